use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec4;

use crate::device::{
    BufferId, BufferKind, GpuDevice, GpuError, ProgramId, ShaderId, ShaderStage, TextureId,
    UniformLocation, UniformValue, VertexArrayId, VertexLayout,
};

/// One call made against a [`HeadlessDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateBuffer {
        buffer: BufferId,
        kind: BufferKind,
        bytes: usize,
    },
    DeleteBuffer(BufferId),
    CreateVertexArray(VertexArrayId),
    DeleteVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    CreateTexture {
        texture: TextureId,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureId),
    BindTexture {
        unit: u32,
        texture: Option<TextureId>,
    },
    CreateProgram(ProgramId),
    CompileShader {
        shader: ShaderId,
        stage: ShaderStage,
    },
    AttachShader {
        program: ProgramId,
        shader: ShaderId,
    },
    LinkProgram(ProgramId),
    DeleteShader(ShaderId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform {
        program: ProgramId,
        name: String,
        value: UniformValue,
    },
    Clear(Vec4),
    Viewport {
        width: u32,
        height: u32,
    },
    DrawIndexed {
        vertex_array: VertexArrayId,
        index_count: u32,
    },
    FinishFrame,
}

struct ShaderRecord {
    stage: ShaderStage,
    source: String,
}

#[derive(Default)]
struct ProgramRecord {
    attached: Vec<(ShaderStage, String)>,
    linked: bool,
    /// Identifiers declared anywhere in the linked stages.
    identifiers: HashSet<String>,
    /// Resolved uniform names; the index is the location.
    uniforms: Vec<String>,
}

/// In-memory GPU context.
///
/// Allocates integer handles, validates every handle it is given, tracks
/// bind state the way a real driver would and records each call as a
/// [`DeviceCommand`]. Used by tests and by the headless CLI runner.
///
/// Shader "compilation" accepts any non-empty source without an `#error`
/// line; linking needs a vertex and a fragment stage; a uniform resolves
/// when every dot-separated segment of its name appears as an identifier in
/// the linked sources.
pub struct HeadlessDevice {
    next_handle: u32,
    buffers: HashMap<BufferId, (BufferKind, usize)>,
    vertex_arrays: HashMap<VertexArrayId, VertexLayout>,
    textures: HashMap<TextureId, (u32, u32)>,
    shaders: HashMap<ShaderId, ShaderRecord>,
    programs: HashMap<ProgramId, ProgramRecord>,
    current_program: Option<ProgramId>,
    current_vertex_array: Option<VertexArrayId>,
    texture_units: BTreeMap<u32, TextureId>,
    viewport: (u32, u32),
    allocations_left: Option<usize>,
    frames: u64,
    commands: Vec<DeviceCommand>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            current_program: None,
            current_vertex_array: None,
            texture_units: BTreeMap::new(),
            viewport: (0, 0),
            allocations_left: None,
            frames: 0,
            commands: Vec::new(),
        }
    }

    /// Let the next `n` allocations succeed, then fail every later one.
    pub fn fail_allocations_after(&mut self, n: usize) {
        self.allocations_left = Some(n);
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// `(vertex array, index count)` of every draw, in issue order.
    pub fn draw_calls(&self) -> Vec<(VertexArrayId, u32)> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DeviceCommand::DrawIndexed {
                    vertex_array,
                    index_count,
                } => Some((*vertex_array, *index_count)),
                _ => None,
            })
            .collect()
    }

    /// Every value uploaded to `name`, in upload order.
    pub fn uploads_to(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DeviceCommand::SetUniform {
                    name: uploaded,
                    value,
                    ..
                } if uploaded == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Buffers, vertex arrays, textures, shaders and programs not yet
    /// deleted.
    pub fn live_handles(&self) -> usize {
        self.buffers.len()
            + self.vertex_arrays.len()
            + self.textures.len()
            + self.shaders.len()
            + self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn buffer_len(&self, buffer: BufferId) -> Option<usize> {
        self.buffers.get(&buffer).map(|(_, bytes)| *bytes)
    }

    pub fn vertex_layout(&self, vertex_array: VertexArrayId) -> Option<&VertexLayout> {
        self.vertex_arrays.get(&vertex_array)
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn current_vertex_array(&self) -> Option<VertexArrayId> {
        self.current_vertex_array
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(&unit).copied()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn allocate(&mut self, what: &str) -> Result<u32, GpuError> {
        match self.allocations_left {
            Some(0) => {
                return Err(GpuError::Allocation(format!("{what}: device out of memory")));
            }
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        Ok(handle)
    }

    fn program(&self, program: ProgramId) -> Result<&ProgramRecord, GpuError> {
        self.programs
            .get(&program)
            .ok_or_else(|| GpuError::invalid_handle(program))
    }
}

fn identifiers(source: &str) -> impl Iterator<Item = &str> {
    source
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
}

impl GpuDevice for HeadlessDevice {
    fn backend(&self) -> &str {
        "headless"
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GpuError> {
        let buffer = BufferId(self.allocate("buffer")?);
        self.buffers.insert(buffer, (kind, data.len()));
        self.commands.push(DeviceCommand::CreateBuffer {
            buffer,
            kind,
            bytes: data.len(),
        });
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), GpuError> {
        self.buffers
            .remove(&buffer)
            .ok_or_else(|| GpuError::invalid_handle(buffer))?;
        self.commands.push(DeviceCommand::DeleteBuffer(buffer));
        Ok(())
    }

    fn create_vertex_array(&mut self, layout: &VertexLayout) -> Result<VertexArrayId, GpuError> {
        for attribute in &layout.attributes {
            match self.buffers.get(&attribute.buffer) {
                Some((BufferKind::Vertex, _)) => {}
                Some((BufferKind::Index, _)) => {
                    return Err(GpuError::InvalidState(format!(
                        "attribute {} reads from index buffer {}",
                        attribute.location, attribute.buffer
                    )));
                }
                None => return Err(GpuError::invalid_handle(attribute.buffer)),
            }
        }
        match self.buffers.get(&layout.index_buffer) {
            Some((BufferKind::Index, _)) => {}
            Some((BufferKind::Vertex, _)) => {
                return Err(GpuError::InvalidState(format!(
                    "{} is not an index buffer",
                    layout.index_buffer
                )));
            }
            None => return Err(GpuError::invalid_handle(layout.index_buffer)),
        }
        let vertex_array = VertexArrayId(self.allocate("vertex array")?);
        self.vertex_arrays.insert(vertex_array, layout.clone());
        self.commands
            .push(DeviceCommand::CreateVertexArray(vertex_array));
        Ok(vertex_array)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) -> Result<(), GpuError> {
        self.vertex_arrays
            .remove(&vertex_array)
            .ok_or_else(|| GpuError::invalid_handle(vertex_array))?;
        if self.current_vertex_array == Some(vertex_array) {
            self.current_vertex_array = None;
        }
        self.commands
            .push(DeviceCommand::DeleteVertexArray(vertex_array));
        Ok(())
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) -> Result<(), GpuError> {
        if let Some(id) = vertex_array {
            if !self.vertex_arrays.contains_key(&id) {
                return Err(GpuError::invalid_handle(id));
            }
        }
        self.current_vertex_array = vertex_array;
        self.commands
            .push(DeviceCommand::BindVertexArray(vertex_array));
        Ok(())
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureId, GpuError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(GpuError::InvalidState(format!(
                "{width}x{height} texture needs {expected} bytes, got {}",
                rgba.len()
            )));
        }
        let texture = TextureId(self.allocate("texture")?);
        self.textures.insert(texture, (width, height));
        self.commands.push(DeviceCommand::CreateTexture {
            texture,
            width,
            height,
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureId) -> Result<(), GpuError> {
        self.textures
            .remove(&texture)
            .ok_or_else(|| GpuError::invalid_handle(texture))?;
        self.texture_units.retain(|_, bound| *bound != texture);
        self.commands.push(DeviceCommand::DeleteTexture(texture));
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) -> Result<(), GpuError> {
        match texture {
            Some(id) => {
                if !self.textures.contains_key(&id) {
                    return Err(GpuError::invalid_handle(id));
                }
                self.texture_units.insert(unit, id);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
        self.commands
            .push(DeviceCommand::BindTexture { unit, texture });
        Ok(())
    }

    fn create_program(&mut self) -> Result<ProgramId, GpuError> {
        let program = ProgramId(self.allocate("program")?);
        self.programs.insert(program, ProgramRecord::default());
        self.commands.push(DeviceCommand::CreateProgram(program));
        Ok(program)
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GpuError> {
        if source.trim().is_empty() {
            return Err(GpuError::Compile(format!("{stage} shader source is empty")));
        }
        if let Some((line, text)) = source
            .lines()
            .enumerate()
            .find(|(_, text)| text.trim_start().starts_with("#error"))
        {
            return Err(GpuError::Compile(format!(
                "0:{}: {}",
                line + 1,
                text.trim()
            )));
        }
        let shader = ShaderId(self.allocate("shader")?);
        self.shaders.insert(
            shader,
            ShaderRecord {
                stage,
                source: source.to_owned(),
            },
        );
        self.commands
            .push(DeviceCommand::CompileShader { shader, stage });
        Ok(shader)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) -> Result<(), GpuError> {
        let record = self
            .shaders
            .get(&shader)
            .ok_or_else(|| GpuError::invalid_handle(shader))?;
        let entry = (record.stage, record.source.clone());
        self.programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::invalid_handle(program))?
            .attached
            .push(entry);
        self.commands
            .push(DeviceCommand::AttachShader { program, shader });
        Ok(())
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        let record = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::invalid_handle(program))?;
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !record.attached.iter().any(|(s, _)| *s == stage) {
                return Err(GpuError::Link(format!("no {stage} shader attached")));
            }
        }
        record.identifiers = record
            .attached
            .iter()
            .flat_map(|(_, source)| identifiers(source))
            .map(str::to_owned)
            .collect();
        record.uniforms.clear();
        record.linked = true;
        self.commands.push(DeviceCommand::LinkProgram(program));
        Ok(())
    }

    fn delete_shader(&mut self, shader: ShaderId) -> Result<(), GpuError> {
        self.shaders
            .remove(&shader)
            .ok_or_else(|| GpuError::invalid_handle(shader))?;
        self.commands.push(DeviceCommand::DeleteShader(shader));
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        self.programs
            .remove(&program)
            .ok_or_else(|| GpuError::invalid_handle(program))?;
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.commands.push(DeviceCommand::DeleteProgram(program));
        Ok(())
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let record = self.programs.get_mut(&program)?;
        if !record.linked || name.is_empty() {
            return None;
        }
        if let Some(index) = record.uniforms.iter().position(|n| n == name) {
            return Some(UniformLocation(index as u32));
        }
        let declared = name
            .split('.')
            .all(|segment| record.identifiers.contains(segment));
        if !declared {
            return None;
        }
        record.uniforms.push(name.to_owned());
        Some(UniformLocation(record.uniforms.len() as u32 - 1))
    }

    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), GpuError> {
        if let Some(id) = program {
            if !self.program(id)?.linked {
                return Err(GpuError::InvalidState(format!("{id} is not linked")));
            }
        }
        self.current_program = program;
        self.commands.push(DeviceCommand::UseProgram(program));
        Ok(())
    }

    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), GpuError> {
        let program = self
            .current_program
            .ok_or_else(|| GpuError::InvalidState("uniform upload with no program in use".into()))?;
        let name = self
            .program(program)?
            .uniforms
            .get(location.0 as usize)
            .cloned()
            .ok_or_else(|| GpuError::invalid_handle(location))?;
        self.commands.push(DeviceCommand::SetUniform {
            program,
            name,
            value: *value,
        });
        Ok(())
    }

    fn clear(&mut self, color: Vec4) -> Result<(), GpuError> {
        self.commands.push(DeviceCommand::Clear(color));
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.commands
            .push(DeviceCommand::Viewport { width, height });
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), GpuError> {
        if self.current_program.is_none() {
            return Err(GpuError::InvalidState("draw with no program in use".into()));
        }
        let vertex_array = self
            .current_vertex_array
            .ok_or_else(|| GpuError::InvalidState("draw with no vertex array bound".into()))?;
        let layout = self
            .vertex_arrays
            .get(&vertex_array)
            .ok_or_else(|| GpuError::invalid_handle(vertex_array))?;
        let available = self
            .buffers
            .get(&layout.index_buffer)
            .map(|(_, bytes)| bytes / 4)
            .unwrap_or(0);
        if index_count as usize > available {
            return Err(GpuError::InvalidState(format!(
                "draw of {index_count} indices from a buffer holding {available}"
            )));
        }
        self.commands.push(DeviceCommand::DrawIndexed {
            vertex_array,
            index_count,
        });
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), GpuError> {
        self.frames += 1;
        self.commands.push(DeviceCommand::FinishFrame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::VertexAttribute;

    const VERTEX: &str = "uniform mat4 projectionMatrix; void main() {}";
    const FRAGMENT: &str = "struct Material { vec4 ambient; }; uniform Material material;";

    fn linked_program(device: &mut HeadlessDevice) -> ProgramId {
        let program = device.create_program().unwrap();
        let vs = device.compile_shader(ShaderStage::Vertex, VERTEX).unwrap();
        let fs = device
            .compile_shader(ShaderStage::Fragment, FRAGMENT)
            .unwrap();
        device.attach_shader(program, vs).unwrap();
        device.attach_shader(program, fs).unwrap();
        device.link_program(program).unwrap();
        program
    }

    fn triangle(device: &mut HeadlessDevice) -> VertexArrayId {
        let positions = device.create_buffer(BufferKind::Vertex, &[0; 36]).unwrap();
        let indices = device.create_buffer(BufferKind::Index, &[0; 12]).unwrap();
        device
            .create_vertex_array(&VertexLayout {
                attributes: vec![VertexAttribute {
                    location: 0,
                    buffer: positions,
                    components: 3,
                }],
                index_buffer: indices,
            })
            .unwrap()
    }

    #[test]
    fn double_delete_is_invalid_handle() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(BufferKind::Vertex, &[1, 2, 3]).unwrap();
        assert_eq!(device.buffer_len(buffer), Some(3));
        device.delete_buffer(buffer).unwrap();
        assert!(matches!(
            device.delete_buffer(buffer),
            Err(GpuError::InvalidHandle(_))
        ));
        assert_eq!(device.live_handles(), 0);
    }

    #[test]
    fn compile_errors_carry_a_log() {
        let mut device = HeadlessDevice::new();
        let err = device
            .compile_shader(ShaderStage::Vertex, "void main() {}\n#error broken\n")
            .unwrap_err();
        assert_eq!(err, GpuError::Compile("0:2: #error broken".into()));
        assert!(matches!(
            device.compile_shader(ShaderStage::Fragment, "   "),
            Err(GpuError::Compile(_))
        ));
    }

    #[test]
    fn link_requires_both_stages() {
        let mut device = HeadlessDevice::new();
        let program = device.create_program().unwrap();
        let vs = device.compile_shader(ShaderStage::Vertex, VERTEX).unwrap();
        device.attach_shader(program, vs).unwrap();
        assert!(matches!(
            device.link_program(program),
            Err(GpuError::Link(log)) if log.contains("fragment")
        ));
    }

    #[test]
    fn uniforms_resolve_from_declared_identifiers() {
        let mut device = HeadlessDevice::new();
        let program = linked_program(&mut device);

        let projection = device.uniform_location(program, "projectionMatrix");
        assert!(projection.is_some());
        assert_eq!(device.uniform_location(program, "projectionMatrix"), projection);
        assert!(device.uniform_location(program, "material.ambient").is_some());
        assert!(device.uniform_location(program, "material.shininess").is_none());
        assert!(device.uniform_location(program, "modelViewMatrix").is_none());
    }

    #[test]
    fn uniform_upload_needs_program_in_use() {
        let mut device = HeadlessDevice::new();
        let program = linked_program(&mut device);
        let location = device
            .uniform_location(program, "projectionMatrix")
            .unwrap();
        let value = UniformValue::Float(1.0);

        assert!(matches!(
            device.set_uniform(location, &value),
            Err(GpuError::InvalidState(_))
        ));
        device.use_program(Some(program)).unwrap();
        device.set_uniform(location, &value).unwrap();
        assert_eq!(device.uploads_to("projectionMatrix"), vec![value]);
    }

    #[test]
    fn draw_requires_bound_vertex_array() {
        let mut device = HeadlessDevice::new();
        let program = linked_program(&mut device);
        let vertex_array = triangle(&mut device);
        device.use_program(Some(program)).unwrap();

        assert!(matches!(
            device.draw_indexed(3),
            Err(GpuError::InvalidState(_))
        ));
        device.bind_vertex_array(Some(vertex_array)).unwrap();
        device.draw_indexed(3).unwrap();
        assert!(device.draw_indexed(4).is_err());
        assert_eq!(device.draw_calls(), vec![(vertex_array, 3)]);
    }

    #[test]
    fn deleting_bound_objects_unbinds_them() {
        let mut device = HeadlessDevice::new();
        let program = linked_program(&mut device);
        let vertex_array = triangle(&mut device);
        let texture = device.create_texture(1, 1, &[255; 4]).unwrap();
        device.use_program(Some(program)).unwrap();
        device.bind_vertex_array(Some(vertex_array)).unwrap();
        device.bind_texture(0, Some(texture)).unwrap();

        device.delete_program(program).unwrap();
        device.delete_vertex_array(vertex_array).unwrap();
        device.delete_texture(texture).unwrap();

        assert_eq!(device.current_program(), None);
        assert_eq!(device.current_vertex_array(), None);
        assert_eq!(device.bound_texture(0), None);
    }

    #[test]
    fn injected_allocation_failure() {
        let mut device = HeadlessDevice::new();
        device.fail_allocations_after(1);
        assert!(device.create_buffer(BufferKind::Vertex, &[0; 4]).is_ok());
        assert!(matches!(
            device.create_buffer(BufferKind::Vertex, &[0; 4]),
            Err(GpuError::Allocation(_))
        ));
        assert!(device.create_program().is_err());
    }

    #[test]
    fn texture_size_must_match_data() {
        let mut device = HeadlessDevice::new();
        assert!(device.create_texture(2, 2, &[0; 15]).is_err());
        assert!(device.create_texture(2, 2, &[0; 16]).is_ok());
    }
}
