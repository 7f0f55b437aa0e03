use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec4;
use hearth_render::{
    BufferId, BufferKind, GpuDevice, GpuError, ProgramId, ShaderId, ShaderStage, TextureId,
    UniformLocation, UniformValue, VertexArrayId, VertexLayout,
};
use wgpu::util::DeviceExt;

use crate::layout::{self, UniformBlock};
use crate::streams::{self, STREAM_COUNT, Stream, StreamShape};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct CompiledStage {
    stage: ShaderStage,
    module: Rc<wgpu::ShaderModule>,
    block: UniformBlock,
}

struct LinkedProgram {
    vertex: Rc<wgpu::ShaderModule>,
    fragment: Rc<wgpu::ShaderModule>,
    block: UniformBlock,
    /// CPU copy of the uniform struct; snapshotted into the frame on draw.
    shadow: Vec<u8>,
    pipelines: HashMap<StreamShape, Rc<wgpu::RenderPipeline>>,
}

#[derive(Default)]
struct ProgramSlot {
    attached: Vec<ShaderId>,
    linked: Option<LinkedProgram>,
}

struct GpuBuffer {
    buffer: Rc<wgpu::Buffer>,
    kind: BufferKind,
}

struct VertexArray {
    streams: [Stream; STREAM_COUNT],
    index_buffer: BufferId,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: Rc<wgpu::TextureView>,
}

struct RecordedDraw {
    pipeline: Rc<wgpu::RenderPipeline>,
    vertex_buffers: Vec<Rc<wgpu::Buffer>>,
    index_buffer: Rc<wgpu::Buffer>,
    texture: Option<TextureId>,
    view: Rc<wgpu::TextureView>,
    block_size: u32,
    uniform_offset: u32,
    index_count: u32,
}

#[derive(Default)]
struct Frame {
    draws: Vec<RecordedDraw>,
    uniforms: Vec<u8>,
}

/// [`GpuDevice`] on top of wgpu.
///
/// wgpu has no immediate-mode draws, so the bind-then-draw calls are
/// recorded: every `draw_indexed` captures the pipeline, buffers, texture
/// and a snapshot of the program's uniform struct. `finish_frame` writes the
/// snapshots into one dynamic-offset uniform buffer, replays the draws in a
/// single render pass and presents.
pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    backend: String,
    depth_view: wgpu::TextureView,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    default_view: Rc<wgpu::TextureView>,
    _default_texture: wgpu::Texture,
    fallbacks: Vec<Rc<wgpu::Buffer>>,
    uniform_ring: wgpu::Buffer,
    uniform_align: u32,

    next_handle: u32,
    buffers: HashMap<BufferId, GpuBuffer>,
    vertex_arrays: HashMap<VertexArrayId, VertexArray>,
    textures: HashMap<TextureId, GpuTexture>,
    shaders: HashMap<ShaderId, CompiledStage>,
    programs: HashMap<ProgramId, ProgramSlot>,

    current_program: Option<ProgramId>,
    current_vertex_array: Option<VertexArrayId>,
    bound_texture: Option<TextureId>,
    clear_color: Vec4,
    frame: Frame,
}

impl WgpuDevice {
    /// Open a device presenting to `target` (usually an `Arc<Window>`).
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(target)
            .map_err(|e| GpuError::Backend(format!("create surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| GpuError::Backend("no compatible adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("hearth_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| GpuError::Backend(format!("request device: {e}")))?;
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            tracing::error!(error = %err, "uncaptured wgpu error");
        }));

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| GpuError::Backend("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            ..Default::default()
        });

        let default_texture = upload_texture(&device, &queue, 1, 1, &[255; 4]);
        let default_view = Rc::new(default_texture.create_view(&Default::default()));
        let fallbacks = streams::FALLBACKS
            .iter()
            .map(|value| {
                Rc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("fallback_attribute"),
                    contents: bytemuck::cast_slice(value),
                    usage: wgpu::BufferUsages::VERTEX,
                }))
            })
            .collect();
        let uniform_align = device.limits().min_uniform_buffer_offset_alignment;
        let uniform_ring = create_uniform_ring(&device, 64 * 1024);
        let depth_view = create_depth_texture(&device, config.width, config.height);

        let info = adapter.get_info();
        let backend = format!("wgpu/{}", info.backend.to_str());
        tracing::info!(
            adapter = %info.name,
            backend = %backend,
            ?format,
            width = config.width,
            height = config.height,
            "GPU initialized"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            backend,
            depth_view,
            bind_group_layout,
            pipeline_layout,
            sampler,
            default_view,
            _default_texture: default_texture,
            fallbacks,
            uniform_ring,
            uniform_align,
            next_handle: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            current_program: None,
            current_vertex_array: None,
            bound_texture: None,
            clear_color: Vec4::ZERO,
            frame: Frame::default(),
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Run `f` with validation and out-of-memory errors captured.
    fn captured<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let out = f(&self.device);
        let oom = pollster::block_on(self.device.pop_error_scope());
        let invalid = pollster::block_on(self.device.pop_error_scope());
        (out, oom.or(invalid))
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, self.config.width, self.config.height);
    }

    fn linked_mut(&mut self, program: ProgramId) -> Result<&mut LinkedProgram, GpuError> {
        self.programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::InvalidHandle(program.to_string()))?
            .linked
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState(format!("{program} is not linked")))
    }

    fn pipeline(
        &mut self,
        program: ProgramId,
        shape: StreamShape,
    ) -> Result<Rc<wgpu::RenderPipeline>, GpuError> {
        if let Some(pipeline) = self.linked_mut(program)?.pipelines.get(&shape) {
            return Ok(pipeline.clone());
        }
        let (vertex, fragment) = {
            let linked = self.linked_mut(program)?;
            (linked.vertex.clone(), linked.fragment.clone())
        };
        let format = self.config.format;
        let (pipeline, err) = self.captured(|device| {
            build_pipeline(device, &self.pipeline_layout, format, &vertex, &fragment, &shape)
        });
        if let Some(err) = err {
            return Err(GpuError::Backend(format!("pipeline for {program}: {err}")));
        }
        let pipeline = Rc::new(pipeline);
        self.linked_mut(program)?
            .pipelines
            .insert(shape, pipeline.clone());
        tracing::debug!(%program, ?shape, "render pipeline created");
        Ok(pipeline)
    }

    fn ensure_ring_capacity(&mut self, bytes: u64) {
        if bytes <= self.uniform_ring.size() {
            return;
        }
        let size = bytes.next_power_of_two();
        tracing::debug!(size, "growing uniform buffer");
        self.uniform_ring = create_uniform_ring(&self.device, size);
    }

    fn present(&mut self, frame: Frame) -> Result<(), GpuError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost or outdated, reconfiguring and dropping frame");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface acquire timed out, dropping frame");
                return Ok(());
            }
            Err(err) => return Err(GpuError::Backend(format!("acquire frame: {err}"))),
        };
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.ensure_ring_capacity(frame.uniforms.len() as u64);
        if !frame.uniforms.is_empty() {
            self.queue.write_buffer(&self.uniform_ring, 0, &frame.uniforms);
        }

        let mut bind_groups: HashMap<(Option<TextureId>, u32), wgpu::BindGroup> = HashMap::new();
        for draw in &frame.draws {
            bind_groups
                .entry((draw.texture, draw.block_size))
                .or_insert_with(|| {
                    self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("scene_bind_group"),
                        layout: &self.bind_group_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                    buffer: &self.uniform_ring,
                                    offset: 0,
                                    size: wgpu::BufferSize::new(u64::from(draw.block_size)),
                                }),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::TextureView(draw.view.as_ref()),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: wgpu::BindingResource::Sampler(&self.sampler),
                            },
                        ],
                    })
                });
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let c = self.clear_color.as_dvec4();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: c.x,
                            g: c.y,
                            b: c.z,
                            a: c.w,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in &frame.draws {
                let Some(bind_group) = bind_groups.get(&(draw.texture, draw.block_size)) else {
                    continue;
                };
                pass.set_pipeline(&draw.pipeline);
                pass.set_bind_group(0, bind_group, &[draw.uniform_offset]);
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl GpuDevice for WgpuDevice {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GpuError> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let (buffer, err) = self.captured(|device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_buffer"),
                contents: data,
                usage,
            })
        });
        if let Some(err) = err {
            return Err(GpuError::Allocation(format!("{} bytes: {err}", data.len())));
        }
        let id = BufferId(self.next());
        self.buffers.insert(
            id,
            GpuBuffer {
                buffer: Rc::new(buffer),
                kind,
            },
        );
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), GpuError> {
        self.buffers
            .remove(&buffer)
            .map(drop)
            .ok_or_else(|| GpuError::InvalidHandle(buffer.to_string()))
    }

    fn create_vertex_array(&mut self, layout: &VertexLayout) -> Result<VertexArrayId, GpuError> {
        let streams = streams::resolve(layout)?;
        for stream in &streams {
            if let Stream::Attribute { buffer, .. } = stream {
                match self.buffers.get(buffer) {
                    Some(b) if b.kind == BufferKind::Vertex => {}
                    Some(_) => {
                        return Err(GpuError::InvalidState(format!(
                            "{buffer} is not a vertex buffer"
                        )));
                    }
                    None => return Err(GpuError::InvalidHandle(buffer.to_string())),
                }
            }
        }
        match self.buffers.get(&layout.index_buffer) {
            Some(b) if b.kind == BufferKind::Index => {}
            Some(_) => {
                return Err(GpuError::InvalidState(format!(
                    "{} is not an index buffer",
                    layout.index_buffer
                )));
            }
            None => return Err(GpuError::InvalidHandle(layout.index_buffer.to_string())),
        }
        let id = VertexArrayId(self.next());
        self.vertex_arrays.insert(
            id,
            VertexArray {
                streams,
                index_buffer: layout.index_buffer,
            },
        );
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) -> Result<(), GpuError> {
        self.vertex_arrays
            .remove(&vertex_array)
            .ok_or_else(|| GpuError::InvalidHandle(vertex_array.to_string()))?;
        if self.current_vertex_array == Some(vertex_array) {
            self.current_vertex_array = None;
        }
        Ok(())
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) -> Result<(), GpuError> {
        if let Some(id) = vertex_array {
            if !self.vertex_arrays.contains_key(&id) {
                return Err(GpuError::InvalidHandle(id.to_string()));
            }
        }
        self.current_vertex_array = vertex_array;
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
                "{width}x{height} texture with {} bytes",
                rgba.len()
            )));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(GpuError::Allocation(format!(
                "{width}x{height} exceeds the {max} pixel limit"
            )));
        }
        let (texture, err) =
            self.captured(|device| upload_texture(device, &self.queue, width, height, rgba));
        if let Some(err) = err {
            return Err(GpuError::Allocation(format!("{width}x{height} texture: {err}")));
        }
        let view = Rc::new(texture.create_view(&Default::default()));
        let id = TextureId(self.next());
        self.textures.insert(
            id,
            GpuTexture {
                _texture: texture,
                view,
            },
        );
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) -> Result<(), GpuError> {
        self.textures
            .remove(&texture)
            .ok_or_else(|| GpuError::InvalidHandle(texture.to_string()))?;
        if self.bound_texture == Some(texture) {
            self.bound_texture = None;
        }
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) -> Result<(), GpuError> {
        if unit != 0 {
            return Err(GpuError::InvalidState(format!(
                "texture unit {unit} unsupported, only unit 0 is sampled"
            )));
        }
        if let Some(id) = texture {
            if !self.textures.contains_key(&id) {
                return Err(GpuError::InvalidHandle(id.to_string()));
            }
        }
        self.bound_texture = texture;
        Ok(())
    }

    fn create_program(&mut self) -> Result<ProgramId, GpuError> {
        let id = ProgramId(self.next());
        self.programs.insert(id, ProgramSlot::default());
        Ok(id)
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GpuError> {
        if source.trim().is_empty() {
            return Err(GpuError::Compile(format!("{stage} stage: empty source")));
        }
        let entry = match stage {
            ShaderStage::Vertex => VERTEX_ENTRY,
            ShaderStage::Fragment => FRAGMENT_ENTRY,
        };
        if !source.contains(&format!("fn {entry}")) {
            return Err(GpuError::Compile(format!(
                "{stage} stage: missing entry point `{entry}`"
            )));
        }
        let block = layout::reflect(source)
            .map_err(|e| GpuError::Compile(format!("{stage} stage uniforms: {e}")))?;
        let (module, err) = self.captured(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(entry),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        if let Some(err) = err {
            return Err(GpuError::Compile(err.to_string()));
        }
        let id = ShaderId(self.next());
        self.shaders.insert(
            id,
            CompiledStage {
                stage,
                module: Rc::new(module),
                block,
            },
        );
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) -> Result<(), GpuError> {
        if !self.shaders.contains_key(&shader) {
            return Err(GpuError::InvalidHandle(shader.to_string()));
        }
        self.programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::InvalidHandle(program.to_string()))?
            .attached
            .push(shader);
        Ok(())
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        let slot = self
            .programs
            .get(&program)
            .ok_or_else(|| GpuError::InvalidHandle(program.to_string()))?;
        let stage = |wanted: ShaderStage| {
            slot.attached
                .iter()
                .filter_map(|id| self.shaders.get(id))
                .find(|s| s.stage == wanted)
        };
        let (Some(vertex), Some(fragment)) = (stage(ShaderStage::Vertex), stage(ShaderStage::Fragment))
        else {
            return Err(GpuError::Link(
                "a vertex and a fragment stage must be attached".into(),
            ));
        };
        if vertex.block != fragment.block {
            return Err(GpuError::Link(format!(
                "uniform struct differs between stages ({} vs {})",
                vertex.block.type_name, fragment.block.type_name
            )));
        }
        let linked = LinkedProgram {
            vertex: vertex.module.clone(),
            fragment: fragment.module.clone(),
            shadow: vec![0; vertex.block.size as usize],
            block: vertex.block.clone(),
            pipelines: HashMap::new(),
        };
        tracing::debug!(%program, uniform_bytes = linked.block.size, "program linked");
        if let Some(slot) = self.programs.get_mut(&program) {
            slot.linked = Some(linked);
        }
        Ok(())
    }

    fn delete_shader(&mut self, shader: ShaderId) -> Result<(), GpuError> {
        self.shaders
            .remove(&shader)
            .map(drop)
            .ok_or_else(|| GpuError::InvalidHandle(shader.to_string()))
    }

    fn delete_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        self.programs
            .remove(&program)
            .ok_or_else(|| GpuError::InvalidHandle(program.to_string()))?;
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        Ok(())
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let linked = self.programs.get(&program)?.linked.as_ref()?;
        linked
            .block
            .index_of(name)
            .map(|index| UniformLocation(index as u32))
    }

    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), GpuError> {
        if let Some(id) = program {
            self.linked_mut(id)?;
        }
        self.current_program = program;
        Ok(())
    }

    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), GpuError> {
        let program = self
            .current_program
            .ok_or_else(|| GpuError::InvalidState("no program in use".into()))?;
        let linked = self.linked_mut(program)?;
        linked
            .block
            .write(&mut linked.shadow, location.0 as usize, value)
            .map_err(GpuError::InvalidState)
    }

    fn clear(&mut self, color: Vec4) -> Result<(), GpuError> {
        if !self.frame.draws.is_empty() {
            tracing::debug!(dropped = self.frame.draws.len(), "discarding unsubmitted draws");
        }
        self.frame = Frame::default();
        self.clear_color = color;
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (self.config.width, self.config.height) == (width, height) {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
        tracing::debug!(width, height, "surface resized");
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), GpuError> {
        let program = self
            .current_program
            .ok_or_else(|| GpuError::InvalidState("draw without a program in use".into()))?;
        let vertex_array = self
            .current_vertex_array
            .ok_or_else(|| GpuError::InvalidState("draw without a vertex array bound".into()))?;
        let array = self
            .vertex_arrays
            .get(&vertex_array)
            .ok_or_else(|| GpuError::InvalidHandle(vertex_array.to_string()))?;
        let streams = array.streams;
        let index_buffer = self
            .buffers
            .get(&array.index_buffer)
            .ok_or_else(|| GpuError::InvalidHandle(array.index_buffer.to_string()))?
            .buffer
            .clone();
        if u64::from(index_count) * 4 > index_buffer.size() {
            return Err(GpuError::InvalidState(format!(
                "{index_count} indices exceed the index buffer of {vertex_array}"
            )));
        }

        let mut vertex_buffers = Vec::with_capacity(STREAM_COUNT);
        for (slot, stream) in streams.iter().enumerate() {
            let buffer = match stream {
                Stream::Attribute { buffer, .. } => self
                    .buffers
                    .get(buffer)
                    .ok_or_else(|| GpuError::InvalidHandle(buffer.to_string()))?
                    .buffer
                    .clone(),
                Stream::Fallback => self.fallbacks[slot].clone(),
            };
            vertex_buffers.push(buffer);
        }
        let view = match self.bound_texture {
            Some(id) => self
                .textures
                .get(&id)
                .ok_or_else(|| GpuError::InvalidHandle(id.to_string()))?
                .view
                .clone(),
            None => self.default_view.clone(),
        };

        let pipeline = self.pipeline(program, streams::shape(&streams))?;
        let align = self.uniform_align as usize;
        let linked = self.linked_mut(program)?;
        let block_size = linked.block.size;
        let snapshot = linked.shadow.clone();
        let uniforms = &mut self.frame.uniforms;
        let offset = uniforms.len().div_ceil(align) * align;
        uniforms.resize(offset, 0);
        uniforms.extend_from_slice(&snapshot);
        let uniform_offset = u32::try_from(offset)
            .map_err(|_| GpuError::Allocation("frame uniform data exceeds 4 GiB".into()))?;

        self.frame.draws.push(RecordedDraw {
            pipeline,
            vertex_buffers,
            index_buffer,
            texture: self.bound_texture,
            view,
            block_size,
            uniform_offset,
            index_count,
        });
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), GpuError> {
        let frame = std::mem::take(&mut self.frame);
        self.present(frame)
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("rgba_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        rgba,
    )
}

fn create_uniform_ring(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform_ring"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    shape: &StreamShape,
) -> wgpu::RenderPipeline {
    let described = streams::buffer_layouts(shape);
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = described
        .iter()
        .enumerate()
        .map(|(location, (_, _, format))| {
            [wgpu::VertexAttribute {
                format: *format,
                offset: 0,
                shader_location: location as u32,
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout> = described
        .iter()
        .zip(&attributes)
        .map(|((step_mode, stride, _), attributes)| wgpu::VertexBufferLayout {
            array_stride: *stride,
            step_mode: *step_mode,
            attributes,
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("scene_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some(VERTEX_ENTRY),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some(FRAGMENT_ENTRY),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            // Loaded models are not reliably wound.
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}
