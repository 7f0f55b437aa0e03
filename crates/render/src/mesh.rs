use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::device::{
    BufferId, BufferKind, GpuDevice, GpuError, TextureId, VertexArrayId, VertexAttribute,
    VertexLayout,
};
use crate::error::RenderError;
use crate::material::Material;

/// The second per-vertex stream: either texture coordinates or colours.
#[derive(Debug, Clone, PartialEq)]
pub enum Secondary {
    /// Two floats per vertex.
    TexCoords(Vec<f32>),
    /// Three floats per vertex.
    Colors(Vec<f32>),
}

impl Secondary {
    pub fn components(&self) -> usize {
        match self {
            Secondary::TexCoords(_) => 2,
            Secondary::Colors(_) => 3,
        }
    }

    pub fn values(&self) -> &[f32] {
        match self {
            Secondary::TexCoords(values) | Secondary::Colors(values) => values,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Secondary::TexCoords(_) => "texture coordinates",
            Secondary::Colors(_) => "colours",
        }
    }
}

/// Raw vertex and index arrays, as produced by a mesh loader.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Three floats per vertex.
    pub positions: Vec<f32>,
    pub secondary: Secondary,
    /// Empty, or three floats per vertex.
    pub normals: Vec<f32>,
    /// Triangle list.
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check every stream against the vertex count. Nothing is truncated:
    /// any mismatch is an error.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.positions.is_empty() || self.positions.len() % 3 != 0 {
            return Err(RenderError::resource(format!(
                "{} position floats is not a non-empty multiple of 3",
                self.positions.len()
            )));
        }
        let vertices = self.vertex_count();
        let secondary = self.secondary.values().len();
        if secondary != vertices * self.secondary.components() {
            return Err(RenderError::resource(format!(
                "{secondary} floats of {} for {vertices} vertices",
                self.secondary.label()
            )));
        }
        if !self.normals.is_empty() && self.normals.len() != vertices * 3 {
            return Err(RenderError::resource(format!(
                "{} normal floats for {vertices} vertices",
                self.normals.len()
            )));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(RenderError::resource(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        if let Some(index) = self.indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(RenderError::resource(format!(
                "index {index} out of range for {vertices} vertices"
            )));
        }
        Ok(())
    }
}

/// Anything the renderer can draw with the program currently bound.
pub trait Drawable {
    fn draw(&self, device: &mut dyn GpuDevice) -> Result<(), RenderError>;
}

/// Vertex and index buffers on the GPU plus the vertex array describing
/// them.
///
/// Attribute locations: 0 position, 1 texture coordinates or colour,
/// 2 normal (only when normals were supplied). Streams are tightly packed,
/// one buffer each. Meshes are shared between scene items through `Rc`, so
/// release goes through `&self`.
#[derive(Debug)]
pub struct Mesh {
    vertex_array: VertexArrayId,
    buffers: Vec<BufferId>,
    vertex_count: u32,
    index_count: u32,
    material: RefCell<Material>,
    released: Cell<bool>,
}

impl Mesh {
    /// Validate `data` and upload it. On failure every handle created so far
    /// is released again.
    pub fn create(device: &mut dyn GpuDevice, data: &MeshData) -> Result<Self, RenderError> {
        data.validate()?;

        let mut created = Vec::with_capacity(4);
        let vertex_array = match upload(device, data, &mut created) {
            Ok(vertex_array) => vertex_array,
            Err(err) => {
                for buffer in created.iter().rev() {
                    if let Err(release) = device.delete_buffer(*buffer) {
                        tracing::warn!(%buffer, error = %release, "buffer release failed");
                    }
                }
                return Err(RenderError::resource(format!("mesh upload failed: {err}")));
            }
        };

        tracing::debug!(
            %vertex_array,
            vertices = data.vertex_count(),
            indices = data.indices.len(),
            "mesh created"
        );
        Ok(Self {
            vertex_array,
            buffers: created,
            vertex_count: data.vertex_count() as u32,
            index_count: data.indices.len() as u32,
            material: RefCell::new(Material::default()),
            released: Cell::new(false),
        })
    }

    pub fn with_material(self, material: Material) -> Self {
        self.material.replace(material);
        self
    }

    pub fn set_material(&self, material: Material) {
        self.material.replace(material);
    }

    pub fn material(&self) -> Material {
        self.material.borrow().clone()
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Bind texture and vertex array, draw every index, unbind.
    ///
    /// Drawing after [`cleanup`](Self::cleanup) is a bug: it panics in debug
    /// builds and fails with [`GpuError::InvalidState`] in release builds.
    pub fn render(&self, device: &mut dyn GpuDevice) -> Result<(), RenderError> {
        debug_assert!(
            !self.released.get(),
            "draw of released mesh {}",
            self.vertex_array
        );
        if self.released.get() {
            return Err(GpuError::InvalidState(format!(
                "draw of released mesh {}",
                self.vertex_array
            ))
            .into());
        }
        let texture = self.material.borrow().texture.as_ref().map(|t| t.id());
        let mut binding = MeshBinding::bind(device, self.vertex_array, texture)?;
        binding.device.draw_indexed(self.index_count)?;
        Ok(())
    }

    /// Release buffers and vertex array. The material's texture is released
    /// too when this mesh held the last reference to it. Safe to call more
    /// than once; release failures are logged and the rest is still freed.
    pub fn cleanup(&self, device: &mut dyn GpuDevice) {
        if self.released.replace(true) {
            return;
        }
        if let Err(err) = device.delete_vertex_array(self.vertex_array) {
            tracing::warn!(vertex_array = %self.vertex_array, error = %err, "vertex array release failed");
        }
        for buffer in &self.buffers {
            if let Err(err) = device.delete_buffer(*buffer) {
                tracing::warn!(%buffer, error = %err, "buffer release failed");
            }
        }
        let texture = self.material.borrow_mut().texture.take();
        if let Some(texture) = texture {
            match Rc::try_unwrap(texture) {
                Ok(texture) => texture.cleanup(device),
                Err(shared) => tracing::debug!(
                    id = %shared.id(),
                    owners = Rc::strong_count(&shared) - 1,
                    "texture still shared, not released"
                ),
            }
        }
        tracing::debug!(vertex_array = %self.vertex_array, "mesh released");
    }
}

impl Drawable for Mesh {
    fn draw(&self, device: &mut dyn GpuDevice) -> Result<(), RenderError> {
        self.render(device)
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if !self.released.get() {
            tracing::warn!(vertex_array = %self.vertex_array, "mesh dropped without cleanup");
        }
    }
}

fn upload(
    device: &mut dyn GpuDevice,
    data: &MeshData,
    created: &mut Vec<BufferId>,
) -> Result<VertexArrayId, GpuError> {
    let mut streams = vec![
        (0, 3, data.positions.as_slice()),
        (
            1,
            data.secondary.components() as u32,
            data.secondary.values(),
        ),
    ];
    if !data.normals.is_empty() {
        streams.push((2, 3, data.normals.as_slice()));
    }

    let mut attributes = Vec::with_capacity(streams.len());
    for (location, components, values) in streams {
        let buffer = device.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(values))?;
        created.push(buffer);
        attributes.push(VertexAttribute {
            location,
            buffer,
            components,
        });
    }
    let index_buffer =
        device.create_buffer(BufferKind::Index, bytemuck::cast_slice(&data.indices))?;
    created.push(index_buffer);

    device.create_vertex_array(&VertexLayout {
        attributes,
        index_buffer,
    })
}

/// Holds a mesh's texture and vertex array bound; unbinds both on drop,
/// including when the draw in between fails.
struct MeshBinding<'a> {
    device: &'a mut dyn GpuDevice,
    textured: bool,
    vertex_array_bound: bool,
}

impl<'a> MeshBinding<'a> {
    fn bind(
        device: &'a mut dyn GpuDevice,
        vertex_array: VertexArrayId,
        texture: Option<TextureId>,
    ) -> Result<Self, GpuError> {
        if let Some(texture) = texture {
            device.bind_texture(0, Some(texture))?;
        }
        let mut binding = Self {
            device,
            textured: texture.is_some(),
            vertex_array_bound: false,
        };
        binding.device.bind_vertex_array(Some(vertex_array))?;
        binding.vertex_array_bound = true;
        Ok(binding)
    }
}

impl Drop for MeshBinding<'_> {
    fn drop(&mut self) {
        if self.vertex_array_bound {
            if let Err(err) = self.device.bind_vertex_array(None) {
                tracing::warn!(error = %err, "vertex array unbind failed");
            }
        }
        if self.textured {
            if let Err(err) = self.device.bind_texture(0, None) {
                tracing::warn!(error = %err, "texture unbind failed");
            }
        }
    }
}
