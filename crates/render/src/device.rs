use std::fmt;

use glam::{Mat4, Vec3, Vec4};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// A GPU buffer (vertex attribute stream or index list).
    BufferId
);
handle!(
    /// A vertex array: attribute layout plus the index buffer it draws from.
    VertexArrayId
);
handle!(TextureId);
handle!(ProgramId);
handle!(ShaderId);
handle!(
    /// Location of a resolved uniform inside one linked program.
    UniformLocation
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// One tightly packed `f32` attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub buffer: BufferId,
    /// Floats per vertex (2, 3 or 4).
    pub components: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub attributes: Vec<VertexAttribute>,
    /// `u32` indices.
    pub index_buffer: BufferId,
}

/// A value uploaded to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Int(_) => "int",
            UniformValue::Float(_) => "float",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Mat4(_) => "mat4",
        }
    }
}

/// Device-level failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GpuError {
    #[error("GPU allocation failed: {0}")]
    Allocation(String),
    #[error("shader compilation failed: {0}")]
    Compile(String),
    #[error("program link failed: {0}")]
    Link(String),
    #[error("unknown or released handle {0}")]
    InvalidHandle(String),
    #[error("invalid device state: {0}")]
    InvalidState(String),
    #[error("GPU backend error: {0}")]
    Backend(String),
}

impl GpuError {
    pub(crate) fn invalid_handle(handle: impl fmt::Display) -> Self {
        GpuError::InvalidHandle(handle.to_string())
    }
}

/// The GPU context.
///
/// Mirrors a bind-then-draw graphics API: resources are created and deleted
/// explicitly, a program and a vertex array are bound, uniforms are uploaded
/// to the bound program and indexed draws are issued. All calls happen on a
/// single thread, and callers must unbind whatever they bound before
/// returning.
pub trait GpuDevice {
    /// Short backend name for logs.
    fn backend(&self) -> &str;

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GpuError>;
    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), GpuError>;

    fn create_vertex_array(&mut self, layout: &VertexLayout) -> Result<VertexArrayId, GpuError>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) -> Result<(), GpuError>;
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) -> Result<(), GpuError>;

    /// Create an RGBA8 texture; `rgba` holds `width * height * 4` bytes.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureId, GpuError>;
    fn delete_texture(&mut self, texture: TextureId) -> Result<(), GpuError>;
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) -> Result<(), GpuError>;

    fn create_program(&mut self) -> Result<ProgramId, GpuError>;
    /// Compile one stage. Failures carry the compiler log in
    /// [`GpuError::Compile`].
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GpuError>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) -> Result<(), GpuError>;
    /// Link the attached stages. Failures carry the linker log in
    /// [`GpuError::Link`].
    fn link_program(&mut self, program: ProgramId) -> Result<(), GpuError>;
    fn delete_shader(&mut self, shader: ShaderId) -> Result<(), GpuError>;
    fn delete_program(&mut self, program: ProgramId) -> Result<(), GpuError>;

    /// Resolve a uniform of a linked program. `None` if the program has no
    /// active uniform with that name.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), GpuError>;
    /// Upload to the program currently in use.
    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), GpuError>;

    /// Clear colour and depth.
    fn clear(&mut self, color: Vec4) -> Result<(), GpuError>;
    fn set_viewport(&mut self, width: u32, height: u32);
    /// Draw `index_count` indices from the bound vertex array with the
    /// program in use.
    fn draw_indexed(&mut self, index_count: u32) -> Result<(), GpuError>;
    /// Submit everything recorded since the previous frame.
    fn finish_frame(&mut self) -> Result<(), GpuError>;
}
