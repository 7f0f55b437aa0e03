use crate::device::{GpuError, ShaderStage};

/// Errors from building or drawing with render resources.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error("uniform `{name}` not found")]
    UniformNotFound { name: String },
    #[error("resource creation failed: {reason}")]
    ResourceCreation { reason: String },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

impl RenderError {
    pub(crate) fn resource(reason: impl Into<String>) -> Self {
        RenderError::ResourceCreation {
            reason: reason.into(),
        }
    }

    pub(crate) fn uniform(name: impl Into<String>) -> Self {
        RenderError::UniformNotFound { name: name.into() }
    }
}
