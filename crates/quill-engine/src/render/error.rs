use thiserror::Error;

use crate::shader::ShaderStage;

/// Failure to build a shader program.
///
/// Link failures are not errors at this level: the program is returned
/// unlinked and carries the linker log.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
}

impl ShaderError {
    pub fn stage(&self) -> ShaderStage {
        match self {
            ShaderError::Compile { stage, .. } => *stage,
        }
    }

    /// Compiler output.
    pub fn log(&self) -> &str {
        match self {
            ShaderError::Compile { log, .. } => log,
        }
    }
}

/// Failure to assemble a sprite from shared resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpriteError {
    #[error("texture and program were created on different drivers")]
    DriverMismatch,
}
