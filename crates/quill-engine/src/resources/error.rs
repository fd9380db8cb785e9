use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::render::{ShaderError, SpriteError};

/// Kind of registry entry, for lookup and duplicate errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Program,
    Texture,
    Sprite,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Program => f.write_str("shader program"),
            ResourceKind::Texture => f.write_str("texture"),
            ResourceKind::Sprite => f.write_str("sprite"),
        }
    }
}

/// Registry load failure.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("failed to decode image {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("shader program `{name}`: {source}")]
    Shader {
        name: String,
        #[source]
        source: ShaderError,
    },

    /// The program was registered but did not link.
    #[error("shader program `{name}` failed to link:\n{log}")]
    Link { name: String, log: String },

    #[error("no {kind} named `{name}`")]
    Lookup { kind: ResourceKind, name: String },

    #[error("sprite `{name}`: {source}")]
    Sprite {
        name: String,
        #[source]
        source: SpriteError,
    },

    #[error("shader program `{name}` is not linked")]
    Unlinked { name: String },

    #[error("a {kind} named `{name}` is already registered")]
    Duplicate { kind: ResourceKind, name: String },
}
