use std::path::{Path, PathBuf};

use crate::driver::{FilterMode, WrapMode};

/// What a `load_*` call does when the name is already registered.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with `ResourceError::Duplicate` and keep the existing entry.
    #[default]
    Reject,
    /// Replace the existing entry. Holders of the old `Rc` keep it alive.
    Replace,
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory every relative resource path is resolved against.
    pub resource_root: PathBuf,

    pub duplicates: DuplicatePolicy,

    /// Sampler filter for textures loaded through the registry.
    pub texture_filter: FilterMode,

    /// Sampler wrap mode for textures loaded through the registry.
    pub texture_wrap: WrapMode,
}

impl RegistryConfig {
    /// Resources live next to the executable: the root is everything before
    /// the last `/` or `\` of `executable_path`.
    pub fn from_executable_path(executable_path: &str) -> Self {
        Self {
            resource_root: executable_dir(executable_path),
            ..Self::default()
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            resource_root: root.into(),
            ..Self::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("."),
            duplicates: DuplicatePolicy::Reject,
            texture_filter: FilterMode::Linear,
            texture_wrap: WrapMode::ClampToEdge,
        }
    }
}

/// Directory part of an executable path, accepting both separators.
///
/// A path without any separator yields `.`.
pub fn executable_dir(executable_path: &str) -> PathBuf {
    match executable_path.rfind(['/', '\\']) {
        Some(0) => PathBuf::from(&executable_path[..1]),
        Some(i) => PathBuf::from(&executable_path[..i]),
        None => Path::new(".").to_path_buf(),
    }
}
