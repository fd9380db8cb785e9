//! Named resource registry and the I/O it loads through.

mod assets;
mod config;
mod error;
mod registry;

pub use assets::{AssetReader, DecodedImage, FsAssets, ImageCrateDecoder, ImageDecoder, MemoryAssets};
pub use config::{DuplicatePolicy, RegistryConfig, executable_dir};
pub use error::{ResourceError, ResourceKind};
pub use registry::ResourceRegistry;
