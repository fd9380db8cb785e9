//! Quill engine crate.
//!
//! GPU resource lifecycle (shader programs, textures, atlases), sprite
//! composition, and a named registry that owns them on behalf of the
//! application.

pub mod driver;
pub mod shader;
pub mod render;
pub mod resources;

pub mod logging;
pub mod coords;

pub use driver::Driver;
pub use render::{ShaderProgram, Sprite, Texture2D};
pub use resources::{RegistryConfig, ResourceError, ResourceRegistry};
