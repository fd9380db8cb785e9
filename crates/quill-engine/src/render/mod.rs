//! GPU resource types and sprite composition.
//!
//! Every resource borrows the [`Driver`](crate::driver::Driver) it was created
//! from and releases its handle on drop.
//!
//! Convention:
//! - world space has a bottom-left origin, +Y up
//! - the vertex stage receives unit-quad positions and applies
//!   `projection * model`

pub mod atlas;
mod error;
mod program;
mod sprite;
mod texture;

pub use atlas::tile_sub_textures;
pub use error::{ShaderError, SpriteError};
pub use program::ShaderProgram;
pub use sprite::{MODEL_UNIFORM, QUAD_VERTICES, Sprite, transform_point};
pub use texture::Texture2D;
