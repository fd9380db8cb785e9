//! Coordinate and geometry types shared by sprites, textures and drivers.
//!
//! World space:
//! - origin bottom-left, +X right, +Y up
//! - units are whatever the projection maps (usually framebuffer pixels)
//!
//! Texture space is normalized `[0, 1]`, bottom-left origin.

mod color;
mod uv_rect;
mod viewport;

pub use color::ColorRgba;
pub use uv_rect::UvRect;
pub use viewport::Viewport;
