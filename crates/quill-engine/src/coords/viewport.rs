use glam::Mat4;

/// Near/far planes of the sprite projection. Sprites sit at z = 0.
const DEPTH_RANGE: f32 = 100.0;

/// Viewport size in world units (usually framebuffer pixels).
///
/// World space has its origin at the bottom-left corner with +Y up, matching
/// the bottom-row-first image convention used for textures.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Orthographic projection mapping `(0,0)-(width,height)` onto clip space.
    ///
    /// Upload this to a program's `projection` uniform once per resize.
    pub fn projection(self) -> Mat4 {
        Mat4::orthographic_rh(
            0.0,
            self.width.max(1.0),
            0.0,
            self.height.max(1.0),
            -DEPTH_RANGE,
            DEPTH_RANGE,
        )
    }
}
