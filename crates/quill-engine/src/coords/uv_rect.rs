use glam::Vec2;

/// Rectangle in normalized texture space (bottom-left origin, +V up).
///
/// Sub-textures of an atlas are stored as `UvRect`s. Values outside `[0, 1]`
/// are representable; nothing clamps them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub left_bottom: Vec2,
    pub right_top: Vec2,
}

impl UvRect {
    /// The whole texture.
    pub const FULL: UvRect = UvRect {
        left_bottom: Vec2::ZERO,
        right_top: Vec2::ONE,
    };

    #[inline]
    pub const fn new(left_bottom: Vec2, right_top: Vec2) -> Self {
        Self { left_bottom, right_top }
    }

    #[inline]
    pub fn size(self) -> Vec2 {
        self.right_top - self.left_bottom
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.left_bottom.is_finite() && self.right_top.is_finite()
    }

    /// Maps a point of the unit square into this rectangle.
    ///
    /// `(0,0)` lands on `left_bottom`, `(1,1)` on `right_top`.
    #[inline]
    pub fn lerp(self, unit: Vec2) -> Vec2 {
        self.left_bottom + unit * self.size()
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uv(l: f32, b: f32, r: f32, t: f32) -> UvRect {
        UvRect::new(Vec2::new(l, b), Vec2::new(r, t))
    }

    #[test]
    fn default_is_full_texture() {
        assert_eq!(UvRect::default(), uv(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn lerp_corners_hit_rect_corners() {
        let r = uv(0.25, 0.5, 0.5, 1.0);
        assert_eq!(r.lerp(Vec2::ZERO), r.left_bottom);
        assert_eq!(r.lerp(Vec2::ONE), r.right_top);
        assert_eq!(r.lerp(Vec2::new(1.0, 0.0)), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn size_of_full_is_one() {
        assert_eq!(UvRect::FULL.size(), Vec2::ONE);
    }

    #[test]
    fn out_of_range_values_are_kept() {
        let r = uv(-0.5, -1.0, 2.0, 1.5);
        assert_eq!(r.left_bottom, Vec2::new(-0.5, -1.0));
        assert!(r.is_finite());
    }
}
