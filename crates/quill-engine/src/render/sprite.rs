use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};

use crate::driver::{Driver, DriverOps, GeometryHandle};

use super::error::SpriteError;
use super::program::ShaderProgram;
use super::texture::Texture2D;

/// Unit quad as two triangles, starting at the bottom-left corner.
pub const QUAD_VERTICES: [Vec2; 6] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 0.0),
];

/// Name of the model matrix uniform sprites write before drawing.
pub const MODEL_UNIFORM: &str = "model";

/// A textured quad with a 2D transform.
///
/// Texture and program are shared; the quad geometry belongs to the sprite and
/// is released when it is dropped. Transform setters take `&self` so sprites
/// held through `Rc` can still be moved around.
pub struct Sprite<'d> {
    driver: &'d dyn Driver,
    texture: Rc<Texture2D<'d>>,
    program: Rc<ShaderProgram<'d>>,
    geometry: GeometryHandle,

    position: Cell<Vec2>,
    size: Cell<Vec2>,
    rotation: Cell<f32>,
}

impl<'d> Sprite<'d> {
    /// Builds the quad with texture coordinates taken from the
    /// `initial_sub_texture` rectangle (the whole texture if unknown).
    ///
    /// The quad lives on the program's driver; the texture must come from the
    /// same one.
    pub fn new(
        texture: Rc<Texture2D<'d>>,
        program: Rc<ShaderProgram<'d>>,
        initial_sub_texture: &str,
        position: Vec2,
        size: Vec2,
        rotation: f32,
    ) -> Result<Self, SpriteError> {
        let driver = program.driver();
        if !std::ptr::addr_eq(texture.driver(), driver) {
            log::error!("sprite texture and program belong to different drivers");
            return Err(SpriteError::DriverMismatch);
        }

        let uv_rect = texture.sub_texture(initial_sub_texture);
        let uvs: Vec<Vec2> = QUAD_VERTICES.iter().map(|&v| uv_rect.lerp(v)).collect();
        let geometry = driver.create_geometry(&QUAD_VERTICES, &uvs);

        Ok(Self {
            driver,
            texture,
            program,
            geometry,
            position: Cell::new(position),
            size: Cell::new(size),
            rotation: Cell::new(rotation),
        })
    }

    /// Draws the quad with the current transform.
    ///
    /// Leaves the program bound; unbinds geometry and texture (unit 0).
    pub fn render(&self) {
        if !self.program.is_linked() {
            log::warn!("sprite skipped: program {:?} is not linked", self.program.handle());
            return;
        }

        self.program.use_program();
        self.program.set_matrix4(MODEL_UNIFORM, &self.model_matrix());

        self.driver.active_texture_unit(0);
        self.texture.bind();

        self.driver.bind_geometry(Some(self.geometry));
        self.driver.draw_triangles(0, QUAD_VERTICES.len() as u32);
        self.driver.bind_geometry(None);

        self.driver.bind_texture(None);
    }

    /// `T(position) * T(size/2) * Rz(rotation) * T(-size/2) * S(size)`.
    ///
    /// Rotation is in degrees, counter-clockwise, about the quad's center.
    pub fn model_matrix(&self) -> Mat4 {
        let position = self.position.get();
        let size = self.size.get();
        let half = (0.5 * size).extend(0.0);

        Mat4::from_translation(position.extend(0.0))
            * Mat4::from_translation(half)
            * Mat4::from_rotation_z(self.rotation.get().to_radians())
            * Mat4::from_translation(-half)
            * Mat4::from_scale(size.extend(1.0))
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position.get()
    }

    #[inline]
    pub fn set_position(&self, position: Vec2) {
        self.position.set(position);
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size.get()
    }

    #[inline]
    pub fn set_size(&self, size: Vec2) {
        self.size.set(size);
    }

    /// Degrees.
    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation.get()
    }

    #[inline]
    pub fn set_rotation(&self, degrees: f32) {
        self.rotation.set(degrees);
    }

    #[inline]
    pub fn texture(&self) -> &Rc<Texture2D<'d>> {
        &self.texture
    }

    #[inline]
    pub fn program(&self) -> &Rc<ShaderProgram<'d>> {
        &self.program
    }
}

impl Drop for Sprite<'_> {
    fn drop(&mut self) {
        self.driver.delete_geometry(self.geometry);
    }
}

impl fmt::Debug for Sprite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("geometry", &self.geometry)
            .field("position", &self.position.get())
            .field("size", &self.size.get())
            .field("rotation", &self.rotation.get())
            .finish()
    }
}

/// Applies `m` to a point of the unit quad.
#[inline]
pub fn transform_point(m: &Mat4, p: Vec2) -> Vec2 {
    m.transform_point3(Vec3::new(p.x, p.y, 0.0)).truncate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{FilterMode, HeadlessDriver, WrapMode};

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).abs().max_element() < 1e-3
    }

    fn sprite<'d>(driver: &'d HeadlessDriver, position: Vec2, rotation: f32) -> Sprite<'d> {
        let texture = Rc::new(Texture2D::new(
            driver,
            1,
            1,
            &[255; 4],
            4,
            FilterMode::Linear,
            WrapMode::ClampToEdge,
        ));
        let program = Rc::new(
            ShaderProgram::new(
                driver,
                include_str!("../../res/shaders/sprite.vert.wgsl"),
                include_str!("../../res/shaders/sprite.frag.wgsl"),
            )
            .unwrap(),
        );
        Sprite::new(texture, program, "", position, Vec2::splat(100.0), rotation).unwrap()
    }

    #[test]
    fn unrotated_quad_covers_position_plus_size() {
        let driver = HeadlessDriver::new();
        let s = sprite(&driver, Vec2::new(300.0, 100.0), 0.0);
        let m = s.model_matrix();

        assert!(close(transform_point(&m, Vec2::ZERO), Vec2::new(300.0, 100.0)));
        assert!(close(transform_point(&m, Vec2::ONE), Vec2::new(400.0, 200.0)));
    }

    #[test]
    fn rotation_pivots_about_center() {
        let driver = HeadlessDriver::new();
        let s = sprite(&driver, Vec2::ZERO, 90.0);
        let m = s.model_matrix();

        assert!(close(transform_point(&m, Vec2::splat(0.5)), Vec2::splat(50.0)));
        assert!(close(transform_point(&m, Vec2::ZERO), Vec2::new(100.0, 0.0)));
    }

    #[test]
    fn render_binds_then_unbinds() {
        let driver = HeadlessDriver::new();
        let s = sprite(&driver, Vec2::ZERO, 0.0);

        s.render();

        let draws = driver.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].mat4(MODEL_UNIFORM), Some(s.model_matrix()));
        assert!(draws[0].sampled("tex", s.texture()));
        assert!(draws[0].used(s.program()));
        assert!(!driver.has_bound_geometry());
        assert!(!driver.has_bound_texture(0));
        assert!(driver.errors().is_empty(), "{:?}", driver.errors());
    }

    #[test]
    fn drop_releases_only_geometry() {
        let driver = HeadlessDriver::new();
        let s = sprite(&driver, Vec2::ZERO, 0.0);
        let texture = s.texture().clone();
        let program = s.program().clone();

        drop(s);

        let live = driver.live_counts();
        assert_eq!(live.geometry, 0);
        assert_eq!(live.textures, 1);
        assert_eq!(live.programs, 1);
        drop((texture, program));
    }

    #[test]
    fn texture_from_another_driver_is_rejected() {
        let driver = HeadlessDriver::new();
        let other = HeadlessDriver::new();
        let foreign = Rc::new(Texture2D::new(
            &other,
            1,
            1,
            &[255; 4],
            4,
            FilterMode::Linear,
            WrapMode::ClampToEdge,
        ));
        let program = sprite(&driver, Vec2::ZERO, 0.0).program().clone();

        let err = Sprite::new(foreign, program, "", Vec2::ZERO, Vec2::ONE, 0.0).unwrap_err();

        assert_eq!(err, SpriteError::DriverMismatch);
        assert_eq!(driver.live_counts().geometry, 0);
        assert_eq!(other.live_counts().geometry, 0);
    }
}
