use std::cell::RefCell;
use std::collections::HashMap;

use glam::{Mat4, Vec2};

use crate::render::{ShaderProgram, Texture2D};
use crate::shader::{ShaderStage, UniformState};

use super::state::{DriverState, LiveCounts, Released};
use super::types::TextureDescriptor;
use super::{
    DriverOps, GeometryHandle, ProgramHandle, ShaderHandle, TextureHandle, UniformLocation,
};

/// One draw as the headless driver saw it.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    program: ProgramHandle,
    /// Positions of the drawn vertex range.
    pub positions: Vec<Vec2>,
    /// Texture coordinates of the drawn vertex range.
    pub uvs: Vec<Vec2>,
    textures: Vec<(String, TextureHandle)>,
    /// Uniform values at draw time.
    pub uniforms: UniformState,
}

impl DrawRecord {
    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        self.uniforms.mat4(name)
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        self.uniforms.int(name)
    }

    /// `true` when the draw ran with `program` bound.
    pub fn used(&self, program: &ShaderProgram<'_>) -> bool {
        program.handle() == Some(self.program)
    }

    /// `true` when the texture/sampler uniform `name` read `texture`.
    pub fn sampled(&self, name: &str, texture: &Texture2D<'_>) -> bool {
        texture.handle().is_some_and(|t| self.texture(name) == Some(t))
    }

    fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.textures.iter().find(|(n, _)| n == name).map(|(_, t)| *t)
    }
}

/// A driver that validates and records every call without touching a GPU.
///
/// Shader stages go through the same WGSL front end as [`super::WgpuDriver`],
/// so compile and link diagnostics match. Misuse is logged and collected in
/// [`HeadlessDriver::errors`].
#[derive(Debug, Default)]
pub struct HeadlessDriver {
    state: RefCell<DriverState>,
    geometry: RefCell<HashMap<GeometryHandle, (Vec<Vec2>, Vec<Vec2>)>>,
    pixels: RefCell<HashMap<TextureHandle, Vec<u8>>>,
    draws: RefCell<Vec<DrawRecord>>,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_counts(&self) -> LiveCounts {
        self.state.borrow().live_counts()
    }

    /// Every handle released so far, in release order.
    pub fn released(&self) -> Vec<Released> {
        self.state.borrow().released().to_vec()
    }

    /// Driver-level errors reported so far.
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors().to_vec()
    }

    pub fn clear_errors(&self) {
        self.state.borrow_mut().clear_errors();
    }

    pub fn has_bound_program(&self) -> bool {
        self.state.borrow().bound_program().is_some()
    }

    pub fn is_bound(&self, program: &ShaderProgram<'_>) -> bool {
        program.handle().is_some() && self.state.borrow().bound_program() == program.handle()
    }

    pub fn active_unit(&self) -> u32 {
        self.state.borrow().active_unit()
    }

    pub fn has_bound_texture(&self, unit: u32) -> bool {
        self.state.borrow().bound_texture(unit).is_some()
    }

    pub fn has_bound_geometry(&self) -> bool {
        self.state.borrow().bound_geometry().is_some()
    }

    /// Current uniform values of a linked program.
    pub fn program_uniforms(&self, program: &ShaderProgram<'_>) -> Option<UniformState> {
        let handle = program.handle()?;
        self.state.borrow().program_uniforms(handle).cloned()
    }

    pub fn texture_descriptor(&self, texture: &Texture2D<'_>) -> Option<TextureDescriptor> {
        let handle = texture.handle()?;
        self.state.borrow().texture(handle).copied()
    }

    /// Base level pixels exactly as uploaded.
    pub fn texture_pixels(&self, texture: &Texture2D<'_>) -> Option<Vec<u8>> {
        let handle = texture.handle()?;
        self.pixels.borrow().get(&handle).cloned()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.draws.borrow().clone()
    }

    /// Returns and forgets the recorded draws.
    pub fn take_draws(&self) -> Vec<DrawRecord> {
        std::mem::take(&mut *self.draws.borrow_mut())
    }
}

impl DriverOps for HeadlessDriver {
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        self.state.borrow_mut().compile_shader(stage, source)
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        self.state.borrow_mut().delete_shader(shader);
    }

    fn create_program(&self) -> ProgramHandle {
        self.state.borrow_mut().create_program()
    }

    fn link_program(
        &self,
        program: ProgramHandle,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<(), String> {
        self.state.borrow_mut().link_program(program, vertex, fragment).map(|_| ())
    }

    fn delete_program(&self, program: ProgramHandle) {
        self.state.borrow_mut().delete_program(program);
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        self.state.borrow_mut().use_program(program);
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.state.borrow().uniform_location(program, name)
    }

    fn set_uniform_i32(&self, location: UniformLocation, value: i32) {
        self.state.borrow_mut().set_uniform_i32(location, value);
    }

    fn set_uniform_mat4(&self, location: UniformLocation, value: &Mat4) {
        self.state.borrow_mut().set_uniform_mat4(location, value);
    }

    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> TextureHandle {
        let handle = self.state.borrow_mut().create_texture(desc, pixels);
        self.pixels.borrow_mut().insert(handle, pixels.to_vec());
        handle
    }

    fn delete_texture(&self, texture: TextureHandle) {
        if self.state.borrow_mut().delete_texture(texture) {
            self.pixels.borrow_mut().remove(&texture);
        }
    }

    fn active_texture_unit(&self, unit: u32) {
        self.state.borrow_mut().active_texture_unit(unit);
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        self.state.borrow_mut().bind_texture(texture);
    }

    fn create_geometry(&self, positions: &[Vec2], uvs: &[Vec2]) -> GeometryHandle {
        let handle = self.state.borrow_mut().create_geometry(positions.len(), uvs.len());
        self.geometry
            .borrow_mut()
            .insert(handle, (positions.to_vec(), uvs.to_vec()));
        handle
    }

    fn delete_geometry(&self, geometry: GeometryHandle) {
        if self.state.borrow_mut().delete_geometry(geometry) {
            self.geometry.borrow_mut().remove(&geometry);
        }
    }

    fn bind_geometry(&self, geometry: Option<GeometryHandle>) {
        self.state.borrow_mut().bind_geometry(geometry);
    }

    fn draw_triangles(&self, first: u32, count: u32) {
        let Some(call) = self.state.borrow_mut().prepare_draw(first, count) else { return };

        let range = first as usize..(first + count) as usize;
        let (positions, uvs) = self
            .geometry
            .borrow()
            .get(&call.geometry)
            .map(|(p, u)| (p[range.clone()].to_vec(), u[range].to_vec()))
            .unwrap_or_default();

        let textures = call
            .uniforms
            .layout()
            .bindings
            .iter()
            .zip(&call.textures)
            .filter_map(|(decl, tex)| tex.map(|t| (decl.name.clone(), t)))
            .collect();

        log::trace!("headless draw: {:?} vertices {first}..{}", call.program, first + count);

        self.draws.borrow_mut().push(DrawRecord {
            program: call.program,
            positions,
            uvs,
            textures,
            uniforms: call.uniforms,
        });
    }
}
