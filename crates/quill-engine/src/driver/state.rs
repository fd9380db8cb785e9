use std::collections::{BTreeMap, HashMap};

use glam::Mat4;

use crate::shader::{
    BindingKind, CompiledStage, ProgramLayout, ShaderStage, UniformState, compile_stage, link,
};

use super::types::TextureDescriptor;
use super::{GeometryHandle, ProgramHandle, ShaderHandle, TextureHandle, UniformLocation};

/// Number of live handles per kind.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LiveCounts {
    pub shaders: usize,
    pub programs: usize,
    pub textures: usize,
    pub geometry: usize,
}

/// A handle released through the driver, in release order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Released {
    Shader(ShaderHandle),
    Program(ProgramHandle),
    Texture(TextureHandle),
    Geometry(GeometryHandle),
}

/// Everything a backend needs to issue one validated draw.
#[derive(Debug, Clone)]
pub(crate) struct DrawCall {
    pub program: ProgramHandle,
    pub geometry: GeometryHandle,
    pub first: u32,
    pub count: u32,
    /// Texture bound for each texture/sampler binding, indexed like the layout.
    pub textures: Vec<Option<TextureHandle>>,
    pub uniforms: UniformState,
}

/// Handle tables and binding state shared by every backend.
///
/// Backends keep their own GPU objects keyed by the same handles and consult
/// this for validation, so misuse is reported identically everywhere.
#[derive(Debug, Default)]
pub(crate) struct DriverState {
    next_id: u64,

    shaders: HashMap<ShaderHandle, CompiledStage>,
    /// `None` until linked.
    programs: HashMap<ProgramHandle, Option<UniformState>>,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    geometry: HashMap<GeometryHandle, u32>,

    bound_program: Option<ProgramHandle>,
    active_unit: u32,
    units: BTreeMap<u32, TextureHandle>,
    bound_geometry: Option<GeometryHandle>,

    released: Vec<Released>,
    errors: Vec<String>,
}

impl DriverState {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Logs a driver-level error and keeps it for inspection.
    pub fn fail(&mut self, msg: String) {
        log::error!("driver: {msg}");
        self.errors.push(msg);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn released(&self) -> &[Released] {
        &self.released
    }

    pub fn live_counts(&self) -> LiveCounts {
        LiveCounts {
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            textures: self.textures.len(),
            geometry: self.geometry.len(),
        }
    }

    pub fn bound_program(&self) -> Option<ProgramHandle> {
        self.bound_program
    }

    pub fn active_unit(&self) -> u32 {
        self.active_unit
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.units.get(&unit).copied()
    }

    pub fn bound_geometry(&self) -> Option<GeometryHandle> {
        self.bound_geometry
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture)
    }

    pub fn program_uniforms(&self, program: ProgramHandle) -> Option<&UniformState> {
        self.programs.get(&program)?.as_ref()
    }

    pub fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, String> {
        let compiled = compile_stage(stage, source)?;
        let handle = ShaderHandle(self.next());
        self.shaders.insert(handle, compiled);
        Ok(handle)
    }

    pub fn delete_shader(&mut self, shader: ShaderHandle) -> bool {
        if self.shaders.remove(&shader).is_none() {
            self.fail(format!("delete of unknown or released shader {shader:?}"));
            return false;
        }
        self.released.push(Released::Shader(shader));
        true
    }

    pub fn create_program(&mut self) -> ProgramHandle {
        let handle = ProgramHandle(self.next());
        self.programs.insert(handle, None);
        handle
    }

    /// Links and records the layout. The backend builds its pipeline from the
    /// returned layout.
    pub fn link_program(
        &mut self,
        program: ProgramHandle,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramLayout, String> {
        if !self.programs.contains_key(&program) {
            let msg = format!("link of unknown or released program {program:?}");
            self.fail(msg.clone());
            return Err(msg);
        }
        let linked = match (self.shaders.get(&vertex), self.shaders.get(&fragment)) {
            (Some(vs), Some(fs)) => link(vs, fs),
            _ => {
                let msg = format!("link of {program:?} with an unknown or released shader");
                self.fail(msg.clone());
                return Err(msg);
            }
        };
        let slot = self.programs.entry(program).or_default();
        match linked {
            Ok(layout) => {
                *slot = Some(UniformState::new(layout.clone()));
                Ok(layout)
            }
            Err(log) => {
                *slot = None;
                Err(log)
            }
        }
    }

    pub fn delete_program(&mut self, program: ProgramHandle) -> bool {
        if self.programs.remove(&program).is_none() {
            self.fail(format!("delete of unknown or released program {program:?}"));
            return false;
        }
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
        self.released.push(Released::Program(program));
        true
    }

    pub fn use_program(&mut self, program: Option<ProgramHandle>) {
        let Some(program) = program else {
            self.bound_program = None;
            return;
        };
        match self.programs.get(&program) {
            None => self.fail(format!("use of unknown or released program {program:?}")),
            Some(None) => self.fail(format!("use of unlinked program {program:?}")),
            Some(Some(_)) => self.bound_program = Some(program),
        }
    }

    pub fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let state = self.programs.get(&program)?.as_ref()?;
        let index = state.layout().slot_index(name)?;
        u32::try_from(index).ok().map(UniformLocation)
    }

    fn bound_uniforms(&mut self, what: &str) -> Option<&mut UniformState> {
        let Some(program) = self.bound_program else {
            self.fail(format!("{what} with no program bound"));
            return None;
        };
        self.programs.get_mut(&program)?.as_mut()
    }

    pub fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        let Some(state) = self.bound_uniforms("uniform write") else { return };
        if let Err(e) = state.write_i32(location.0 as usize, value) {
            self.fail(e);
        }
    }

    pub fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        let Some(state) = self.bound_uniforms("uniform write") else { return };
        if let Err(e) = state.write_mat4(location.0 as usize, value) {
            self.fail(e);
        }
    }

    pub fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8]) -> TextureHandle {
        if pixels.len() != desc.byte_len() {
            self.fail(format!(
                "texture data is {} bytes, {}x{} {:?} needs {}",
                pixels.len(),
                desc.width,
                desc.height,
                desc.format,
                desc.byte_len()
            ));
        }
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, *desc);
        handle
    }

    pub fn delete_texture(&mut self, texture: TextureHandle) -> bool {
        if self.textures.remove(&texture).is_none() {
            self.fail(format!("delete of unknown or released texture {texture:?}"));
            return false;
        }
        self.units.retain(|_, t| *t != texture);
        self.released.push(Released::Texture(texture));
        true
    }

    pub fn active_texture_unit(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    pub fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        match texture {
            None => {
                self.units.remove(&self.active_unit);
            }
            Some(t) if self.textures.contains_key(&t) => {
                self.units.insert(self.active_unit, t);
            }
            Some(t) => self.fail(format!("bind of unknown or released texture {t:?}")),
        }
    }

    pub fn create_geometry(&mut self, positions: usize, uvs: usize) -> GeometryHandle {
        if positions != uvs {
            self.fail(format!("geometry has {positions} positions but {uvs} uvs"));
        }
        let handle = GeometryHandle(self.next());
        let count = u32::try_from(positions.min(uvs)).unwrap_or(u32::MAX);
        self.geometry.insert(handle, count);
        handle
    }

    pub fn delete_geometry(&mut self, geometry: GeometryHandle) -> bool {
        if self.geometry.remove(&geometry).is_none() {
            self.fail(format!("delete of unknown or released geometry {geometry:?}"));
            return false;
        }
        if self.bound_geometry == Some(geometry) {
            self.bound_geometry = None;
        }
        self.released.push(Released::Geometry(geometry));
        true
    }

    pub fn bind_geometry(&mut self, geometry: Option<GeometryHandle>) {
        match geometry {
            None => self.bound_geometry = None,
            Some(g) if self.geometry.contains_key(&g) => self.bound_geometry = Some(g),
            Some(g) => self.fail(format!("bind of unknown or released geometry {g:?}")),
        }
    }

    /// Validates the current bindings for a draw and snapshots them.
    pub fn prepare_draw(&mut self, first: u32, count: u32) -> Option<DrawCall> {
        if count == 0 {
            return None;
        }
        let Some(program) = self.bound_program else {
            self.fail("draw with no program bound".to_owned());
            return None;
        };
        let Some(geometry) = self.bound_geometry else {
            self.fail("draw with no geometry bound".to_owned());
            return None;
        };
        let Some(uniforms) = self.programs.get(&program).and_then(Option::as_ref).cloned() else {
            self.fail(format!("draw with unlinked program {program:?}"));
            return None;
        };

        let vertices = self.geometry.get(&geometry).copied().unwrap_or(0);
        if first.checked_add(count).is_none_or(|end| end > vertices) {
            self.fail(format!(
                "draw of vertices {first}..{} exceeds the {vertices} vertices of {geometry:?}",
                first.saturating_add(count)
            ));
            return None;
        }

        let mut textures = Vec::with_capacity(uniforms.layout().bindings.len());
        for (index, decl) in uniforms.layout().bindings.iter().enumerate() {
            let bound = match decl.kind {
                BindingKind::Texture | BindingKind::Sampler => {
                    let unit = uniforms.unit(index);
                    let Some(texture) = self.units.get(&unit).copied() else {
                        self.fail(format!("draw samples `{}` from empty texture unit {unit}", decl.name));
                        return None;
                    };
                    Some(texture)
                }
                BindingKind::UniformBuffer { .. } => None,
            };
            textures.push(bound);
        }

        Some(DrawCall { program, geometry, first, count, textures, uniforms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{FilterMode, PixelFormat, WrapMode};

    const VERTEX: &str = include_str!("../../res/shaders/sprite.vert.wgsl");
    const FRAGMENT: &str = include_str!("../../res/shaders/sprite.frag.wgsl");

    fn linked(state: &mut DriverState) -> ProgramHandle {
        let vs = state.compile_shader(ShaderStage::Vertex, VERTEX).unwrap();
        let fs = state.compile_shader(ShaderStage::Fragment, FRAGMENT).unwrap();
        let program = state.create_program();
        state.link_program(program, vs, fs).unwrap();
        program
    }

    #[test]
    fn double_delete_is_reported_once_released_once() {
        let mut state = DriverState::new();
        let program = state.create_program();

        assert!(state.delete_program(program));
        assert!(!state.delete_program(program));

        assert_eq!(state.released(), &[Released::Program(program)]);
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn unlinked_program_is_never_bound() {
        let mut state = DriverState::new();
        let program = state.create_program();

        state.use_program(Some(program));

        assert_eq!(state.bound_program(), None);
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn draw_requires_texture_on_sampled_unit() {
        let mut state = DriverState::new();
        let program = linked(&mut state);
        let geometry = state.create_geometry(6, 6);

        state.use_program(Some(program));
        state.bind_geometry(Some(geometry));
        assert!(state.prepare_draw(0, 6).is_none());

        let desc = TextureDescriptor {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            filter: FilterMode::Linear,
            wrap: WrapMode::ClampToEdge,
        };
        let texture = state.create_texture(&desc, &[255; 4]);
        state.bind_texture(Some(texture));

        let call = state.prepare_draw(0, 6).unwrap();
        assert_eq!(call.textures, vec![None, Some(texture), Some(texture)]);
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn out_of_range_draw_is_rejected() {
        let mut state = DriverState::new();
        let program = linked(&mut state);
        let geometry = state.create_geometry(3, 3);

        state.use_program(Some(program));
        state.bind_geometry(Some(geometry));

        assert!(state.prepare_draw(0, 6).is_none());
        assert!(state.errors()[0].contains("exceeds"));
    }
}
