//! Graphics driver abstraction.
//!
//! A `Driver` owns every raw handle and all binding state (bound program,
//! active texture unit, bound texture per unit, bound geometry). Resource
//! types hold `&'d dyn Driver`, so the borrow checker rejects any program in
//! which the driver is dropped before the resources created from it. Raw
//! handles never leave the crate's resource types.
//!
//! Two drivers are provided:
//! - [`WgpuDriver`] renders through wgpu.
//! - [`HeadlessDriver`] validates and records calls without a GPU.

mod gpu;
mod headless;
mod init;
mod state;
mod types;

pub use gpu::WgpuDriver;
pub use headless::{DrawRecord, HeadlessDriver};
pub use init::DriverInit;
pub use state::{LiveCounts, Released};
pub use types::{FilterMode, PixelFormat, TextureDescriptor, WrapMode};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

handle!(
    /// A compiled shader stage.
    ShaderHandle
);
handle!(
    /// A program object (linked or not).
    ProgramHandle
);
handle!(
    /// A 2D texture with its sampler state.
    TextureHandle
);
handle!(
    /// Uploaded position + uv vertex streams.
    GeometryHandle
);

/// Index of a named uniform slot within a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Graphics context that programs, textures and sprites are created from.
///
/// The raw handle operations sit on a supertrait that is private to this
/// crate, so handles can only be created and released by the resource types
/// that own them. Implemented by [`WgpuDriver`] and [`HeadlessDriver`].
pub trait Driver: DriverOps {}

impl Driver for WgpuDriver {}
impl Driver for HeadlessDriver {}

mod ops {
    use glam::{Mat4, Vec2};

    use crate::shader::ShaderStage;

    use super::{
        GeometryHandle, ProgramHandle, ShaderHandle, TextureDescriptor, TextureHandle,
        UniformLocation,
    };

    /// Handle-based operations behind [`super::Driver`].
    ///
    /// All methods take `&self`; implementations keep their state behind
    /// interior mutability and are single-threaded. Misuse (binding an
    /// unlinked program, drawing with nothing bound, touching released
    /// handles) is reported through `log::error!` and otherwise ignored.
    pub trait DriverOps {
        /// Compiles one stage. The error string is the compiler log.
        fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;
        fn delete_shader(&self, shader: ShaderHandle);

        fn create_program(&self) -> ProgramHandle;
        /// Links two compiled stages into `program`. The error string is the
        /// linker log; the program stays allocated (and unlinked) on failure.
        fn link_program(
            &self,
            program: ProgramHandle,
            vertex: ShaderHandle,
            fragment: ShaderHandle,
        ) -> Result<(), String>;
        fn delete_program(&self, program: ProgramHandle);
        /// Binds `program` for subsequent uniform writes and draws. `None` unbinds.
        fn use_program(&self, program: Option<ProgramHandle>);

        /// Location of a named uniform, `None` when unknown or not linked.
        fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
        /// Writes into the currently bound program. For texture and sampler
        /// uniforms the value selects a texture unit.
        fn set_uniform_i32(&self, location: UniformLocation, value: i32);
        /// Writes into the currently bound program.
        fn set_uniform_mat4(&self, location: UniformLocation, value: &Mat4);

        /// Uploads the base level from tightly packed, bottom-row-first pixels
        /// and builds the full mip chain.
        fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> TextureHandle;
        fn delete_texture(&self, texture: TextureHandle);
        fn active_texture_unit(&self, unit: u32);
        /// Binds on the active texture unit. `None` unbinds.
        fn bind_texture(&self, texture: Option<TextureHandle>);

        /// Uploads matching position and uv streams.
        fn create_geometry(&self, positions: &[Vec2], uvs: &[Vec2]) -> GeometryHandle;
        fn delete_geometry(&self, geometry: GeometryHandle);
        fn bind_geometry(&self, geometry: Option<GeometryHandle>);

        /// Draws `count` vertices starting at `first` as a triangle list using
        /// the current bindings.
        fn draw_triangles(&self, first: u32, count: u32);
    }
}

pub(crate) use ops::DriverOps;
