use std::fmt;

use glam::Mat4;

use crate::driver::{Driver, DriverOps, ProgramHandle, ShaderHandle, UniformLocation};
use crate::shader::ShaderStage;

use super::error::ShaderError;

/// Releases a compiled stage when dropped, on success and failure paths alike.
struct StageGuard<'d> {
    driver: &'d dyn Driver,
    handle: ShaderHandle,
}

impl<'d> StageGuard<'d> {
    fn compile(driver: &'d dyn Driver, stage: ShaderStage, source: &str) -> Result<Self, ShaderError> {
        match driver.compile_shader(stage, source) {
            Ok(handle) => Ok(Self { driver, handle }),
            Err(log) => {
                log::error!("{stage} shader compile failed:\n{log}");
                Err(ShaderError::Compile { stage, log })
            }
        }
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        self.driver.delete_shader(self.handle);
    }
}

/// A vertex + fragment program owned by the driver.
///
/// The program handle is released exactly once, when the value that owns it is
/// dropped. [`ShaderProgram::take`] moves ownership out and leaves an empty,
/// unlinked program behind.
pub struct ShaderProgram<'d> {
    driver: &'d dyn Driver,
    handle: Option<ProgramHandle>,
    linked: bool,
    link_log: Option<String>,
}

impl<'d> ShaderProgram<'d> {
    /// Compiles both stages and links them.
    ///
    /// A compile failure of either stage is an error and leaves nothing
    /// allocated. A link failure is logged and yields an unlinked program that
    /// still owns its handle.
    pub fn new(
        driver: &'d dyn Driver,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = StageGuard::compile(driver, ShaderStage::Vertex, vertex_source)?;
        let fragment = StageGuard::compile(driver, ShaderStage::Fragment, fragment_source)?;

        let handle = driver.create_program();
        let link_log = match driver.link_program(handle, vertex.handle, fragment.handle) {
            Ok(()) => None,
            Err(log) => {
                log::error!("shader program link failed:\n{log}");
                Some(log)
            }
        };

        drop(fragment);
        drop(vertex);

        Ok(Self {
            driver,
            handle: Some(handle),
            linked: link_log.is_none(),
            link_log,
        })
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Linker output of a failed link.
    pub fn link_log(&self) -> Option<&str> {
        self.link_log.as_deref()
    }

    /// `true` once ownership has been moved out with [`ShaderProgram::take`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
    }

    #[inline]
    pub(crate) fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    #[inline]
    pub fn driver(&self) -> &'d dyn Driver {
        self.driver
    }

    /// Makes this the current program. Unlinked programs are never bound.
    pub fn use_program(&self) {
        match self.handle {
            Some(handle) if self.linked => self.driver.use_program(Some(handle)),
            Some(handle) => log::error!("refusing to bind unlinked program {handle:?}"),
            None => log::error!("refusing to bind an empty (moved-from) program"),
        }
    }

    /// Points a texture uniform at `unit`.
    ///
    /// Writes into the currently bound program; call [`Self::use_program`]
    /// first. Unknown names are ignored.
    pub fn set_texture(&self, name: &str, unit: i32) {
        if let Some(location) = self.location(name) {
            self.driver.set_uniform_i32(location, unit);
        }
    }

    /// Uploads a column-major 4x4 matrix.
    ///
    /// Writes into the currently bound program; call [`Self::use_program`]
    /// first. Unknown names are ignored.
    pub fn set_matrix4(&self, name: &str, value: &Mat4) {
        if let Some(location) = self.location(name) {
            self.driver.set_uniform_mat4(location, value);
        }
    }

    fn location(&self, name: &str) -> Option<UniformLocation> {
        self.driver.uniform_location(self.handle?, name)
    }

    /// Moves the handle and link state into a new value. `self` becomes empty
    /// and releases nothing when dropped.
    pub fn take(&mut self) -> ShaderProgram<'d> {
        ShaderProgram {
            driver: self.driver,
            handle: self.handle.take(),
            linked: std::mem::take(&mut self.linked),
            link_log: self.link_log.take(),
        }
    }
}

impl Drop for ShaderProgram<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.driver.delete_program(handle);
        }
    }
}

impl fmt::Debug for ShaderProgram<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("handle", &self.handle)
            .field("linked", &self.linked)
            .finish()
    }
}
