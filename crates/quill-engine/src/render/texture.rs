use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use glam::Vec2;

use crate::coords::UvRect;
use crate::driver::{
    Driver, DriverOps, FilterMode, PixelFormat, TextureDescriptor, TextureHandle, WrapMode,
};

/// A 2D texture owned by the driver, plus named sub-rectangles (atlas tiles).
///
/// Sub-textures are behind a `RefCell` so a texture shared through `Rc` can
/// still be tiled after registration.
pub struct Texture2D<'d> {
    driver: &'d dyn Driver,
    handle: Option<TextureHandle>,
    width: u32,
    height: u32,
    format: PixelFormat,
    filter: FilterMode,
    wrap: WrapMode,
    sub_textures: RefCell<HashMap<String, UvRect>>,
}

impl<'d> Texture2D<'d> {
    /// Uploads `pixels` (tightly packed rows, bottom row first) and builds the
    /// mip chain. Three channels is RGB, anything else RGBA.
    pub fn new(
        driver: &'d dyn Driver,
        width: u32,
        height: u32,
        pixels: &[u8],
        channels: u32,
        filter: FilterMode,
        wrap: WrapMode,
    ) -> Self {
        let format = PixelFormat::from_channels(channels);
        let desc = TextureDescriptor { width, height, format, filter, wrap };
        let handle = driver.create_texture(&desc, pixels);
        log::debug!("texture {handle:?}: {width}x{height} {format:?}");

        Self {
            driver,
            handle: Some(handle),
            width,
            height,
            format,
            filter,
            wrap,
            sub_textures: RefCell::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    #[inline]
    pub fn wrap(&self) -> WrapMode {
        self.wrap
    }

    /// `true` once ownership has been moved out with [`Texture2D::take`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
    }

    #[inline]
    pub(crate) fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    #[inline]
    pub fn driver(&self) -> &'d dyn Driver {
        self.driver
    }

    /// Registers (or overwrites) a named sub-rectangle. Nothing is clamped.
    pub fn add_sub_texture(&self, name: impl Into<String>, left_bottom: Vec2, right_top: Vec2) {
        self.sub_textures
            .borrow_mut()
            .insert(name.into(), UvRect::new(left_bottom, right_top));
    }

    /// The named sub-rectangle, or the whole texture when unknown.
    pub fn sub_texture(&self, name: &str) -> UvRect {
        self.sub_textures.borrow().get(name).copied().unwrap_or(UvRect::FULL)
    }

    pub fn has_sub_texture(&self, name: &str) -> bool {
        self.sub_textures.borrow().contains_key(name)
    }

    /// Names of every registered sub-texture, sorted.
    pub fn sub_texture_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sub_textures.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Binds on the driver's active texture unit.
    pub fn bind(&self) {
        match self.handle {
            Some(handle) => self.driver.bind_texture(Some(handle)),
            None => log::error!("bind of an empty (moved-from) texture"),
        }
    }

    /// Moves the handle, metadata and sub-textures into a new value. `self`
    /// becomes empty and releases nothing when dropped.
    pub fn take(&mut self) -> Texture2D<'d> {
        Texture2D {
            driver: self.driver,
            handle: self.handle.take(),
            width: std::mem::take(&mut self.width),
            height: std::mem::take(&mut self.height),
            format: self.format,
            filter: self.filter,
            wrap: self.wrap,
            sub_textures: RefCell::new(self.sub_textures.take()),
        }
    }
}

impl Drop for Texture2D<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.driver.delete_texture(handle);
        }
    }
}

impl fmt::Debug for Texture2D<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture2D")
            .field("handle", &self.handle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sub_textures", &self.sub_textures.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HeadlessDriver;

    fn texture(driver: &HeadlessDriver) -> Texture2D<'_> {
        Texture2D::new(
            driver,
            2,
            2,
            &[0; 12],
            3,
            FilterMode::Nearest,
            WrapMode::Repeat,
        )
    }

    #[test]
    fn three_channels_upload_as_rgb() {
        let driver = HeadlessDriver::new();
        let tex = texture(&driver);

        let desc = driver.texture_descriptor(&tex).unwrap();
        assert_eq!(desc.format, PixelFormat::Rgb8);
        assert_eq!(desc.filter, FilterMode::Nearest);
        assert_eq!(desc.wrap, WrapMode::Repeat);
        assert!(driver.errors().is_empty());
    }

    #[test]
    fn unknown_sub_texture_is_full_rect() {
        let driver = HeadlessDriver::new();
        let tex = texture(&driver);

        let first = tex.sub_texture("nonexistent");
        let second = tex.sub_texture("nonexistent");
        assert_eq!(first, UvRect::FULL);
        assert_eq!(first.left_bottom.x.to_bits(), second.left_bottom.x.to_bits());
        assert_eq!(first.right_top.y.to_bits(), second.right_top.y.to_bits());
    }

    #[test]
    fn sub_texture_overwrite_keeps_latest() {
        let driver = HeadlessDriver::new();
        let tex = texture(&driver);

        tex.add_sub_texture("a", Vec2::ZERO, Vec2::splat(0.5));
        tex.add_sub_texture("a", Vec2::splat(0.5), Vec2::ONE);

        assert_eq!(tex.sub_texture("a"), UvRect::new(Vec2::splat(0.5), Vec2::ONE));
        assert_eq!(tex.sub_texture_names(), vec!["a".to_owned()]);
    }

    #[test]
    fn take_moves_ownership_and_sub_textures() {
        let driver = HeadlessDriver::new();
        let mut original = texture(&driver);
        original.add_sub_texture("tile", Vec2::ZERO, Vec2::splat(0.5));

        let moved = original.take();
        assert!(original.is_empty());
        assert!(!moved.is_empty());
        assert_eq!(original.width(), 0);
        assert!(moved.has_sub_texture("tile"));
        assert!(!original.has_sub_texture("tile"));

        drop(original);
        assert_eq!(driver.live_counts().textures, 1);
        drop(moved);
        assert_eq!(driver.live_counts().textures, 0);
        assert!(driver.errors().is_empty());
    }
}
