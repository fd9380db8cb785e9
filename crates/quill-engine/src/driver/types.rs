/// Pixel layout of uploaded texture data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// 3 channels is RGB; any other count is treated as RGBA.
    #[inline]
    pub fn from_channels(channels: u32) -> Self {
        if channels == 3 { PixelFormat::Rgb8 } else { PixelFormat::Rgba8 }
    }

    #[inline]
    pub fn channels(self) -> u32 {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Texel filter, used for magnification, minification and between mip levels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Addressing outside `[0, 1]`, applied to both axes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

impl From<FilterMode> for wgpu::FilterMode {
    fn from(f: FilterMode) -> Self {
        match f {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl From<FilterMode> for wgpu::MipmapFilterMode {
    fn from(f: FilterMode) -> Self {
        match f {
            FilterMode::Nearest => wgpu::MipmapFilterMode::Nearest,
            FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
        }
    }
}

impl From<WrapMode> for wgpu::AddressMode {
    fn from(w: WrapMode) -> Self {
        match w {
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

/// Everything a driver needs to allocate a 2D texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

impl TextureDescriptor {
    /// Size in bytes of the tightly packed base level.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels() as usize
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }
}
