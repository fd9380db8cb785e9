use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use super::config::executable_dir;

/// Source of resource file contents, addressed by relative path.
pub trait AssetReader {
    fn read(&self, relative_path: &str) -> io::Result<Vec<u8>>;

    /// Where `relative_path` points, for diagnostics.
    fn describe(&self, relative_path: &str) -> PathBuf {
        PathBuf::from(relative_path)
    }
}

/// Reads files below a root directory.
#[derive(Debug, Clone)]
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rooted at the directory containing the executable.
    pub fn from_executable_path(executable_path: &str) -> Self {
        Self::new(executable_dir(executable_path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetReader for FsAssets {
    fn read(&self, relative_path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(relative_path))
    }

    fn describe(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }
}

/// In-memory files, for tests and resources embedded in the binary.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, relative_path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(relative_path.into(), contents.into());
    }

    /// Builder form of [`MemoryAssets::insert`].
    pub fn with(mut self, relative_path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(relative_path, contents);
        self
    }
}

impl AssetReader for MemoryAssets {
    fn read(&self, relative_path: &str) -> io::Result<Vec<u8>> {
        self.files.get(relative_path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no embedded file {relative_path}"))
        })
    }
}

/// Decoded pixels, rows bottom to top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// 3 (RGB) or 4 (RGBA).
    pub channels: u32,
    pub pixels: Vec<u8>,
}

/// Turns encoded image bytes into pixels with the bottom row first.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, String>;
}

/// Decoder backed by the `image` crate.
///
/// Images without alpha are kept as RGB; everything else is converted to RGBA.
#[derive(Debug, Copy, Clone, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?.flipv();
        let (width, height) = (img.width(), img.height());

        let (channels, pixels) = if img.color().has_alpha() {
            (4, img.into_rgba8().into_raw())
        } else if img.color().channel_count() == 3 {
            (3, img.into_rgb8().into_raw())
        } else {
            (4, img.into_rgba8().into_raw())
        };

        Ok(DecodedImage { width, height, channels, pixels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_png(img: image::DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_flips_rows_bottom_first() {
        let mut img = RgbaImage::new(1, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255])); // top
        img.put_pixel(0, 1, Rgba([0, 0, 255, 128])); // bottom
        let bytes = encode_png(img.into());

        let decoded = ImageCrateDecoder.decode(&bytes).unwrap();

        assert_eq!((decoded.width, decoded.height, decoded.channels), (1, 2, 4));
        assert_eq!(decoded.pixels, vec![0, 0, 255, 128, 255, 0, 0, 255]);
    }

    #[test]
    fn rgb_stays_three_channels() {
        let img = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        let decoded = ImageCrateDecoder.decode(&encode_png(img.into())).unwrap();

        assert_eq!(decoded.channels, 3);
        assert_eq!(decoded.pixels.len(), 12);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(ImageCrateDecoder.decode(b"not an image").is_err());
    }

    #[test]
    fn memory_assets_report_missing_files() {
        let assets = MemoryAssets::new().with("a.txt", "hello");
        assert_eq!(assets.read("a.txt").unwrap(), b"hello");
        assert_eq!(assets.read("b.txt").unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
