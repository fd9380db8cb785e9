//! Shared fixtures for the integration tests.
//!
//! Everything runs on `HeadlessDriver`; no GPU is required.

#![allow(dead_code)]

use std::io::Cursor;

use glam::Vec2;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use quill_engine::logging::{LoggingConfig, init_logging};
use quill_engine::resources::{MemoryAssets, RegistryConfig, ResourceRegistry};

pub const SPRITE_VERTEX: &str = include_str!("../../res/shaders/sprite.vert.wgsl");
pub const SPRITE_FRAGMENT: &str = include_str!("../../res/shaders/sprite.frag.wgsl");

/// Fragment stage that reads a varying the sprite vertex stage never writes.
pub const MISMATCHED_FRAGMENT: &str = r#"
@fragment
fn fs_main(@location(4) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;

pub fn init() {
    init_logging(LoggingConfig::for_tests());
}

pub fn encode_png(img: DynamicImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("png encoding into memory");
    out.into_inner()
}

/// Opaque RGB image of one color.
pub fn solid_rgb_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode_png(RgbImage::from_pixel(width, height, Rgb(color)).into())
}

/// RGBA image whose top row is red and every other row blue.
pub fn red_top_rgba_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |_, y| {
        if y == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) }
    });
    encode_png(img.into())
}

/// Assets with the bundled sprite shaders and a 48x32 atlas.
pub fn standard_assets() -> MemoryAssets {
    MemoryAssets::new()
        .with("res/shaders/sprite.vert.wgsl", SPRITE_VERTEX)
        .with("res/shaders/sprite.frag.wgsl", SPRITE_FRAGMENT)
        .with("res/shaders/broken.frag.wgsl", MISMATCHED_FRAGMENT)
        .with("res/shaders/empty.wgsl", "")
        .with("res/textures/atlas.png", red_top_rgba_png(48, 32))
        .with("res/textures/opaque.png", solid_rgb_png(4, 4, [10, 20, 30]))
}

pub fn registry_with(
    driver: &quill_engine::driver::HeadlessDriver,
    config: RegistryConfig,
) -> ResourceRegistry<'_> {
    ResourceRegistry::with_sources(
        driver,
        config,
        standard_assets(),
        quill_engine::resources::ImageCrateDecoder,
    )
}

pub fn assert_close(actual: Vec2, expected: Vec2) {
    assert!(
        (actual - expected).abs().max_element() < 1e-3,
        "expected {expected:?}, got {actual:?}"
    );
}
