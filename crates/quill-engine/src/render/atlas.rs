use glam::Vec2;

use super::texture::Texture2D;

/// Assigns `names` to consecutive `tile_width` x `tile_height` tiles of
/// `texture`, row-major, starting at the top-left tile.
///
/// The cursor wraps to the next row down once `x >= width`. Names past the
/// last tile are still assigned; their rectangles fall below the texture.
pub fn tile_sub_textures<S: AsRef<str>>(
    texture: &Texture2D<'_>,
    names: &[S],
    tile_width: u32,
    tile_height: u32,
) {
    let width = texture.width();
    let height = texture.height();
    if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 {
        log::warn!(
            "atlas tiling skipped: {width}x{height} texture, {tile_width}x{tile_height} tiles"
        );
        return;
    }

    let capacity = u64::from(width / tile_width) * u64::from(height / tile_height);
    if names.len() as u64 > capacity {
        log::warn!(
            "atlas has room for {capacity} tiles of {tile_width}x{tile_height}, {} names given",
            names.len()
        );
    }

    let (w, h) = (width as f32, height as f32);
    let (tw, th) = (tile_width as i64, tile_height as i64);
    let mut x: i64 = 0;
    let mut y: i64 = i64::from(height);

    for name in names {
        let left_bottom = Vec2::new(x as f32 / w, (y - th) as f32 / h);
        let right_top = Vec2::new((x + tw) as f32 / w, y as f32 / h);
        texture.add_sub_texture(name.as_ref(), left_bottom, right_top);

        x += tw;
        if x >= i64::from(width) {
            x = 0;
            y -= th;
        }
    }
}
