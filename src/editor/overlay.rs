use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

use super::operation::OverlayKind;
use crate::buffer::{Image, Pixels};
use crate::geometry::Point;

const GLYPH_SIZE: u32 = 8;

/// Rasterizes one overlay onto a transparent layer.
pub(crate) fn draw_overlay(layer: &mut RgbaImage, overlay: &OverlayKind) {
    match overlay {
        OverlayKind::Stroke {
            points,
            color,
            width,
        } => draw_stroke(layer, points, color.opaque(), *width),
        OverlayKind::Text {
            content,
            position,
            font_size,
            color,
        } => draw_text(layer, content, *position, *font_size, color.opaque()),
    }
}

fn draw_stroke(layer: &mut RgbaImage, points: &[Point], color: Rgba<u8>, width: u32) {
    let radius = (width as f32 / 2.0).max(0.5);
    let Some(first) = points.first() else {
        return;
    };
    stamp_disc(layer, *first, radius, color);
    for pair in points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let dx = i64::from(end.x) - i64::from(start.x);
        let dy = i64::from(end.y) - i64::from(start.y);
        let steps = dx.abs().max(dy.abs());
        for step in 1..=steps {
            let t = step as f64 / steps as f64;
            let x = f64::from(start.x) + dx as f64 * t;
            let y = f64::from(start.y) + dy as f64 * t;
            stamp_disc(layer, Point::new(x.round() as i32, y.round() as i32), radius, color);
        }
    }
}

fn stamp_disc(layer: &mut RgbaImage, center: Point, radius: f32, color: Rgba<u8>) {
    let reach = radius.floor() as i32;
    let limit = radius * radius;
    for oy in -reach..=reach {
        for ox in -reach..=reach {
            if (ox * ox + oy * oy) as f32 > limit {
                continue;
            }
            put_clipped(
                layer,
                i64::from(center.x) + i64::from(ox),
                i64::from(center.y) + i64::from(oy),
                color,
            );
        }
    }
}

/// 8x8 bitmap glyphs scaled by whole multiples of `font_size / 8`.
/// Unknown characters render as `?`; `\n` starts a new line.
fn draw_text(layer: &mut RgbaImage, content: &str, origin: Point, font_size: u32, color: Rgba<u8>) {
    let scale = (font_size / GLYPH_SIZE).max(1);
    let advance = i64::from(GLYPH_SIZE * scale);
    let line_height = advance + i64::from(scale);
    let (mut cursor_x, mut cursor_y) = (i64::from(origin.x), i64::from(origin.y));

    for ch in content.chars() {
        if ch == '\n' {
            cursor_x = i64::from(origin.x);
            cursor_y += line_height;
            continue;
        }
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += advance;
            continue;
        };
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let base_x = cursor_x + i64::from(col * scale);
                let base_y = cursor_y + row as i64 * i64::from(scale);
                for sy in 0..i64::from(scale) {
                    for sx in 0..i64::from(scale) {
                        put_clipped(layer, base_x + sx, base_y + sy, color);
                    }
                }
            }
        }
        cursor_x += advance;
    }
}

fn put_clipped(layer: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= i64::from(layer.width()) || y >= i64::from(layer.height()) {
        return;
    }
    layer.put_pixel(x as u32, y as u32, color);
}

/// Source-over composite of the overlay layer onto `base`.
pub(crate) fn composite(base: &Image, layer: &RgbaImage) -> Image {
    match base.clone().into_color().into_pixels() {
        Pixels::Rgba(mut rgba) => {
            for (x, y, src) in layer.enumerate_pixels() {
                if let Some(dst) = rgba.get_pixel_mut_checked(x, y) {
                    *dst = blend(*src, *dst);
                }
            }
            Image::from_rgba(rgba)
        }
        Pixels::Rgb(mut rgb) => {
            for (x, y, src) in layer.enumerate_pixels() {
                if let Some(dst) = rgb.get_pixel_mut_checked(x, y) {
                    let [r, g, b] = dst.0;
                    let [r, g, b, _] = blend(*src, Rgba([r, g, b, u8::MAX])).0;
                    dst.0 = [r, g, b];
                }
            }
            Image::from_rgb(rgb)
        }
        Pixels::Gray(gray) => Image::from_gray(gray),
    }
}

fn blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let alpha = u32::from(src[3]);
    match alpha {
        0 => return dst,
        255 => return src,
        _ => {}
    }
    let inverse = 255 - alpha;
    let mix = |s: u8, d: u8| ((u32::from(s) * alpha + u32::from(d) * inverse + 127) / 255) as u8;
    let out_alpha = alpha + (u32::from(dst[3]) * inverse + 127) / 255;
    Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        out_alpha.min(255) as u8,
    ])
}
