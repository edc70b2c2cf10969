use image::{imageops, GrayImage, ImageBuffer, Luma, Pixel};

use crate::buffer::{Image, Pixels};
use crate::geometry::Axis;

/// Operates on any 8-bit pixel buffer so the background and the overlay layer share one code path.
pub(crate) trait BufferTransform {
    fn apply<P>(&self, buffer: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8> + 'static;
}

impl Image {
    pub(crate) fn transformed<T: BufferTransform>(&self, transform: &T) -> Image {
        let pixels = match self.pixels() {
            Pixels::Gray(gray) => Pixels::Gray(transform.apply(gray)),
            Pixels::Rgb(rgb) => Pixels::Rgb(transform.apply(rgb)),
            Pixels::Rgba(rgba) => Pixels::Rgba(transform.apply(rgba)),
        };
        Image::from_pixels(pixels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Geometry {
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// Counter-clockwise.
    Rotate { degrees: f64 },
    Flip(Axis),
    Resize { width: u32, height: u32 },
}

impl Geometry {
    /// Whether the output gains canvas fill that no source pixel covers.
    pub(crate) fn expands_canvas(&self) -> bool {
        matches!(*self, Self::Rotate { degrees } if !is_right_angle(degrees))
    }
}

impl BufferTransform for Geometry {
    fn apply<P>(&self, buffer: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        match *self {
            Self::Crop {
                x,
                y,
                width,
                height,
            } => imageops::crop_imm(buffer, x, y, width, height).to_image(),
            Self::Rotate { degrees } => rotate(buffer, degrees),
            Self::Flip(Axis::Horizontal) => imageops::flip_horizontal(buffer),
            Self::Flip(Axis::Vertical) => imageops::flip_vertical(buffer),
            Self::Resize { width, height } => {
                imageops::resize(buffer, width, height, imageops::FilterType::Triangle)
            }
        }
    }
}

fn is_right_angle(degrees: f64) -> bool {
    degrees.rem_euclid(360.0) % 90.0 == 0.0
}

fn rotate<P>(buffer: &ImageBuffer<P, Vec<u8>>, degrees: f64) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let normalized = degrees.rem_euclid(360.0);
    if is_right_angle(normalized) {
        // imageops rotates clockwise.
        return match normalized as u32 {
            90 => imageops::rotate270(buffer),
            180 => imageops::rotate180(buffer),
            270 => imageops::rotate90(buffer),
            _ => buffer.clone(),
        };
    }
    rotate_expanding(buffer, normalized)
}

/// Canvas size needed to hold a `width`x`height` image rotated by `degrees`.
pub(crate) fn rotated_extent((width, height): (u32, u32), degrees: f64) -> (u32, u32) {
    let (sin, cos) = degrees.rem_euclid(360.0).to_radians().sin_cos();
    let (w, h) = (f64::from(width), f64::from(height));
    (
        expanded_extent(w * cos.abs() + h * sin.abs()),
        expanded_extent(w * sin.abs() + h * cos.abs()),
    )
}

/// Nearest-neighbour rotation onto a canvas grown to hold the whole rotated image.
/// Uncovered pixels stay zeroed: black, or transparent when the buffer has alpha.
fn rotate_expanding<P>(buffer: &ImageBuffer<P, Vec<u8>>, degrees: f64) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (width, height) = buffer.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (f64::from(width), f64::from(height));
    let (out_width, out_height) = rotated_extent((width, height), degrees);

    let mut output = ImageBuffer::<P, Vec<u8>>::new(out_width, out_height);
    let (src_cx, src_cy) = (w / 2.0, h / 2.0);
    let (dst_cx, dst_cy) = (f64::from(out_width) / 2.0, f64::from(out_height) / 2.0);

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - dst_cx;
        let dy = f64::from(y) + 0.5 - dst_cy;
        let src_x = (dx * cos - dy * sin + src_cx).floor();
        let src_y = (dx * sin + dy * cos + src_cy).floor();
        if src_x < 0.0 || src_y < 0.0 || src_x >= w || src_y >= h {
            continue;
        }
        *pixel = *buffer.get_pixel(src_x as u32, src_y as u32);
    }
    output
}

fn expanded_extent(value: f64) -> u32 {
    // Absorb float noise so exact sizes do not round up by one.
    let extent = (value - 1e-6).ceil().max(1.0);
    if extent >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        extent as u32
    }
}

/// Mask level at or above which a pixel holds image content rather than canvas fill.
const COVERED: u8 = 128;

pub(crate) fn full_coverage((width, height): (u32, u32)) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([u8::MAX]))
}

pub(crate) fn is_covered(coverage: &GrayImage, x: u32, y: u32) -> bool {
    coverage
        .get_pixel_checked(x, y)
        .is_some_and(|mask| mask[0] >= COVERED)
}

/// Zeroes every pixel the coverage mask marks as canvas fill.
pub(crate) struct ClearFill<'a> {
    pub(crate) coverage: &'a GrayImage,
}

impl BufferTransform for ClearFill<'_> {
    fn apply<P>(&self, buffer: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        let mut output = buffer.clone();
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            if !is_covered(self.coverage, x, y) {
                pixel.channels_mut().fill(0);
            }
        }
        output
    }
}
