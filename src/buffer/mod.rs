//! Owned pixel grid with an explicit channel model, plus encode/decode.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat as CodecFormat, Rgb, RgbImage, Rgba, RgbaImage};
use thiserror::Error;

pub type BufferResult<T> = std::result::Result<T, BufferError>;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image as {format:?}: {source}")]
    Encode {
        format: ImageFormat,
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported image format for path: {path}")]
    UnsupportedFormat { path: String },
    #[error("pixel ({x}, {y}) outside {width}x{height} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("image must be at least 1x1, got {width}x{height}")]
    Empty { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Gray,
    Rgb,
    Rgba,
}

/// Formats that must survive a save/load round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> BufferResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("png") => Ok(Self::Png),
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            _ => Err(BufferError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }

    const fn codec(self) -> CodecFormat {
        match self {
            Self::Png => CodecFormat::Png,
            Self::Jpeg => CodecFormat::Jpeg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pixels {
    Gray(GrayImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

/// Image value handed between the catalog, the history and the caller.
///
/// Transforms never mutate an `Image` they were given; they build a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pixels: Pixels,
}

impl Image {
    pub(crate) const fn from_pixels(pixels: Pixels) -> Self {
        Self { pixels }
    }

    pub(crate) const fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    pub(crate) fn into_pixels(self) -> Pixels {
        self.pixels
    }

    pub fn filled(width: u32, height: u32, mode: ChannelMode, color: Rgba<u8>) -> Self {
        let pixels = match mode {
            ChannelMode::Gray => Pixels::Gray(GrayImage::from_pixel(
                width,
                height,
                image::Luma([luma([color[0], color[1], color[2]])]),
            )),
            ChannelMode::Rgb => Pixels::Rgb(RgbImage::from_pixel(
                width,
                height,
                Rgb([color[0], color[1], color[2]]),
            )),
            ChannelMode::Rgba => Pixels::Rgba(RgbaImage::from_pixel(width, height, color)),
        };
        Self { pixels }
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self::from_pixels(Pixels::Rgb(image))
    }

    pub fn from_rgba(image: RgbaImage) -> Self {
        Self::from_pixels(Pixels::Rgba(image))
    }

    pub fn from_gray(image: GrayImage) -> Self {
        Self::from_pixels(Pixels::Gray(image))
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        let color = image.color();
        let pixels = if color.has_alpha() {
            Pixels::Rgba(image.into_rgba8())
        } else if color.has_color() {
            Pixels::Rgb(image.into_rgb8())
        } else {
            Pixels::Gray(image.into_luma8())
        };
        Self { pixels }
    }

    pub fn load(bytes: &[u8]) -> BufferResult<Self> {
        let decoded = image::load_from_memory(bytes).map_err(BufferError::Decode)?;
        let image = Self::from_dynamic(decoded);
        if image.width() == 0 || image.height() == 0 {
            return Err(BufferError::Empty {
                width: image.width(),
                height: image.height(),
            });
        }
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            mode = ?image.mode(),
            "decoded image"
        );
        Ok(image)
    }

    pub fn save(&self, format: ImageFormat) -> BufferResult<Vec<u8>> {
        let dynamic = match (format, &self.pixels) {
            (ImageFormat::Jpeg, Pixels::Rgba(rgba)) => {
                DynamicImage::ImageRgb8(flatten_over_black(rgba))
            }
            _ => self.to_dynamic(),
        };
        let mut bytes = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut bytes), format.codec())
            .map_err(|source| BufferError::Encode { format, source })?;
        Ok(bytes)
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        match &self.pixels {
            Pixels::Gray(gray) => DynamicImage::ImageLuma8(gray.clone()),
            Pixels::Rgb(rgb) => DynamicImage::ImageRgb8(rgb.clone()),
            Pixels::Rgba(rgba) => DynamicImage::ImageRgba8(rgba.clone()),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match &self.pixels {
            Pixels::Gray(gray) => gray.dimensions(),
            Pixels::Rgb(rgb) => rgb.dimensions(),
            Pixels::Rgba(rgba) => rgba.dimensions(),
        }
    }

    pub const fn mode(&self) -> ChannelMode {
        match &self.pixels {
            Pixels::Gray(_) => ChannelMode::Gray,
            Pixels::Rgb(_) => ChannelMode::Rgb,
            Pixels::Rgba(_) => ChannelMode::Rgba,
        }
    }

    fn check_bounds(&self, x: u32, y: u32) -> BufferResult<()> {
        let (width, height) = self.dimensions();
        if x >= width || y >= height {
            return Err(BufferError::OutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Reads a pixel as RGBA regardless of channel mode.
    pub fn pixel(&self, x: u32, y: u32) -> BufferResult<Rgba<u8>> {
        self.check_bounds(x, y)?;
        let pixel = match &self.pixels {
            Pixels::Gray(gray) => {
                let value = gray.get_pixel(x, y)[0];
                Rgba([value, value, value, 255])
            }
            Pixels::Rgb(rgb) => {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Rgba([r, g, b, 255])
            }
            Pixels::Rgba(rgba) => *rgba.get_pixel(x, y),
        };
        Ok(pixel)
    }

    /// Writes a pixel, converting to the image's channel mode.
    pub fn set_pixel(&mut self, x: u32, y: u32, value: Rgba<u8>) -> BufferResult<()> {
        self.check_bounds(x, y)?;
        let [r, g, b, _] = value.0;
        match &mut self.pixels {
            Pixels::Gray(gray) => gray.put_pixel(x, y, image::Luma([luma([r, g, b])])),
            Pixels::Rgb(rgb) => rgb.put_pixel(x, y, Rgb([r, g, b])),
            Pixels::Rgba(rgba) => rgba.put_pixel(x, y, value),
        }
        Ok(())
    }

    /// Promotes grayscale to RGB; RGB and RGBA are returned as-is.
    pub(crate) fn into_color(self) -> Self {
        match self.pixels {
            Pixels::Gray(gray) => {
                Self::from_rgb(DynamicImage::ImageLuma8(gray).into_rgb8())
            }
            pixels => Self { pixels },
        }
    }

    /// Expands any channel mode to RGBA; gray and RGB become fully opaque.
    pub(crate) fn to_rgba8(&self) -> RgbaImage {
        self.to_dynamic().into_rgba8()
    }
}

/// JPEG has no alpha channel, so translucent pixels are composited over black.
fn flatten_over_black(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let premultiply = |value: u8| ((u32::from(value) * u32::from(a) + 127) / 255) as u8;
        Rgb([premultiply(r), premultiply(g), premultiply(b)])
    })
}

/// ITU-R 601 luma in 16-bit fixed point; the weights sum to 65536 so a gray input maps to itself.
pub(crate) const fn luma([r, g, b]: [u8; 3]) -> u8 {
    let weighted = r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000;
    (weighted >> 16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rgb() -> Image {
        let mut rgb = RgbImage::new(3, 2);
        rgb.put_pixel(2, 1, Rgb([200, 10, 30]));
        Image::from_rgb(rgb)
    }

    #[test]
    fn pixel_access_rejects_out_of_bounds_coordinates() {
        let mut image = sample_rgb();
        assert!(matches!(
            image.pixel(3, 0),
            Err(BufferError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 2
            })
        ));
        assert!(image.set_pixel(0, 2, Rgba([0, 0, 0, 255])).is_err());
        assert_eq!(image.pixel(2, 1).unwrap(), Rgba([200, 10, 30, 255]));
    }

    #[test]
    fn set_pixel_on_gray_stores_luma() {
        let mut image = Image::filled(2, 2, ChannelMode::Gray, Rgba([0, 0, 0, 255]));
        image.set_pixel(1, 1, Rgba([90, 90, 90, 255])).unwrap();
        assert_eq!(image.pixel(1, 1).unwrap(), Rgba([90, 90, 90, 255]));
        assert_eq!(image.mode(), ChannelMode::Gray);
    }

    #[test]
    fn png_round_trip_preserves_pixels_and_mode() {
        let image = sample_rgb();
        let bytes = image.save(ImageFormat::Png).unwrap();
        let decoded = Image::load(&bytes).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn jpeg_round_trip_flattens_alpha_and_keeps_dimensions() {
        let image = Image::filled(16, 8, ChannelMode::Rgba, Rgba([120, 120, 120, 128]));
        let bytes = image.save(ImageFormat::Jpeg).unwrap();
        let decoded = Image::load(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
        assert_eq!(decoded.mode(), ChannelMode::Rgb);
    }

    #[test]
    fn jpeg_composites_translucent_pixels_over_black() {
        let image = Image::filled(16, 8, ChannelMode::Rgba, Rgba([200, 100, 50, 128]));
        let decoded = Image::load(&image.save(ImageFormat::Jpeg).unwrap()).unwrap();
        let [r, g, b, _] = decoded.pixel(8, 4).unwrap().0;
        for (actual, expected) in [(r, 100), (g, 50), (b, 25)] {
            assert!(
                actual.abs_diff(expected) <= 4,
                "channel {actual} too far from {expected}"
            );
        }

        let transparent = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 0]));
        let flattened = flatten_over_black(&transparent);
        assert_eq!(flattened.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn load_rejects_garbage_bytes() {
        assert!(matches!(
            Image::load(b"not an image"),
            Err(BufferError::Decode(_))
        ));
    }

    #[test]
    fn format_is_selected_by_extension() {
        assert_eq!(
            ImageFormat::from_path(Path::new("out/photo.JPG")).unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_path(Path::new("photo.png")).unwrap(),
            ImageFormat::Png
        );
        assert!(ImageFormat::from_path(Path::new("photo.bmp")).is_err());
        assert!(ImageFormat::from_path(Path::new("photo")).is_err());
    }

    #[test]
    fn luma_keeps_neutral_gray() {
        assert_eq!(luma([128, 128, 128]), 128);
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([0, 0, 0]), 0);
    }

    #[test]
    fn into_color_promotes_gray_only() {
        let gray = Image::filled(1, 1, ChannelMode::Gray, Rgba([40, 40, 40, 255]));
        assert_eq!(gray.into_color().mode(), ChannelMode::Rgb);
        let rgba = Image::filled(1, 1, ChannelMode::Rgba, Rgba([40, 40, 40, 7]));
        assert_eq!(rgba.into_color().mode(), ChannelMode::Rgba);
    }
}
