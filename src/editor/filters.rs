use image::{imageops, ImageBuffer, Pixel};

use super::operation::{FilterToggleSet, Kernel};
use super::transform::BufferTransform;
use crate::buffer::{luma, Image, Pixels};
use crate::config::EditorConfig;
use crate::geometry::Color;

/// Runs the active filters in the fixed order grayscale, sepia, invert, blur.
pub fn apply_filters(image: &Image, filters: FilterToggleSet, config: &EditorConfig) -> Image {
    let mut output = image.clone();
    if filters.is_empty() {
        return output;
    }
    if filters.grayscale {
        output = grayscale(&output);
    }
    if filters.sepia {
        output = sepia(&output);
    }
    if filters.invert {
        output = invert(&output);
    }
    if filters.blur {
        output = blur(&output, config.blur_radius);
    }
    output
}

/// Luma re-expanded to three equal channels; the channel count never drops.
pub fn grayscale(image: &Image) -> Image {
    map_rgb(image, |rgb| {
        let value = luma(rgb);
        [value, value, value]
    })
}

pub fn sepia(image: &Image) -> Image {
    map_rgb(image, |[r, g, b]| {
        let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
        [
            sepia_channel(0.393 * r + 0.769 * g + 0.189 * b),
            sepia_channel(0.349 * r + 0.686 * g + 0.168 * b),
            sepia_channel(0.272 * r + 0.534 * g + 0.131 * b),
        ]
    })
}

fn sepia_channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

pub fn invert(image: &Image) -> Image {
    map_rgb(image, |[r, g, b]| [255 - r, 255 - g, 255 - b])
}

/// Gaussian blur; `radius` is the standard deviation in pixels.
pub fn blur(image: &Image, radius: f32) -> Image {
    image.transformed(&GaussianBlur { sigma: radius })
}

struct GaussianBlur {
    sigma: f32,
}

impl BufferTransform for GaussianBlur {
    fn apply<P>(&self, buffer: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        imageops::blur(buffer, self.sigma)
    }
}

/// Runs a 3x3 kernel over the colour channels. Alpha and the one-pixel border are kept.
pub fn convolve(image: &Image, kernel: Kernel) -> Image {
    image.transformed(&Convolution3x3::for_kernel(kernel))
}

struct Convolution3x3 {
    weights: [i32; 9],
    scale: i32,
    offset: i32,
}

impl Convolution3x3 {
    const fn for_kernel(kernel: Kernel) -> Self {
        match kernel {
            Kernel::Detail => Self {
                weights: [0, -1, 0, -1, 10, -1, 0, -1, 0],
                scale: 6,
                offset: 0,
            },
            Kernel::Sharpen => Self {
                weights: [-2, -2, -2, -2, 32, -2, -2, -2, -2],
                scale: 16,
                offset: 0,
            },
            Kernel::Contour => Self {
                weights: [-1, -1, -1, -1, 8, -1, -1, -1, -1],
                scale: 1,
                offset: 255,
            },
            Kernel::Smooth => Self {
                weights: [1, 1, 1, 1, 5, 1, 1, 1, 1],
                scale: 13,
                offset: 0,
            },
        }
    }

    fn finish(&self, sum: i32) -> u8 {
        let value = (f64::from(sum) / f64::from(self.scale)).round() + f64::from(self.offset);
        value.clamp(0.0, 255.0) as u8
    }
}

impl BufferTransform for Convolution3x3 {
    fn apply<P>(&self, buffer: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        let (width, height) = buffer.dimensions();
        let mut output = buffer.clone();
        if width < 3 || height < 3 {
            return output;
        }
        let color_channels = usize::from(P::CHANNEL_COUNT.min(3));

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let mut sums = [0i32; 3];
                for (tap, weight) in (0u32..).zip(self.weights) {
                    if weight == 0 {
                        continue;
                    }
                    let source = buffer.get_pixel(x + tap % 3 - 1, y + tap / 3 - 1).channels();
                    for (sum, value) in sums.iter_mut().zip(&source[..color_channels]) {
                        *sum += weight * i32::from(*value);
                    }
                }
                let target = output.get_pixel_mut(x, y).channels_mut();
                for (value, sum) in target[..color_channels].iter_mut().zip(sums) {
                    *value = self.finish(sum);
                }
            }
        }
        output
    }
}

/// Exact RGB match; alpha is left alone.
pub fn replace_color(image: &Image, from: Color, to: Color) -> Image {
    let (from, to) = (from.rgb(), to.rgb());
    map_rgb(image, |rgb| if rgb == from { to } else { rgb })
}

/// Applies `f` to every RGB triple, promoting grayscale to RGB and keeping alpha.
pub(crate) fn map_rgb(image: &Image, f: impl Fn([u8; 3]) -> [u8; 3]) -> Image {
    match image.clone().into_color().into_pixels() {
        Pixels::Rgb(mut rgb) => {
            for pixel in rgb.pixels_mut() {
                pixel.0 = f(pixel.0);
            }
            Image::from_rgb(rgb)
        }
        Pixels::Rgba(mut rgba) => {
            for pixel in rgba.pixels_mut() {
                let [r, g, b, a] = pixel.0;
                let [r, g, b] = f([r, g, b]);
                pixel.0 = [r, g, b, a];
            }
            Image::from_rgba(rgba)
        }
        Pixels::Gray(gray) => Image::from_gray(gray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ChannelMode;
    use image::Rgba;

    fn solid(r: u8, g: u8, b: u8) -> Image {
        Image::filled(4, 4, ChannelMode::Rgb, Rgba([r, g, b, 255]))
    }

    #[test]
    fn grayscale_of_gray_is_unchanged() {
        let image = solid(128, 128, 128);
        assert_eq!(grayscale(&image), image);
    }

    #[test]
    fn grayscale_keeps_three_channels() {
        let gray = grayscale(&solid(255, 0, 0));
        assert_eq!(gray.mode(), ChannelMode::Rgb);
        assert_eq!(gray.pixel(0, 0).unwrap(), Rgba([76, 76, 76, 255]));
    }

    #[test]
    fn sepia_uses_fixed_matrix_and_clamps() {
        let toned = sepia(&solid(100, 150, 200));
        assert_eq!(toned.pixel(1, 1).unwrap(), Rgba([192, 171, 133, 255]));

        let white = sepia(&solid(255, 255, 255));
        assert_eq!(white.pixel(0, 0).unwrap(), Rgba([255, 255, 238, 255]));
    }

    #[test]
    fn invert_promotes_gray_and_keeps_alpha() {
        let gray = Image::filled(2, 2, ChannelMode::Gray, Rgba([10, 10, 10, 255]));
        let inverted = invert(&gray);
        assert_eq!(inverted.mode(), ChannelMode::Rgb);
        assert_eq!(inverted.pixel(0, 0).unwrap(), Rgba([245, 245, 245, 255]));

        let translucent = Image::filled(1, 1, ChannelMode::Rgba, Rgba([0, 100, 255, 40]));
        assert_eq!(
            invert(&translucent).pixel(0, 0).unwrap(),
            Rgba([255, 155, 0, 40])
        );
    }

    #[test]
    fn blur_keeps_dimensions_and_softens_edges() {
        let mut image = solid(0, 0, 0);
        for y in 0..4 {
            for x in 2..4 {
                image.set_pixel(x, y, Rgba([255, 255, 255, 255])).unwrap();
            }
        }
        let blurred = blur(&image, 1.0);
        assert_eq!(blurred.dimensions(), (4, 4));
        let edge = blurred.pixel(1, 1).unwrap()[0];
        assert!(edge > 0 && edge < 255, "edge pixel {edge} should be mixed");
    }

    #[test]
    fn filters_run_in_fixed_order() {
        let config = EditorConfig::default();
        let image = solid(100, 150, 200);
        let all = FilterToggleSet {
            grayscale: true,
            sepia: true,
            invert: true,
            blur: false,
        };
        let expected = invert(&sepia(&grayscale(&image)));
        assert_eq!(apply_filters(&image, all, &config), expected);
        assert_eq!(apply_filters(&image, FilterToggleSet::NONE, &config), image);
    }

    fn dotted(mode: ChannelMode) -> Image {
        let mut image = Image::filled(5, 5, mode, Rgba([100, 100, 100, 255]));
        image.set_pixel(2, 2, Rgba([200, 200, 200, 255])).unwrap();
        image
    }

    #[test]
    fn weighted_kernels_leave_flat_regions_alone() {
        let flat = solid(90, 120, 150);
        for kernel in [Kernel::Detail, Kernel::Sharpen, Kernel::Smooth] {
            assert_eq!(convolve(&flat, kernel), flat, "{} changed a flat image", kernel.label());
        }
    }

    #[test]
    fn sharpen_amplifies_a_bright_dot_and_keeps_the_border() {
        let sharpened = convolve(&dotted(ChannelMode::Gray), Kernel::Sharpen);
        assert_eq!(sharpened.mode(), ChannelMode::Gray);
        assert_eq!(sharpened.pixel(2, 2).unwrap(), Rgba([255, 255, 255, 255]));
        // (32 * 100 - 2 * (7 * 100 + 200)) / 16 = 87.5
        assert_eq!(sharpened.pixel(1, 1).unwrap(), Rgba([88, 88, 88, 255]));
        assert_eq!(sharpened.pixel(0, 0).unwrap(), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn smooth_spreads_the_dot() {
        let smoothed = convolve(&dotted(ChannelMode::Rgb), Kernel::Smooth);
        // (5 * 200 + 8 * 100) / 13 = 138.46
        assert_eq!(smoothed.pixel(2, 2).unwrap(), Rgba([138, 138, 138, 255]));
        assert_eq!(smoothed.pixel(1, 2).unwrap(), Rgba([108, 108, 108, 255]));
    }

    #[test]
    fn contour_whitens_flat_interior_and_keeps_alpha() {
        let flat = Image::filled(4, 4, ChannelMode::Rgba, Rgba([60, 70, 80, 90]));
        let contoured = convolve(&flat, Kernel::Contour);
        assert_eq!(contoured.pixel(1, 1).unwrap(), Rgba([255, 255, 255, 90]));
        assert_eq!(contoured.pixel(0, 3).unwrap(), Rgba([60, 70, 80, 90]));
    }

    #[test]
    fn kernels_skip_images_without_an_interior() {
        let thin = Image::filled(2, 9, ChannelMode::Rgb, Rgba([5, 5, 5, 255]));
        assert_eq!(convolve(&thin, Kernel::Contour), thin);
    }

    #[test]
    fn replace_color_only_touches_exact_matches() {
        let mut image = solid(1, 2, 3);
        image.set_pixel(0, 0, Rgba([9, 9, 9, 255])).unwrap();
        let replaced = replace_color(&image, Color::new(1, 2, 3), Color::new(200, 0, 0));
        assert_eq!(replaced.pixel(0, 0).unwrap(), Rgba([9, 9, 9, 255]));
        assert_eq!(replaced.pixel(3, 3).unwrap(), Rgba([200, 0, 0, 255]));
    }
}
