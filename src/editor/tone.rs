use super::operation::Tone;
use crate::buffer::{Image, Pixels};

const MID_GRAY: f64 = 128.0;

/// Brightness scales each channel, then contrast scales its distance from mid-gray.
pub fn apply_tone(image: &Image, tone: Tone) -> Image {
    if tone.is_identity() {
        return image.clone();
    }
    let lut = tone_lut(tone);
    let pixels = match image.clone().into_pixels() {
        Pixels::Gray(mut gray) => {
            for pixel in gray.pixels_mut() {
                pixel.0[0] = lut[usize::from(pixel.0[0])];
            }
            Pixels::Gray(gray)
        }
        Pixels::Rgb(mut rgb) => {
            for channel in rgb.iter_mut() {
                *channel = lut[usize::from(*channel)];
            }
            Pixels::Rgb(rgb)
        }
        Pixels::Rgba(mut rgba) => {
            for pixel in rgba.pixels_mut() {
                for channel in &mut pixel.0[..3] {
                    *channel = lut[usize::from(*channel)];
                }
            }
            Pixels::Rgba(rgba)
        }
    };
    Image::from_pixels(pixels)
}

fn tone_lut(tone: Tone) -> [u8; 256] {
    let mut lut = [0_u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let brightened = value as f64 * tone.brightness;
        let contrasted = MID_GRAY + (brightened - MID_GRAY) * tone.contrast;
        *slot = contrasted.round().clamp(0.0, 255.0) as u8;
    }
    lut
}
