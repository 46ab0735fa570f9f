//! Contrast adjustment.
//!
//! Pixels are pulled toward or pushed away from the image's mean gray:
//! `out = mid + (in - mid) * level`, truncated and clipped to `0..=255`.
//! A level of 1.0 returns the input unchanged, 0.0 would flatten the image
//! to a solid mid-gray.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::config::{DEFAULT_CONTRAST, MAX_CONTRAST, MIN_CONTRAST};

/// Parse a user-supplied contrast value and clamp it to the allowed range.
///
/// Missing, empty and unparsable inputs fall back to `DEFAULT_CONTRAST`.
/// Underscores between digits are accepted as group separators (`1_5` is
/// 15). Infinities clamp to the nearest bound and NaN lands on
/// `MAX_CONTRAST`.
pub fn parse_contrast_level(raw: Option<&str>) -> f32 {
    let parsed = raw
        .map(str::trim)
        .map(strip_digit_separators)
        .and_then(|value| value.parse::<f32>().ok());

    match parsed {
        Some(value) => clamp_contrast(value),
        None => DEFAULT_CONTRAST,
    }
}

/// Drop `_` only where it sits between two ASCII digits. Any other
/// underscore is kept so the parse rejects it.
fn strip_digit_separators(value: &str) -> String {
    let bytes = value.as_bytes();
    value
        .char_indices()
        .filter(|&(i, c)| {
            c != '_'
                || !(i > 0
                    && bytes[i - 1].is_ascii_digit()
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        })
        .map(|(_, c)| c)
        .collect()
}

/// Clamp a contrast level into `[MIN_CONTRAST, MAX_CONTRAST]`.
/// NaN is not ordered against either bound and maps to the upper one.
pub fn clamp_contrast(level: f32) -> f32 {
    if level.is_nan() {
        return MAX_CONTRAST;
    }
    level.clamp(MIN_CONTRAST, MAX_CONTRAST)
}

/// Bring an image into a mode the transform understands.
///
/// 8-bit RGB and 8-bit grayscale pass through untouched; everything else
/// (alpha, 16-bit, float) is converted to 8-bit RGB, dropping alpha.
pub fn normalize_color_mode(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// ITU-R 601 luma in 16.16 fixed point, rounded.
fn luma(r: u8, g: u8, b: u8) -> u32 {
    (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16
}

/// Rounded mean luminance of an image (0 for an empty image).
pub fn mean_luminance(img: &DynamicImage) -> u8 {
    let (sum, count) = match img {
        DynamicImage::ImageLuma8(gray) => gray_sum(gray),
        other => rgb_sum(&other.to_rgb8()),
    };
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64 + 0.5).floor().min(255.0) as u8
}

fn gray_sum(img: &GrayImage) -> (u64, u64) {
    img.pixels()
        .fold((0u64, 0u64), |(sum, n), p| (sum + p.0[0] as u64, n + 1))
}

fn rgb_sum(img: &RgbImage) -> (u64, u64) {
    img.pixels().fold((0u64, 0u64), |(sum, n), p| {
        (sum + luma(p.0[0], p.0[1], p.0[2]) as u64, n + 1)
    })
}

/// Precompute the 256-entry transfer table for one (mid, level) pair.
fn contrast_table(mid: u8, level: f32) -> [u8; 256] {
    let mid = mid as f32;
    let mut table = [0u8; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        let out = mid + level * (value as f32 - mid);
        *slot = if out <= 0.0 {
            0
        } else if out >= 255.0 {
            255
        } else {
            out as u8
        };
    }
    table
}

/// Apply a contrast multiplier, returning a new image of the same size.
///
/// Grayscale stays grayscale; every other mode comes back as 8-bit RGB.
pub fn adjust_contrast(img: &DynamicImage, level: f32) -> DynamicImage {
    let mid = mean_luminance(img);
    let table = contrast_table(mid, level);

    match img {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = gray.clone();
            for p in out.pixels_mut() {
                p.0[0] = table[p.0[0] as usize];
            }
            DynamicImage::ImageLuma8(out)
        }
        other => {
            let mut out = other.to_rgb8();
            for p in out.pixels_mut() {
                for channel in p.0.iter_mut() {
                    *channel = table[*channel as usize];
                }
            }
            DynamicImage::ImageRgb8(out)
        }
    }
}
