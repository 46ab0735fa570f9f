//! Text CAPTCHA generation and verification.
//!
//! Challenges are drawn from an alphabet without look-alike symbols
//! (`0/O`, `1/I`) and rendered with a built-in 5x7 bitmap font, scaled up
//! and distorted per glyph, over a speckled background crossed by noise
//! lines.

use image::{DynamicImage, Rgb, RgbImage};
use rand::Rng;

use crate::config::CaptchaConfig;
use crate::imaging::encode::{encode_png, to_base64};
use crate::imaging::ImagingError;

/// Symbols a challenge is drawn from.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const GLYPH_COLS: u32 = 5;
const GLYPH_ROWS: u32 = 7;
const MARGIN: u32 = 20;
const NOISE_LINES: usize = 5;
const SPECKLES: usize = 250;

/// 5x7 glyphs, one byte per row, bit 4 is the leftmost column.
fn glyph(symbol: u8) -> Option<[u8; 7]> {
    let rows = match symbol {
        b'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        b'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        b'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        b'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        b'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        b'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        b'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        b'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        b'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        b'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        b'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        b'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        b'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        b'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        b'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        b'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        b'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        b'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        b'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        b'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        b'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        b'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        b'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        b'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        b'2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        b'3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        b'4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        b'5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        b'6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        b'7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        b'8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        b'9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        _ => return None,
    };
    Some(rows)
}

/// A generated challenge: the expected answer and its rendering.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub text: String,
    pub image: RgbImage,
}

impl Challenge {
    /// PNG-encode the rendering as base64 for inline `<img>` embedding.
    pub fn image_base64(&self) -> Result<String, ImagingError> {
        let png = encode_png(&DynamicImage::ImageRgb8(self.image.clone()))?;
        Ok(to_base64(&png))
    }
}

/// Produces challenges with fixed dimensions and length.
#[derive(Debug, Clone)]
pub struct CaptchaGenerator {
    config: CaptchaConfig,
}

impl CaptchaGenerator {
    pub fn new(config: CaptchaConfig) -> Self {
        Self { config }
    }

    /// Generate a challenge using the thread-local RNG.
    pub fn generate(&self) -> Challenge {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generate a challenge from a caller-supplied RNG (seedable in tests).
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Challenge {
        let text = random_text(rng, self.config.length);
        let image = render(&text, self.config.width, self.config.height, rng);
        Challenge { text, image }
    }
}

/// Random challenge text of `length` symbols from `ALPHABET`.
pub fn random_text<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Compare a user answer with the expected text.
///
/// Both sides are trimmed and compared ASCII case-insensitively. An empty
/// answer or a missing expectation never verifies.
pub fn verify(answer: &str, expected: Option<&str>) -> bool {
    let answer = answer.trim();
    match expected.map(str::trim) {
        Some(expected) if !expected.is_empty() && !answer.is_empty() => {
            answer.eq_ignore_ascii_case(expected)
        }
        _ => false,
    }
}

fn render<R: Rng + ?Sized>(text: &str, width: u32, height: u32, rng: &mut R) -> RgbImage {
    let mut canvas = RgbImage::from_fn(width, height, |_, _| {
        let base = rng.gen_range(232..=255u8);
        Rgb([base, base.saturating_sub(rng.gen_range(0..8)), base])
    });

    let count = text.len().max(1) as u32;
    let usable = width.saturating_sub(2 * MARGIN).max(count);
    let cell = usable / count;
    let scale = (cell / (GLYPH_COLS + 1)).min(height / (GLYPH_ROWS + 2)).max(1);
    let glyph_w = GLYPH_COLS * scale;
    let glyph_h = GLYPH_ROWS * scale;
    let base_y = height.saturating_sub(glyph_h) / 2;

    for (i, symbol) in text.bytes().enumerate() {
        let Some(rows) = glyph(symbol.to_ascii_uppercase()) else {
            continue;
        };
        let color = Rgb([
            rng.gen_range(10..110u8),
            rng.gen_range(10..110u8),
            rng.gen_range(10..110u8),
        ]);
        let slack = cell.saturating_sub(glyph_w);
        let x0 = (MARGIN + i as u32 * cell + rng.gen_range(0..=slack)) as i64;
        let jitter = (base_y / 2) as i64;
        let y0 = base_y as i64 + rng.gen_range(-jitter..=jitter);
        let shear: i64 = rng.gen_range(-1..=1);

        for (row, bits) in rows.iter().enumerate() {
            let row_shift = (row as i64 - GLYPH_ROWS as i64 / 2) * shear;
            for col in 0..GLYPH_COLS {
                if bits & (1 << (GLYPH_COLS - 1 - col)) == 0 {
                    continue;
                }
                let px = x0 + (col * scale) as i64 + row_shift;
                let py = y0 + (row as u32 * scale) as i64;
                fill_rect(&mut canvas, px, py, scale, scale, color);
            }
        }
    }

    for _ in 0..NOISE_LINES {
        let from = (rng.gen_range(0..width) as i64, rng.gen_range(0..height) as i64);
        let to = (rng.gen_range(0..width) as i64, rng.gen_range(0..height) as i64);
        let shade = rng.gen_range(60..160u8);
        draw_line(&mut canvas, from, to, Rgb([shade, shade / 2, shade]));
    }

    for _ in 0..SPECKLES {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let shade = rng.gen_range(80..200u8);
        canvas.put_pixel(x, y, Rgb([shade, shade, shade]));
    }

    canvas
}

fn put_clipped(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(canvas: &mut RgbImage, x: i64, y: i64, w: u32, h: u32, color: Rgb<u8>) {
    for dy in 0..h as i64 {
        for dx in 0..w as i64 {
            put_clipped(canvas, x + dx, y + dy, color);
        }
    }
}

/// Bresenham line, clipped to the canvas.
fn draw_line(canvas: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_clipped(canvas, x, y, color);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
