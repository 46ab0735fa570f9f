//! Histogram computation and rendering.
//!
//! The rendered chart is a small PNG meant for inline display next to the
//! image it describes; it is never written to disk.

use image::{DynamicImage, Rgb, RgbImage};

use super::encode::{encode_png, to_base64};
use super::ImagingError;

/// Rendered chart width. Two pixels per intensity bin.
pub const CHART_WIDTH: u32 = 512;
/// Rendered chart height.
pub const CHART_HEIGHT: u32 = 200;

const BACKGROUND: [u8; 3] = [255, 255, 255];
const GRID: [u8; 3] = [226, 226, 226];
const AXIS: [u8; 3] = [120, 120, 120];
/// Fill opacity of each channel's area, out of 255.
const FILL_ALPHA: u16 = 90;

/// Which intensity channel a bin vector describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Luma,
    Red,
    Green,
    Blue,
}

impl Channel {
    fn color(self) -> [u8; 3] {
        match self {
            Channel::Luma => [64, 64, 64],
            Channel::Red => [220, 38, 38],
            Channel::Green => [22, 163, 74],
            Channel::Blue => [37, 99, 235],
        }
    }
}

/// Per-channel 256-bin intensity counts.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub channels: Vec<(Channel, [u32; 256])>,
}

impl Histogram {
    /// Count intensities. Grayscale yields one channel, anything else three.
    pub fn compute(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => {
                let mut bins = [0u32; 256];
                for p in gray.pixels() {
                    bins[p.0[0] as usize] += 1;
                }
                Self {
                    channels: vec![(Channel::Luma, bins)],
                }
            }
            other => {
                let rgb = other.to_rgb8();
                let mut bins = [[0u32; 256]; 3];
                for p in rgb.pixels() {
                    bins[0][p.0[0] as usize] += 1;
                    bins[1][p.0[1] as usize] += 1;
                    bins[2][p.0[2] as usize] += 1;
                }
                Self {
                    channels: vec![
                        (Channel::Red, bins[0]),
                        (Channel::Green, bins[1]),
                        (Channel::Blue, bins[2]),
                    ],
                }
            }
        }
    }

    /// Highest single bin across all channels.
    pub fn peak(&self) -> u32 {
        self.channels
            .iter()
            .flat_map(|(_, bins)| bins.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Total samples counted in the first channel (= pixel count).
    pub fn total(&self) -> u64 {
        self.channels
            .first()
            .map(|(_, bins)| bins.iter().map(|&c| c as u64).sum())
            .unwrap_or(0)
    }

    /// Draw the histogram as overlaid translucent areas.
    pub fn render(&self) -> RgbImage {
        let mut chart = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, Rgb(BACKGROUND));
        draw_grid(&mut chart);

        let peak = self.peak();
        if peak == 0 {
            return chart;
        }

        let plot_height = CHART_HEIGHT - 1;
        for (channel, bins) in &self.channels {
            let color = channel.color();
            for (bin, &count) in bins.iter().enumerate() {
                let bar = ((count as u64 * plot_height as u64) / peak as u64) as u32;
                if bar == 0 {
                    continue;
                }
                let top = plot_height - bar;
                for dx in 0..2 {
                    let x = bin as u32 * 2 + dx;
                    for y in top..plot_height {
                        blend_pixel(&mut chart, x, y, color, FILL_ALPHA);
                    }
                    // Outline on top of the area
                    chart.put_pixel(x, top, Rgb(color));
                }
            }
        }
        chart
    }
}

fn draw_grid(chart: &mut RgbImage) {
    for quarter in 1..4 {
        let y = CHART_HEIGHT * quarter / 4;
        for x in 0..CHART_WIDTH {
            chart.put_pixel(x, y, Rgb(GRID));
        }
        let x = CHART_WIDTH * quarter / 4;
        for y in 0..CHART_HEIGHT {
            chart.put_pixel(x, y, Rgb(GRID));
        }
    }
    for x in 0..CHART_WIDTH {
        chart.put_pixel(x, CHART_HEIGHT - 1, Rgb(AXIS));
    }
}

fn blend_pixel(chart: &mut RgbImage, x: u32, y: u32, color: [u8; 3], alpha: u16) {
    let p = chart.get_pixel_mut(x, y);
    for (dst, &src) in p.0.iter_mut().zip(color.iter()) {
        *dst = ((src as u16 * alpha + *dst as u16 * (255 - alpha)) / 255) as u8;
    }
}

/// Render the histogram of `img` and return it as a base64 PNG.
pub fn histogram_base64(img: &DynamicImage) -> Result<String, ImagingError> {
    let chart = Histogram::compute(img).render();
    let png = encode_png(&DynamicImage::ImageRgb8(chart))?;
    Ok(to_base64(&png))
}
