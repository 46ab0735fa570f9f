//! Coarse image categorisation.
//!
//! The pipeline only needs a short human-readable label. `ImageClassifier`
//! is the seam; `FeatureClassifier` is the built-in implementation working
//! from global colour statistics, so the service runs without model files.

use image::DynamicImage;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Cannot classify an empty image")]
    EmptyImage,
    #[error("Classifier failed: {0}")]
    Failed(String),
}

/// Maps a processed image to a category label.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<String, ClassifierError>;
}

/// Global statistics the built-in classifier decides on.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFeatures {
    /// Mean luminance, 0-255.
    pub mean_luminance: f32,
    /// RMS contrast (std-dev of luminance), 0-127.5.
    pub rms_contrast: f32,
    /// Mean HSV saturation, 0-1.
    pub mean_saturation: f32,
    /// Share of saturated pixels per hue family: warm, green, cool.
    pub hue_shares: [f32; 3],
}

/// Saturation above which a pixel's hue is considered meaningful.
const SATURATED: f32 = 0.2;

impl ImageFeatures {
    pub fn extract(image: &DynamicImage) -> Result<Self, ClassifierError> {
        let rgb = image.to_rgb8();
        let count = rgb.width() as u64 * rgb.height() as u64;
        if count == 0 {
            return Err(ClassifierError::EmptyImage);
        }

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut sat_sum = 0.0f64;
        let mut hue_counts = [0u64; 3];

        for p in rgb.pixels() {
            let [r, g, b] = p.0;
            let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            sum += luma;
            sum_sq += luma * luma;

            let (hue, sat) = hue_saturation(r, g, b);
            sat_sum += sat as f64;
            if sat >= SATURATED {
                if let Some(family) = hue_family(hue) {
                    hue_counts[family] += 1;
                }
            }
        }

        let n = count as f64;
        let mean = sum / n;
        let variance = (sum_sq / n) - (mean * mean);

        Ok(Self {
            mean_luminance: mean as f32,
            rms_contrast: variance.max(0.0).sqrt() as f32,
            mean_saturation: (sat_sum / n) as f32,
            hue_shares: hue_counts.map(|c| (c as f64 / n) as f32),
        })
    }
}

/// HSV hue in degrees and saturation in 0-1.
fn hue_saturation(r: u8, g: u8, b: u8) -> (f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if max <= 0.0 || delta <= 0.0 {
        return (0.0, 0.0);
    }
    let sat = delta / max;
    let hue = if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };
    (hue, sat)
}

/// 0 = warm (reds through yellows), 1 = green, 2 = cool (cyans and blues).
/// Purples and magentas belong to no family.
fn hue_family(hue: f32) -> Option<usize> {
    match hue {
        h if !(70.0..330.0).contains(&h) => Some(0),
        h if h < 170.0 => Some(1),
        h if h < 290.0 => Some(2),
        _ => None,
    }
}

/// Rule-based classifier over `ImageFeatures`.
#[derive(Debug, Clone)]
pub struct FeatureClassifier {
    pub dark_below: f32,
    pub bright_above: f32,
    pub low_contrast_below: f32,
    pub monochrome_below: f32,
    /// Minimum share a hue family needs to name the image.
    pub dominant_share: f32,
}

impl Default for FeatureClassifier {
    fn default() -> Self {
        Self {
            dark_below: 50.0,
            bright_above: 205.0,
            low_contrast_below: 18.0,
            monochrome_below: 0.1,
            dominant_share: 0.35,
        }
    }
}

impl FeatureClassifier {
    pub fn label_for(&self, f: &ImageFeatures) -> &'static str {
        if f.mean_luminance < self.dark_below {
            return "dark scene";
        }
        if f.mean_luminance > self.bright_above {
            return "bright scene";
        }
        if f.rms_contrast < self.low_contrast_below {
            return "low contrast";
        }
        if f.mean_saturation < self.monochrome_below {
            return "monochrome";
        }

        let (family, share) = f
            .hue_shares
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, s)| if s > best.1 { (i, s) } else { best });

        if share < self.dominant_share {
            return "mixed colors";
        }
        match family {
            0 => "warm tones",
            1 => "greenery",
            _ => "cool tones",
        }
    }
}

impl ImageClassifier for FeatureClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<String, ClassifierError> {
        let features = ImageFeatures::extract(image)?;
        let label = self.label_for(&features);
        tracing::debug!(
            label,
            luminance = features.mean_luminance,
            contrast = features.rms_contrast,
            saturation = features.mean_saturation,
            "Image classified"
        );
        Ok(label.to_string())
    }
}
