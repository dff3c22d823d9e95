//! Stroke layer binarization.
//!
//! A freehand stroke layer is anti-aliased and may be semi-transparent. It is
//! reduced to a two-state [`CoverageMask`] in two steps: an Otsu threshold on
//! a desaturated projection picks a black/white split, then every pixel that
//! ends up as fully transparent black is kept and all others are synthesized.

use image::{GrayImage, Luma, Rgba, RgbaImage};

/// Per-pixel coverage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Known pixel, preserved from the source.
    Unmasked,
    /// Pixel to synthesize.
    Masked,
}

/// Two-state mask, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMask {
    width: u32,
    height: u32,
    states: Vec<Coverage>,
}

impl CoverageMask {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// State of the pixel at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Coverage {
        self.states[y as usize * self.width as usize + x as usize]
    }

    /// `1.0` for an unmasked pixel, `0.0` for a masked one.
    #[must_use]
    pub fn keep(&self, x: u32, y: u32) -> f32 {
        match self.get(x, y) {
            Coverage::Unmasked => 1.0,
            Coverage::Masked => 0.0,
        }
    }

    /// Number of masked pixels.
    #[must_use]
    pub fn masked_count(&self) -> usize {
        self.states.iter().filter(|&&s| s == Coverage::Masked).count()
    }
}

/// Binarize a stroke layer into a coverage mask.
///
/// An empty layer yields an empty mask.
#[must_use]
pub fn binarize(stroke: &RgbaImage) -> CoverageMask {
    coverage_from_binarized(&binarize_image(stroke))
}

/// Black/white version of the stroke layer.
///
/// Each pixel's `0.3R + 0.59G + 0.11B` luma is compared against the Otsu
/// threshold of the desaturated layer: above it becomes white, otherwise
/// black. Fully transparent pixels have no colour and always become black.
/// Alpha is carried over unchanged.
#[must_use]
pub fn binarize_image(stroke: &RgbaImage) -> RgbaImage {
    let gray = grayscale(stroke);
    let threshold = otsu_threshold(&histogram(&gray), u64::from(gray.width()) * u64::from(gray.height()));

    tracing::debug!(threshold, "Binarizing stroke layer");

    let mut binary = RgbaImage::new(stroke.width(), stroke.height());
    for (src, dst) in stroke.pixels().zip(binary.pixels_mut()) {
        let level = if luma(src) > threshold { u8::MAX } else { 0 };
        *dst = Rgba([level, level, level, src[3]]);
    }

    binary
}

/// Derive coverage from a binarized layer.
///
/// Only pixels that are exactly transparent black are unmasked, so any pixel
/// the user painted over (non-zero alpha) is masked regardless of its luma.
#[must_use]
pub fn coverage_from_binarized(binary: &RgbaImage) -> CoverageMask {
    let states = binary
        .pixels()
        .map(|p| {
            if p.0 == [0, 0, 0, 0] {
                Coverage::Unmasked
            } else {
                Coverage::Masked
            }
        })
        .collect();

    CoverageMask {
        width: binary.width(),
        height: binary.height(),
        states,
    }
}

/// Desaturate to a single gray channel.
///
/// Uses the luminance weights of a zero-saturation colour matrix. Fully
/// transparent pixels have no colour and project to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn grayscale(image: &RgbaImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let value = if src[3] == 0 {
            0
        } else {
            let [r, g, b] = [f32::from(src[0]), f32::from(src[1]), f32::from(src[2])];
            // Safe: weights sum to 1, result stays within [0, 255]
            0.213_f32
                .mul_add(r, 0.715_f32.mul_add(g, 0.072 * b))
                .round()
                .clamp(0.0, 255.0) as u8
        };
        *dst = Luma([value]);
    }
    gray
}

/// 256-bin histogram of gray levels.
#[must_use]
pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for pixel in gray.pixels() {
        bins[usize::from(pixel[0])] += 1;
    }
    bins
}

/// Otsu's threshold over a gray-level histogram.
///
/// Levels at or below the threshold form the background class. The lowest
/// level reaching the maximum between-class variance wins. Returns 0 when
/// `total` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn otsu_threshold(histogram: &[u64; 256], total: u64) -> u8 {
    let sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut sum_b = 0.0_f64;
    let mut weight_b = 0u64;
    let mut var_max = 0.0_f64;
    let mut threshold = 0usize;

    for (level, &count) in histogram.iter().enumerate() {
        weight_b += count;
        if weight_b == 0 {
            continue;
        }

        let weight_f = total.saturating_sub(weight_b);
        if weight_f == 0 {
            break;
        }

        sum_b += level as f64 * count as f64;

        let mean_b = sum_b / weight_b as f64;
        let mean_f = (sum - sum_b) / weight_f as f64;
        let var_between = weight_b as f64 * weight_f as f64 * (mean_b - mean_f).powi(2);

        if var_between > var_max {
            var_max = var_between;
            threshold = level;
        }
    }

    // Safe: level comes from enumerating 256 bins
    threshold as u8
}

/// Manual luma used for the final black/white decision.
///
/// Computed in double precision and truncated. Fully transparent pixels
/// project to 0, like [`grayscale`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luma(pixel: &Rgba<u8>) -> u8 {
    if pixel[3] == 0 {
        return 0;
    }
    let [r, g, b] = [f64::from(pixel[0]), f64::from(pixel[1]), f64::from(pixel[2])];
    // Truncates like an integer cast of the weighted sum
    (r * 0.3 + g * 0.59 + b * 0.11) as u8
}
