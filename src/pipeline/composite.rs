//! Blending synthesized pixels back onto the source.
//!
//! Compositing happens twice. Pass 1 runs at the working resolution and
//! merges the model output with the resized source under the coverage mask.
//! The result and its black/white mask are then resized to the source size,
//! and pass 2 merges again, this time taking kept pixels from the original
//! source. Resampling blur therefore only ever lands in the synthesized area.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use ndarray::ArrayView4;

use crate::error::{Error, Result};
use crate::image::OPAQUE;

use super::codec::RGB_CHANNELS;
use super::context::InferenceContext;
use super::mask::Coverage;

const WHITE: Rgba<u8> = Rgba([u8::MAX, u8::MAX, u8::MAX, OPAQUE]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, OPAQUE]);

/// Pass-1 result at the working resolution.
#[derive(Debug, Clone)]
pub struct WorkingComposite {
    /// Blended image.
    pub image: RgbaImage,
    /// White where the pixel was kept, black where it was synthesized.
    pub visualization: RgbaImage,
}

/// Final output at the source resolution.
#[derive(Debug, Clone)]
pub struct Composite {
    /// Source with the masked region filled in.
    pub image: RgbaImage,
    /// White where the source was preserved, black where it was synthesized.
    pub mask_visualization: RgbaImage,
}

/// Run both compositing passes.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if `synthesized` is not
/// `(1, C >= 3, R, R)` at the context's working resolution.
pub fn composite(synthesized: ArrayView4<'_, f32>, ctx: &InferenceContext<'_>) -> Result<Composite> {
    let working = blend_working(synthesized, ctx)?;
    Ok(blend_source(&working, ctx))
}

/// Pass 1: merge the model output with the working image.
///
/// Per channel `ground = src / 255 * keep` and
/// `fake = (s + 1) / 2 * (1 - keep)`; exactly one term is non-zero.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if `synthesized` does not match the
/// working resolution.
pub fn blend_working(
    synthesized: ArrayView4<'_, f32>,
    ctx: &InferenceContext<'_>,
) -> Result<WorkingComposite> {
    let resolution = ctx.resolution() as usize;
    let (batch, channels, height, width) = synthesized.dim();
    if batch != 1 || channels < RGB_CHANNELS || height != resolution || width != resolution {
        return Err(Error::ShapeMismatch {
            expected: format!("(1, >=3, {resolution}, {resolution})"),
            actual: format!("{:?}", synthesized.shape()),
        });
    }

    let working = ctx.working_image();
    let coverage = ctx.coverage();
    let mut image = RgbaImage::new(working.width(), working.height());
    let mut visualization = RgbaImage::new(working.width(), working.height());

    for (x, y, pixel) in working.enumerate_pixels() {
        let keep = coverage.keep(x, y);
        let (row, col) = (y as usize, x as usize);

        let mut out = [0u8; 4];
        for c in 0..RGB_CHANNELS {
            let ground = f32::from(pixel[c]) / 255.0 * keep;
            let fake = (synthesized[[0, c, row, col]] + 1.0) * 0.5 * (1.0 - keep);
            out[c] = to_byte(ground + fake);
        }
        out[3] = OPAQUE;

        image.put_pixel(x, y, Rgba(out));
        visualization.put_pixel(x, y, if coverage.get(x, y) == Coverage::Unmasked { WHITE } else { BLACK });
    }

    Ok(WorkingComposite {
        image,
        visualization,
    })
}

/// Upscale a pass-1 result and merge it with the original source.
///
/// A pixel is kept only where the upscaled visualization is exactly white.
/// The returned visualization renders that decision in pure black and white.
#[must_use]
pub fn blend_source(working: &WorkingComposite, ctx: &InferenceContext<'_>) -> Composite {
    let (width, height) = ctx.source_dims();
    let fake = imageops::resize(&working.image, width, height, FilterType::Triangle);
    let upscaled_mask = imageops::resize(&working.visualization, width, height, FilterType::Triangle);

    let mut image = RgbaImage::new(width, height);
    let mut mask_visualization = RgbaImage::new(width, height);

    for (x, y, ground_px) in ctx.source().enumerate_pixels() {
        let kept = is_white(upscaled_mask.get_pixel(x, y));
        let keep = if kept { 1.0 } else { 0.0 };
        let fake_px = fake.get_pixel(x, y);

        let mut out = [0u8; 4];
        for c in 0..RGB_CHANNELS {
            let ground = f32::from(ground_px[c]) / 255.0 * keep;
            let synthesized = f32::from(fake_px[c]) / 255.0 * (1.0 - keep);
            out[c] = to_byte(ground + synthesized);
        }
        out[3] = OPAQUE;

        image.put_pixel(x, y, Rgba(out));
        mask_visualization.put_pixel(x, y, if kept { WHITE } else { BLACK });
    }

    Composite {
        image,
        mask_visualization,
    }
}

fn is_white(pixel: &Rgba<u8>) -> bool {
    pixel[0] == u8::MAX && pixel[1] == u8::MAX && pixel[2] == u8::MAX
}

/// Convert a [0, 1] intensity to a byte, rounding to nearest.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
