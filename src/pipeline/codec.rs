//! Conversion between raster images and planar model tensors.

use image::{Rgba, RgbaImage};
use ndarray::{Array4, ArrayView4};

use crate::error::{Error, Result};
use crate::image::OPAQUE;

use super::mask::CoverageMask;

/// Image tensor in NCHW format (batch, channels, height, width).
pub type ImageTensor = Array4<f32>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Channel order and mask encoding of an image+mask tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[R, G, B, Mask]`, mask plane in {0, 1}.
    RgbMask,
    /// `[Mask, R, G, B]`, mask plane centered to {-0.5, 0.5}.
    MaskRgb,
}

impl TensorLayout {
    /// Channel count of an encoded tensor.
    #[must_use]
    pub const fn channels(self) -> usize {
        RGB_CHANNELS + 1
    }

    const fn mask_plane(self) -> usize {
        match self {
            Self::RgbMask => RGB_CHANNELS,
            Self::MaskRgb => 0,
        }
    }

    const fn rgb_offset(self) -> usize {
        match self {
            Self::RgbMask => 0,
            Self::MaskRgb => 1,
        }
    }

    fn mask_value(self, keep: f32) -> f32 {
        match self {
            Self::RgbMask => keep,
            Self::MaskRgb => keep - 0.5,
        }
    }
}

/// Value range of the RGB planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// [-1, 1], used by the generators.
    Signed,
    /// [0, 1], used by the super-resolution model.
    Unit,
}

impl Normalization {
    #[inline]
    fn normalize(self, value: u8) -> f32 {
        match self {
            Self::Signed => (f32::from(value) / 127.5) - 1.0,
            Self::Unit => f32::from(value) / 255.0,
        }
    }

    /// Map back to [0, 255] with rounding and clamping.
    #[inline]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn denormalize(self, value: f32) -> u8 {
        let unit = match self {
            Self::Signed => (value + 1.0) * 0.5,
            Self::Unit => value,
        };
        // Safe: clamped to [0, 255] range before casting
        (unit * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

/// Pack an image and its coverage mask into a model input tensor.
///
/// Both must already be at the working resolution. RGB of masked pixels is
/// zeroed so the model never sees what lies under the stroke.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the image and mask sizes differ.
pub fn encode(image: &RgbaImage, mask: &CoverageMask, layout: TensorLayout) -> Result<ImageTensor> {
    if image.dimensions() != mask.dimensions() {
        return Err(Error::ShapeMismatch {
            expected: format!("mask {}x{}", image.width(), image.height()),
            actual: format!("mask {}x{}", mask.width(), mask.height()),
        });
    }

    let (width, height) = (image.width() as usize, image.height() as usize);
    let rgb = layout.rgb_offset();
    let mut tensor = Array4::<f32>::zeros((1, layout.channels(), height, width));

    for (x, y, pixel) in image.enumerate_pixels() {
        let keep = mask.keep(x, y);
        let (row, col) = (y as usize, x as usize);
        for c in 0..RGB_CHANNELS {
            tensor[[0, rgb + c, row, col]] = Normalization::Signed.normalize(pixel[c]) * keep;
        }
        tensor[[0, layout.mask_plane(), row, col]] = layout.mask_value(keep);
    }

    Ok(tensor)
}

/// Unpack a [-1, 1] model output into an opaque image.
///
/// Only the first three planes are read.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the tensor is not `(1, C >= 3, H, W)`
/// with a non-zero area.
pub fn decode(tensor: ArrayView4<'_, f32>) -> Result<RgbaImage> {
    tensor_to_image(tensor, Normalization::Signed)
}

/// Convert an image into a `(1, 3, H, W)` tensor with the given range.
#[must_use]
pub fn image_to_tensor(image: &RgbaImage, normalization: Normalization) -> ImageTensor {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height, width));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..RGB_CHANNELS {
            tensor[[0, c, y as usize, x as usize]] = normalization.normalize(pixel[c]);
        }
    }

    tensor
}

/// Convert the first three planes of a tensor into an opaque image.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the tensor is not `(1, C >= 3, H, W)`.
#[allow(clippy::cast_possible_truncation)]
pub fn tensor_to_image(tensor: ArrayView4<'_, f32>, normalization: Normalization) -> Result<RgbaImage> {
    let (batch, channels, height, width) = tensor.dim();
    if batch != 1 || channels < RGB_CHANNELS || height == 0 || width == 0 {
        return Err(Error::ShapeMismatch {
            expected: "(1, >=3, H > 0, W > 0)".to_string(),
            actual: format!("{:?}", tensor.shape()),
        });
    }

    let width_px = u32::try_from(width).map_err(|_| oversized(tensor.shape()))?;
    let height_px = u32::try_from(height).map_err(|_| oversized(tensor.shape()))?;

    Ok(RgbaImage::from_fn(width_px, height_px, |x, y| {
        let (row, col) = (y as usize, x as usize);
        Rgba([
            normalization.denormalize(tensor[[0, 0, row, col]]),
            normalization.denormalize(tensor[[0, 1, row, col]]),
            normalization.denormalize(tensor[[0, 2, row, col]]),
            OPAQUE,
        ])
    }))
}

fn oversized(shape: &[usize]) -> Error {
    Error::ShapeMismatch {
        expected: "spatial size within u32".to_string(),
        actual: format!("{shape:?}"),
    }
}
