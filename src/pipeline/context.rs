//! Per-request scratch state.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{Error, Result};

use super::mask::{self, CoverageMask};

/// Everything one inpainting request derives from its inputs.
///
/// Built at the start of a request and dropped once the final image exists.
/// The source is borrowed and never modified.
#[derive(Debug)]
pub struct InferenceContext<'a> {
    source: &'a RgbaImage,
    working_image: RgbaImage,
    binarized: RgbaImage,
    coverage: CoverageMask,
}

impl<'a> InferenceContext<'a> {
    /// Resize the inputs to `resolution`x`resolution` and binarize the stroke.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateInput`] for a zero-area source or a stroke
    /// layer whose size differs from the source.
    pub fn prepare(source: &'a RgbaImage, stroke: &RgbaImage, resolution: u32) -> Result<Self> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::DegenerateInput {
                width,
                height,
                reason: "source image has no pixels".to_string(),
            });
        }
        if stroke.dimensions() != source.dimensions() {
            return Err(Error::DegenerateInput {
                width: stroke.width(),
                height: stroke.height(),
                reason: format!("stroke layer does not match source {width}x{height}"),
            });
        }

        let working_image = imageops::resize(source, resolution, resolution, FilterType::Triangle);
        let scaled_stroke = imageops::resize(stroke, resolution, resolution, FilterType::Triangle);
        let binarized = mask::binarize_image(&scaled_stroke);
        let coverage = mask::coverage_from_binarized(&binarized);

        tracing::debug!(
            "Prepared {width}x{height} request at {resolution}x{resolution}, {} masked pixels",
            coverage.masked_count()
        );

        Ok(Self {
            source,
            working_image,
            binarized,
            coverage,
        })
    }

    /// The untouched source image.
    #[must_use]
    pub const fn source(&self) -> &RgbaImage {
        self.source
    }

    /// Source dimensions.
    #[must_use]
    pub fn source_dims(&self) -> (u32, u32) {
        self.source.dimensions()
    }

    /// Source image resized to the working resolution.
    #[must_use]
    pub const fn working_image(&self) -> &RgbaImage {
        &self.working_image
    }

    /// Black/white stroke layer at the working resolution.
    #[must_use]
    pub const fn binarized(&self) -> &RgbaImage {
        &self.binarized
    }

    /// Coverage mask at the working resolution.
    #[must_use]
    pub const fn coverage(&self) -> &CoverageMask {
        &self.coverage
    }

    /// Side of the square working resolution.
    #[must_use]
    pub const fn resolution(&self) -> u32 {
        self.coverage.width()
    }
}
