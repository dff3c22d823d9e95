//! Image loading utilities.

use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::error::{Error, Result};

/// Load an image from disk as packed RGBA.
///
/// RGB sources get an opaque alpha channel. Stroke layers should be saved
/// with transparency so untouched pixels keep an alpha of zero.
///
/// # Errors
///
/// Returns an error if the image cannot be opened or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Loaded {} ({}x{}, {:?})",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );

    Ok(to_rgba(img))
}

fn to_rgba(img: DynamicImage) -> RgbaImage {
    match img {
        DynamicImage::ImageRgba8(rgba) => rgba,
        other => other.to_rgba8(),
    }
}
