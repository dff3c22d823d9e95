//! Image saving utilities.

use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::error::{Error, Result};

/// Save an RGBA image to disk.
///
/// The format is inferred from the extension. JPEG output drops the alpha
/// channel and uses the given quality (1-100); other formats ignore it.
///
/// # Errors
///
/// Returns an error if the image cannot be written.
pub fn save_image<P: AsRef<Path>>(image: &RgbaImage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image.clone()).to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            image.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    tracing::debug!("Saved {}", path.display());
    Ok(())
}
