//! # `inpainter`
//!
//! Interactive image inpainting driven by ONNX generative models.
//!
//! A caller hands over a source image and the stroke layer a user painted on
//! top of it. The stroke layer is binarized into a coverage mask, the image is
//! packed into the tensor layout of the configured backend, the model chain
//! synthesizes the covered region, and the result is composited back onto the
//! source at full resolution.
//!
//! ## Example
//!
//! ```no_run
//! use inpainter::{Config, Pipeline};
//!
//! # fn main() -> inpainter::Result<()> {
//! let mut pipeline = Pipeline::new(Config::default())?;
//!
//! let source = inpainter::image::load_image("photo.png")?;
//! let stroke = inpainter::image::load_image("stroke.png")?;
//! let output = pipeline.inpaint(&source, &stroke)?;
//!
//! inpainter::image::save_image(&output.image, "filled.png", 95)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod worker;

pub use error::{Error, Result};
pub use pipeline::{Config, InferenceBackend, InpaintOutput, Pipeline};
pub use worker::InpaintWorker;
