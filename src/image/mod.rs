//! Image loading and saving for the command line front end.
//!
//! The pipeline itself only deals with in-memory [`RgbaImage`] buffers; these
//! helpers sit at the file-system edge.

mod load;
mod save;

pub use load::load_image;
pub use save::save_image;

pub use ::image::RgbaImage;

/// Fully opaque alpha value.
pub const OPAQUE: u8 = u8::MAX;
