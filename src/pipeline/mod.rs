//! Stroke-mask inpainting pipeline.
//!
//! Leaves first: [`mask`] binarizes the stroke layer, [`codec`] converts
//! between images and tensors, [`noise`] draws the style latent,
//! [`composite`] blends results back onto the source, and [`inpaint`]
//! sequences the model [`stage`]s of the configured backend.

pub mod codec;
pub mod composite;
pub mod context;
pub mod mask;
pub mod noise;
pub mod stage;

mod inpaint;

pub use context::InferenceContext;
pub use inpaint::{BackendStages, Config, InferenceBackend, InpaintOutput, Pipeline, Step};
