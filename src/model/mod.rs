//! Model asset location and ONNX session loading.

mod loader;

pub use loader::{ModelCache, ModelType};
