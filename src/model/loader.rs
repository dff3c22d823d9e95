//! Model directory management and session loading.

use std::fs;
use std::path::{Path, PathBuf};

use ort::session::Session;

use crate::error::{Error, Result};
use crate::pipeline::stage::OnnxStage;

/// Model assets shipped alongside the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Mapping network - turns a noise latent into a style vector.
    Mapping,
    /// Encoder - packs the masked image and style into generator features.
    Encoder,
    /// Generator - synthesizes the RGB output from encoder features.
    Generator,
    /// ESRGAN super-resolution, an optional quality pass.
    SuperResolution,
    /// MI-GAN single-pass inpainting generator.
    SinglePass,
}

impl ModelType {
    /// Get the filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Mapping => "mapping.onnx",
            Self::Encoder => "encoder.onnx",
            Self::Generator => "generator.onnx",
            Self::SuperResolution => "esrgan.onnx",
            Self::SinglePass => "migan.onnx",
        }
    }

    /// Short name used in logs and stage errors.
    #[must_use]
    pub const fn stage_name(&self) -> &'static str {
        match self {
            Self::Mapping => "mapping",
            Self::Encoder => "encoder",
            Self::Generator => "generator",
            Self::SuperResolution => "super-resolution",
            Self::SinglePass => "single-pass",
        }
    }
}

/// Manages the directory the ONNX models are read from.
pub struct ModelCache {
    model_dir: PathBuf,
}

impl ModelCache {
    /// Create a model cache rooted at `model_dir`, or the platform default.
    ///
    /// The default location is the platform cache directory:
    /// - Windows: `%LOCALAPPDATA%\inpainter\models`
    /// - Linux: `~/.cache/inpainter/models`
    /// - macOS: `~/Library/Caches/inpainter/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(model_dir: Option<&Path>) -> Result<Self> {
        let model_dir = model_dir.map_or_else(default_model_dir, Path::to_path_buf);

        fs::create_dir_all(&model_dir).map_err(|source| Error::CacheDir {
            path: model_dir.clone(),
            source,
        })?;

        Ok(Self { model_dir })
    }

    /// Directory the models are read from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.model_dir
    }

    /// Get the path to a model file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] if the file is absent.
    pub fn get_model_path(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.model_dir.join(model_type.filename());

        if !path.exists() {
            return Err(Error::ModelNotFound {
                name: model_type.filename().to_string(),
                path,
            });
        }

        Ok(path)
    }

    /// Load an ONNX model session.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is missing or cannot be loaded.
    pub fn load_session(&self, model_type: ModelType, intra_threads: usize) -> Result<Session> {
        let path = self.get_model_path(model_type)?;

        Session::builder()
            .map_err(|source| load_error(model_type, source))?
            .with_intra_threads(intra_threads)
            .map_err(|source| load_error(model_type, source.into()))?
            .commit_from_file(&path)
            .map_err(|source| load_error(model_type, source))
    }

    /// Load a model and wrap it as a pipeline stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is missing or cannot be loaded.
    pub fn load_stage(&self, model_type: ModelType, intra_threads: usize) -> Result<OnnxStage> {
        tracing::info!("Loading {}...", model_type.filename());
        let session = self.load_session(model_type, intra_threads)?;
        Ok(OnnxStage::new(model_type.stage_name(), session))
    }
}

fn load_error(model_type: ModelType, source: ort::Error) -> Error {
    Error::ModelLoad {
        name: model_type.filename().to_string(),
        source,
    }
}

fn default_model_dir() -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("inpainter").join("models")
}
