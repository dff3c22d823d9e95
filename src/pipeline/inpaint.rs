//! Inpainting pipeline orchestration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use image::RgbaImage;
use ndarray::{ArrayD, Ix4};

use crate::error::{Error, Result};
use crate::model::{ModelCache, ModelType};

use super::codec::{self, ImageTensor, Normalization, TensorLayout};
use super::composite::{self, WorkingComposite};
use super::context::InferenceContext;
use super::noise;
use super::stage::{first_output, match_inputs, InferenceStage};

/// Input name of the mapping network.
const MAPPING_INPUT: &str = "noise";
/// Image input name of the encoder and the single-pass generator.
const IMAGE_INPUT: &str = "input";
/// Style input name of the encoder.
const STYLE_INPUT: &str = "in_ws";

/// Model chain used to synthesize the masked region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceBackend {
    /// Mapping, encoder and generator networks at 256x256.
    #[default]
    Multistage,
    /// One generator at 512x512.
    SinglePass,
}

impl InferenceBackend {
    /// Side of the square working resolution.
    #[must_use]
    pub const fn resolution(self) -> u32 {
        match self {
            Self::Multistage => 256,
            Self::SinglePass => 512,
        }
    }

    /// Tensor layout the first stage expects.
    #[must_use]
    pub const fn layout(self) -> TensorLayout {
        match self {
            Self::Multistage => TensorLayout::RgbMask,
            Self::SinglePass => TensorLayout::MaskRgb,
        }
    }

    /// Models this backend loads.
    #[must_use]
    pub const fn models(self) -> &'static [ModelType] {
        match self {
            Self::Multistage => &[ModelType::Mapping, ModelType::Encoder, ModelType::Generator],
            Self::SinglePass => &[ModelType::SinglePass],
        }
    }
}

impl fmt::Display for InferenceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multistage => write!(f, "multistage"),
            Self::SinglePass => write!(f, "single-pass"),
        }
    }
}

impl FromStr for InferenceBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "multistage" | "multi-stage" => Ok(Self::Multistage),
            "single-pass" | "singlepass" | "migan" => Ok(Self::SinglePass),
            _ => Err(Error::InvalidParameter {
                name: "backend".to_string(),
                reason: format!("unknown backend '{s}', expected multistage or single-pass"),
            }),
        }
    }
}

/// Configuration for the inpainting pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model chain to run.
    pub backend: InferenceBackend,

    /// Directory holding the ONNX models. None for the platform default.
    pub model_dir: Option<PathBuf>,

    /// Seed of the mapping network's noise latent.
    pub seed: u64,

    /// Length of the noise latent.
    pub noise_dim: usize,

    /// Intra-op thread count for each ONNX session.
    pub intra_threads: usize,

    /// Run the super-resolution model on the working composite.
    pub super_resolution: bool,

    /// Output JPEG quality (1-100).
    pub output_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: InferenceBackend::default(),
            model_dir: None,
            seed: 2023,
            noise_dim: 512,
            intra_threads: 8,
            super_resolution: false,
            output_quality: 95,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.noise_dim == 0 {
            return Err(Error::InvalidParameter {
                name: "noise_dim".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.intra_threads == 0 {
            return Err(Error::InvalidParameter {
                name: "intra_threads".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }
}

/// Loaded stages for the configured backend.
pub enum BackendStages {
    Multistage {
        mapping: Box<dyn InferenceStage>,
        encoder: Box<dyn InferenceStage>,
        generator: Box<dyn InferenceStage>,
    },
    SinglePass {
        generator: Box<dyn InferenceStage>,
    },
}

impl BackendStages {
    fn backend(&self) -> InferenceBackend {
        match self {
            Self::Multistage { .. } => InferenceBackend::Multistage,
            Self::SinglePass { .. } => InferenceBackend::SinglePass,
        }
    }
}

/// Pipeline step being entered, reported to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    MapNoise,
    Encode,
    Generate,
    Enhance,
    Composite,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MapNoise => "mapping noise",
            Self::Encode => "encoding",
            Self::Generate => "generating",
            Self::Enhance => "enhancing",
            Self::Composite => "compositing",
        };
        f.write_str(name)
    }
}

/// Result of one inpainting request.
#[derive(Debug, Clone)]
pub struct InpaintOutput {
    /// Source with the masked region filled in, at source resolution.
    pub image: RgbaImage,
    /// White where the source was preserved, black where it was synthesized.
    pub mask_visualization: RgbaImage,
    /// Raw generator output at the working resolution.
    pub synthesized: RgbaImage,
    /// Wall-clock time spent in the model chain.
    pub inference_time: Duration,
}

/// Inpainting pipeline holding the long-lived model stages.
pub struct Pipeline {
    config: Config,
    stages: BackendStages,
    enhancer: Option<Box<dyn InferenceStage>>,
}

impl Pipeline {
    /// Create a new pipeline, loading the models of the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a model cannot be
    /// loaded.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing pipeline with config: {config:?}");

        let cache = ModelCache::new(config.model_dir.as_deref())?;
        tracing::info!("Loading models from {}", cache.dir().display());
        let threads = config.intra_threads;

        // Fail before loading anything if a model of the chain is missing.
        for &model in config.backend.models() {
            cache.get_model_path(model)?;
        }

        let stages = match config.backend {
            InferenceBackend::Multistage => BackendStages::Multistage {
                mapping: Box::new(cache.load_stage(ModelType::Mapping, threads)?),
                encoder: Box::new(cache.load_stage(ModelType::Encoder, threads)?),
                generator: Box::new(cache.load_stage(ModelType::Generator, threads)?),
            },
            InferenceBackend::SinglePass => BackendStages::SinglePass {
                generator: Box::new(cache.load_stage(ModelType::SinglePass, threads)?),
            },
        };

        let enhancer: Option<Box<dyn InferenceStage>> = if config.super_resolution {
            Some(Box::new(cache.load_stage(ModelType::SuperResolution, threads)?))
        } else {
            None
        };

        tracing::info!("Pipeline initialized successfully");

        Self::with_stages(config, stages, enhancer)
    }

    /// Create a pipeline from already loaded stages.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the stages do not
    /// belong to the configured backend.
    pub fn with_stages(
        config: Config,
        stages: BackendStages,
        enhancer: Option<Box<dyn InferenceStage>>,
    ) -> Result<Self> {
        config.validate()?;

        if stages.backend() != config.backend {
            return Err(Error::InvalidParameter {
                name: "backend".to_string(),
                reason: format!(
                    "configured for {} but given {} stages",
                    config.backend,
                    stages.backend()
                ),
            });
        }

        Ok(Self {
            config,
            stages,
            enhancer,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Inpaint the region covered by `stroke`.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are degenerate or any stage fails. No
    /// partial result is produced.
    pub fn inpaint(&mut self, source: &RgbaImage, stroke: &RgbaImage) -> Result<InpaintOutput> {
        self.inpaint_observed(source, stroke, &mut |_| {})
    }

    /// Inpaint, reporting each step to `observer` as it starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are degenerate or any stage fails.
    pub fn inpaint_observed(
        &mut self,
        source: &RgbaImage,
        stroke: &RgbaImage,
        observer: &mut dyn FnMut(Step),
    ) -> Result<InpaintOutput> {
        let backend = self.config.backend;
        tracing::info!(
            "Inpainting {}x{} image with {backend} backend",
            source.width(),
            source.height()
        );

        let ctx = InferenceContext::prepare(source, stroke, backend.resolution())?;

        let started = Instant::now();
        let synthesized = self.generate(&ctx, observer)?;
        let inference_time = started.elapsed();
        tracing::debug!("Model chain finished in {} ms", inference_time.as_millis());

        let raw = codec::decode(synthesized.view())?;
        let mut working = composite::blend_working(synthesized.view(), &ctx)?;

        if self.enhancer.is_some() {
            observer(Step::Enhance);
            working = self.enhance(working)?;
        }

        observer(Step::Composite);
        let result = composite::blend_source(&working, &ctx);

        tracing::info!("Inpainting complete");
        Ok(InpaintOutput {
            image: result.image,
            mask_visualization: result.mask_visualization,
            synthesized: raw,
            inference_time,
        })
    }

    /// Run the model chain and return the RGB output tensor.
    fn generate(
        &mut self,
        ctx: &InferenceContext<'_>,
        observer: &mut dyn FnMut(Step),
    ) -> Result<ImageTensor> {
        let layout = self.config.backend.layout();

        let output = match &mut self.stages {
            BackendStages::Multistage {
                mapping,
                encoder,
                generator,
            } => {
                observer(Step::MapNoise);
                let latent = noise::sample(1, self.config.noise_dim, self.config.seed);
                let styles = mapping.run(vec![(MAPPING_INPUT.to_string(), latent.into_dyn())])?;
                let style = first_output(mapping.name(), styles)?;

                observer(Step::Encode);
                let input = codec::encode(ctx.working_image(), ctx.coverage(), layout)?;
                let features = encoder.run(vec![
                    (IMAGE_INPUT.to_string(), input.into_dyn()),
                    (STYLE_INPUT.to_string(), style),
                ])?;
                tracing::debug!("Encoder produced {} tensors", features.len());

                observer(Step::Generate);
                let inputs = match_inputs(generator.name(), &generator.input_names(), features)?;
                let outputs = generator.run(inputs)?;
                first_output(generator.name(), outputs)?
            }
            BackendStages::SinglePass { generator } => {
                observer(Step::Encode);
                let input = codec::encode(ctx.working_image(), ctx.coverage(), layout)?;

                observer(Step::Generate);
                let outputs = generator.run(vec![(IMAGE_INPUT.to_string(), input.into_dyn())])?;
                first_output(generator.name(), outputs)?
            }
        };

        into_image_tensor(output)
    }

    /// Run the super-resolution stage on a working composite.
    fn enhance(&mut self, working: WorkingComposite) -> Result<WorkingComposite> {
        let Some(enhancer) = self.enhancer.as_mut() else {
            return Ok(working);
        };

        let input = codec::image_to_tensor(&working.image, Normalization::Unit);
        let outputs = enhancer.run(vec![(IMAGE_INPUT.to_string(), input.into_dyn())])?;
        let enhanced = into_image_tensor(first_output(enhancer.name(), outputs)?)?;
        let image = codec::tensor_to_image(enhanced.view(), Normalization::Unit)?;

        tracing::debug!(
            "Enhanced working composite to {}x{}",
            image.width(),
            image.height()
        );

        Ok(WorkingComposite {
            image,
            visualization: working.visualization,
        })
    }
}

fn into_image_tensor(tensor: ArrayD<f32>) -> Result<ImageTensor> {
    let shape = tensor.shape().to_vec();
    tensor
        .into_dimensionality::<Ix4>()
        .map_err(|_| Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor {shape:?}", shape.len()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::NamedTensors;
    use image::Rgba;
    use ndarray::{Array4, IxDyn};
    use std::sync::{Arc, Mutex};

    type RunFn = Box<dyn FnMut(NamedTensors) -> Result<NamedTensors> + Send>;

    /// In-memory stage driven by a closure.
    struct FnStage {
        name: String,
        inputs: Vec<String>,
        run: RunFn,
    }

    impl FnStage {
        fn boxed(
            name: &str,
            inputs: &[&str],
            run: impl FnMut(NamedTensors) -> Result<NamedTensors> + Send + 'static,
        ) -> Box<dyn InferenceStage> {
            Box::new(Self {
                name: name.to_string(),
                inputs: inputs.iter().map(ToString::to_string).collect(),
                run: Box::new(run),
            })
        }
    }

    impl InferenceStage for FnStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn input_names(&self) -> Vec<String> {
            self.inputs.clone()
        }

        fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors> {
            for name in &self.inputs {
                if !inputs.iter().any(|(n, _)| n == name) {
                    return Err(Error::MissingInput {
                        stage: self.name.clone(),
                        name: name.clone(),
                    });
                }
            }
            (self.run)(inputs)
        }
    }

    fn named(name: &str, tensor: ArrayD<f32>) -> (String, ArrayD<f32>) {
        (name.to_string(), tensor)
    }

    fn constant_rgb(resolution: usize, value: f32) -> ArrayD<f32> {
        Array4::from_elem((1, 3, resolution, resolution), value).into_dyn()
    }

    /// Multistage chain whose generator paints every pixel white.
    fn white_multistage(log: Arc<Mutex<Vec<String>>>) -> BackendStages {
        let mapping_log = Arc::clone(&log);
        let encoder_log = Arc::clone(&log);
        let generator_log = log;

        BackendStages::Multistage {
            mapping: FnStage::boxed("mapping", &["noise"], move |inputs| {
                mapping_log.lock().unwrap().push("mapping".to_string());
                assert_eq!(inputs[0].1.shape(), &[1, 512]);
                Ok(vec![named("ws", ArrayD::zeros(IxDyn(&[1, 14, 512])))])
            }),
            encoder: FnStage::boxed("encoder", &["input", "in_ws"], move |inputs| {
                encoder_log.lock().unwrap().push("encoder".to_string());
                let image = &inputs.iter().find(|(n, _)| n == "input").unwrap().1;
                assert_eq!(image.shape(), &[1, 4, 256, 256]);
                Ok(vec![
                    named("x_global", ArrayD::zeros(IxDyn(&[1, 512]))),
                    named("feats_64", ArrayD::zeros(IxDyn(&[1, 64, 64, 64]))),
                    named("feats_16", ArrayD::zeros(IxDyn(&[1, 256, 16, 16]))),
                ])
            }),
            generator: FnStage::boxed(
                "generator",
                &["feats_16", "x_global", "feats_64"],
                move |inputs| {
                    generator_log.lock().unwrap().push("generator".to_string());
                    assert_eq!(inputs[0].0, "feats_16");
                    Ok(vec![named("img", constant_rgb(256, 1.0))])
                },
            ),
        }
    }

    fn black_with_stroke(size: u32, start: u32, len: u32) -> (RgbaImage, RgbaImage) {
        let source = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255]));
        let stroke = RgbaImage::from_fn(size, size, |x, y| {
            let inside = (start..start + len).contains(&x) && (start..start + len).contains(&y);
            if inside {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        (source, stroke)
    }

    #[test]
    fn test_backend_parameters() {
        assert_eq!(InferenceBackend::Multistage.resolution(), 256);
        assert_eq!(InferenceBackend::Multistage.layout(), TensorLayout::RgbMask);
        assert_eq!(InferenceBackend::SinglePass.resolution(), 512);
        assert_eq!(InferenceBackend::SinglePass.layout(), TensorLayout::MaskRgb);
        assert_eq!(InferenceBackend::Multistage.models().len(), 3);
        assert_eq!(InferenceBackend::SinglePass.models(), &[ModelType::SinglePass]);
        assert_eq!("single-pass".parse::<InferenceBackend>().unwrap(), InferenceBackend::SinglePass);
        assert!("diffusion".parse::<InferenceBackend>().is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            intra_threads: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            output_quality: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_kept_by_pipeline() {
        let config = Config {
            seed: 7,
            output_quality: 80,
            ..Config::default()
        };
        let stages = white_multistage(Arc::new(Mutex::new(Vec::new())));

        let pipeline = Pipeline::with_stages(config, stages, None).unwrap();

        assert_eq!(pipeline.config().seed, 7);
        assert_eq!(pipeline.config().output_quality, 80);
        assert_eq!(pipeline.config().backend, InferenceBackend::Multistage);
    }

    #[test]
    fn test_stage_backend_mismatch_rejected() {
        let config = Config {
            backend: InferenceBackend::SinglePass,
            ..Config::default()
        };
        let stages = white_multistage(Arc::new(Mutex::new(Vec::new())));

        assert!(Pipeline::with_stages(config, stages, None).is_err());
    }

    #[test]
    fn test_end_to_end_black_square() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline =
            Pipeline::with_stages(Config::default(), white_multistage(Arc::clone(&log)), None).unwrap();
        let (source, stroke) = black_with_stroke(64, 24, 16);

        let mut steps = Vec::new();
        let output = pipeline
            .inpaint_observed(&source, &stroke, &mut |step| steps.push(step))
            .unwrap();

        assert_eq!(*log.lock().unwrap(), ["mapping", "encoder", "generator"]);
        assert_eq!(
            steps,
            [Step::MapNoise, Step::Encode, Step::Generate, Step::Composite]
        );
        assert_eq!(output.image.dimensions(), (64, 64));
        assert_eq!(output.mask_visualization.dimensions(), (64, 64));
        assert_eq!(output.synthesized.dimensions(), (256, 256));

        // The bilinear round trip through 256x256 widens the fill by exactly
        // one pixel: a half-gray edge at 23 and 40 with quarter-gray corners.
        let ring = 23..=40;
        for (x, y, pixel) in output.image.enumerate_pixels() {
            let inside = (24..40).contains(&x) && (24..40).contains(&y);
            let on_ring = ring.contains(&x) && ring.contains(&y) && !inside;
            let corner = (x == 23 || x == 40) && (y == 23 || y == 40);
            let expected = if inside {
                [255, 255, 255, 255]
            } else if corner {
                [64, 64, 64, 255]
            } else if on_ring {
                [128, 128, 128, 255]
            } else {
                [0, 0, 0, 255]
            };
            assert_eq!(pixel.0, expected, "pixel ({x}, {y})");

            let viz = output.mask_visualization.get_pixel(x, y).0;
            let synthesized = inside || on_ring;
            assert_eq!(viz == [0, 0, 0, 255], synthesized, "mask ({x}, {y})");
        }
    }

    #[test]
    fn test_unmasked_pixels_scale_invariant() {
        for size in [96u32, 300] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let mut pipeline =
                Pipeline::with_stages(Config::default(), white_multistage(log), None).unwrap();
            let source = RgbaImage::from_fn(size, size, |x, y| {
                Rgba([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 255])
            });
            let stroke = RgbaImage::from_fn(size, size, |x, y| {
                if x > size / 3 && x < size / 2 && y > size / 3 && y < size / 2 {
                    Rgba([200, 200, 200, 255])
                } else {
                    Rgba([0, 0, 0, 0])
                }
            });

            let output = pipeline.inpaint(&source, &stroke).unwrap();

            let mut kept = 0usize;
            for (x, y, viz) in output.mask_visualization.enumerate_pixels() {
                if viz.0 == [255, 255, 255, 255] {
                    kept += 1;
                    assert_eq!(output.image.get_pixel(x, y), source.get_pixel(x, y));
                }
            }
            assert!(kept > (size * size / 2) as usize);
        }
    }

    #[test]
    fn test_single_pass_layout() {
        let config = Config {
            backend: InferenceBackend::SinglePass,
            ..Config::default()
        };
        let stages = BackendStages::SinglePass {
            generator: FnStage::boxed("single-pass", &["input"], |inputs| {
                let tensor = &inputs[0].1;
                assert_eq!(tensor.shape(), &[1, 4, 512, 512]);
                // Mask plane comes first and is centered.
                assert!(tensor
                    .iter()
                    .take(512 * 512)
                    .all(|&v| v == 0.5 || v == -0.5));
                Ok(vec![named("output", constant_rgb(512, -1.0))])
            }),
        };
        let mut pipeline = Pipeline::with_stages(config, stages, None).unwrap();
        let source = RgbaImage::from_pixel(50, 40, Rgba([10, 200, 30, 255]));
        let stroke = RgbaImage::new(50, 40);

        let output = pipeline.inpaint(&source, &stroke).unwrap();

        assert_eq!(output.image, source);
        assert!(output
            .mask_visualization
            .pixels()
            .all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_missing_generator_input_aborts() {
        let stages = BackendStages::Multistage {
            mapping: FnStage::boxed("mapping", &["noise"], |_| {
                Ok(vec![named("ws", ArrayD::zeros(IxDyn(&[1, 512])))])
            }),
            encoder: FnStage::boxed("encoder", &["input", "in_ws"], |_| {
                Ok(vec![named("feats", ArrayD::zeros(IxDyn(&[1, 8])))])
            }),
            generator: FnStage::boxed("generator", &["feats", "x_global"], |_| {
                panic!("generator must not run without all inputs")
            }),
        };
        let mut pipeline = Pipeline::with_stages(Config::default(), stages, None).unwrap();
        let (source, stroke) = black_with_stroke(32, 8, 8);

        let err = pipeline.inpaint(&source, &stroke).unwrap_err();

        assert!(matches!(err, Error::MissingInput { ref name, .. } if name == "x_global"));
    }

    #[test]
    fn test_stage_failure_aborts() {
        let stages = BackendStages::SinglePass {
            generator: FnStage::boxed("single-pass", &["input"], |_| {
                Err(Error::StageFailed {
                    stage: "single-pass".to_string(),
                    reason: "boom".to_string(),
                })
            }),
        };
        let config = Config {
            backend: InferenceBackend::SinglePass,
            ..Config::default()
        };
        let mut pipeline = Pipeline::with_stages(config, stages, None).unwrap();
        let (source, stroke) = black_with_stroke(16, 4, 4);

        assert!(matches!(
            pipeline.inpaint(&source, &stroke),
            Err(Error::StageFailed { .. })
        ));
    }

    #[test]
    fn test_wrong_generator_resolution_aborts() {
        let config = Config {
            backend: InferenceBackend::SinglePass,
            ..Config::default()
        };
        let stages = BackendStages::SinglePass {
            generator: FnStage::boxed("single-pass", &["input"], |_| {
                Ok(vec![named("output", constant_rgb(256, 0.0))])
            }),
        };
        let mut pipeline = Pipeline::with_stages(config, stages, None).unwrap();
        let (source, stroke) = black_with_stroke(16, 4, 4);

        assert!(matches!(
            pipeline.inpaint(&source, &stroke),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_degenerate_input_runs_no_stage() {
        let stages = BackendStages::SinglePass {
            generator: FnStage::boxed("single-pass", &["input"], |_| {
                panic!("no stage may run for an empty image")
            }),
        };
        let config = Config {
            backend: InferenceBackend::SinglePass,
            ..Config::default()
        };
        let mut pipeline = Pipeline::with_stages(config, stages, None).unwrap();

        let err = pipeline
            .inpaint(&RgbaImage::new(0, 0), &RgbaImage::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateInput { .. }));
    }

    #[test]
    fn test_enhancer_runs_between_passes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let enhancer_log = Arc::clone(&log);
        let enhancer = FnStage::boxed("super-resolution", &["input"], move |inputs| {
            enhancer_log.lock().unwrap().push("enhancer".to_string());
            let tensor = &inputs[0].1;
            assert_eq!(tensor.shape(), &[1, 3, 256, 256]);
            assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
            // Upscale 2x by repeating the input's first pixel.
            let value = tensor.iter().next().copied().unwrap_or(0.0);
            Ok(vec![named("output", ArrayD::from_elem(IxDyn(&[1, 3, 512, 512]), value))])
        });
        let config = Config {
            super_resolution: true,
            ..Config::default()
        };
        let mut pipeline =
            Pipeline::with_stages(config, white_multistage(Arc::clone(&log)), Some(enhancer)).unwrap();
        let (source, stroke) = black_with_stroke(64, 24, 16);

        let mut steps = Vec::new();
        let output = pipeline
            .inpaint_observed(&source, &stroke, &mut |step| steps.push(step))
            .unwrap();

        assert_eq!(*log.lock().unwrap(), ["mapping", "encoder", "generator", "enhancer"]);
        assert_eq!(steps[steps.len() - 2..], [Step::Enhance, Step::Composite]);
        assert_eq!(output.image.dimensions(), (64, 64));
        // Kept pixels still come from the source.
        assert_eq!(output.image.get_pixel(2, 2).0, [0, 0, 0, 255]);
    }
}
