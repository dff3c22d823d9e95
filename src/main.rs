//! `inpainter` CLI - Fill a painted-over region of an image.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inpainter::image::{load_image, save_image};
use inpainter::worker::PROGRESS_INTERVAL;
use inpainter::{Config, InferenceBackend, InpaintWorker, Pipeline};

/// Fill the region covered by a stroke layer using generative ONNX models.
#[derive(Parser, Debug)]
#[command(name = "inpainter")]
#[command(version, about, long_about = None)]
struct Args {
    /// Source image path.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Stroke layer painted over the source, same size as INPUT.
    #[arg(value_name = "MASK")]
    mask: PathBuf,

    /// Output image path.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Also write the black/white keep mask to this path.
    #[arg(long, value_name = "PATH")]
    mask_output: Option<PathBuf>,

    /// Also write the raw generator output to this path.
    #[arg(long, value_name = "PATH")]
    raw_output: Option<PathBuf>,

    /// Model chain: multistage (256px) or single-pass (512px).
    #[arg(short, long, default_value = "multistage", value_name = "NAME")]
    backend: InferenceBackend,

    /// Directory holding the ONNX models.
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Seed of the noise latent.
    #[arg(long, default_value = "2023", value_name = "INT")]
    seed: u64,

    /// Intra-op threads per model session.
    #[arg(long, default_value = "8", value_name = "INT")]
    threads: usize,

    /// Run the super-resolution model before the final composite.
    #[arg(long)]
    super_resolution: bool,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("inpainter={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    for path in [&args.input, &args.mask] {
        if !path.exists() {
            anyhow::bail!("Input file does not exist: {}", path.display());
        }
    }

    let source = load_image(&args.input).context("Failed to load source image")?;
    let stroke = load_image(&args.mask).context("Failed to load stroke layer")?;

    let config = Config {
        backend: args.backend,
        model_dir: args.model_dir.clone(),
        seed: args.seed,
        intra_threads: args.threads,
        super_resolution: args.super_resolution,
        output_quality: args.quality,
        ..Config::default()
    };

    let pipeline = Pipeline::new(config).context("Failed to initialize pipeline")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);

    let worker = InpaintWorker::spawn(pipeline, source, stroke).context("Failed to start worker")?;
    let (pipeline, result) = worker
        .wait(PROGRESS_INTERVAL, |progress| {
            let millis = progress.elapsed.as_millis();
            match progress.step {
                Some(step) => spinner.set_message(format!("Time cost: {millis} ms ({step})")),
                None => spinner.set_message(format!("Time cost: {millis} ms")),
            }
            spinner.tick();
        })
        .context("Inpainting worker failed")?;

    let output = result.context("Failed to inpaint image")?;
    let quality = pipeline.config().output_quality;
    spinner.finish_with_message(format!(
        "Time cost: {} ms",
        output.inference_time.as_millis()
    ));

    save_image(&output.image, &args.output, quality).context("Failed to save output image")?;

    if let Some(path) = &args.mask_output {
        save_image(&output.mask_visualization, path, quality)
            .context("Failed to save mask visualization")?;
    }

    if let Some(path) = &args.raw_output {
        save_image(&output.synthesized, path, quality).context("Failed to save raw output")?;
    }

    println!(
        "Successfully inpainted {} -> {}",
        args.input.display(),
        args.output.display()
    );

    Ok(())
}
