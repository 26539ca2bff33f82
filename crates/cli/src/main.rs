use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;

use lumiscale_core::config::{self, EngineConfig};
use lumiscale_core::{logging, ExecutionBackend, UpscaleEngine};

#[derive(Parser)]
#[command(
    name = "lumiscale",
    about = "Decode an image and resize it, enlarging through an ONNX super-resolution model"
)]
struct Cli {
    #[arg(help = "Encoded input image (PNG, JPEG, WebP, ...)")]
    input: PathBuf,

    #[arg(help = "Output path; written as PNG")]
    output: PathBuf,

    #[arg(short = 'W', long, help = "Target width in pixels")]
    width: u32,

    #[arg(short = 'H', long, help = "Target height in pixels")]
    height: u32,

    #[arg(short, long, help = "Super-resolution model (.onnx); required for enlargement")]
    model: Option<PathBuf>,

    #[arg(long, help = "Execution backend: cpu, cuda, rocm, directml (overrides config)")]
    backend: Option<String>,

    #[arg(long, help = "Cache key for the upscale result (caching off when omitted)")]
    cache_key: Option<String>,

    #[arg(long, help = "Entropy smart-crop instead of aspect-preserving fit")]
    crop: bool,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help = "Increase log verbosity (-v: debug, -vv: trace)"
    )]
    verbose: u8,

    #[arg(
        long = "log-filter",
        value_name = "FILTER",
        help = "Explicit tracing filter (overrides RUST_LOG and -v)"
    )]
    log_filter: Option<String>,
}

fn main() {
    if let Err(error) = run() {
        tracing::error!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_filter.as_deref());

    let data_dir = config::data_dir(cli.data_dir.as_deref());
    config::initialize_data_dir(&data_dir)
        .with_context(|| format!("failed to initialize data dir {}", data_dir.display()))?;
    let cfg = EngineConfig::load_from_path(&config::config_path(&data_dir))?;

    let backend = cli
        .backend
        .as_deref()
        .map(ExecutionBackend::from_str_lossy)
        .unwrap_or(cfg.backend);

    info!(
        input = %cli.input.display(),
        target = format!("{}x{}", cli.width, cli.height),
        %backend,
        "starting decode/resize"
    );

    let engine = UpscaleEngine::new(backend, cfg.cache_capacity);

    let encoded = fs::read(&cli.input)
        .with_context(|| format!("failed to read input {}", cli.input.display()))?;

    let result = engine.decode_and_resize(
        &encoded,
        cli.model.as_deref(),
        cli.cache_key.as_deref(),
        cli.width,
        cli.height,
        cli.crop,
    )?;

    result
        .to_dynamic()?
        .save_with_format(&cli.output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write output {}", cli.output.display()))?;

    info!(
        output = %cli.output.display(),
        size = format!("{}x{}", result.width(), result.height()),
        "done"
    );
    Ok(())
}
