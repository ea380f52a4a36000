//! voxstat CLI

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use vx_core::ImageSource;
use vx_image::{DataType, ImageOneSample, OneSampleInput, OneSampleOptions, RawVolumeReader};
use vx_inference::{WeightKind, Which};

#[derive(Parser)]
#[command(name = "voxstat")]
#[command(about = "voxstat - voxelwise group statistics over image volumes")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One-sample t (or variance ratio) across images, voxel by voxel
    Onesample(OnesampleArgs),

    /// Print version
    Version,
}

#[derive(Args)]
struct OnesampleArgs {
    /// Input image (raw volume with JSON header sidecar). Repeat per subject.
    #[arg(short, long = "image", required = true)]
    images: Vec<PathBuf>,

    /// Weight image, one per --image, in the same order.
    #[arg(short, long = "weight")]
    weights: Vec<PathBuf>,

    /// Interpretation of weight images
    #[arg(long, value_enum)]
    weight_kind: Option<WeightKindArg>,

    /// Variance-ratio prior image
    #[arg(long)]
    varatio_prior: Option<PathBuf>,

    /// Fixed-variance prior image
    #[arg(long)]
    varfix_prior: Option<PathBuf>,

    /// JSON options file; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model component: mean (t/sd/effect) or varatio (varatio/varfix)
    #[arg(long, value_enum)]
    which: Option<WhichArg>,

    /// Skip the t map
    #[arg(long)]
    no_t: bool,

    /// Skip the sd map
    #[arg(long)]
    no_sd: bool,

    /// Skip the effect map
    #[arg(long)]
    no_mean: bool,

    /// Skip the varatio map
    #[arg(long)]
    no_varatio: bool,

    /// Skip the varfix map
    #[arg(long)]
    no_varfix: bool,

    /// Output directory (created if absent)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Output file extension
    #[arg(long)]
    ext: Option<String>,

    /// Prefix for output file stems
    #[arg(long)]
    prefix: Option<String>,

    /// Overwrite existing outputs
    #[arg(long)]
    clobber: bool,

    /// Output element type
    #[arg(long, value_enum)]
    dtype: Option<DtypeArg>,

    /// Treat weights as exact inverse variances (no residual scale)
    #[arg(long)]
    no_scale: bool,

    /// Variance-ratio EM iteration cap
    #[arg(long)]
    max_iter: Option<usize>,

    /// Variance-ratio EM relative tolerance
    #[arg(long)]
    tol: Option<f64>,

    /// Output file for the run summary (pretty JSON). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WhichArg {
    Mean,
    Varatio,
}

impl From<WhichArg> for Which {
    fn from(arg: WhichArg) -> Self {
        match arg {
            WhichArg::Mean => Which::Mean,
            WhichArg::Varatio => Which::Varatio,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WeightKindArg {
    /// Standard deviation images
    #[value(alias = "sd")]
    Std,
    /// Variance images
    Var,
    /// Inverse-variance images
    Weight,
}

impl From<WeightKindArg> for WeightKind {
    fn from(arg: WeightKindArg) -> Self {
        match arg {
            WeightKindArg::Std => WeightKind::Std,
            WeightKindArg::Var => WeightKind::Var,
            WeightKindArg::Weight => WeightKind::Weight,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DtypeArg {
    F32,
    F64,
}

impl From<DtypeArg> for DataType {
    fn from(arg: DtypeArg) -> Self {
        match arg {
            DtypeArg::F32 => DataType::F32,
            DtypeArg::F64 => DataType::F64,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Onesample(args) => cmd_onesample(&args),
        Commands::Version => {
            println!("voxstat {}", vx_core::VERSION);
            Ok(())
        }
    }
}

fn cmd_onesample(args: &OnesampleArgs) -> Result<()> {
    let options = build_options(args)?;

    let images = args.images.iter().map(|p| open_image(p)).collect::<Result<Vec<_>>>()?;
    let mut input = if args.weights.is_empty() {
        OneSampleInput::images(images)
    } else {
        let weights = args.weights.iter().map(|p| open_image(p)).collect::<Result<Vec<_>>>()?;
        OneSampleInput::with_weights(images, weights)?
    };
    if let Some(p) = &args.varatio_prior {
        input = input.with_varatio_prior(open_image(p)?);
    }
    if let Some(p) = &args.varfix_prior {
        input = input.with_varfix_prior(open_image(p)?);
    }

    let fit = ImageOneSample::new(input, &options)?;
    let summary = fit.fit()?;
    tracing::info!(
        n_positions = summary.n_positions,
        n_degenerate = summary.n_degenerate,
        "outputs written to {}",
        options.path.display()
    );

    let outputs: Vec<String> = summary
        .statistics
        .iter()
        .map(|&s| options.output_path(s).display().to_string())
        .collect();
    let output_json = serde_json::json!({
        "summary": summary,
        "outputs": outputs,
    });
    write_json(args.output.as_ref(), output_json)
}

fn build_options(args: &OnesampleArgs) -> Result<OneSampleOptions> {
    let mut options = match &args.config {
        Some(path) => OneSampleOptions::from_json_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => OneSampleOptions::default(),
    };

    if let Some(which) = args.which {
        options.which = which.into();
    }
    if let Some(kind) = args.weight_kind {
        options.weight_kind = kind.into();
    }
    options.t &= !args.no_t;
    options.sd &= !args.no_sd;
    options.mean &= !args.no_mean;
    options.est_varatio &= !args.no_varatio;
    options.est_varfix &= !args.no_varfix;
    if let Some(path) = &args.path {
        options.path = path.clone();
    }
    if let Some(ext) = &args.ext {
        options.ext = ext.clone();
    }
    if let Some(prefix) = &args.prefix {
        options.prefix = prefix.clone();
    }
    options.clobber |= args.clobber;
    if let Some(dtype) = args.dtype {
        options.dtype = dtype.into();
    }
    options.use_scale &= !args.no_scale;
    if let Some(max_iter) = args.max_iter {
        options.max_iter = max_iter;
    }
    if let Some(tol) = args.tol {
        options.tol = tol;
    }

    if !args.weights.is_empty() && args.weights.len() != args.images.len() {
        bail!("{} --image but {} --weight", args.images.len(), args.weights.len());
    }
    options.validate()?;
    Ok(options)
}

fn open_image(path: &Path) -> Result<Box<dyn ImageSource>> {
    tracing::debug!(path = %path.display(), "opening image");
    let reader =
        RawVolumeReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(reader))
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
