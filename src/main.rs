use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use facecrop::{config, convert, input, AlignType, Aligner, BackendKind, BorderMode, Landmarks};
use facecrop_vision::{AlignBackend, Interpolation};
use log::info;
use ndarray::Array3;

#[derive(Parser)]
#[command(name = "facecrop")]
#[command(version, about = "Align and crop faces from five-point landmarks")]
struct Cli {
    /// Config file (defaults to FACECROP_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align an image and write the square crop
    Align {
        /// Source image
        #[arg(short, long)]
        image: PathBuf,
        #[command(flatten)]
        landmarks: LandmarkSource,
        /// Where to write the aligned crop
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the alignment geometry for an image size as JSON
    Plan {
        #[arg(long)]
        width: usize,
        #[arg(long)]
        height: usize,
        #[command(flatten)]
        landmarks: LandmarkSource,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Show the effective config, or write the defaults with --init
    Config {
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct LandmarkSource {
    /// JSON file with five [x, y] points
    #[arg(short, long)]
    landmarks: Option<PathBuf>,
    /// Inline coordinates "x1,y1,...,x5,y5" (eyes, nose, mouth corners)
    #[arg(long, allow_hyphen_values = true)]
    points: Option<String>,
}

impl LandmarkSource {
    fn resolve(&self) -> Result<Landmarks> {
        match (&self.landmarks, &self.points) {
            (Some(path), _) => input::load_landmarks(path),
            (None, Some(points)) => input::parse_points(points),
            (None, None) => bail!("either --landmarks or --points is required"),
        }
    }
}

#[derive(Args)]
struct Overrides {
    #[arg(long)]
    crop_size: Option<usize>,
    #[arg(long)]
    face_factor: Option<f64>,
    #[arg(long)]
    landmark_factor: Option<f64>,
    /// similarity or affine
    #[arg(long)]
    align_type: Option<AlignType>,
    /// Interpolation order 0-5 (4 and 5 are both Lanczos)
    #[arg(long)]
    order: Option<u8>,
    /// constant, edge, symmetric, reflect or wrap
    #[arg(long)]
    border: Option<BorderMode>,
    /// native or imageproc
    #[arg(long)]
    backend: Option<BackendKind>,
}

impl Overrides {
    fn apply(&self, cfg: &mut config::Config) -> Result<()> {
        let align = &mut cfg.align;
        if let Some(v) = self.crop_size {
            align.crop_size = v;
        }
        if let Some(v) = self.face_factor {
            align.face_factor = v;
        }
        if let Some(v) = self.landmark_factor {
            align.landmark_factor = v;
        }
        if let Some(v) = self.align_type {
            align.align_type = v;
        }
        if let Some(v) = self.order {
            align.order = Interpolation::try_from(v)?;
        }
        if let Some(v) = self.border {
            align.border = v;
        }
        if let Some(v) = self.backend {
            cfg.backend = v;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Align {
            image,
            landmarks,
            output,
            overrides,
        } => {
            let aligner = build_aligner(config_path, &overrides)?;
            align(&aligner, &image, &landmarks.resolve()?, &output)
        }
        Commands::Plan {
            width,
            height,
            landmarks,
            overrides,
        } => {
            let aligner = build_aligner(config_path, &overrides)?;
            let plan = aligner.plan(height, width, &landmarks.resolve()?)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Commands::Config { init } => show_config(config_path, init),
    }
}

fn build_aligner(config_path: Option<&Path>, overrides: &Overrides) -> Result<Aligner> {
    let mut cfg = config::load_config(config_path)?;
    overrides.apply(&mut cfg)?;
    let params = cfg.to_params()?;
    Aligner::new(cfg.backend(), params).context("Failed to set up aligner")
}

fn align(aligner: &Aligner, image: &Path, landmarks: &Landmarks, output: &Path) -> Result<()> {
    info!("Aligning {} with the {} backend", image.display(), aligner.backend.name());

    let img = image::open(image).with_context(|| format!("Failed to open {}", image.display()))?;
    let array: Array3<f32> = convert::image_to_array(&img)?;

    let plan = aligner.plan(array.dim().0, array.dim().1, landmarks)?;
    let estimate = &plan.estimate;
    info!(
        "Fit {} transform, rms error {:.3}px, {} inliers",
        aligner.params.align_type,
        estimate.rms_error(),
        estimate.inlier_count()
    );

    let cropped = aligner.align_planned(array.view(), &plan)?;
    convert::array_to_image(cropped.view())?
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("✓ Wrote {}x{} crop to {}", cropped.dim().1, cropped.dim().0, output.display());
    Ok(())
}

fn show_config(config_path: Option<&Path>, init: bool) -> Result<()> {
    let path = config_path.unwrap_or(config::CONFIG_PATH.as_path());
    if init {
        if path.exists() {
            bail!("Config already exists at {}", path.display());
        }
        config::save_config(&config::Config::default(), Some(path))?;
        info!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let cfg = config::load_config(Some(path))?;
    info!("Config file: {}", path.display());
    print!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}
