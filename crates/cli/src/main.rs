use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mask_shot_core::geometry::ImagePoint;
use mask_shot_core::config::{ConfigBuilder, ENGINE_VAR};
use mask_shot_core::{init, AppError, Config, MaskShot, ScriptedSelection};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to open (required for headless runs)
    image: Option<PathBuf>,

    /// Segment without a window and write the mask here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Bounding box prompt as X1,Y1,X2,Y2 in image pixels
    #[arg(long, value_parser = parse_bbox, conflicts_with = "point")]
    bbox: Option<[i32; 4]>,

    /// Point prompt as X,Y; repeat for several points
    #[arg(long, value_parser = parse_point)]
    point: Vec<ImagePoint>,

    /// Override the engine program from the environment
    #[arg(long)]
    engine: Option<String>,

    /// Override the model passed to the engine
    #[arg(short, long)]
    model: Option<String>,

    /// Override the foreground probability threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn selection(&self) -> ScriptedSelection {
        if let Some([x1, y1, x2, y2]) = self.bbox {
            ScriptedSelection::BoundingBox(ImagePoint::new(x1, y1), ImagePoint::new(x2, y2))
        } else if !self.point.is_empty() {
            ScriptedSelection::Points(self.point.clone())
        } else {
            ScriptedSelection::All
        }
    }
}

fn parse_ints<const N: usize>(raw: &str) -> std::result::Result<[i32; N], String> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<i32>().map_err(|e| format!("'{v}': {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<i32>| format!("expected {N} comma-separated integers, got {}", v.len()))
}

fn parse_bbox(raw: &str) -> std::result::Result<[i32; 4], String> {
    parse_ints::<4>(raw)
}

fn parse_point(raw: &str) -> std::result::Result<ImagePoint, String> {
    let [x, y] = parse_ints::<2>(raw)?;
    Ok(ImagePoint::new(x, y))
}

/// Applies the command-line overrides on top of the environment.
fn load_config(args: &Args, env: ConfigBuilder) -> Result<Config> {
    let mut builder = env;
    if let Some(engine) = &args.engine {
        builder = builder.with_engine(engine);
    }
    if !builder.has_engine() {
        return Err(AppError::MissingEnvVar(format!(
            "{ENGINE_VAR} must be set in environment or .env file, or pass --engine"
        )))
        .context("Failed to load configuration");
    }
    if let Some(model) = &args.model {
        builder = builder.with_model(model);
    }
    if let Some(threshold) = args.threshold {
        builder = builder.with_threshold(threshold);
    }
    builder.build().context("Invalid configuration")
}

fn main() -> Result<()> {
    init();
    let args = Args::parse();

    let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let env = ConfigBuilder::from_env().context("Failed to read environment configuration")?;
    let config = load_config(&args, env)?;
    let app = MaskShot::with_config(config);

    let Some(output) = &args.output else {
        if args.bbox.is_some() || !args.point.is_empty() {
            bail!("--bbox and --point need --output for a headless run");
        }
        return app
            .run_interactive(args.image.clone())
            .context("Failed to run the segmentation window");
    };

    let Some(image) = &args.image else {
        bail!("A headless run needs an input image");
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.set_message(format!("Segmenting with {}...", app.config().model_name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = app.segment_file(image, &args.selection(), output);
    spinner.finish_and_clear();

    let summary = result.with_context(|| format!("Segmentation of {} failed", image.display()))?;
    let total = (summary.size.width as usize * summary.size.height as usize).max(1);
    println!(
        "Mask saved to {} ({:.1}% foreground, {:.1}s)",
        output.display(),
        summary.coverage as f64 * 100.0 / total as f64,
        summary.elapsed.as_secs_f64()
    );

    Ok(())
}
