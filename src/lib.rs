//! bbchkit: curation toolkit for BBCH-annotated object detection datasets.
//!
//! bbchkit reads Pascal VOC annotation files, runs every document through a
//! configurable chain of label rules (extract a label from an attribute,
//! drop rotated objects, allow-list, cluster, generalize), and re-emits the
//! surviving documents together with their images under fresh identifiers.
//! Downstream commands compute label statistics, export a flat detection
//! JSON format, split a curated dataset into train/validation subsets, and
//! crop per-label object patches.
//!
//! # Modules
//!
//! - [`ir`]: Annotation document model and the VOC XML reader/writer
//! - [`rules`]: Label transformation rules
//! - [`pipeline`]: Ordered rule chains
//! - [`sync`]: Dataset synchronization and run summaries
//! - [`config`]: YAML rule-chain configuration
//! - [`error`]: Error types for bbchkit operations

pub mod config;
pub mod crop;
pub mod error;
pub mod export;
pub mod ir;
pub mod pipeline;
pub mod rules;
pub mod split;
pub mod stats;
pub mod sync;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

pub use error::BbchError;

/// The bbchkit CLI application.
#[derive(Parser)]
#[command(name = "bbchkit")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run a rule chain over a dataset and write the curated copy.
    Curate(CurateArgs),
    /// Count objects per label.
    Stats(StatsArgs),
    /// Export annotations to per-image detection JSON files.
    Export(ExportArgs),
    /// Split a curated dataset into train and validation subsets.
    Split(SplitArgs),
    /// Crop every object into a per-label image directory.
    Crop(CropArgs),
}

/// Arguments for the curate subcommand.
#[derive(clap::Args)]
struct CurateArgs {
    /// Directory of source VOC XML files.
    #[arg(long)]
    annotations: PathBuf,

    /// Directory of source images.
    #[arg(long)]
    photos: PathBuf,

    /// Output root; receives `annotations/` and `photos/`.
    #[arg(long)]
    output: PathBuf,

    /// YAML rule-chain configuration.
    #[arg(long, env = "BBCHKIT_RULES")]
    rules: PathBuf,

    /// Move images instead of copying them.
    #[arg(long = "move")]
    move_images: bool,

    /// Output format for the run summary ('text' or 'json').
    #[arg(long, default_value = "text")]
    report: String,
}

/// Arguments for the stats subcommand.
#[derive(clap::Args)]
struct StatsArgs {
    /// Directory of VOC XML files.
    input: PathBuf,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the export subcommand.
#[derive(clap::Args)]
struct ExportArgs {
    /// Directory of VOC XML files.
    input: PathBuf,

    /// Directory receiving the JSON files.
    #[arg(long)]
    output: PathBuf,

    /// Image directory used to measure documents without a <size>.
    #[arg(long)]
    photos: Option<PathBuf>,
}

/// Arguments for the split subcommand.
#[derive(clap::Args)]
struct SplitArgs {
    /// Curated dataset root containing `photos/` and `annotations/`.
    input: PathBuf,

    /// Fraction of pairs placed in the training subset.
    #[arg(long, default_value_t = 0.8)]
    train_fraction: f64,

    /// Seed for a reproducible shuffle.
    #[arg(long)]
    seed: Option<u64>,
}

/// Arguments for the crop subcommand.
#[derive(clap::Args)]
struct CropArgs {
    /// Directory of images.
    #[arg(long)]
    photos: PathBuf,

    /// Directory of VOC XML files.
    #[arg(long)]
    annotations: PathBuf,

    /// Directory receiving `<label>/<id>.jpg` crops.
    #[arg(long, default_value = "crops")]
    output: PathBuf,
}

/// Report output formats shared by the subcommands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    fn parse(value: &str) -> Result<Self, BbchError> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(BbchError::UnsupportedFormat(format!(
                "'{other}' (supported: text, json)"
            ))),
        }
    }
}

/// Run the bbchkit CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), BbchError> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Curate(args)) => run_curate(args),
        Some(Commands::Stats(args)) => run_stats(args),
        Some(Commands::Export(args)) => run_export(args),
        Some(Commands::Split(args)) => run_split(args),
        Some(Commands::Crop(args)) => run_crop(args),
        None => {
            println!("bbchkit {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Curation toolkit for BBCH-annotated detection datasets.");
            println!();
            println!("Run 'bbchkit --help' for usage information.");
            Ok(())
        }
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the `info` default.
fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn run_curate(args: CurateArgs) -> Result<(), BbchError> {
    let format = ReportFormat::parse(&args.report)?;

    let config = config::load_rule_chain(&args.rules)?;
    let pipeline = pipeline::Pipeline::from_config(&config)?;
    let sources = ir::io_voc_xml::collect_xml_files(&args.annotations)?;

    let mut opts = sync::SyncOptions::with_output_root(&args.photos, &args.output);
    if args.move_images {
        opts.transfer = sync::TransferMode::Move;
    }

    let mut ids = sync::UuidGenerator;
    let summary = sync::synchronize_dataset(&sources, &pipeline, &opts, &mut ids)?;
    emit(&summary, format, &args.output)
}

fn run_stats(args: StatsArgs) -> Result<(), BbchError> {
    let format = ReportFormat::parse(&args.output)?;
    let paths = ir::io_voc_xml::collect_xml_files(&args.input)?;
    let stats = stats::count_labels(&paths)?;
    emit(&stats, format, &args.input)
}

fn run_export(args: ExportArgs) -> Result<(), BbchError> {
    let paths = ir::io_voc_xml::collect_xml_files(&args.input)?;
    let summary = export::export_detection_json(&paths, &args.output, args.photos.as_deref())?;
    println!(
        "Exported {} document(s) with {} class(es) to {}",
        summary.documents,
        summary.classes.len(),
        args.output.display()
    );
    for (class_id, name) in summary.classes.iter().enumerate() {
        println!("  {class_id}: {name}");
    }
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<(), BbchError> {
    let opts = split::SplitOptions {
        train_fraction: args.train_fraction,
        seed: args.seed,
    };
    let summary = split::split_dataset(&args.input, &opts)?;
    println!(
        "Split {} pair(s): {} train, {} validate ({} unpaired file(s) skipped)",
        summary.train + summary.validate,
        summary.train,
        summary.validate,
        summary.unpaired
    );
    Ok(())
}

fn run_crop(args: CropArgs) -> Result<(), BbchError> {
    let paths = ir::io_voc_xml::collect_xml_files(&args.annotations)?;
    let mut ids = sync::UuidGenerator;
    let summary = crop::crop_objects(&paths, &args.photos, &args.output, &mut ids)?;
    println!(
        "Cropped {} object(s) into {} label director(ies); {} failed",
        summary.cropped,
        summary.labels.len(),
        summary.failed
    );
    Ok(())
}

/// Print a report as text (its `Display`) or pretty JSON.
fn emit<T>(report: &T, format: ReportFormat, context: &Path) -> Result<(), BbchError>
where
    T: std::fmt::Display + Serialize,
{
    match format {
        ReportFormat::Text => print!("{report}"),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(report).map_err(|source| {
                BbchError::JsonWrite {
                    path: context.to_path_buf(),
                    source,
                }
            })?;
            println!("{json}");
        }
    }
    Ok(())
}
