//! Command-line interface for the segmentation pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::DatasetMode;
use crate::processors::labeling::ClassPalette;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "lidar-seg")]
#[command(about = "LiDAR segmentation dataset preprocessing and evaluation", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the largest point count over all scans below a directory
    MaxPoints {
        /// Directory searched recursively for PCD scans
        root: PathBuf,
        /// Worker threads
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Label scans from their annotations and write padded samples
    Preprocess {
        /// Dataset root containing Training/Validation/Test
        #[arg(long)]
        root: Option<PathBuf>,
        /// Split to preprocess
        #[arg(short, long, value_enum)]
        mode: Option<DatasetMode>,
        /// Output directory (defaults to the split's area directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Rows every sample is padded to
        #[arg(long)]
        max_points: Option<usize>,
        /// Worker threads
        #[arg(short, long)]
        workers: Option<usize>,
        /// Truncate scans larger than the padding budget
        #[arg(long)]
        truncate: bool,
    },

    /// Score per-point predictions on preprocessed samples
    Evaluate {
        /// Distance between sliding-window pillar centres
        #[arg(short, long)]
        step: Option<f32>,
        /// Also write points with predictions (pts.txt)
        #[arg(short = 'p', long)]
        savepts: bool,
        /// Directory of preprocessed samples (defaults to <root>/Test/<test_area>)
        #[arg(long)]
        samples: Option<PathBuf>,
    },

    /// Plot a preprocessed sample as a top-down scatter plot (PNG)
    Visualize {
        /// Sample directory holding xyzrgb.npy and label.npy
        sample_dir: PathBuf,
        /// pred.txt whose classes replace the ground-truth labels
        #[arg(short, long)]
        predictions: Option<PathBuf>,
        /// Output PNG file path (defaults to <sample_dir>/labels.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum number of points to plot (subsamples if exceeded)
        #[arg(long, default_value_t = 1_000_000)]
        max_points: usize,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over `len` items
fn create_progress_bar(len: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn fail(message: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", message, err);
    std::process::exit(1);
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Dispatch to subcommands
    match cli.command {
        Commands::MaxPoints { root, workers } => {
            let config = load_config(cli.config.as_deref());
            let workers = workers.unwrap_or(config.preprocessing.workers);
            cmd_max_points(&root, workers, &config);
        }
        Commands::Preprocess { root, mode, output, max_points, workers, truncate } => {
            let mut config = load_config(cli.config.as_deref());
            if let Some(root) = root {
                config.dataset.root = root;
            }
            if let Some(mode) = mode {
                config.dataset.mode = mode;
            }
            if output.is_some() {
                config.dataset.output_dir = output;
            }
            if let Some(max_points) = max_points {
                config.preprocessing.max_points = max_points;
            }
            if let Some(workers) = workers {
                config.preprocessing.workers = workers;
            }
            config.preprocessing.truncate_overflow |= truncate;
            cmd_preprocess(&config);
        }
        Commands::Evaluate { step, savepts, samples } => {
            // results are written next to the config, so it cannot fall back to defaults
            let Some(config_path) = cli.config.as_deref() else {
                fail("evaluate", "--config is required");
            };
            let config = PipelineConfig::from_yaml(config_path).unwrap_or_else(|e| {
                fail(&format!("Failed to load config {}", config_path.display()), e)
            });
            info!("Loaded config from: {}", config_path.display());
            cmd_evaluate(config_path, config, step, savepts, samples);
        }
        Commands::Visualize { sample_dir, predictions, output, max_points } => {
            let config = load_config(cli.config.as_deref());
            cmd_visualize(&sample_dir, predictions, output, max_points, &config);
        }
    }
}

/// Load the YAML config, falling back to defaults
fn load_config(path: Option<&Path>) -> PipelineConfig {
    match path {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    }
}

/// Scans below `root` with the configured scan extension.
fn scan_files(
    root: &Path,
    config: &PipelineConfig,
) -> crate::processors::discovery::Result<Vec<PathBuf>> {
    crate::processors::discovery::list_files_with_extension(root, &config.dataset.pcd_extension)
}

fn cmd_max_points(root: &Path, workers: usize, config: &PipelineConfig) {
    use crate::processors::preprocess;

    let start = Instant::now();

    let spinner = create_spinner("Scanning directory for PCD files...");
    let scans = scan_files(root, config).unwrap_or_else(|e| fail("Failed to list scans", e));
    spinner.finish_and_clear();

    let pb = create_progress_bar(scans.len(), "Counting points");
    let report = preprocess::find_max_points(&scans, workers, &pb)
        .unwrap_or_else(|e| fail("Failed to count points", e));
    pb.finish_and_clear();

    print_summary(
        "Max Points Complete",
        &[
            ("Directory", root.display().to_string()),
            ("Scans", report.files.to_string()),
            ("Max points", report.max_points.to_string()),
            (
                "Largest scan",
                report
                    .path
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("Workers", workers.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_preprocess(config: &PipelineConfig) {
    use crate::processors::{discovery, preprocess};

    let start = Instant::now();

    let palette = ClassPalette::from_config(&config.classes)
        .unwrap_or_else(|e| fail("Invalid class palette", e));

    let input_dir = config.dataset.input_dir();
    let output_dir = config.dataset.output_dir();

    println!("Preprocessing {} split", config.dataset.mode);
    println!("Input: {}", input_dir.display());
    println!("Output: {}", output_dir.display());

    let spinner = create_spinner("Pairing scans with annotations...");
    let pairing = discovery::collect_pairs(
        &input_dir,
        &config.dataset.pcd_extension,
        &config.dataset.annotation_extension,
    )
    .unwrap_or_else(|e| fail("Failed to scan dataset", e));
    spinner.finish_and_clear();

    if pairing.pairs.is_empty() {
        warn!("No annotated scans found in {}", input_dir.display());
    }

    let pb = create_progress_bar(pairing.pairs.len(), "Preprocessing");
    let report = preprocess::preprocess_dataset(
        &pairing.pairs,
        &output_dir,
        &palette,
        &config.preprocessing,
        &pb,
    )
    .unwrap_or_else(|e| fail("Preprocessing failed", e));
    pb.finish_and_clear();

    for (path, reason) in &report.failed {
        error!("{}: {}", path.display(), reason);
    }

    print_summary(
        "Preprocessing Complete",
        &[
            ("Mode", config.dataset.mode.to_string()),
            ("Output", output_dir.display().to_string()),
            ("Samples written", report.written.to_string()),
            ("Samples failed", report.failed.len().to_string()),
            ("Unpaired scans", pairing.unmatched_scans.len().to_string()),
            ("Unpaired labels", pairing.unmatched_annotations.len().to_string()),
            ("Labelled points", report.matched_points.to_string()),
            ("Unmatched labels", report.unmatched_points.to_string()),
            ("Max points", config.preprocessing.max_points.to_string()),
            ("Workers", config.preprocessing.workers.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_evaluate(
    config_path: &Path,
    mut config: PipelineConfig,
    step: Option<f32>,
    savepts: bool,
    samples: Option<PathBuf>,
) {
    use crate::processors::{evaluation, list_sample_dirs};

    let start = Instant::now();

    if let Some(step) = step {
        config.evaluation.step = step;
    }
    config.evaluation.savepts |= savepts;

    let palette = ClassPalette::from_config(&config.classes)
        .unwrap_or_else(|e| fail("Invalid class palette", e));

    let results_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let samples_dir = samples.unwrap_or_else(|| {
        config
            .dataset
            .root
            .join("Test")
            .join(&config.evaluation.test_area)
    });

    println!("Evaluating {} scores", config.evaluation.model);
    println!("Samples: {}", samples_dir.display());
    println!("Step: {}", config.evaluation.step);

    let sample_count = list_sample_dirs(&samples_dir)
        .map(|dirs| dirs.len())
        .unwrap_or_else(|e| fail("Failed to list samples", e));

    let pb = create_progress_bar(sample_count, "Evaluating");
    let report = evaluation::evaluate_dataset(
        &samples_dir,
        &results_dir,
        palette.names(),
        &config.evaluation,
        &pb,
    )
    .unwrap_or_else(|e| fail("Evaluation failed", e));
    pb.finish_and_clear();

    for (path, reason) in &report.failed {
        error!("{}: {}", path.display(), reason);
    }

    println!("{:<12} {:>8}", "class", "IoU");
    for (i, iou) in report.per_class_iou.iter().enumerate() {
        let name = palette.names().get(i).map(String::as_str).unwrap_or("?");
        println!("{:<12} {:>8.4}", name, iou);
    }

    print_summary(
        "Evaluation Complete",
        &[
            ("Samples", samples_dir.display().to_string()),
            ("Results", report.results_dir.display().to_string()),
            ("Evaluated", report.evaluated.to_string()),
            ("Failed", report.failed.len().to_string()),
            ("Mean IoU", format!("{:.4}", report.mean_iou)),
            ("Overall accuracy", format!("{:.4}", report.overall_accuracy)),
            ("Step", config.evaluation.step.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn read_predictions(path: &Path) -> anyhow::Result<Vec<usize>> {
    let content = std::fs::read_to_string(path)?;
    let predictions = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(predictions)
}

fn cmd_visualize(
    sample_dir: &Path,
    predictions: Option<PathBuf>,
    output: Option<PathBuf>,
    max_points: usize,
    config: &PipelineConfig,
) {
    use crate::core::loaders;
    use crate::visualization;

    let start = Instant::now();

    let output_path = output.unwrap_or_else(|| sample_dir.join("labels.png"));

    let palette = ClassPalette::from_config(&config.classes)
        .unwrap_or_else(|e| fail("Invalid class palette", e));

    println!("Visualizing sample...");
    println!("Input: {}", sample_dir.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Loading sample...");

    let sample = loaders::load_sample(sample_dir).unwrap_or_else(|e| {
        spinner.finish_and_clear();
        fail("Failed to load sample", e)
    });

    let predicted = predictions.as_deref().map(|path| {
        read_predictions(path).unwrap_or_else(|e| {
            spinner.finish_and_clear();
            fail(&format!("Failed to read predictions {}", path.display()), e)
        })
    });

    spinner.set_message("Generating plot...");

    match visualization::plot_labeled_sample(
        &output_path,
        &sample,
        predicted.as_deref(),
        &palette,
        max_points,
    ) {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Visualization Complete",
                &[
                    ("Sample", sample_dir.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Rows in sample", sample.len().to_string()),
                    (
                        "Colouring",
                        if predicted.is_some() { "predictions" } else { "labels" }.to_string(),
                    ),
                    ("Max points plotted", max_points.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            fail("Visualization failed", e);
        }
    }
}
