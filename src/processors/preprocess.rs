//! Conversion of annotated scans into fixed-size padded samples.
//!
//! Every sample has exactly `max_points` rows: the deduplicated scan points
//! with their class colour, followed by padding rows at the origin carrying
//! the background class. Work is spread over a fixed pool of worker threads,
//! each processing one contiguous range of the sorted file list.

use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::PreprocessingConfig;
use crate::core::loaders::{self, LabeledSample, LoaderError};
use crate::core::transforms::pad_rows;
use crate::core::writers::{self, WriteError};

use super::discovery::{partition_ranges, ScanPair};
use super::labeling::{assign_labels, ClassPalette, LabelStats, LabelingError};

/// Errors that can occur while preprocessing a scan.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Label(#[from] LabelingError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("{path}: {points} points exceed the padding budget of {max_points}")]
    Overflow {
        path: PathBuf,
        points: usize,
        max_points: usize,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for preprocessing operations.
pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Largest scan found by [`find_max_points`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaxPointReport {
    /// Largest point count, duplicates included.
    pub max_points: usize,
    /// Scan holding that many points.
    pub path: Option<PathBuf>,
    /// Number of scans inspected.
    pub files: usize,
}

/// Totals of a preprocessing run.
#[derive(Debug, Clone, Default)]
pub struct PreprocessReport {
    pub written: usize,
    pub failed: Vec<(PathBuf, String)>,
    /// Annotation points matched to scan points.
    pub matched_points: usize,
    /// Annotation points with no identical scan point.
    pub unmatched_points: usize,
}

impl PreprocessReport {
    fn merge(mut self, other: PreprocessReport) -> Self {
        self.written += other.written;
        self.failed.extend(other.failed);
        self.matched_points += other.matched_points;
        self.unmatched_points += other.unmatched_points;
        self
    }
}

fn worker_pool(workers: usize) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?)
}

/// Find the scan with the most points.
///
/// Scans are split into one contiguous range per worker; each worker
/// reports its local maximum and the global maximum is returned.
///
/// # Errors
///
/// Returns the first error of any scan that cannot be read.
pub fn find_max_points(
    scans: &[PathBuf],
    workers: usize,
    progress: &ProgressBar,
) -> Result<MaxPointReport> {
    let ranges = partition_ranges(scans.len(), workers);
    let pool = worker_pool(workers)?;

    let partials: Vec<Result<MaxPointReport>> = pool.install(|| {
        ranges
            .par_iter()
            .map(|range| {
                let mut best = MaxPointReport::default();
                for path in &scans[range.clone()] {
                    let count = loaders::count_pcd_points(path)?;
                    if best.path.is_none() || count > best.max_points {
                        best.max_points = count;
                        best.path = Some(path.clone());
                    }
                    best.files += 1;
                    progress.inc(1);
                }
                debug!(
                    "range {:?}: max {} points over {} scans",
                    range, best.max_points, best.files
                );
                Ok(best)
            })
            .collect()
    });

    let mut report = MaxPointReport::default();
    for partial in partials {
        let partial = partial?;
        report.files += partial.files;
        if report.path.is_none() || partial.max_points > report.max_points {
            report.max_points = partial.max_points;
            report.path = partial.path;
        }
    }

    Ok(report)
}

/// Build the padded sample of one scan.
///
/// # Errors
///
/// Returns an error if a file cannot be read, an annotation class is not in
/// the palette, or the deduplicated scan is larger than `max_points` while
/// `truncate_overflow` is off.
pub fn preprocess_sample(
    pair: &ScanPair,
    palette: &ClassPalette,
    config: &PreprocessingConfig,
) -> Result<(LabeledSample, LabelStats)> {
    let cloud = loaders::load_pcd(&pair.pcd)?;
    let annotations = loaders::load_annotations(&pair.annotation)?;

    let mut labeled = assign_labels(&cloud.to_coords(), &annotations, palette)?;

    let max_points = config.max_points;
    if labeled.points.len() > max_points {
        if !config.truncate_overflow {
            return Err(PreprocessError::Overflow {
                path: pair.pcd.clone(),
                points: labeled.points.len(),
                max_points,
            });
        }
        warn!(
            "{}: truncating {} points to {}",
            pair.pcd.display(),
            labeled.points.len(),
            max_points
        );
        labeled.points.truncate(max_points);
        labeled.classes.truncate(max_points);
    }

    let mut xyzrgb: Vec<[f64; 6]> = Vec::with_capacity(max_points);
    let mut labels: Vec<i64> = Vec::with_capacity(max_points);

    for (p, &class) in labeled.points.iter().zip(&labeled.classes) {
        let color = palette
            .color_of_index(class)
            .unwrap_or_else(|| palette.background_color());
        xyzrgb.push([
            p[0] as f64,
            p[1] as f64,
            p[2] as f64,
            color[0] as f64,
            color[1] as f64,
            color[2] as f64,
        ]);
        labels.push(class as i64);
    }

    let bg = palette.background_color();
    pad_rows(
        &mut xyzrgb,
        max_points,
        [0.0, 0.0, 0.0, bg[0] as f64, bg[1] as f64, bg[2] as f64],
    );
    pad_rows(&mut labels, max_points, palette.background_index() as i64);

    Ok((LabeledSample { xyzrgb, labels }, labeled.stats))
}

/// Directory a sample is written to.
pub fn sample_dir(output_dir: &Path, pair: &ScanPair) -> PathBuf {
    output_dir.join(pair.index.to_string())
}

fn process_range(
    pairs: &[ScanPair],
    output_dir: &Path,
    palette: &ClassPalette,
    config: &PreprocessingConfig,
    progress: &ProgressBar,
) -> PreprocessReport {
    let mut report = PreprocessReport::default();

    for pair in pairs {
        let result = preprocess_sample(pair, palette, config).and_then(|(sample, stats)| {
            writers::write_sample(&sample_dir(output_dir, pair), &sample)?;
            Ok(stats)
        });

        match result {
            Ok(stats) => {
                debug!(
                    "[{}] {}: {} points ({} unique), {} annotated, {} unmatched",
                    pair.index,
                    pair.pcd.display(),
                    stats.raw_points,
                    stats.unique_points,
                    stats.matched,
                    stats.unmatched
                );
                report.written += 1;
                report.matched_points += stats.matched;
                report.unmatched_points += stats.unmatched;
            }
            Err(e) => {
                warn!("[{}] {}: {}", pair.index, pair.pcd.display(), e);
                report.failed.push((pair.pcd.clone(), e.to_string()));
            }
        }
        progress.inc(1);
    }

    report
}

/// Preprocess every pair into `output_dir/<index>/`.
///
/// A failing scan is logged and recorded in the report; the others are
/// still written.
///
/// # Errors
///
/// Returns an error only if the worker pool cannot be created.
pub fn preprocess_dataset(
    pairs: &[ScanPair],
    output_dir: &Path,
    palette: &ClassPalette,
    config: &PreprocessingConfig,
    progress: &ProgressBar,
) -> Result<PreprocessReport> {
    let ranges = partition_ranges(pairs.len(), config.workers);
    let pool = worker_pool(config.workers)?;

    info!(
        "preprocessing {} scans into {} with {} workers ({} ranges)",
        pairs.len(),
        output_dir.display(),
        config.workers,
        ranges.len()
    );

    let report = pool.install(|| {
        ranges
            .par_iter()
            .map(|range| process_range(&pairs[range.clone()], output_dir, palette, config, progress))
            .reduce(PreprocessReport::default, PreprocessReport::merge)
    });

    Ok(report)
}
