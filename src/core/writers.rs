//! Data writers for padded samples and evaluation results.
//!
//! This module provides functions for writing:
//! - Padded samples as `xyzrgb.npy` (`f64 [N, 6]`) and `label.npy` (`i64 [N]`)
//! - Per-point predictions as plain text, one class index per line
//! - Points with predictions as seven-column text
//! - Per-class IoU tables as CSV

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::{LabeledSample, LABEL_FILE, XYZRGB_FILE};
use super::npy::{self, NpyArray, NpyData, NpyError};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Array encoding error.
    #[error(transparent)]
    Npy(#[from] NpyError),

    /// Mismatched array lengths.
    #[error("array length mismatch: points has {points_len} rows, labels has {labels_len} rows")]
    LengthMismatch { points_len: usize, labels_len: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates a directory and its parents if they don't exist.
fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| WriteError::CreateDirectory {
            path: dir.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

fn write_err(path: &Path) -> impl Fn(std::io::Error) -> WriteError + '_ {
    move |e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    }
}

/// Write a padded sample into `dir` as `xyzrgb.npy` and `label.npy`.
///
/// The directory (and its parents) is created if needed; existing files are
/// overwritten.
///
/// # Errors
///
/// Returns an error if the point and label counts differ or a file cannot
/// be written.
pub fn write_sample(dir: &Path, sample: &LabeledSample) -> Result<()> {
    if sample.xyzrgb.len() != sample.labels.len() {
        return Err(WriteError::LengthMismatch {
            points_len: sample.xyzrgb.len(),
            labels_len: sample.labels.len(),
        });
    }

    ensure_dir(dir)?;

    let rows = sample.len();
    let points = NpyArray::new(
        vec![rows, 6],
        NpyData::F64(sample.xyzrgb.iter().flatten().copied().collect()),
    )?;
    let labels = NpyArray::new(vec![rows], NpyData::I64(sample.labels.clone()))?;

    npy::write_npy(&dir.join(XYZRGB_FILE), &points)?;
    npy::write_npy(&dir.join(LABEL_FILE), &labels)?;
    Ok(())
}

/// Write one predicted class index per line.
pub fn write_predictions_txt(path: &Path, predictions: &[usize]) -> Result<()> {
    let mut writer = create_buffered_writer(path)?;
    let err = write_err(path);

    for pred in predictions {
        writeln!(writer, "{}", pred).map_err(&err)?;
    }
    writer.flush().map_err(&err)?;
    Ok(())
}

/// Write `x y z r g b prediction` rows.
///
/// Coordinates use four decimals; colours and predictions are integers.
pub fn write_points_txt(path: &Path, xyzrgb: &[[f64; 6]], predictions: &[usize]) -> Result<()> {
    if xyzrgb.len() != predictions.len() {
        return Err(WriteError::LengthMismatch {
            points_len: xyzrgb.len(),
            labels_len: predictions.len(),
        });
    }

    let mut writer = create_buffered_writer(path)?;
    let err = write_err(path);

    for (row, pred) in xyzrgb.iter().zip(predictions) {
        writeln!(
            writer,
            "{:.4} {:.4} {:.4} {} {} {} {}",
            row[0], row[1], row[2], row[3] as i64, row[4] as i64, row[5] as i64, pred
        )
        .map_err(&err)?;
    }
    writer.flush().map_err(&err)?;
    Ok(())
}

/// Write a `class,iou` table, followed by a `mean` row.
pub fn write_iou_csv(path: &Path, classes: &[String], per_class: &[f64], mean: f64) -> Result<()> {
    if classes.len() != per_class.len() {
        return Err(WriteError::LengthMismatch {
            points_len: classes.len(),
            labels_len: per_class.len(),
        });
    }

    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));
    let csv_err = |e| WriteError::CsvError {
        path: path.display().to_string(),
        source: e,
    };

    csv_writer.write_record(["class", "iou"]).map_err(csv_err)?;
    for (name, iou) in classes.iter().zip(per_class) {
        csv_writer
            .write_record([name.as_str(), format!("{:.6}", iou).as_str()])
            .map_err(csv_err)?;
    }
    csv_writer
        .write_record(["mean", format!("{:.6}", mean).as_str()])
        .map_err(csv_err)?;

    csv_writer.flush().map_err(write_err(path))?;
    Ok(())
}
