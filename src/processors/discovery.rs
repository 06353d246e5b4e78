//! Dataset file discovery, scan/annotation pairing and work partitioning.

use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

/// Errors that can occur while scanning a dataset tree.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// A scan and its annotation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPair {
    /// Position in the sorted dataset; names the output sample directory.
    pub index: usize,
    pub pcd: PathBuf,
    pub annotation: PathBuf,
}

/// Outcome of pairing scans with annotations.
#[derive(Debug, Clone, Default)]
pub struct Pairing {
    pub pairs: Vec<ScanPair>,
    pub unmatched_scans: Vec<PathBuf>,
    pub unmatched_annotations: Vec<PathBuf>,
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Recursively list every regular file below `root`, sorted by path.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| DiscoveryError::ReadDir {
            path: dir.clone(),
            source,
        })?;

        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Sorted list of files below `root` with the given extension.
pub fn list_files_with_extension(root: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    Ok(list_files(root)?
        .into_iter()
        .filter(|path| has_extension(path, ext))
        .collect())
}

fn stem(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
}

/// Pair scans with annotation files.
///
/// Both lists are sorted by path. When they have the same length and every
/// pair shares a file stem, they are zipped in order. Otherwise scans are
/// matched to annotations by file stem and every file left over is logged
/// and reported.
pub fn pair_files(scans: Vec<PathBuf>, annotations: Vec<PathBuf>) -> Pairing {
    let positional = scans.len() == annotations.len()
        && scans
            .iter()
            .zip(&annotations)
            .all(|(s, a)| stem(s) == stem(a));

    if positional {
        debug!("pairing {} scans with annotations by position", scans.len());
        let pairs = scans
            .into_iter()
            .zip(annotations)
            .enumerate()
            .map(|(index, (pcd, annotation))| ScanPair {
                index,
                pcd,
                annotation,
            })
            .collect();
        return Pairing {
            pairs,
            ..Default::default()
        };
    }

    debug!(
        "{} scans / {} annotations do not line up, pairing by file stem",
        scans.len(),
        annotations.len()
    );

    let mut by_stem: HashMap<String, PathBuf> = HashMap::with_capacity(annotations.len());
    let mut unmatched_annotations = Vec::new();
    for annotation in annotations {
        let key = stem(&annotation).to_string();
        if by_stem.contains_key(&key) {
            warn!("duplicate annotation stem, ignoring {}", annotation.display());
            unmatched_annotations.push(annotation);
        } else {
            by_stem.insert(key, annotation);
        }
    }

    let mut pairs = Vec::with_capacity(scans.len());
    let mut unmatched_scans = Vec::new();
    for pcd in scans {
        match by_stem.remove(stem(&pcd)) {
            Some(annotation) => pairs.push(ScanPair {
                index: pairs.len(),
                pcd,
                annotation,
            }),
            None => {
                warn!("no annotation for scan {}", pcd.display());
                unmatched_scans.push(pcd);
            }
        }
    }

    let mut leftover: Vec<PathBuf> = by_stem.into_values().collect();
    leftover.sort();
    for annotation in &leftover {
        warn!("no scan for annotation {}", annotation.display());
    }
    unmatched_annotations.extend(leftover);

    Pairing {
        pairs,
        unmatched_scans,
        unmatched_annotations,
    }
}

/// Discover and pair scans and annotations below `root`.
pub fn collect_pairs(root: &Path, pcd_ext: &str, annotation_ext: &str) -> Result<Pairing> {
    let files = list_files(root)?;
    let (scans, annotations): (Vec<PathBuf>, Vec<PathBuf>) = files
        .into_iter()
        .filter(|p| has_extension(p, pcd_ext) || has_extension(p, annotation_ext))
        .partition(|p| has_extension(p, pcd_ext));

    Ok(pair_files(scans, annotations))
}

/// Split `0..len` into contiguous ranges, one per worker.
///
/// Ranges start every `len / workers` items and the last range runs to
/// `len`. Fewer items than workers gives one range per item; no range is
/// ever empty.
pub fn partition_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }

    let workers = workers.clamp(1, len);
    let stride = len / workers;

    (0..workers)
        .map(|i| {
            let start = i * stride;
            let end = if i + 1 == workers { len } else { start + stride };
            start..end
        })
        .collect()
}
