//! Data loaders for LiDAR scans, annotation files and preprocessed samples.
//!
//! This module provides:
//! - PCD scan loading (ASCII and binary) through `pcd-rs`
//! - JSON annotation parsing (`annotations[].class`, `annotations[].3D_points`)
//! - Loading of padded `xyzrgb.npy` / `label.npy` sample pairs

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use pcd_rs::{DynReader, Field};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::npy::{self, NpyError};

/// File name of the padded point/colour array inside a sample directory.
pub const XYZRGB_FILE: &str = "xyzrgb.npy";

/// File name of the padded label array inside a sample directory.
pub const LABEL_FILE: &str = "label.npy";

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read PCD file {path}: {message}")]
    Pcd { path: PathBuf, message: String },

    #[error("invalid annotation file {path}: {source}")]
    Annotation {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required fields: {0}")]
    MissingColumns(String),

    #[error(transparent)]
    Npy(#[from] NpyError),

    #[error("Invalid sample {path}: {message}")]
    InvalidSample { path: PathBuf, message: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for 3D point cloud data.
#[derive(Debug, Clone)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f32>,
    /// Y coordinates of all points.
    pub y: Vec<f32>,
    /// Z coordinates of all points.
    pub z: Vec<f32>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
        }
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
        }
    }

    /// Creates a point cloud from `[x, y, z]` triples.
    pub fn from_coords(coords: &[[f32; 3]]) -> Self {
        let mut cloud = Self::with_capacity(coords.len());
        for &[x, y, z] in coords {
            cloud.push(x, y, z);
        }
        cloud
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Converts point cloud to a vector of [x, y, z] coordinate arrays.
    pub fn to_coords(&self) -> Vec<[f32; 3]> {
        (0..self.len())
            .map(|i| [self.x[i], self.y[i], self.z[i]])
            .collect()
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}

/// One labelled object in an annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Class name, looked up in the class palette.
    pub class: String,
    /// Scan points belonging to the object.
    #[serde(rename = "3D_points", default)]
    pub points: Vec<[f64; 3]>,
}

/// Contents of one annotation file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Annotations {
    /// Total number of annotated points over all objects.
    pub fn point_count(&self) -> usize {
        self.annotations.iter().map(|a| a.points.len()).sum()
    }
}

/// A padded sample as written by preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    /// Rows of `[x, y, z, r, g, b]`.
    pub xyzrgb: Vec<[f64; 6]>,
    /// Class index per row.
    pub labels: Vec<i64>,
}

impl LabeledSample {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Point coordinates as `f32` triples.
    pub fn coords(&self) -> Vec<[f32; 3]> {
        self.xyzrgb
            .iter()
            .map(|r| [r[0] as f32, r[1] as f32, r[2] as f32])
            .collect()
    }

    /// Point colours, clamped to the `u8` range.
    pub fn colors(&self) -> Vec<[u8; 3]> {
        self.xyzrgb
            .iter()
            .map(|r| {
                [
                    r[3].clamp(0.0, 255.0) as u8,
                    r[4].clamp(0.0, 255.0) as u8,
                    r[5].clamp(0.0, 255.0) as u8,
                ]
            })
            .collect()
    }
}

fn scalar(field: &Field) -> Option<f32> {
    match field {
        Field::I8(v) => v.first().map(|&x| x as f32),
        Field::I16(v) => v.first().map(|&x| x as f32),
        Field::I32(v) => v.first().map(|&x| x as f32),
        Field::U8(v) => v.first().map(|&x| x as f32),
        Field::U16(v) => v.first().map(|&x| x as f32),
        Field::U32(v) => v.first().map(|&x| x as f32),
        Field::F32(v) => v.first().copied(),
        Field::F64(v) => v.first().map(|&x| x as f32),
    }
}

/// Load the x, y, z coordinates of every record of a PCD file.
///
/// Both ASCII and binary PCD data sections are supported. Additional
/// fields (intensity, ring, ...) are ignored. Duplicate points are kept.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has no x/y/z fields.
pub fn load_pcd<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let reader = DynReader::open(path).map_err(|e| LoaderError::Pcd {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let field_index = |name: &str| {
        reader
            .meta()
            .field_defs
            .fields
            .iter()
            .position(|def| def.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| LoaderError::MissingColumns(format!("{} in {}", name, path.display())))
    };
    let x_idx = field_index("x")?;
    let y_idx = field_index("y")?;
    let z_idx = field_index("z")?;

    // the ascii reader expects a data line even when the header says 0 points
    let num_points = reader.meta().num_points as usize;
    if num_points == 0 {
        return Ok(PointCloud::new());
    }

    let mut cloud = PointCloud::with_capacity(num_points);

    for record in reader.take(num_points) {
        let record = record.map_err(|e| LoaderError::Pcd {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let fields = &record.0;
        let coord = |idx: usize| {
            fields.get(idx).and_then(scalar).ok_or_else(|| LoaderError::Pcd {
                path: path.to_path_buf(),
                message: format!("record without value for field #{}", idx),
            })
        };
        cloud.push(coord(x_idx)?, coord(y_idx)?, coord(z_idx)?);
    }

    Ok(cloud)
}

/// Number of records in a PCD file, duplicates included.
pub fn count_pcd_points<P: AsRef<Path>>(path: P) -> Result<usize> {
    Ok(load_pcd(path)?.len())
}

/// Load an annotation JSON file.
pub fn load_annotations<P: AsRef<Path>>(path: P) -> Result<Annotations> {
    let path = path.as_ref();
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LoaderError::Annotation {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the `xyzrgb.npy` / `label.npy` pair of a sample directory.
///
/// # Errors
///
/// Returns an error if either array is missing, has the wrong rank or
/// width, or the two arrays disagree on the number of rows.
pub fn load_sample<P: AsRef<Path>>(dir: P) -> Result<LabeledSample> {
    let dir = dir.as_ref();
    let invalid = |message: String| LoaderError::InvalidSample {
        path: dir.to_path_buf(),
        message,
    };

    let points = npy::read_npy(&dir.join(XYZRGB_FILE))?;
    let labels = npy::read_npy(&dir.join(LABEL_FILE))?;

    if points.shape.len() != 2 || points.shape[1] != 6 {
        return Err(invalid(format!(
            "{} has shape {:?}, expected [N, 6]",
            XYZRGB_FILE, points.shape
        )));
    }
    if labels.shape.len() != 1 {
        return Err(invalid(format!(
            "{} has shape {:?}, expected [N]",
            LABEL_FILE, labels.shape
        )));
    }
    if points.shape[0] != labels.shape[0] {
        return Err(invalid(format!(
            "{} rows but {} labels",
            points.shape[0], labels.shape[0]
        )));
    }

    let xyzrgb = points
        .to_f64_vec()
        .chunks_exact(6)
        .map(|c| [c[0], c[1], c[2], c[3], c[4], c[5]])
        .collect();

    Ok(LabeledSample {
        xyzrgb,
        labels: labels.to_i64_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::npy::{write_npy, NpyArray, NpyData};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pcd_header(file: &mut NamedTempFile, points: usize, data: &str) {
        writeln!(file, "# .PCD v0.7 - Point Cloud Data file format").unwrap();
        writeln!(file, "VERSION 0.7").unwrap();
        writeln!(file, "FIELDS x y z intensity").unwrap();
        writeln!(file, "SIZE 4 4 4 4").unwrap();
        writeln!(file, "TYPE F F F F").unwrap();
        writeln!(file, "COUNT 1 1 1 1").unwrap();
        writeln!(file, "WIDTH {}", points).unwrap();
        writeln!(file, "HEIGHT 1").unwrap();
        writeln!(file, "VIEWPOINT 0 0 0 1 0 0 0").unwrap();
        writeln!(file, "POINTS {}", points).unwrap();
        writeln!(file, "DATA {}", data).unwrap();
    }

    fn ascii_pcd(points: &[[f32; 4]]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        pcd_header(&mut file, points.len(), "ascii");
        for p in points {
            writeln!(file, "{} {} {} {}", p[0], p[1], p[2], p[3]).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn binary_pcd(points: &[[f32; 4]]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        pcd_header(&mut file, points.len(), "binary");
        for value in points.iter().flatten() {
            file.write_all(&value.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_point_cloud_operations() {
        let mut cloud = PointCloud::new();
        assert!(cloud.is_empty());

        cloud.push(1.0, 2.0, 3.0);
        cloud.push(4.0, 5.0, 6.0);

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.to_coords(), vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        let copy = PointCloud::from_coords(&cloud.to_coords());
        assert_eq!(copy.x, cloud.x);
    }

    #[test]
    fn test_load_pcd_ascii() -> Result<()> {
        let file = ascii_pcd(&[[1.0, 2.0, 3.0, 0.5], [-4.5, 0.25, 6.0, 0.1], [1.0, 2.0, 3.0, 0.7]]);

        let cloud = load_pcd(file.path())?;
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.x, vec![1.0, -4.5, 1.0]);
        assert_eq!(cloud.y[1], 0.25);
        assert_eq!(cloud.z[2], 3.0);

        assert_eq!(count_pcd_points(file.path())?, 3);
        Ok(())
    }

    #[test]
    fn test_load_pcd_binary() -> Result<()> {
        let file = binary_pcd(&[[0.5, -1.25, 2.0, 9.0], [3.0, 4.0, -5.5, 1.0]]);

        let cloud = load_pcd(file.path())?;
        assert_eq!(cloud.to_coords(), vec![[0.5, -1.25, 2.0], [3.0, 4.0, -5.5]]);
        Ok(())
    }

    #[test]
    fn test_load_pcd_without_points() -> Result<()> {
        let ascii = ascii_pcd(&[]);
        assert!(load_pcd(ascii.path())?.is_empty());
        assert_eq!(count_pcd_points(ascii.path())?, 0);

        let binary = binary_pcd(&[]);
        assert!(load_pcd(binary.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_load_pcd_missing_file() {
        let result = load_pcd("/definitely/not/here.pcd");
        assert!(matches!(result, Err(LoaderError::Pcd { .. })));
    }

    #[test]
    fn test_load_annotations() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"filename": "scan_0001.pcd",
                "annotations": [
                  {{"class": "sedan", "id": 3, "3D_points": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]}},
                  {{"class": "pedestrian", "3D_points": []}}
                ]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let annotations = load_annotations(file.path())?;
        assert_eq!(annotations.annotations.len(), 2);
        assert_eq!(annotations.annotations[0].class, "sedan");
        assert_eq!(annotations.annotations[0].points[1], [4.0, 5.0, 6.0]);
        assert_eq!(annotations.point_count(), 2);
        Ok(())
    }

    #[test]
    fn test_load_annotations_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"annotations\": [{{\"3D_points\": 5}}]}}").unwrap();
        file.flush().unwrap();

        let result = load_annotations(file.path());
        assert!(matches!(result, Err(LoaderError::Annotation { .. })));
    }

    #[test]
    fn test_load_sample() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let xyzrgb = NpyArray::new(
            vec![2, 6],
            NpyData::F64(vec![1.0, 2.0, 3.0, 255.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        )?;
        let labels = NpyArray::new(vec![2], NpyData::I64(vec![0, 7]))?;
        write_npy(&dir.path().join(XYZRGB_FILE), &xyzrgb)?;
        write_npy(&dir.path().join(LABEL_FILE), &labels)?;

        let sample = load_sample(dir.path())?;
        assert_eq!(sample.len(), 2);
        assert_eq!(sample.coords()[0], [1.0, 2.0, 3.0]);
        assert_eq!(sample.colors()[0], [255, 0, 0]);
        assert_eq!(sample.labels, vec![0, 7]);
        Ok(())
    }

    #[test]
    fn test_load_sample_row_mismatch() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let xyzrgb = NpyArray::new(vec![1, 6], NpyData::F32(vec![0.0; 6]))?;
        let labels = NpyArray::new(vec![2], NpyData::I64(vec![0, 1]))?;
        write_npy(&dir.path().join(XYZRGB_FILE), &xyzrgb)?;
        write_npy(&dir.path().join(LABEL_FILE), &labels)?;

        let result = load_sample(dir.path());
        assert!(matches!(result, Err(LoaderError::InvalidSample { .. })));
        Ok(())
    }
}
