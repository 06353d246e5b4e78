//! Configuration types for the segmentation pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Dataset split being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum DatasetMode {
    Training,
    Validation,
    Test,
}

impl DatasetMode {
    /// Directory name of the split under the dataset root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DatasetMode::Training => "Training",
            DatasetMode::Validation => "Validation",
            DatasetMode::Test => "Test",
        }
    }

    /// Area directory preprocessed samples of this split are written to.
    ///
    /// Validation and test scans share the held-out area.
    pub fn default_output(&self, root: &Path) -> PathBuf {
        match self {
            DatasetMode::Training => root.join("Training").join("Area_1"),
            DatasetMode::Validation | DatasetMode::Test => root.join("Test").join("Area_2"),
        }
    }
}

impl fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Location and layout of the raw dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset root containing one directory per split
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Split to preprocess
    #[serde(default = "default_mode")]
    pub mode: DatasetMode,

    /// Explicit output directory (overrides the split's default area)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Extension of point cloud scans
    #[serde(default = "default_pcd_extension")]
    pub pcd_extension: String,

    /// Extension of annotation files
    #[serde(default = "default_annotation_extension")]
    pub annotation_extension: String,
}

fn default_root() -> PathBuf {
    PathBuf::from("sample")
}

fn default_mode() -> DatasetMode {
    DatasetMode::Training
}

fn default_pcd_extension() -> String {
    "pcd".to_string()
}

fn default_annotation_extension() -> String {
    "json".to_string()
}

impl DatasetConfig {
    /// Directory scanned for input files.
    pub fn input_dir(&self) -> PathBuf {
        self.root.join(self.mode.dir_name())
    }

    /// Directory preprocessed samples are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.mode.default_output(&self.root))
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            mode: default_mode(),
            output_dir: None,
            pcd_extension: default_pcd_extension(),
            annotation_extension: default_annotation_extension(),
        }
    }
}

/// One annotated class and the colour it is stored with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub name: String,
    pub color: [u8; 3],
}

impl ClassEntry {
    pub fn new(name: &str, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
        }
    }
}

/// Class palette used to colour and index labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Ordered palette entries; entries sharing a colour share a class index
    #[serde(default = "default_palette")]
    pub palette: Vec<ClassEntry>,

    /// Class given to unannotated and padding points
    #[serde(default = "default_background")]
    pub background: String,
}

fn default_palette() -> Vec<ClassEntry> {
    vec![
        ClassEntry::new("sedan", [255, 0, 0]),
        ClassEntry::new("suv", [0, 255, 0]),
        ClassEntry::new("bus", [0, 0, 255]),
        ClassEntry::new("truck", [255, 255, 0]),
        ClassEntry::new("bicycle", [0, 255, 255]),
        ClassEntry::new("pedestrian", [255, 0, 255]),
        ClassEntry::new("unknown", [128, 128, 128]),
        // median and guardrail are folded into none through the shared colour
        ClassEntry::new("median", [0, 0, 0]),
        ClassEntry::new("guardrail", [0, 0, 0]),
        ClassEntry::new("none", [0, 0, 0]),
    ]
}

fn default_background() -> String {
    "none".to_string()
}

impl Default for ClassConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            background: default_background(),
        }
    }
}

/// Configuration for padded sample generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Number of rows every sample is padded to
    #[serde(default = "default_max_points")]
    pub max_points: usize,

    /// Worker threads; each processes one contiguous range of files
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Truncate clouds larger than `max_points` instead of failing the sample
    #[serde(default)]
    pub truncate_overflow: bool,
}

fn default_max_points() -> usize {
    70_081
}

/// Half of the available cores, at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            workers: default_workers(),
            truncate_overflow: false,
        }
    }
}

/// Configuration for sliding-window evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of segmentation classes
    #[serde(default = "default_n_classes")]
    pub n_classes: usize,

    /// Distance between neighbouring pillar centres
    #[serde(default = "default_step")]
    pub step: f32,

    /// Side length of a pillar's XY footprint
    #[serde(default = "default_pillar_size")]
    pub pillar_size: f32,

    /// Points per inference window
    #[serde(default = "default_num_points")]
    pub num_points: usize,

    /// Windows handed to the model per call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Feed colours as features (otherwise constant features)
    #[serde(default = "default_true")]
    pub rgb: bool,

    /// Write `pred.txt` per sample
    #[serde(default = "default_true")]
    pub savepreds: bool,

    /// Write `pts.txt` per sample
    #[serde(default)]
    pub savepts: bool,

    /// File name of exported per-point logits inside each sample directory
    #[serde(default = "default_scores_file")]
    pub scores_file: String,

    /// Neighbours averaged when re-projecting scores onto unseen points
    #[serde(default = "default_knn")]
    pub knn: usize,

    /// Network architecture the scores came from (informational)
    #[serde(default = "default_model")]
    pub model: String,

    /// Area directory holding the evaluated samples
    #[serde(default = "default_test_area")]
    pub test_area: String,
}

fn default_n_classes() -> usize {
    8
}

fn default_step() -> f32 {
    0.5
}

fn default_pillar_size() -> f32 {
    2.0
}

fn default_num_points() -> usize {
    8192
}

fn default_batch_size() -> usize {
    16
}

fn default_true() -> bool {
    true
}

fn default_scores_file() -> String {
    "scores.npy".to_string()
}

fn default_knn() -> usize {
    1
}

fn default_model() -> String {
    "KPConv".to_string()
}

fn default_test_area() -> String {
    "Area_2".to_string()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            n_classes: default_n_classes(),
            step: default_step(),
            pillar_size: default_pillar_size(),
            num_points: default_num_points(),
            batch_size: default_batch_size(),
            rgb: true,
            savepreds: true,
            savepts: false,
            scores_file: default_scores_file(),
            knn: default_knn(),
            model: default_model(),
            test_area: default_test_area(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub classes: ClassConfig,

    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
