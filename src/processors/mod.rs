//! Data processing modules.

pub mod discovery;
pub mod evaluation;
pub mod labeling;
pub mod metrics;
pub mod preprocess;
pub mod reprojection;
pub mod sliding_window;

// Re-export key types for convenience
pub use discovery::{collect_pairs, pair_files, partition_ranges, DiscoveryError, Pairing, ScanPair};
pub use evaluation::{
    evaluate_dataset, evaluate_sample, list_sample_dirs, EvaluationError, EvaluationReport,
    PrecomputedScores, ScoreAccumulator, SegmentationModel,
};
pub use labeling::{assign_labels, ClassPalette, LabelingError};
pub use metrics::ConfusionMatrix;
pub use preprocess::{find_max_points, preprocess_dataset, preprocess_sample, PreprocessError};
pub use reprojection::{nearest_correspondence, ReprojectionError};
pub use sliding_window::{compute_sliding_windows, Pillar, SlidingWindows, Window, WindowError};
