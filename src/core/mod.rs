//! Core data types and I/O operations.

pub mod loaders;
pub mod npy;
pub mod transforms;
pub mod writers;

pub use loaders::{Annotation, Annotations, LabeledSample, LoaderError, PointCloud};
pub use npy::{NpyArray, NpyData, NpyError};
pub use writers::{write_iou_csv, write_points_txt, write_predictions_txt, write_sample, WriteError};
