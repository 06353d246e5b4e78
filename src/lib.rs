//! LiDAR semantic-segmentation dataset pipeline.
//!
//! This crate provides tools for:
//! - Labelling PCD scans from JSON annotations and writing fixed-size padded
//!   samples (`xyzrgb.npy` / `label.npy`) with a pool of worker threads
//! - Sliding-window evaluation of per-point segmentation scores with
//!   nearest-neighbour re-projection and per-class IoU
//! - Top-down plots of labelled or predicted samples
//!
//! # Example
//!
//! ```no_run
//! use lidar_seg_pipeline::core::loaders::load_sample;
//! use lidar_seg_pipeline::processors::{evaluate_sample, PrecomputedScores};
//! use lidar_seg_pipeline::EvaluationConfig;
//! use std::path::Path;
//!
//! let config = EvaluationConfig::default();
//! let sample = load_sample("Test/Area_2/0").unwrap();
//! let model = PrecomputedScores::load(Path::new("Test/Area_2/0/scores.npy"), config.n_classes).unwrap();
//! let result = evaluate_sample(&sample, &model, &config).unwrap();
//! println!("mean IoU {:.4}", result.confusion.stats_iou_per_class().0);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ClassConfig, DatasetConfig, DatasetMode, EvaluationConfig, PipelineConfig, PreprocessingConfig};
pub use core::loaders::{LabeledSample, PointCloud};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
