//! Sliding-window evaluation of a segmentation model on padded samples.
//!
//! The model sees a scan one window at a time. Window outputs are summed per
//! point, a point repeated inside one window counting once; points never covered by a window get the scores of their nearest
//! covered neighbour. The predicted class is the argmax of the final scores.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::EvaluationConfig;
use crate::core::loaders::{self, LabeledSample, LoaderError, XYZRGB_FILE};
use crate::core::npy::{self, NpyError};
use crate::core::transforms::features_from_colors;
use crate::core::writers::{self, WriteError};

use super::metrics::ConfusionMatrix;
use super::reprojection::{nearest_correspondence, ReprojectionError};
use super::sliding_window::{compute_sliding_windows, SlidingWindows, Window, WindowError};

/// File holding the predicted class of every point.
pub const PREDICTIONS_FILE: &str = "pred.txt";

/// File holding points, colours and predictions.
pub const POINTS_FILE: &str = "pts.txt";

/// Per-class IoU table written next to the per-sample results.
pub const IOU_FILE: &str = "iou.csv";

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Npy(#[from] NpyError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Reprojection(#[from] ReprojectionError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model predicts {found} classes, expected {expected}")]
    ClassCountMismatch { expected: usize, found: usize },

    #[error("{path}: expected scores of shape [N, {n_classes}], found {shape:?}")]
    ScoreShape {
        path: PathBuf,
        shape: Vec<usize>,
        n_classes: usize,
    },

    #[error("point id {id} out of range for {len} scored points")]
    IdOutOfRange { id: usize, len: usize },

    #[error("model returned {found} values for a window, expected {expected}")]
    OutputSize { expected: usize, found: usize },

    #[error("no point was covered by any window")]
    NoPointsSeen,
}

pub type Result<T> = std::result::Result<T, EvaluationError>;

/// A per-point segmentation network.
///
/// `predict` receives a batch of windows. Window points are given relative
/// to the XY centre of their pillar; `point_ids` are indices into the full
/// scan. The output holds one flat row-major `[window_len, n_classes]` score
/// block per window.
pub trait SegmentationModel {
    fn n_classes(&self) -> usize;

    fn predict(
        &self,
        window_points: &[Vec<[f32; 3]>],
        window_features: &[Vec<[f32; 3]>],
        point_ids: &[Vec<usize>],
    ) -> Result<Vec<Vec<f32>>>;
}

/// Replays per-point logits exported by an external network.
///
/// The network is run outside this pipeline and its scores saved as an
/// `[N, n_classes]` array aligned with the sample rows. Each window gets the
/// rows of its point ids, so accumulation and re-projection behave as with a
/// live model.
#[derive(Debug, Clone)]
pub struct PrecomputedScores {
    n_classes: usize,
    scores: Vec<f32>,
}

impl PrecomputedScores {
    /// Wrap row-major scores of `scores.len() / n_classes` points.
    pub fn new(scores: Vec<f32>, n_classes: usize) -> Self {
        Self { n_classes, scores }
    }

    /// Load an `[N, n_classes]` array from a `.npy` file.
    pub fn load(path: &Path, n_classes: usize) -> Result<Self> {
        let array = npy::read_npy(path)?;
        if array.shape.len() != 2 || array.shape[1] != n_classes {
            return Err(EvaluationError::ScoreShape {
                path: path.to_path_buf(),
                shape: array.shape,
                n_classes,
            });
        }
        Ok(Self::new(array.to_f32_vec(), n_classes))
    }

    /// Number of scored points.
    pub fn len(&self) -> usize {
        if self.n_classes == 0 {
            0
        } else {
            self.scores.len() / self.n_classes
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SegmentationModel for PrecomputedScores {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(
        &self,
        _window_points: &[Vec<[f32; 3]>],
        _window_features: &[Vec<[f32; 3]>],
        point_ids: &[Vec<usize>],
    ) -> Result<Vec<Vec<f32>>> {
        let len = self.len();
        let c = self.n_classes;

        point_ids
            .iter()
            .map(|ids| {
                let mut out = Vec::with_capacity(ids.len() * c);
                for &id in ids {
                    if id >= len {
                        return Err(EvaluationError::IdOutOfRange { id, len });
                    }
                    out.extend_from_slice(&self.scores[id * c..(id + 1) * c]);
                }
                Ok(out)
            })
            .collect()
    }
}

/// Per-point sum of window outputs.
#[derive(Debug, Clone)]
pub struct ScoreAccumulator {
    n_classes: usize,
    scores: Vec<f32>,
}

impl ScoreAccumulator {
    pub fn new(n_points: usize, n_classes: usize) -> Self {
        Self {
            n_classes,
            scores: vec![0.0; n_points * n_classes],
        }
    }

    /// Add one window's `[ids.len(), n_classes]` output.
    ///
    /// An id listed several times in the window is added once, with the row
    /// of its last occurrence.
    pub fn add(&mut self, ids: &[usize], window_scores: &[f32]) -> Result<()> {
        let c = self.n_classes;
        if window_scores.len() != ids.len() * c {
            return Err(EvaluationError::OutputSize {
                expected: ids.len() * c,
                found: window_scores.len(),
            });
        }

        let len = self.n_points();
        if let Some(&id) = ids.iter().find(|&&id| id >= len) {
            return Err(EvaluationError::IdOutOfRange { id, len });
        }

        let mut applied = HashSet::with_capacity(ids.len());
        for (&id, row) in ids.iter().zip(window_scores.chunks_exact(c.max(1))).rev() {
            if !applied.insert(id) {
                continue;
            }
            for (acc, v) in self.scores[id * c..(id + 1) * c].iter_mut().zip(row) {
                *acc += v;
            }
        }
        Ok(())
    }

    pub fn n_points(&self) -> usize {
        if self.n_classes == 0 {
            0
        } else {
            self.scores.len() / self.n_classes
        }
    }

    pub fn row(&self, id: usize) -> &[f32] {
        &self.scores[id * self.n_classes..(id + 1) * self.n_classes]
    }

    /// Whether each point received any non-zero score.
    pub fn seen_mask(&self) -> Vec<bool> {
        (0..self.n_points())
            .map(|i| self.row(i).iter().any(|&v| v != 0.0))
            .collect()
    }
}

/// Index of the largest score; the first one on ties.
pub fn argmax(scores: &[f32]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}

/// Outcome of evaluating one sample.
#[derive(Debug, Clone)]
pub struct SampleEvaluation {
    /// Predicted class of every sample row.
    pub predictions: Vec<usize>,
    pub confusion: ConfusionMatrix,
    pub windows: usize,
    /// Rows covered by at least one window.
    pub seen_points: usize,
}

/// Run the model over all windows, `batch_size` windows at a time.
fn run_windows(
    coords: &[[f32; 3]],
    features: &[[f32; 3]],
    windows: &SlidingWindows,
    model: &dyn SegmentationModel,
    batch_size: usize,
) -> Result<ScoreAccumulator> {
    let n_classes = model.n_classes();
    let mut accumulator = ScoreAccumulator::new(coords.len(), n_classes);

    let mut pending = windows.iter();
    loop {
        let batch: Vec<Window> = pending.by_ref().take(batch_size.max(1)).collect();
        if batch.is_empty() {
            break;
        }

        let points: Vec<Vec<[f32; 3]>> = batch
            .iter()
            .map(|w| {
                w.ids
                    .iter()
                    .map(|&i| {
                        let p = coords[i];
                        [p[0] - w.center[0], p[1] - w.center[1], p[2]]
                    })
                    .collect()
            })
            .collect();
        let feats: Vec<Vec<[f32; 3]>> = batch
            .iter()
            .map(|w| w.ids.iter().map(|&i| features[i]).collect())
            .collect();
        let ids: Vec<Vec<usize>> = batch.into_iter().map(|w| w.ids).collect();

        let outputs = model.predict(&points, &feats, &ids)?;
        if outputs.len() != ids.len() {
            return Err(EvaluationError::OutputSize {
                expected: ids.len(),
                found: outputs.len(),
            });
        }

        for (window_ids, scores) in ids.iter().zip(&outputs) {
            accumulator.add(window_ids, scores)?;
        }
    }

    Ok(accumulator)
}

/// Evaluate a model on one padded sample.
///
/// # Errors
///
/// Returns an error if the model's class count differs from the
/// configuration, the window parameters are invalid, the model output is
/// malformed, or no point was covered by a window.
pub fn evaluate_sample(
    sample: &LabeledSample,
    model: &dyn SegmentationModel,
    config: &EvaluationConfig,
) -> Result<SampleEvaluation> {
    if model.n_classes() != config.n_classes {
        return Err(EvaluationError::ClassCountMismatch {
            expected: config.n_classes,
            found: model.n_classes(),
        });
    }

    let coords = sample.coords();
    let features = features_from_colors(&sample.colors(), config.rgb);
    let windows =
        compute_sliding_windows(&coords, config.step, config.pillar_size, config.num_points)?;

    let accumulator = run_windows(&coords, &features, &windows, model, config.batch_size)?;

    let mask = accumulator.seen_mask();
    let seen: Vec<usize> = (0..mask.len()).filter(|&i| mask[i]).collect();
    if seen.is_empty() {
        return Err(EvaluationError::NoPointsSeen);
    }

    let seen_coords: Vec<[f32; 3]> = seen.iter().map(|&i| coords[i]).collect();
    let seen_scores: Vec<Vec<f32>> = seen.iter().map(|&i| accumulator.row(i).to_vec()).collect();
    let scores = nearest_correspondence(&seen_coords, &coords, &seen_scores, config.knn)?;

    let predictions: Vec<usize> = scores.iter().map(|row| argmax(row)).collect();
    // negative labels fall outside the matrix and are skipped
    let labels: Vec<usize> = sample
        .labels
        .iter()
        .map(|&l| usize::try_from(l).unwrap_or(usize::MAX))
        .collect();
    let confusion = ConfusionMatrix::from_predictions(&labels, &predictions, config.n_classes);

    debug!(
        "{} windows, {}/{} points seen",
        windows.len(),
        seen.len(),
        coords.len()
    );

    Ok(SampleEvaluation {
        predictions,
        confusion,
        windows: windows.len(),
        seen_points: seen.len(),
    })
}

/// Totals of an evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub confusion: ConfusionMatrix,
    pub mean_iou: f64,
    pub per_class_iou: Vec<f64>,
    pub overall_accuracy: f64,
    pub evaluated: usize,
    pub failed: Vec<(PathBuf, String)>,
    /// Directory the per-sample results and IoU table were written to.
    pub results_dir: PathBuf,
}

/// Sample directories below `samples_dir`, sorted by name.
pub fn list_sample_dirs(samples_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(samples_dir).map_err(|source| EvaluationError::Io {
        path: samples_dir.to_path_buf(),
        source,
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join(XYZRGB_FILE).is_file())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Directory results for a window step are written to.
///
/// The step is always written with a fractional part (`results_step1.0`).
pub fn step_dir(results_dir: &Path, step: f32) -> PathBuf {
    results_dir.join(format!("results_step{:?}", step))
}

fn evaluate_dir(dir: &Path, config: &EvaluationConfig) -> Result<(LabeledSample, SampleEvaluation)> {
    let sample = loaders::load_sample(dir)?;
    let model = PrecomputedScores::load(&dir.join(&config.scores_file), config.n_classes)?;
    let evaluation = evaluate_sample(&sample, &model, config)?;
    Ok((sample, evaluation))
}

fn write_results(
    out_dir: &Path,
    sample: &LabeledSample,
    evaluation: &SampleEvaluation,
    config: &EvaluationConfig,
) -> Result<()> {
    if config.savepreds {
        writers::write_predictions_txt(&out_dir.join(PREDICTIONS_FILE), &evaluation.predictions)?;
    }
    if config.savepts {
        writers::write_points_txt(
            &out_dir.join(POINTS_FILE),
            &sample.xyzrgb,
            &evaluation.predictions,
        )?;
    }
    Ok(())
}

/// Evaluate every sample directory below `samples_dir`.
///
/// Each sample directory must hold the padded sample and the exported
/// scores named by `config.scores_file`. Failing samples are logged and
/// skipped. Results go to `results_dir/results_step<step>/<sample>/` and the
/// IoU table of the accumulated confusion matrix to `iou.csv` in the step
/// directory, using `class_names` for its rows.
pub fn evaluate_dataset(
    samples_dir: &Path,
    results_dir: &Path,
    class_names: &[String],
    config: &EvaluationConfig,
    progress: &ProgressBar,
) -> Result<EvaluationReport> {
    let dirs = list_sample_dirs(samples_dir)?;
    let out_root = step_dir(results_dir, config.step);

    info!(
        "evaluating {} samples from {} ({} scores, step {})",
        dirs.len(),
        samples_dir.display(),
        config.model,
        config.step
    );

    let mut global = ConfusionMatrix::new(config.n_classes);
    let mut evaluated = 0;
    let mut failed = Vec::new();

    for dir in &dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = evaluate_dir(dir, config).and_then(|(sample, evaluation)| {
            write_results(&out_root.join(&name), &sample, &evaluation, config)?;
            Ok(evaluation)
        });

        match result {
            Ok(evaluation) => {
                let (sample_iou, _) = evaluation.confusion.stats_iou_per_class();
                global.add(&evaluation.confusion);
                let (global_iou, _) = global.stats_iou_per_class();
                info!(
                    "{}: IoU {:.4} (running {:.4}), {} windows",
                    name, sample_iou, global_iou, evaluation.windows
                );
                evaluated += 1;
            }
            Err(e) => {
                warn!("{}: {}", dir.display(), e);
                failed.push((dir.clone(), e.to_string()));
            }
        }
        progress.inc(1);
    }

    let (mean_iou, per_class_iou) = global.stats_iou_per_class();

    let names: Vec<String> = (0..config.n_classes)
        .map(|i| {
            class_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", i))
        })
        .collect();
    writers::write_iou_csv(&out_root.join(IOU_FILE), &names, &per_class_iou, mean_iou)?;

    Ok(EvaluationReport {
        overall_accuracy: global.overall_accuracy(),
        confusion: global,
        mean_iou,
        per_class_iou,
        evaluated,
        failed,
        results_dir: out_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::npy::{write_npy, NpyArray, NpyData};
    use tempfile::TempDir;

    /// Scores every point of the given class with 1, all others with 0.
    fn one_hot(labels: &[usize], n_classes: usize) -> Vec<f32> {
        let mut scores = vec![0.0; labels.len() * n_classes];
        for (i, &l) in labels.iter().enumerate() {
            scores[i * n_classes + l] = 1.0;
        }
        scores
    }

    fn grid_sample(n: usize) -> LabeledSample {
        let xyzrgb = (0..n)
            .map(|i| [(i % 5) as f64, (i / 5) as f64, 0.0, 255.0, 0.0, 0.0])
            .collect();
        let labels = (0..n).map(|i| (i % 3) as i64).collect();
        LabeledSample { xyzrgb, labels }
    }

    fn config(n_classes: usize) -> EvaluationConfig {
        EvaluationConfig {
            n_classes,
            step: 1.0,
            pillar_size: 2.0,
            num_points: 4,
            batch_size: 2,
            ..Default::default()
        }
    }

    fn labels_of(sample: &LabeledSample) -> Vec<usize> {
        sample.labels.iter().map(|&l| l as usize).collect()
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[-3.0, -1.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_accumulator_sums_windows() {
        let mut acc = ScoreAccumulator::new(3, 2);
        acc.add(&[0, 2], &[1.0, 0.0, 0.5, 0.5]).unwrap();
        acc.add(&[2], &[1.0, 0.0]).unwrap();

        assert_eq!(acc.row(0), &[1.0, 0.0]);
        assert_eq!(acc.row(2), &[1.5, 0.5]);
        assert_eq!(acc.row(1), &[0.0, 0.0]);
        assert_eq!(acc.seen_mask(), vec![true, false, true]);

        assert!(matches!(
            acc.add(&[1], &[1.0]),
            Err(EvaluationError::OutputSize { expected: 2, found: 1 })
        ));
        assert!(matches!(
            acc.add(&[1, 7], &[1.0, 1.0, 1.0, 1.0]),
            Err(EvaluationError::IdOutOfRange { id: 7, len: 3 })
        ));
        // nothing applied from the rejected window
        assert_eq!(acc.row(1), &[0.0, 0.0]);
    }

    #[test]
    fn test_repeated_ids_count_once_per_window() {
        let mut acc = ScoreAccumulator::new(2, 2);
        // a cycled window: point 0 appears three times
        acc.add(&[0, 1, 0, 0], &[1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 3.0])
            .unwrap();
        assert_eq!(acc.row(0), &[0.0, 3.0]);
        assert_eq!(acc.row(1), &[0.0, 1.0]);

        acc.add(&[0, 0], &[1.0, 0.0, 1.0, 0.0]).unwrap();
        assert_eq!(acc.row(0), &[1.0, 3.0]);
    }

    /// Counts the windows of every batch it is given.
    struct CountingModel {
        inner: PrecomputedScores,
        batches: std::cell::RefCell<Vec<usize>>,
    }

    impl SegmentationModel for CountingModel {
        fn n_classes(&self) -> usize {
            self.inner.n_classes()
        }

        fn predict(
            &self,
            window_points: &[Vec<[f32; 3]>],
            window_features: &[Vec<[f32; 3]>],
            point_ids: &[Vec<usize>],
        ) -> Result<Vec<Vec<f32>>> {
            self.batches.borrow_mut().push(point_ids.len());
            self.inner.predict(window_points, window_features, point_ids)
        }
    }

    #[test]
    fn test_windows_are_batched() {
        let sample = grid_sample(20);
        let model = CountingModel {
            inner: PrecomputedScores::new(one_hot(&labels_of(&sample), 3), 3),
            batches: Default::default(),
        };
        let cfg = EvaluationConfig {
            batch_size: 3,
            ..config(3)
        };

        let evaluation = evaluate_sample(&sample, &model, &cfg).unwrap();
        let batches = model.batches.borrow();
        assert_eq!(batches.iter().sum::<usize>(), evaluation.windows);
        assert!(batches.iter().all(|b| (1..=3).contains(b)));
        assert_eq!(batches.len(), evaluation.windows.div_ceil(3));
    }

    #[test]
    fn test_step_dir_keeps_fraction() {
        let root = Path::new("run");
        assert_eq!(step_dir(root, 1.0), root.join("results_step1.0"));
        assert_eq!(step_dir(root, 0.5), root.join("results_step0.5"));
        assert_eq!(step_dir(root, 2.25), root.join("results_step2.25"));
    }

    #[test]
    fn test_perfect_scores_give_perfect_iou() {
        let sample = grid_sample(20);
        let model = PrecomputedScores::new(one_hot(&labels_of(&sample), 3), 3);

        let evaluation = evaluate_sample(&sample, &model, &config(3)).unwrap();
        assert_eq!(evaluation.predictions, labels_of(&sample));
        assert_eq!(evaluation.seen_points, 20);

        let (mean, per_class) = evaluation.confusion.stats_iou_per_class();
        assert!((mean - 1.0).abs() < 1e-9);
        assert!(per_class.iter().all(|&iou| (iou - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_unseen_points_take_nearest_prediction() {
        // pillars of side 0.5 every 3 units only cover the points at x = 0 and x = 3
        let sample = LabeledSample {
            xyzrgb: vec![
                [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [3.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ],
            labels: vec![0, 0, 1, 1],
        };
        let model = PrecomputedScores::new(one_hot(&[0, 0, 1, 1], 2), 2);
        let cfg = EvaluationConfig {
            step: 3.0,
            pillar_size: 0.5,
            ..config(2)
        };

        let evaluation = evaluate_sample(&sample, &model, &cfg).unwrap();
        assert_eq!(evaluation.seen_points, 2);
        assert_eq!(evaluation.predictions, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_no_points_seen_is_an_error() {
        let sample = grid_sample(5);
        let model = PrecomputedScores::new(vec![0.0; 5 * 3], 3);
        let result = evaluate_sample(&sample, &model, &config(3));
        assert!(matches!(result, Err(EvaluationError::NoPointsSeen)));
    }

    #[test]
    fn test_class_count_mismatch() {
        let sample = grid_sample(5);
        let model = PrecomputedScores::new(vec![1.0; 5 * 2], 2);
        let result = evaluate_sample(&sample, &model, &config(3));
        assert!(matches!(
            result,
            Err(EvaluationError::ClassCountMismatch { expected: 3, found: 2 })
        ));
    }

    fn write_sample_dir(root: &Path, name: &str, sample: &LabeledSample, scores: Vec<f32>, n_classes: usize) {
        let dir = root.join(name);
        writers::write_sample(&dir, sample).unwrap();
        let rows = scores.len() / n_classes;
        let array = NpyArray::new(vec![rows, n_classes], NpyData::F32(scores)).unwrap();
        write_npy(&dir.join("scores.npy"), &array).unwrap();
    }

    #[test]
    fn test_evaluate_dataset_writes_results() {
        let dir = TempDir::new().unwrap();
        let samples = dir.path().join("Area_2");
        let results = dir.path().join("run");

        let sample = grid_sample(10);
        write_sample_dir(&samples, "0", &sample, one_hot(&labels_of(&sample), 3), 3);
        write_sample_dir(&samples, "1", &sample, one_hot(&labels_of(&sample), 3), 3);
        // wrong class count, skipped
        write_sample_dir(&samples, "2", &sample, vec![1.0; 10 * 2], 2);
        std::fs::create_dir_all(samples.join("not_a_sample")).unwrap();

        let cfg = EvaluationConfig {
            savepts: true,
            ..config(3)
        };
        let names: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let report =
            evaluate_dataset(&samples, &results, &names, &cfg, &ProgressBar::hidden()).unwrap();

        assert_eq!(report.evaluated, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.confusion.total(), 20);
        assert!((report.mean_iou - 1.0).abs() < 1e-9);
        assert!((report.overall_accuracy - 1.0).abs() < 1e-9);

        let step = results.join("results_step1.0");
        assert_eq!(report.results_dir, step);
        let preds = std::fs::read_to_string(step.join("0").join(PREDICTIONS_FILE)).unwrap();
        assert_eq!(preds.lines().count(), 10);
        let pts = std::fs::read_to_string(step.join("1").join(POINTS_FILE)).unwrap();
        assert_eq!(pts.lines().next().unwrap(), "0.0000 0.0000 0.0000 255 0 0 0");

        let iou = std::fs::read_to_string(step.join(IOU_FILE)).unwrap();
        assert!(iou.starts_with("class,iou\na,1.000000\n"));
        assert!(!step.join("2").exists());
    }
}
