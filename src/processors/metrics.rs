//! Confusion matrices and segmentation scores.

/// Square confusion matrix; rows are ground truth, columns predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    n_classes: usize,
    counts: Vec<u64>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Count (label, prediction) pairs.
    ///
    /// Pairs where either side is outside `0..n_classes` are not counted.
    pub fn from_predictions(labels: &[usize], predictions: &[usize], n_classes: usize) -> Self {
        let mut cm = Self::new(n_classes);
        for (&label, &pred) in labels.iter().zip(predictions) {
            cm.record(label, pred);
        }
        cm
    }

    /// Count one pair; returns false if it was skipped.
    pub fn record(&mut self, label: usize, prediction: usize) -> bool {
        if label >= self.n_classes || prediction >= self.n_classes {
            return false;
        }
        self.counts[label * self.n_classes + prediction] += 1;
        true
    }

    /// Add another matrix of the same size.
    ///
    /// # Panics
    ///
    /// Panics if the matrices have different sizes.
    pub fn add(&mut self, other: &ConfusionMatrix) {
        assert_eq!(
            self.n_classes, other.n_classes,
            "confusion matrices have different class counts"
        );
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn get(&self, label: usize, prediction: usize) -> u64 {
        self.counts[label * self.n_classes + prediction]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn true_positives(&self, class: usize) -> u64 {
        self.get(class, class)
    }

    fn row_sum(&self, class: usize) -> u64 {
        (0..self.n_classes).map(|p| self.get(class, p)).sum()
    }

    fn col_sum(&self, class: usize) -> u64 {
        (0..self.n_classes).map(|l| self.get(l, class)).sum()
    }

    /// Fraction of points whose prediction equals the label.
    pub fn overall_accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..self.n_classes).map(|c| self.true_positives(c)).sum();
        correct as f64 / total as f64
    }

    /// Recall of each class; 0 for classes with no ground truth.
    pub fn accuracy_per_class(&self) -> Vec<f64> {
        (0..self.n_classes)
            .map(|c| {
                let row = self.row_sum(c);
                if row == 0 {
                    0.0
                } else {
                    self.true_positives(c) as f64 / row as f64
                }
            })
            .collect()
    }

    /// Mean IoU and IoU of every class.
    ///
    /// `IoU = TP / (TP + FP + FN)`. Classes absent from the ground truth are
    /// given the mean IoU of the classes that are present, so they do not
    /// pull the mean down. With no ground truth at all every IoU is 0.
    pub fn stats_iou_per_class(&self) -> (f64, Vec<f64>) {
        let mut per_class = vec![0.0; self.n_classes];
        let mut present = vec![false; self.n_classes];

        for c in 0..self.n_classes {
            let tp = self.true_positives(c);
            let row = self.row_sum(c);
            let col = self.col_sum(c);
            present[c] = row > 0;
            let union = row + col - tp;
            if union > 0 {
                per_class[c] = tp as f64 / union as f64;
            }
        }

        let present_count = present.iter().filter(|&&p| p).count();
        if present_count == 0 {
            return (0.0, per_class);
        }

        let mean = per_class
            .iter()
            .zip(&present)
            .filter(|&(_, &p)| p)
            .map(|(iou, _)| iou)
            .sum::<f64>()
            / present_count as f64;

        for (iou, &p) in per_class.iter_mut().zip(&present) {
            if !p {
                *iou = mean;
            }
        }

        (mean, per_class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_from_predictions_layout() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 2], &[0, 1, 1, 1], 3);
        assert_eq!(cm.get(0, 0), 1);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(2, 1), 1);
        assert_eq!(cm.total(), 4);
    }

    #[test]
    fn test_out_of_range_pairs_are_skipped() {
        let cm = ConfusionMatrix::from_predictions(&[0, 5, 1], &[0, 0, 9], 3);
        assert_eq!(cm.total(), 1);
        assert!(!ConfusionMatrix::new(2).record(2, 0));
    }

    #[test]
    fn test_perfect_prediction() {
        let labels = vec![0, 1, 1, 3, 3, 3];
        let cm = ConfusionMatrix::from_predictions(&labels, &labels, 4);
        let (mean, per_class) = cm.stats_iou_per_class();

        assert!(approx(mean, 1.0));
        assert!(per_class.iter().all(|&iou| approx(iou, 1.0)));
        assert!(approx(cm.overall_accuracy(), 1.0));
    }

    #[test]
    fn test_iou_values() {
        // class 0: tp 2, fn 1, fp 1 -> 2/4
        // class 1: tp 1, fn 1, fp 1 -> 1/3
        // class 2: no ground truth, gets the mean
        let labels = vec![0, 0, 0, 1, 1];
        let preds = vec![0, 0, 1, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&labels, &preds, 3);
        let (mean, per_class) = cm.stats_iou_per_class();

        let expected_mean = (0.5 + 1.0 / 3.0) / 2.0;
        assert!(approx(per_class[0], 0.5));
        assert!(approx(per_class[1], 1.0 / 3.0));
        assert!(approx(per_class[2], expected_mean));
        assert!(approx(mean, expected_mean));

        assert!(approx(cm.overall_accuracy(), 0.6));
        let acc = cm.accuracy_per_class();
        assert!(approx(acc[0], 2.0 / 3.0));
        assert!(approx(acc[1], 0.5));
        assert!(approx(acc[2], 0.0));
    }

    #[test]
    fn test_add_and_empty_matrix() {
        let mut global = ConfusionMatrix::new(2);
        assert_eq!(global.stats_iou_per_class(), (0.0, vec![0.0, 0.0]));
        assert!(approx(global.overall_accuracy(), 0.0));

        global.add(&ConfusionMatrix::from_predictions(&[0], &[0], 2));
        global.add(&ConfusionMatrix::from_predictions(&[1, 0], &[1, 1], 2));
        assert_eq!(global.get(0, 0), 1);
        assert_eq!(global.get(0, 1), 1);
        assert_eq!(global.get(1, 1), 1);
        assert_eq!(global.total(), 3);
    }
}
