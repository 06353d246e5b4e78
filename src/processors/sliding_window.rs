//! Pillar-based sliding windows used to feed fixed-size chunks of a scan to
//! a segmentation network.
//!
//! A regular grid of pillar centres covers the XY bounding box of the scan.
//! Each pillar is a vertical column with a square footprint of side
//! `pillar_size`; with `step < pillar_size` neighbouring pillars overlap and
//! most points are seen several times.

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("window step must be positive, got {0}")]
    InvalidStep(f32),

    #[error("pillar size must be positive, got {0}")]
    InvalidPillarSize(f32),

    #[error("windows must hold at least one point")]
    EmptyWindow,
}

pub type Result<T> = std::result::Result<T, WindowError>;

/// A fixed-size set of point ids taken from one pillar.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// XY centre of the pillar.
    pub center: [f32; 2],
    /// Exactly `num_points` ids; ids repeat when the pillar is smaller.
    pub ids: Vec<usize>,
}

/// The points inside one pillar footprint, in ascending id order.
#[derive(Debug, Clone, PartialEq)]
pub struct Pillar {
    pub center: [f32; 2],
    pub ids: Vec<usize>,
}

impl Pillar {
    /// Number of windows of `num_points` ids needed to cover the pillar.
    pub fn window_count(&self, num_points: usize) -> usize {
        self.ids.len().div_ceil(num_points)
    }

    /// The `index`-th window of the pillar.
    ///
    /// Windows take consecutive runs of `num_points` ids. The last one is
    /// filled up by cycling through the pillar from its first id, so a
    /// pillar smaller than `num_points` repeats its points.
    pub fn window(&self, index: usize, num_points: usize) -> Window {
        let start = (index * num_points).min(self.ids.len());
        let end = (start + num_points).min(self.ids.len());
        let mut ids = Vec::with_capacity(num_points);
        ids.extend_from_slice(&self.ids[start..end]);
        let missing = num_points - ids.len();
        ids.extend(self.ids.iter().cycle().take(missing));
        Window {
            center: self.center,
            ids,
        }
    }
}

/// Pillars of a scan, cut into windows on demand.
///
/// Only the pillar memberships are stored; each window is materialised when
/// iterated, so memory stays proportional to the scan rather than to the
/// number of windows times `num_points`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindows {
    pillars: Vec<Pillar>,
    num_points: usize,
}

impl SlidingWindows {
    pub fn pillars(&self) -> &[Pillar] {
        &self.pillars
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Total number of windows over all pillars.
    pub fn len(&self) -> usize {
        self.pillars
            .iter()
            .map(|p| p.window_count(self.num_points))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pillars.is_empty()
    }

    /// Windows in pillar order.
    pub fn iter(&self) -> impl Iterator<Item = Window> + '_ {
        let n = self.num_points;
        self.pillars
            .iter()
            .flat_map(move |p| (0..p.window_count(n)).map(move |k| p.window(k, n)))
    }
}

/// Pillar centres covering `[min, max]` with the given spacing.
fn axis_centers(min: f32, max: f32, step: f32) -> Vec<f32> {
    let count = ((max - min) / step).floor() as usize + 1;
    (0..count).map(|i| min + i as f32 * step).collect()
}

/// Compute the sliding windows of a scan.
///
/// Points are assigned to every pillar whose footprint contains them
/// (`|dx| <= pillar_size / 2` and `|dy| <= pillar_size / 2`). Windows are
/// ordered by pillar, row by row along y then x, and empty pillars are
/// skipped. Windows are not built until [`SlidingWindows::iter`] yields
/// them.
///
/// # Errors
///
/// Returns an error if `step` or `pillar_size` is not positive or
/// `num_points` is zero.
pub fn compute_sliding_windows(
    points: &[[f32; 3]],
    step: f32,
    pillar_size: f32,
    num_points: usize,
) -> Result<SlidingWindows> {
    if !(step > 0.0) {
        return Err(WindowError::InvalidStep(step));
    }
    if !(pillar_size > 0.0) {
        return Err(WindowError::InvalidPillarSize(pillar_size));
    }
    if num_points == 0 {
        return Err(WindowError::EmptyWindow);
    }
    if points.is_empty() {
        return Ok(SlidingWindows {
            pillars: Vec::new(),
            num_points,
        });
    }

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p[0]);
        max_x = max_x.max(p[0]);
        min_y = min_y.min(p[1]);
        max_y = max_y.max(p[1]);
    }

    let xs = axis_centers(min_x, max_x, step);
    let ys = axis_centers(min_y, max_y, step);
    let centers: Vec<[f32; 2]> = ys
        .iter()
        .flat_map(|&y| xs.iter().map(move |&x| [x, y]))
        .collect();

    let footprint: Vec<[f32; 2]> = points.iter().map(|p| [p[0], p[1]]).collect();
    let tree: ImmutableKdTree<f32, 2> = ImmutableKdTree::new_from_slice(&footprint);

    let half = pillar_size / 2.0;
    // circle circumscribing the square footprint
    let radius_sq = 2.0 * half * half;

    let pillars: Vec<Option<Pillar>> = centers
        .par_iter()
        .map(|center| {
            let mut ids: Vec<usize> = tree
                .within::<SquaredEuclidean>(center, radius_sq)
                .into_iter()
                .map(|nn| nn.item as usize)
                .filter(|&i| {
                    (footprint[i][0] - center[0]).abs() <= half
                        && (footprint[i][1] - center[1]).abs() <= half
                })
                .collect();
            ids.sort_unstable();

            (!ids.is_empty()).then(|| Pillar {
                center: *center,
                ids,
            })
        })
        .collect();

    Ok(SlidingWindows {
        pillars: pillars.into_iter().flatten().collect(),
        num_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters() {
        let points = vec![[0.0, 0.0, 0.0]];
        assert_eq!(
            compute_sliding_windows(&points, 0.0, 1.0, 4),
            Err(WindowError::InvalidStep(0.0))
        );
        assert_eq!(
            compute_sliding_windows(&points, 1.0, -1.0, 4),
            Err(WindowError::InvalidPillarSize(-1.0))
        );
        assert_eq!(
            compute_sliding_windows(&points, 1.0, 1.0, 0),
            Err(WindowError::EmptyWindow)
        );
        assert!(compute_sliding_windows(&points, f32::NAN, 1.0, 4).is_err());
    }

    fn collect(points: &[[f32; 3]], step: f32, pillar_size: f32, num_points: usize) -> Vec<Window> {
        compute_sliding_windows(points, step, pillar_size, num_points)
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn test_empty_cloud_has_no_windows() {
        let windows = compute_sliding_windows(&[], 0.5, 2.0, 8).unwrap();
        assert!(windows.is_empty());
        assert_eq!(windows.len(), 0);
        assert_eq!(windows.iter().count(), 0);
    }

    #[test]
    fn test_small_pillar_is_cycled() {
        let points = vec![[0.0, 0.0, 0.0], [0.1, 0.1, 1.0], [0.2, 0.0, 2.0]];
        let windows = collect(&points, 1.0, 2.0, 8);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].center, [0.0, 0.0]);
        assert_eq!(windows[0].ids, vec![0, 1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_large_pillar_is_chunked() {
        let points: Vec<[f32; 3]> = (0..10).map(|i| [0.0, 0.0, i as f32]).collect();
        let windows = collect(&points, 1.0, 1.0, 4);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].ids, vec![0, 1, 2, 3]);
        assert_eq!(windows[1].ids, vec![4, 5, 6, 7]);
        assert_eq!(windows[2].ids, vec![8, 9, 0, 1]);
    }

    #[test]
    fn test_every_point_is_covered() {
        let points: Vec<[f32; 3]> = (0..50)
            .map(|i| [(i % 10) as f32 * 0.7, (i / 10) as f32 * 1.3, 0.0])
            .collect();
        let windows = collect(&points, 0.5, 2.0, 16);

        let mut seen = vec![false; points.len()];
        for window in &windows {
            assert_eq!(window.ids.len(), 16);
            for &id in &window.ids {
                seen[id] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_pillar_footprint_is_square() {
        // (0.9, 0.9) is inside the square of half-size 1 around the origin
        // pillar, (1.5, 0) is not
        let points = vec![[0.0, 0.0, 0.0], [0.9, 0.9, 0.0], [1.5, 0.0, 0.0]];
        let windows = collect(&points, 10.0, 2.0, 2);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].center, [0.0, 0.0]);
        assert_eq!(windows[0].ids, vec![0, 1]);
    }

    #[test]
    fn test_pillar_ids_are_stored_once() {
        // one pillar of 3 points cut into 1000-point windows, and one pillar
        // of 10 points needing several windows
        let mut points: Vec<[f32; 3]> = (0..3).map(|i| [0.0, 0.0, i as f32]).collect();
        points.extend((0..10).map(|i| [5.0, 0.0, i as f32]));

        let small = compute_sliding_windows(&points, 5.0, 1.0, 1000).unwrap();
        assert_eq!(small.pillars().len(), 2);
        let stored: usize = small.pillars().iter().map(|p| p.ids.len()).sum();
        assert_eq!(stored, 13);
        assert_eq!(small.len(), 2);
        assert!(small.iter().all(|w| w.ids.len() == 1000));

        let chunked = compute_sliding_windows(&points, 5.0, 1.0, 4).unwrap();
        assert_eq!(chunked.len(), 1 + 3);
        assert_eq!(chunked.iter().count(), chunked.len());
        assert_eq!(chunked.pillars()[1].window(2, 4).ids, vec![11, 12, 3, 4]);
    }
}
