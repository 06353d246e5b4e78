//! Nearest-neighbour transfer of per-point data between two clouds.

use std::num::NonZeroUsize;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReprojectionError {
    #[error("cannot re-project from an empty source cloud")]
    EmptySource,

    #[error("source has {points} points but {rows} data rows")]
    LengthMismatch { points: usize, rows: usize },
}

pub type Result<T> = std::result::Result<T, ReprojectionError>;

/// Copy data rows from `src_pts` onto `dst_pts`.
///
/// For each destination point the `k` nearest source points are found with
/// a kd-tree (squared Euclidean distance). With `k == 1` the nearest row is
/// copied, otherwise the `k` rows are averaged. `k` is clamped to
/// `1..=src_pts.len()`.
///
/// # Errors
///
/// Returns an error if the source cloud is empty or `src_data` does not
/// have one row per source point.
pub fn nearest_correspondence(
    src_pts: &[[f32; 3]],
    dst_pts: &[[f32; 3]],
    src_data: &[Vec<f32>],
    k: usize,
) -> Result<Vec<Vec<f32>>> {
    if src_pts.is_empty() {
        return Err(ReprojectionError::EmptySource);
    }
    if src_pts.len() != src_data.len() {
        return Err(ReprojectionError::LengthMismatch {
            points: src_pts.len(),
            rows: src_data.len(),
        });
    }

    let tree: ImmutableKdTree<f32, 3> = ImmutableKdTree::new_from_slice(src_pts);
    let k = k.clamp(1, src_pts.len());

    let rows = dst_pts
        .par_iter()
        .map(|query| {
            if k == 1 {
                let nn = tree.nearest_one::<SquaredEuclidean>(query);
                return src_data[nn.item as usize].clone();
            }

            // k >= 2 here
            let qty = NonZeroUsize::new(k).unwrap_or(NonZeroUsize::MIN);
            let neighbours = tree.nearest_n::<SquaredEuclidean>(query, qty);

            let width = src_data[neighbours[0].item as usize].len();
            let mut mean = vec![0.0f32; width];
            for nn in &neighbours {
                for (acc, v) in mean.iter_mut().zip(&src_data[nn.item as usize]) {
                    *acc += v;
                }
            }
            let n = neighbours.len() as f32;
            mean.iter_mut().for_each(|v| *v /= n);
            mean
        })
        .collect();

    Ok(rows)
}
