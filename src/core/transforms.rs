//! Array shaping helpers shared by preprocessing and evaluation.

use std::collections::HashSet;

use rayon::prelude::*;

/// Hashable identity of a point: the bit patterns of its coordinates.
///
/// `-0.0` is folded into `0.0` so that both compare equal, as they do
/// numerically.
#[inline]
pub fn point_key(p: [f32; 3]) -> [u32; 3] {
    let bits = |v: f32| if v == 0.0 { 0u32 } else { v.to_bits() };
    [bits(p[0]), bits(p[1]), bits(p[2])]
}

/// Drop exact duplicate points, keeping the first occurrence of each.
///
/// Output order is the order of first occurrence in the input.
pub fn unique_points(points: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(points.len());
    points
        .iter()
        .copied()
        .filter(|&p| seen.insert(point_key(p)))
        .collect()
}

/// Pad `rows` with copies of `fill` until it holds exactly `len` rows.
///
/// Rows beyond `len` are left in place; callers decide whether an
/// oversized input is an error.
pub fn pad_rows<T: Clone>(rows: &mut Vec<T>, len: usize, fill: T) {
    if rows.len() < len {
        rows.resize(len, fill);
    }
}

/// Per-point input features for the segmentation network.
///
/// With `rgb` the colour is scaled to `[0, 1]`; otherwise every point gets
/// the constant feature `[1.0, 1.0, 1.0]`, which removes colour information
/// while keeping the feature width.
pub fn features_from_colors(colors: &[[u8; 3]], rgb: bool) -> Vec<[f32; 3]> {
    if !rgb {
        return vec![[1.0; 3]; colors.len()];
    }

    colors
        .par_iter()
        .map(|c| {
            [
                c[0] as f32 / 255.0,
                c[1] as f32 / 255.0,
                c[2] as f32 / 255.0,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_key_folds_negative_zero() {
        assert_eq!(point_key([0.0, -0.0, 1.0]), point_key([-0.0, 0.0, 1.0]));
        assert_ne!(point_key([1.0, 0.0, 0.0]), point_key([0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_unique_points_keeps_first_occurrence_order() {
        let points = vec![
            [3.0, 3.0, 3.0],
            [1.0, 1.0, 1.0],
            [3.0, 3.0, 3.0],
            [2.0, 2.0, 2.0],
            [1.0, 1.0, 1.0],
        ];
        let unique = unique_points(&points);
        assert_eq!(
            unique,
            vec![[3.0, 3.0, 3.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]
        );
    }

    #[test]
    fn test_pad_rows() {
        let mut rows = vec![1, 2, 3];
        pad_rows(&mut rows, 6, 0);
        assert_eq!(rows, vec![1, 2, 3, 0, 0, 0]);

        let mut full = vec![1, 2, 3];
        pad_rows(&mut full, 2, 0);
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn test_features_from_colors() {
        let colors = vec![[255, 0, 51], [0, 0, 0]];

        let rgb = features_from_colors(&colors, true);
        assert_eq!(rgb[0], [1.0, 0.0, 0.2]);
        assert_eq!(rgb[1], [0.0, 0.0, 0.0]);

        let plain = features_from_colors(&colors, false);
        assert_eq!(plain, vec![[1.0; 3]; 2]);
    }
}
