//! Visualization tools for labelled samples.
//!
//! Samples are drawn as top-down 2D scatter plots (x vs y) using the
//! plotters library, one dot per point in the colour of its class.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::LabeledSample;
use crate::processors::labeling::ClassPalette;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Sample has no points to plot")]
    EmptySample,

    #[error("{labels} labels given for {points} points")]
    LabelCountMismatch { points: usize, labels: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Colour of labels outside the palette.
const UNKNOWN_COLOR: (u8, u8, u8) = (128, 128, 128);

/// Number of rows before the trailing padding.
///
/// Padding rows sit at the origin and carry the background class; only the
/// run of such rows at the end of the sample is treated as padding.
pub fn padding_start(sample: &LabeledSample, background: usize) -> usize {
    let is_padding = |i: usize| {
        let r = &sample.xyzrgb[i];
        r[0] == 0.0 && r[1] == 0.0 && r[2] == 0.0 && sample.labels[i] == background as i64
    };

    let mut end = sample.len();
    while end > 0 && is_padding(end - 1) {
        end -= 1;
    }
    end
}

/// Plot a top-down scatter plot of a sample coloured by class and save as PNG.
///
/// `labels` overrides the sample's own labels, e.g. with predictions read
/// from `pred.txt`. Padding rows are skipped and the plot is subsampled to
/// at most `max_points` points.
///
/// # Errors
///
/// Returns an error if the sample only holds padding, `labels` has the wrong
/// length, or the image cannot be written.
pub fn plot_labeled_sample(
    output_path: &Path,
    sample: &LabeledSample,
    labels: Option<&[usize]>,
    palette: &ClassPalette,
    max_points: usize,
) -> Result<()> {
    if let Some(labels) = labels {
        if labels.len() != sample.len() {
            return Err(VisualizationError::LabelCountMismatch {
                points: sample.len(),
                labels: labels.len(),
            });
        }
    }

    let n = padding_start(sample, palette.background_index());
    if n == 0 {
        return Err(VisualizationError::EmptySample);
    }

    // Compute subsampling step
    let max_points = max_points.max(1);
    let step = if n > max_points { n / max_points } else { 1 };

    let mut points: Vec<(f32, f32, RGBColor)> = Vec::with_capacity(n.min(max_points));

    for i in (0..n).step_by(step) {
        let row = &sample.xyzrgb[i];
        let class = match labels {
            Some(labels) => Some(labels[i]),
            None => usize::try_from(sample.labels[i]).ok(),
        };

        let (r, g, b) = match class.and_then(|c| palette.color_of_index(c)) {
            Some(c) => (c[0], c[1], c[2]),
            None => UNKNOWN_COLOR,
        };

        points.push((row[0] as f32, row[1] as f32, RGBColor(r, g, b)));
    }

    let (x_min, x_max, y_min, y_max) = compute_bounds(&points);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    // no mesh or captions: text rendering needs a font backend
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(points.iter().map(|(x, y, color)| {
            Circle::new((*x, *y), 2, color.filled())
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f32, f32, RGBColor)]) -> (f32, f32, f32, f32) {
    let mut x_min = f32::MAX;
    let mut x_max = f32::MIN;
    let mut y_min = f32::MAX;
    let mut y_max = f32::MIN;

    for (x, y, _) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }

    if (x_max - x_min).abs() < f32::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f32::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}
