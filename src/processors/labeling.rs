//! Class palette and point labelling from annotation files.
//!
//! Labels are stored twice in a padded sample: as an RGB colour in the
//! `xyzrgb` array and as a class index in the `label` array. Several class
//! names may share a colour; they then share one class index, which is how
//! `median` and `guardrail` are folded into the background class.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::{ClassConfig, ClassEntry};
use crate::core::loaders::Annotations;
use crate::core::transforms::{point_key, unique_points};

/// Errors that can occur while labelling points.
#[derive(Debug, Error)]
pub enum LabelingError {
    #[error("class palette is empty")]
    EmptyPalette,

    #[error("unknown class '{0}'")]
    UnknownClass(String),
}

/// Result type for labelling operations.
pub type Result<T> = std::result::Result<T, LabelingError>;

/// Mapping between class names, colours and class indices.
#[derive(Debug, Clone)]
pub struct ClassPalette {
    /// Distinct colours in first-appearance order; position is the class index.
    colors: Vec<[u8; 3]>,
    /// Name of each class index (the last entry declaring that colour).
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
    background: usize,
}

impl ClassPalette {
    /// Build a palette from ordered entries.
    ///
    /// # Errors
    ///
    /// Returns an error if `entries` is empty or `background` is not one of
    /// the entry names.
    pub fn new(entries: &[ClassEntry], background: &str) -> Result<Self> {
        if entries.is_empty() {
            return Err(LabelingError::EmptyPalette);
        }

        let mut colors: Vec<[u8; 3]> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut name_to_index = HashMap::with_capacity(entries.len());

        for entry in entries {
            let index = match colors.iter().position(|c| *c == entry.color) {
                Some(index) => {
                    names[index] = entry.name.clone();
                    index
                }
                None => {
                    colors.push(entry.color);
                    names.push(entry.name.clone());
                    colors.len() - 1
                }
            };
            name_to_index.insert(entry.name.clone(), index);
        }

        let background = *name_to_index
            .get(background)
            .ok_or_else(|| LabelingError::UnknownClass(background.to_string()))?;

        Ok(Self {
            colors,
            names,
            name_to_index,
            background,
        })
    }

    /// Build the palette described by a class configuration.
    pub fn from_config(config: &ClassConfig) -> Result<Self> {
        Self::new(&config.palette, &config.background)
    }

    /// Number of distinct classes.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Class index of a class name.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| LabelingError::UnknownClass(name.to_string()))
    }

    /// Colour of a class name.
    pub fn color_of(&self, name: &str) -> Result<[u8; 3]> {
        self.index_of(name).map(|i| self.colors[i])
    }

    /// Class index stored with a colour.
    pub fn index_of_color(&self, color: [u8; 3]) -> Option<usize> {
        self.colors.iter().position(|c| *c == color)
    }

    /// Colour of a class index.
    pub fn color_of_index(&self, index: usize) -> Option<[u8; 3]> {
        self.colors.get(index).copied()
    }

    /// Class names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn background_index(&self) -> usize {
        self.background
    }

    pub fn background_color(&self) -> [u8; 3] {
        self.colors[self.background]
    }
}

/// Counters collected while labelling one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStats {
    /// Points in the scan, duplicates included.
    pub raw_points: usize,
    /// Points left after dropping duplicates.
    pub unique_points: usize,
    /// Annotation points that matched a scan point.
    pub matched: usize,
    /// Annotation points with no identical scan point.
    pub unmatched: usize,
}

/// Deduplicated scan points with one class index each.
#[derive(Debug, Clone)]
pub struct LabeledPoints {
    pub points: Vec<[f32; 3]>,
    pub classes: Vec<usize>,
    pub stats: LabelStats,
}

/// Label the points of a scan from its annotations.
///
/// Duplicate scan points are collapsed (first occurrence kept). Every point
/// starts as background; annotation points are matched to scan points by
/// exact coordinate equality at `f32` precision, and later annotations
/// override earlier ones. Annotation points absent from the scan are
/// counted and otherwise ignored.
///
/// # Errors
///
/// Returns an error if an annotation names a class missing from the palette.
pub fn assign_labels(
    points: &[[f32; 3]],
    annotations: &Annotations,
    palette: &ClassPalette,
) -> Result<LabeledPoints> {
    let unique = unique_points(points);

    let position: HashMap<[u32; 3], usize> = unique
        .iter()
        .enumerate()
        .map(|(i, &p)| (point_key(p), i))
        .collect();

    let mut classes = vec![palette.background_index(); unique.len()];
    let mut stats = LabelStats {
        raw_points: points.len(),
        unique_points: unique.len(),
        ..Default::default()
    };

    for annotation in &annotations.annotations {
        let class = palette.index_of(&annotation.class)?;

        for p in &annotation.points {
            let key = point_key([p[0] as f32, p[1] as f32, p[2] as f32]);
            match position.get(&key) {
                Some(&i) => {
                    classes[i] = class;
                    stats.matched += 1;
                }
                None => stats.unmatched += 1,
            }
        }
    }

    Ok(LabeledPoints {
        points: unique,
        classes,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::Annotation;

    fn default_palette() -> ClassPalette {
        ClassPalette::from_config(&ClassConfig::default()).unwrap()
    }

    fn annotation(class: &str, points: &[[f64; 3]]) -> Annotation {
        Annotation {
            class: class.to_string(),
            points: points.to_vec(),
        }
    }

    #[test]
    fn test_default_palette_indices() {
        let palette = default_palette();
        assert_eq!(palette.len(), 8);
        assert_eq!(
            palette.names(),
            &["sedan", "suv", "bus", "truck", "bicycle", "pedestrian", "unknown", "none"]
        );
        assert_eq!(palette.index_of("sedan").unwrap(), 0);
        assert_eq!(palette.index_of("unknown").unwrap(), 6);
        assert_eq!(palette.index_of("none").unwrap(), 7);
        assert_eq!(palette.background_index(), 7);
        assert_eq!(palette.background_color(), [0, 0, 0]);
    }

    #[test]
    fn test_shared_colour_collapses_classes() {
        let palette = default_palette();
        assert_eq!(palette.index_of("median").unwrap(), 7);
        assert_eq!(palette.index_of("guardrail").unwrap(), 7);
        assert_eq!(palette.color_of("guardrail").unwrap(), [0, 0, 0]);
        assert_eq!(palette.index_of_color([0, 0, 255]), Some(2));
        assert_eq!(palette.index_of_color([1, 2, 3]), None);
        assert_eq!(palette.color_of_index(5), Some([255, 0, 255]));
    }

    #[test]
    fn test_palette_errors() {
        assert!(matches!(
            ClassPalette::new(&[], "none"),
            Err(LabelingError::EmptyPalette)
        ));
        let entries = vec![ClassEntry::new("car", [1, 1, 1])];
        assert!(matches!(
            ClassPalette::new(&entries, "none"),
            Err(LabelingError::UnknownClass(_))
        ));
        assert!(default_palette().index_of("tram").is_err());
    }

    #[test]
    fn test_assign_labels_matches_exact_points() {
        let palette = default_palette();
        let points = vec![
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [1.0, 2.0, 3.0],
            [7.5, 8.25, -9.0],
        ];
        let annotations = Annotations {
            annotations: vec![
                annotation("sedan", &[[1.0, 2.0, 3.0], [100.0, 0.0, 0.0]]),
                annotation("pedestrian", &[[7.5, 8.25, -9.0]]),
            ],
        };

        let labeled = assign_labels(&points, &annotations, &palette).unwrap();
        assert_eq!(labeled.points.len(), 3);
        assert_eq!(labeled.classes, vec![0, 7, 5]);
        assert_eq!(
            labeled.stats,
            LabelStats {
                raw_points: 4,
                unique_points: 3,
                matched: 2,
                unmatched: 1,
            }
        );
    }

    #[test]
    fn test_later_annotation_wins() {
        let palette = default_palette();
        let points = vec![[1.0, 1.0, 1.0]];
        let annotations = Annotations {
            annotations: vec![
                annotation("bus", &[[1.0, 1.0, 1.0]]),
                annotation("guardrail", &[[1.0, 1.0, 1.0]]),
            ],
        };

        let labeled = assign_labels(&points, &annotations, &palette).unwrap();
        assert_eq!(labeled.classes, vec![7]);
    }

    #[test]
    fn test_json_coordinates_match_at_f32_precision() {
        let palette = default_palette();
        let value = 0.1f32;
        let points = vec![[value, value, value]];
        // the f32 value printed at f64 precision, as a JSON exporter would
        let wide = value as f64;
        let annotations = Annotations {
            annotations: vec![annotation("truck", &[[wide, wide, wide]])],
        };

        let labeled = assign_labels(&points, &annotations, &palette).unwrap();
        assert_eq!(labeled.classes, vec![3]);
    }

    #[test]
    fn test_unknown_annotation_class_fails() {
        let palette = default_palette();
        let annotations = Annotations {
            annotations: vec![annotation("tram", &[])],
        };
        let result = assign_labels(&[[0.0, 0.0, 0.0]], &annotations, &palette);
        assert!(matches!(result, Err(LabelingError::UnknownClass(name)) if name == "tram"));
    }
}
