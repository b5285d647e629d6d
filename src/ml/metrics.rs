//! Evaluation metrics for classification models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Tally aligned truth/prediction pairs; out-of-range pairs are ignored.
    pub fn from_pairs(n_classes: usize, truth: &[usize], predicted: &[usize]) -> Self {
        let mut cm = Self::new(n_classes);
        for (&t, &p) in truth.iter().zip(predicted) {
            cm.add(t, p);
        }
        cm
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    /// Render as an aligned text table with truth rows and predicted columns.
    pub fn render(&self, names: &[String]) -> String {
        let label = |idx: usize| {
            names
                .get(idx)
                .cloned()
                .unwrap_or_else(|| idx.to_string())
        };
        let width = (0..self.n_classes)
            .map(|idx| label(idx).len())
            .chain(self.counts.iter().map(|count| count.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(5);
        let mut out = format!("{:>width$}", "truth");
        for predicted in 0..self.n_classes {
            out.push_str(&format!(" {:>width$}", label(predicted)));
        }
        for truth in 0..self.n_classes {
            out.push('\n');
            out.push_str(&format!("{:>width$}", label(truth)));
            for predicted in 0..self.n_classes {
                out.push_str(&format!(" {:>width$}", self.get(truth, predicted)));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Serialized metrics snapshot written next to a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f32,
    pub per_class: Vec<PerClassMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClassMetric {
    pub class_id: String,
    pub support: u32,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

impl ModelMetrics {
    pub fn from_confusion(cm: &ConfusionMatrix, names: &[String]) -> Self {
        let per_class = precision_recall_by_class(cm)
            .into_iter()
            .enumerate()
            .map(|(idx, stats)| {
                let denom = stats.precision + stats.recall;
                PerClassMetric {
                    class_id: names.get(idx).cloned().unwrap_or_else(|| idx.to_string()),
                    support: stats.support,
                    precision: stats.precision,
                    recall: stats.recall,
                    f1: if denom == 0.0 {
                        0.0
                    } else {
                        2.0 * stats.precision * stats.recall / denom
                    },
                }
            })
            .collect();
        Self {
            accuracy: accuracy(cm),
            per_class,
        }
    }
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f32;
        let mut fp = 0f32;
        let mut fn_ = 0f32;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f32;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f32;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            precision,
            recall,
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let mut correct = 0u64;
    let mut total = 0u64;
    for truth in 0..cm.n_classes {
        for predicted in 0..cm.n_classes {
            let v = cm.get(truth, predicted) as u64;
            total += v;
            if truth == predicted {
                correct += v;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        (correct as f32) / (total as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["happy".into(), "sad".into()]
    }

    #[test]
    fn precision_recall_and_accuracy() {
        let cm = ConfusionMatrix::from_pairs(2, &[0, 0, 0, 1, 1], &[0, 0, 1, 1, 0]);
        assert_eq!(cm.get(0, 1), 1);
        let stats = precision_recall_by_class(&cm);
        assert!((stats[0].precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((stats[0].recall - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(stats[1].support, 2);
        assert!((accuracy(&cm) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn empty_matrix_has_zero_accuracy() {
        let cm = ConfusionMatrix::new(3);
        assert_eq!(accuracy(&cm), 0.0);
        let metrics = ModelMetrics::from_confusion(&cm, &[]);
        assert_eq!(metrics.per_class.len(), 3);
        assert_eq!(metrics.per_class[2].class_id, "2");
        assert_eq!(metrics.per_class[0].f1, 0.0);
    }

    #[test]
    fn render_lists_names_and_counts() {
        let cm = ConfusionMatrix::from_pairs(2, &[0, 1, 1], &[0, 1, 0]);
        let text = cm.render(&names());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("happy") && lines[0].contains("sad"));
        assert!(lines[2].trim_start().starts_with("sad"));
        assert!(lines[2].ends_with('1'));
    }
}
