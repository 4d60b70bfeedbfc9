//! Metrics Module for Ensemble Evaluation
//!
//! Provides the metrics used to judge the voted predictions:
//! - Accuracy over the four classes
//! - Per-class precision, recall and F1-score
//! - Micro-averaged precision/recall/F1 over the three emotion classes
//!   (the "others" class is excluded, as in the shared-task scoring)
//! - Confusion Matrix

use serde::{Deserialize, Serialize};

use crate::dataset::{Emotion, NUM_CLASSES};

/// Evaluation summary for one set of predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionMetrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Micro-averaged precision over happy/angry/sad
    pub micro_precision: f64,

    /// Micro-averaged recall over happy/angry/sad
    pub micro_recall: f64,

    /// Harmonic mean of the two above
    pub micro_f1: f64,

    /// Per-class metrics, indexed by class id
    pub per_class: Vec<ClassMetrics>,

    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
}

impl EmotionMetrics {
    /// Score predictions against gold labels.
    ///
    /// Both slices must have the same length; extra entries on either side
    /// are ignored.
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize]) -> Self {
        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, NUM_CLASSES);

        let per_class: Vec<ClassMetrics> = Emotion::ALL
            .iter()
            .map(|emotion| {
                ClassMetrics::from_confusion_matrix(&confusion_matrix, emotion.index())
                    .with_name(emotion.name())
            })
            .collect();

        let emotional = per_class.iter().filter(|m| m.class_idx != Emotion::Others.index());
        let (tp, fp, fn_) = emotional.fold((0usize, 0usize, 0usize), |(tp, fp, fn_), m| {
            (tp + m.true_positives, fp + m.false_positives, fn_ + m.false_negatives)
        });

        let micro_precision = ratio(tp, tp + fp);
        let micro_recall = ratio(tp, tp + fn_);
        let micro_f1 = if micro_precision + micro_recall > 0.0 {
            2.0 * micro_precision * micro_recall / (micro_precision + micro_recall)
        } else {
            0.0
        };

        Self {
            total_samples: confusion_matrix.total(),
            accuracy: confusion_matrix.accuracy(),
            micro_precision,
            micro_recall,
            micro_f1,
            per_class,
            confusion_matrix,
        }
    }

    /// Pretty print metrics
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str("║                    Evaluation Metrics                        ║\n");
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!("║ Accuracy:          {:6.2}%                                  ║\n", self.accuracy * 100.0));
        output.push_str(&format!("║ Micro Precision:   {:6.2}%                                  ║\n", self.micro_precision * 100.0));
        output.push_str(&format!("║ Micro Recall:      {:6.2}%                                  ║\n", self.micro_recall * 100.0));
        output.push_str(&format!("║ Micro F1:          {:6.2}%                                  ║\n", self.micro_f1 * 100.0));
        output.push_str(&format!("║ Total Samples:     {:6}                                    ║\n", self.total_samples));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        for class in &self.per_class {
            output.push_str(&format!(
                "  {:<8} P={:.4} R={:.4} F1={:.4} (n={})\n",
                class.class_name.as_deref().unwrap_or("?"),
                class.precision,
                class.recall,
                class.f1,
                class.support
            ));
        }

        output
    }
}

impl std::fmt::Display for EmotionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class index
    pub class_idx: usize,

    /// Class name (if available)
    pub class_name: Option<String>,

    /// True positives
    pub true_positives: usize,

    /// False positives
    pub false_positives: usize,

    /// False negatives
    pub false_negatives: usize,

    /// Precision = TP / (TP + FP)
    pub precision: f64,

    /// Recall = TP / (TP + FN)
    pub recall: f64,

    /// F1 = 2 * (precision * recall) / (precision + recall)
    pub f1: f64,

    /// Support = number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for a class from confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        // Predicted as this class but actually another one
        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        // Actually this class but predicted as another one
        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let support = true_positives + false_negatives;
        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, support);

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            class_name: None,
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
            support,
        }
    }

    /// Set the class name
    pub fn with_name(mut self, name: &str) -> Self {
        self.class_name = Some(name.to_string());
        self
    }
}

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Matrix data (row = actual, column = predicted)
    /// Stored as a flat vector in row-major order
    pub matrix: Vec<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(NUM_CLASSES)
    }
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);

        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }

        cm
    }

    /// Add a single prediction to the matrix
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            let idx = actual * self.num_classes + predicted;
            self.matrix[idx] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Get the total count
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Get the number of correct predictions (diagonal sum)
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Get overall accuracy
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Pretty print the confusion matrix
    pub fn display(&self, class_names: Option<&[&str]>) -> String {
        let mut output = String::new();

        output.push_str("\nConfusion Matrix (rows=actual, cols=predicted):\n\n");

        output.push_str("          ");
        for col in 0..self.num_classes {
            match class_names.and_then(|names| names.get(col)) {
                Some(name) => output.push_str(&format!("{:>8}", &name[..name.len().min(8)])),
                None => output.push_str(&format!("{:>8}", col)),
            }
        }
        output.push('\n');

        for row in 0..self.num_classes {
            match class_names.and_then(|names| names.get(row)) {
                Some(name) => output.push_str(&format!("{:>8}  ", &name[..name.len().min(8)])),
                None => output.push_str(&format!("{:>8}  ", row)),
            }

            for col in 0..self.num_classes {
                let count = self.get(row, col);
                if row == col {
                    output.push_str(&format!("  [{:>4}]", count));
                } else if count > 0 {
                    output.push_str(&format!("   {:>4} ", count));
                } else {
                    output.push_str("      . ");
                }
            }
            output.push('\n');
        }

        output.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));

        output
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = Emotion::ALL.iter().map(|e| e.name()).collect();
        if self.num_classes == NUM_CLASSES {
            write!(f, "{}", self.display(Some(&names)))
        } else {
            write!(f, "{}", self.display(None))
        }
    }
}

/// Running average for tracking losses during training
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    /// Create a new running average
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value with a weight (e.g. a batch mean weighted by batch size)
    pub fn add_weighted(&mut self, value: f64, weight: usize) {
        self.sum += value * weight as f64;
        self.count += weight;
    }

    /// Add a value
    pub fn add(&mut self, value: f64) {
        self.add_weighted(value, 1);
    }

    /// Get the current average
    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    /// Get the count
    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix() {
        let predictions = vec![0, 1, 2, 0, 1, 2, 0, 0, 2, 3];
        let ground_truth = vec![0, 1, 2, 0, 2, 2, 1, 0, 1, 3];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 4);

        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(2, 2), 2);
        assert_eq!(cm.get(3, 3), 1);

        assert_eq!(cm.total(), 10);
        assert_eq!(cm.correct(), 7);
        assert!((cm.accuracy() - 0.7).abs() < 0.001);
    }

    #[test]
    fn test_micro_f1_ignores_others() {
        // Only "others" rows: no emotional positives at all
        let metrics = EmotionMetrics::from_predictions(&[3, 3, 3], &[3, 3, 3]);
        assert!((metrics.accuracy - 1.0).abs() < 1e-9);
        assert_eq!(metrics.micro_f1, 0.0);
    }

    #[test]
    fn test_micro_f1_values() {
        // gold:  happy happy angry others sad
        // pred:  happy others angry happy sad
        let gold = [0, 0, 1, 3, 2];
        let pred = [0, 3, 1, 0, 2];
        let metrics = EmotionMetrics::from_predictions(&pred, &gold);

        // TP = 3 (happy, angry, sad), FP = 1 (others -> happy), FN = 1 (happy -> others)
        assert!((metrics.micro_precision - 0.75).abs() < 1e-9);
        assert!((metrics.micro_recall - 0.75).abs() < 1e-9);
        assert!((metrics.micro_f1 - 0.75).abs() < 1e-9);
        assert_eq!(metrics.total_samples, 5);
    }

    #[test]
    fn test_class_metrics() {
        let predictions = vec![0, 0, 0, 1, 1];
        let ground_truth = vec![0, 0, 1, 1, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        let class0 = ClassMetrics::from_confusion_matrix(&cm, 0);

        assert_eq!(class0.true_positives, 2);
        assert_eq!(class0.false_positives, 1);
        assert_eq!(class0.false_negatives, 1);
        assert!((class0.precision - 2.0 / 3.0).abs() < 0.001);
        assert!((class0.recall - 2.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_running_average_weighted() {
        let mut avg = RunningAverage::new();

        avg.add_weighted(1.0, 2);
        avg.add_weighted(4.0, 1);

        assert_eq!(avg.count(), 3);
        assert!((avg.average() - 2.0).abs() < 0.001);
    }
}
