//! Loss composition over the three predictor heads
//!
//! - class term: per-example CE or focal loss on the 4-way logits, scaled by
//!   the weight of each example's class, summed and divided by the batch size
//! - binary term: the same on the others-vs-emotion logits with weights
//!   `[2 - w_others, w_others]`
//! - emotion term: mean squared error against the one-hot emotion target
//!
//! `total = (class + λ1·binary + λ2·emotion) / (1 + λ1 + λ2)`. Every class
//! weight is raised to the flatten exponent before use.

use burn::tensor::{activation::log_softmax, backend::Backend, Int, Tensor, TensorData};
use burn::nn::loss::{MseLoss, Reduction};

use crate::config::{LossConfig, LossMode};
use crate::dataset::{TargetBatch, NUM_CLASSES};
use crate::model::PredictorOutput;
use crate::utils::{EnsembleError, Result};

/// Index of the `others` weight inside the class-weight vector
const OTHERS: usize = NUM_CLASSES - 1;

/// The combined loss and its parts
#[derive(Debug, Clone)]
pub struct LossBreakdown<B: Backend> {
    /// Scalar tensor `[1]` to backpropagate
    pub total: Tensor<B, 1>,
    pub class: Tensor<B, 1>,
    /// Absent when λ1 is zero
    pub binary: Option<Tensor<B, 1>>,
    /// Absent when λ2 is zero
    pub emotion: Option<Tensor<B, 1>>,
}

/// Combines the per-head losses into one training objective
#[derive(Debug, Clone)]
pub struct LossComposer {
    mode: LossMode,
    focal_gamma: f64,
    class_weights: Vec<f32>,
    binary_weights: Vec<f32>,
    lambda_binary: f64,
    lambda_emotion: f64,
}

impl LossComposer {
    /// Build from configuration, rejecting malformed class weights
    pub fn new(config: &LossConfig) -> Result<Self> {
        if config.class_weights.len() != NUM_CLASSES {
            return Err(EnsembleError::InvalidClassWeights(format!(
                "expected {} weights, got {}",
                NUM_CLASSES,
                config.class_weights.len()
            )));
        }
        if config.class_weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EnsembleError::InvalidClassWeights(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        let others = config.class_weights[OTHERS];
        if others > 2.0 {
            return Err(EnsembleError::InvalidClassWeights(format!(
                "the others weight {} leaves a negative binary weight",
                others
            )));
        }

        let flatten = |w: f64| w.powf(config.flatten) as f32;

        Ok(Self {
            mode: config.mode,
            focal_gamma: config.focal_gamma,
            class_weights: config.class_weights.iter().map(|&w| flatten(w)).collect(),
            binary_weights: vec![flatten(2.0 - others), flatten(others)],
            lambda_binary: config.lambda_binary,
            lambda_emotion: config.lambda_emotion,
        })
    }

    /// Effective (flattened) class weights
    pub fn class_weights(&self) -> &[f32] {
        &self.class_weights
    }

    /// Effective (flattened) binary weights
    pub fn binary_weights(&self) -> &[f32] {
        &self.binary_weights
    }

    /// Compose the loss for one batch
    pub fn forward<B: Backend>(
        &self,
        output: &PredictorOutput<B>,
        targets: &TargetBatch<B>,
    ) -> LossBreakdown<B> {
        let class = self.weighted_loss(
            output.class_logits.clone(),
            targets.class.clone(),
            &self.class_weights,
        );

        let mut total = class.clone();

        let binary = (self.lambda_binary != 0.0).then(|| {
            self.weighted_loss(
                output.binary_logits.clone(),
                targets.binary.clone(),
                &self.binary_weights,
            )
        });
        if let Some(binary) = &binary {
            total = total + binary.clone().mul_scalar(self.lambda_binary);
        }

        let emotion = (self.lambda_emotion != 0.0).then(|| {
            MseLoss::new().forward(
                output.emotion_scores.clone(),
                targets.emotion.clone(),
                Reduction::Mean,
            )
        });
        if let Some(emotion) = &emotion {
            total = total + emotion.clone().mul_scalar(self.lambda_emotion);
        }

        let total = total.div_scalar(1.0 + self.lambda_binary + self.lambda_emotion);

        LossBreakdown {
            total,
            class,
            binary,
            emotion,
        }
    }

    /// Σ weight[target]·loss(example) / batch_size
    fn weighted_loss<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
        weights: &[f32],
    ) -> Tensor<B, 1> {
        let [batch_size, num_classes] = logits.dims();
        let device = logits.device();

        let log_probs = log_softmax(logits, 1);
        let target_log_probs = log_probs
            .gather(1, targets.clone().reshape([batch_size, 1]))
            .reshape([batch_size]);

        let per_example = match self.mode {
            LossMode::Ce => target_log_probs.neg(),
            LossMode::Focal => {
                let modulating = target_log_probs
                    .clone()
                    .exp()
                    .neg()
                    .add_scalar(1.0)
                    .powf_scalar(self.focal_gamma);
                (modulating * target_log_probs).neg()
            }
        };

        let table = Tensor::<B, 1>::from_floats(
            TensorData::new(weights.to_vec(), [num_classes]),
            &device,
        );
        let example_weights = table.select(0, targets);

        (per_example * example_weights).sum().div_scalar(batch_size as f64)
    }
}
