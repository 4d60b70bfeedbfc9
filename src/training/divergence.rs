//! Divergence detection for a fold's training run
//!
//! A run has diverged when the mean validation loss of an epoch exceeds the
//! threshold after the warm-up epochs. A diverged run is discarded and the
//! fold restarts from a fresh model, at most `max_restarts` times.

use crate::config::TrainingConfig;

/// Policy deciding whether an epoch's validation loss means divergence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceGuard {
    threshold: f64,
    warmup_epochs: usize,
    max_restarts: usize,
}

impl DivergenceGuard {
    pub fn new(threshold: f64, warmup_epochs: usize, max_restarts: usize) -> Self {
        Self {
            threshold,
            warmup_epochs,
            max_restarts,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(
            config.divergence_threshold,
            config.divergence_warmup_epochs,
            config.max_divergence_restarts,
        )
    }

    /// True when `val_loss` at 0-based `epoch` counts as divergence.
    ///
    /// A non-finite loss past the warm-up also counts.
    pub fn has_diverged(&self, epoch: usize, val_loss: f64) -> bool {
        epoch > self.warmup_epochs && (val_loss > self.threshold || !val_loss.is_finite())
    }

    /// Total attempts a fold may make (first run plus restarts)
    pub fn max_attempts(&self) -> usize {
        self.max_restarts + 1
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for DivergenceGuard {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}
