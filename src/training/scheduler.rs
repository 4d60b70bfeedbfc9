//! Learning rate scheduling.
//!
//! The fold trainer steps the scheduler once per epoch with exponential
//! decay (`lr = lr0 · γ^epoch`).

/// Per-epoch exponential learning rate decay
#[derive(Debug, Clone)]
pub struct LearningRateScheduler {
    gamma: f64,
    current_lr: f64,
}

impl LearningRateScheduler {
    /// Exponential decay with the given per-epoch factor
    pub fn exponential(base_lr: f64, gamma: f64) -> Self {
        Self {
            gamma,
            current_lr: base_lr,
        }
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Step the scheduler (call at the end of each epoch)
    pub fn step(&mut self) {
        self.current_lr *= self.gamma;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_lr() {
        let mut scheduler = LearningRateScheduler::exponential(5e-4, 0.2);
        assert_eq!(scheduler.get_lr(), 5e-4);

        scheduler.step();
        assert!((scheduler.get_lr() - 1e-4).abs() < 1e-12);

        scheduler.step();
        assert!((scheduler.get_lr() - 2e-5).abs() < 1e-12);
    }

    #[test]
    fn test_unit_gamma_keeps_rate() {
        let mut scheduler = LearningRateScheduler::exponential(0.01, 1.0);
        for _ in 0..5 {
            scheduler.step();
        }
        assert_eq!(scheduler.get_lr(), 0.01);
    }
}
