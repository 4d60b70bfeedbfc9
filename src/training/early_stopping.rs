//! Early-stopping monitor over per-epoch validation losses
//!
//! The first observation is always the best. Each later observation either
//! improves on the best (resetting the counter) or increments the counter;
//! once the counter exceeds the patience the monitor is `Stopped` and
//! ignores further observations.

/// Monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Watching,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: Option<f64>,
    best_epoch: Option<usize>,
    bad_epochs: usize,
    observed: usize,
    last_was_best: bool,
    state: MonitorState,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best: None,
            best_epoch: None,
            bad_epochs: 0,
            observed: 0,
            last_was_best: false,
            state: MonitorState::Watching,
        }
    }

    /// Report one epoch's validation loss
    pub fn step(&mut self, loss: f64) -> MonitorState {
        if self.state == MonitorState::Stopped {
            return self.state;
        }

        let epoch = self.observed;
        self.observed += 1;

        let improved = loss.is_finite()
            && match self.best {
                None => true,
                Some(best) => loss < best - self.min_delta,
            };

        if improved {
            self.best = Some(loss);
            self.best_epoch = Some(epoch);
            self.bad_epochs = 0;
            self.last_was_best = true;
        } else {
            self.bad_epochs += 1;
            self.last_was_best = false;
            if self.bad_epochs > self.patience {
                self.state = MonitorState::Stopped;
            }
        }

        self.state
    }

    /// Whether the most recent observation set a new best
    pub fn is_best(&self) -> bool {
        self.last_was_best
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// 0-based index of the best observation
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_best() {
        let mut es = EarlyStopping::new(1, 0.0);
        assert_eq!(es.step(0.9), MonitorState::Watching);
        assert!(es.is_best());
        assert_eq!(es.best_epoch(), Some(0));
    }

    #[test]
    fn test_strictly_decreasing_losses_are_always_best() {
        let mut es = EarlyStopping::new(0, 0.0);
        for epoch in 0..10 {
            let state = es.step(1.0 / (epoch as f64 + 1.0));
            assert_eq!(state, MonitorState::Watching);
            assert!(es.is_best());
            assert_eq!(es.best_epoch(), Some(epoch));
        }
    }

    #[test]
    fn test_increasing_losses_stop_after_patience_plus_one() {
        for patience in 0..4 {
            let mut es = EarlyStopping::new(patience, 0.0);
            let mut stopped_at = None;
            for epoch in 0..10 {
                if es.step(1.0 + epoch as f64) == MonitorState::Stopped {
                    stopped_at = Some(epoch);
                    break;
                }
            }
            assert_eq!(stopped_at, Some(patience + 1));
        }
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut es = EarlyStopping::new(1, 0.0);
        es.step(1.0);
        es.step(1.1);
        assert!(!es.is_best());
        assert_eq!(es.step(0.8), MonitorState::Watching);
        assert!(es.is_best());
        assert_eq!(es.step(0.9), MonitorState::Watching);
        assert_eq!(es.step(0.95), MonitorState::Stopped);
        assert_eq!(es.best(), Some(0.8));
        assert_eq!(es.best_epoch(), Some(2));
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut es = EarlyStopping::new(0, 0.0);
        es.step(1.0);
        assert_eq!(es.step(2.0), MonitorState::Stopped);
        assert_eq!(es.step(0.1), MonitorState::Stopped);
        assert_eq!(es.best(), Some(1.0));
    }

    #[test]
    fn test_nan_is_never_best() {
        let mut es = EarlyStopping::new(3, 0.0);
        es.step(f64::NAN);
        assert!(!es.is_best());
        assert_eq!(es.best(), None);
        es.step(0.5);
        assert!(es.is_best());
    }

    #[test]
    fn test_equal_loss_is_not_an_improvement() {
        let mut es = EarlyStopping::new(2, 0.0);
        es.step(0.5);
        es.step(0.5);
        assert!(!es.is_best());
    }
}
