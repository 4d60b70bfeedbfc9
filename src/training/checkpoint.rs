//! Checkpoint-by-prediction cache
//!
//! Instead of saving model weights, a fold keeps the held-out predictions
//! made at its best epoch. The cache is overwritten when an epoch is the
//! best so far, and filled once from the first epoch that runs inference
//! even when that epoch is not the best, so a fold always has predictions.

use serde::{Deserialize, Serialize};

use crate::utils::{EnsembleError, Result};

/// Held-out predictions of one fold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldPredictions {
    pub dev: Vec<usize>,
    pub test: Vec<usize>,
    /// 0-based epoch the predictions come from
    pub epoch: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionCache {
    cached: Option<FoldPredictions>,
}

impl PredictionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an epoch with this best-flag would change the cache
    pub fn wants(&self, is_best: bool) -> bool {
        is_best || self.cached.is_none()
    }

    /// Offer one epoch's predictions. Returns true when they were stored.
    pub fn offer(&mut self, is_best: bool, epoch: usize, dev: Vec<usize>, test: Vec<usize>) -> bool {
        if !self.wants(is_best) {
            return false;
        }
        self.cached = Some(FoldPredictions { dev, test, epoch });
        true
    }

    pub fn is_empty(&self) -> bool {
        self.cached.is_none()
    }

    pub fn epoch(&self) -> Option<usize> {
        self.cached.as_ref().map(|p| p.epoch)
    }

    /// Take the cached predictions, failing if none were ever stored
    pub fn into_predictions(self) -> Result<FoldPredictions> {
        self.cached.ok_or_else(|| {
            EnsembleError::Training("no epoch produced held-out predictions".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_takes_non_best_epoch() {
        let mut cache = PredictionCache::new();
        assert!(cache.offer(false, 0, vec![1, 2], vec![3]));
        assert_eq!(cache.epoch(), Some(0));
    }

    #[test]
    fn test_non_best_does_not_overwrite() {
        let mut cache = PredictionCache::new();
        cache.offer(true, 0, vec![0], vec![0]);
        assert!(!cache.offer(false, 1, vec![1], vec![1]));

        let predictions = cache.into_predictions().unwrap();
        assert_eq!(predictions.dev, vec![0]);
        assert_eq!(predictions.epoch, 0);
    }

    #[test]
    fn test_best_overwrites() {
        let mut cache = PredictionCache::new();
        cache.offer(true, 0, vec![0], vec![0]);
        cache.offer(true, 3, vec![2], vec![1]);

        let predictions = cache.into_predictions().unwrap();
        assert_eq!(predictions.test, vec![1]);
        assert_eq!(predictions.epoch, 3);
    }

    #[test]
    fn test_empty_cache_is_an_error() {
        assert!(PredictionCache::new().into_predictions().is_err());
    }
}
