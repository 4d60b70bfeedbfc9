//! Fold Trainer
//!
//! Trains one cross-validation fold. Each attempt builds a fresh model,
//! optimizer and learning-rate schedule, then runs the epoch loop:
//!
//! 1. shuffled mini-batches with gradient-norm clipping
//! 2. mean validation loss on the fold's held-out part
//! 3. divergence check, which abandons the attempt
//! 4. early-stopping step
//! 5. dev/test inference when the prediction cache wants this epoch
//! 6. loop exit once stopped
//!
//! A stopping epoch only runs inference when the cache is still empty.
//!
//! A diverged attempt discards all of its state. Once the restart budget
//! is spent the fold fails with [`EnsembleError::Divergence`].

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    grad_clipping::GradientClippingConfig,
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion},
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::checkpoint::{FoldPredictions, PredictionCache};
use super::divergence::DivergenceGuard;
use super::early_stopping::{EarlyStopping, MonitorState};
use super::loss::LossComposer;
use super::scheduler::LearningRateScheduler;
use crate::config::TrainingConfig;
use crate::dataset::{ConversationBatch, ConversationBatcher, ConversationDataset};
use crate::inference::predict_classes;
use crate::model::{EmotionPredictor, PredictorFactory};
use crate::utils::{EnsembleError, Result, RunningAverage, TrainingLogger};

/// The two global held-out sets every fold predicts
#[derive(Debug, Clone, Copy)]
pub struct HeldOutSets<'a> {
    pub dev: &'a ConversationDataset,
    pub test: &'a ConversationDataset,
}

/// Losses of one completed epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub learning_rate: f64,
    pub is_best: bool,
}

/// Result of a fold that converged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub fold: usize,
    /// Attempts used, including the successful one
    pub attempts: usize,
    pub predictions: FoldPredictions,
    pub best_epoch: Option<usize>,
    pub best_val_loss: Option<f64>,
    /// Epochs of the successful attempt
    pub history: Vec<EpochRecord>,
    pub stopped_early: bool,
}

enum AttemptOutcome {
    Converged {
        predictions: FoldPredictions,
        monitor: EarlyStopping,
        history: Vec<EpochRecord>,
    },
    Diverged,
}

/// Trains folds with a shared configuration, loss and batcher
pub struct FoldTrainer<'a, B: AutodiffBackend, F: PredictorFactory<B>> {
    config: &'a TrainingConfig,
    factory: &'a F,
    composer: &'a LossComposer,
    batcher: &'a ConversationBatcher,
    guard: DivergenceGuard,
    device: B::Device,
}

impl<'a, B, F> FoldTrainer<'a, B, F>
where
    B: AutodiffBackend,
    F: PredictorFactory<B>,
{
    pub fn new(
        config: &'a TrainingConfig,
        factory: &'a F,
        composer: &'a LossComposer,
        batcher: &'a ConversationBatcher,
        device: B::Device,
    ) -> Self {
        Self {
            config,
            factory,
            composer,
            batcher,
            guard: DivergenceGuard::from_config(config),
            device,
        }
    }

    /// Train one fold until it converges or runs out of attempts
    pub fn train(
        &self,
        fold: usize,
        total_folds: usize,
        train: &ConversationDataset,
        validation: &ConversationDataset,
        held_out: HeldOutSets<'_>,
    ) -> Result<FoldOutcome> {
        if train.is_empty() || validation.is_empty() {
            return Err(EnsembleError::Training(format!(
                "fold {} has {} training and {} validation examples",
                fold,
                train.len(),
                validation.len()
            )));
        }

        let mut logger = TrainingLogger::new(fold, total_folds, self.config.max_epochs);

        for attempt in 0..self.guard.max_attempts() {
            logger.start_attempt(attempt);

            match self.run_attempt(fold, attempt, train, validation, held_out, &mut logger)? {
                AttemptOutcome::Diverged => continue,
                AttemptOutcome::Converged {
                    predictions,
                    monitor,
                    history,
                } => {
                    logger.log_complete(monitor.best_epoch(), monitor.best());
                    return Ok(FoldOutcome {
                        fold,
                        attempts: attempt + 1,
                        predictions,
                        best_epoch: monitor.best_epoch(),
                        best_val_loss: monitor.best(),
                        history,
                        stopped_early: monitor.state() == MonitorState::Stopped,
                    });
                }
            }
        }

        Err(EnsembleError::Divergence {
            fold,
            attempts: self.guard.max_attempts(),
        })
    }

    fn run_attempt(
        &self,
        fold: usize,
        attempt: usize,
        train: &ConversationDataset,
        validation: &ConversationDataset,
        held_out: HeldOutSets<'_>,
        logger: &mut TrainingLogger,
    ) -> Result<AttemptOutcome> {
        let mut model = self.factory.build(&self.device);
        let mut optimizer = AdamConfig::new()
            .with_grad_clipping(Some(GradientClippingConfig::Norm(self.config.grad_clip)))
            .init::<B, F::Model>();
        let mut scheduler =
            LearningRateScheduler::exponential(self.config.learning_rate, self.config.lr_gamma);
        let mut monitor = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut cache = PredictionCache::new();
        let mut history = Vec::new();

        let seed = self
            .config
            .seed
            .wrapping_add((fold as u64).wrapping_mul(1000))
            .wrapping_add(attempt as u64);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let batch_size = self.config.batch_size.max(1);

        for epoch in 0..self.config.max_epochs {
            logger.start_epoch(epoch);
            let learning_rate = scheduler.get_lr();

            let mut indices: Vec<usize> = (0..train.len()).collect();
            indices.shuffle(&mut rng);

            let mut train_loss = RunningAverage::new();
            for chunk in indices.chunks(batch_size) {
                let items: Vec<_> = chunk.iter().filter_map(|&i| train.get(i)).collect();
                if items.is_empty() {
                    continue;
                }

                let batch: ConversationBatch<B> = self.batcher.batch(items, &self.device);
                let targets = batch.targets.ok_or_else(|| {
                    EnsembleError::Training("training batch contains unlabeled items".to_string())
                })?;

                let output = model.forward(&batch.turns);
                let loss = self.composer.forward(&output, &targets).total;
                let loss_value: f64 = loss.clone().into_scalar().elem();
                train_loss.add_weighted(loss_value, batch.size);

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(learning_rate, model, grads);
            }
            scheduler.step();

            let inner = model.valid();
            let inner_device = inner.devices().into_iter().next().unwrap_or_default();
            let val_loss = self.validation_loss(&inner, validation, &inner_device)?;

            if self.guard.has_diverged(epoch, val_loss) {
                logger.log_divergence(val_loss, self.guard.threshold());
                return Ok(AttemptOutcome::Diverged);
            }

            let state = monitor.step(val_loss);
            let is_best = monitor.is_best();
            logger.end_epoch(train_loss.average(), val_loss, learning_rate);
            history.push(EpochRecord {
                epoch,
                train_loss: train_loss.average(),
                val_loss,
                learning_rate,
                is_best,
            });

            if is_best {
                logger.log_new_best(val_loss);
            }

            // A stopping epoch is never best, so it only runs to fill an empty cache
            if cache.wants(is_best) {
                let predict = |dataset: &ConversationDataset| {
                    predict_classes::<B::InnerBackend, _>(
                        &inner,
                        dataset,
                        self.batcher,
                        batch_size,
                        &inner_device,
                    )
                };
                let dev = predict(held_out.dev)?;
                let test = predict(held_out.test)?;
                cache.offer(is_best, epoch, dev, test);
            }

            if state == MonitorState::Stopped {
                logger.log_early_stop(self.config.patience);
                break;
            }
        }

        Ok(AttemptOutcome::Converged {
            predictions: cache.into_predictions()?,
            monitor,
            history,
        })
    }

    /// Example-weighted mean loss, without gradients
    fn validation_loss<M>(
        &self,
        model: &M,
        dataset: &ConversationDataset,
        device: &<B::InnerBackend as Backend>::Device,
    ) -> Result<f64>
    where
        M: EmotionPredictor<B::InnerBackend>,
    {
        let mut average = RunningAverage::new();

        for start in (0..dataset.len()).step_by(self.config.batch_size.max(1)) {
            let end = (start + self.config.batch_size).min(dataset.len());
            let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: ConversationBatch<B::InnerBackend> = self.batcher.batch(items, device);
            let targets = batch.targets.ok_or_else(|| {
                EnsembleError::Training("validation batch contains unlabeled items".to_string())
            })?;

            let output = model.forward(&batch.turns);
            let loss: f64 = self.composer.forward(&output, &targets).total.into_scalar().elem();
            average.add_weighted(loss, batch.size);
        }

        Ok(average.average())
    }
}
