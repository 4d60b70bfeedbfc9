//! Cross-Validation Orchestrator
//!
//! Shuffles the training corpus with the configured seed, splits it into K
//! stratified folds and trains them one after another. Every fold sees the
//! same read-only vocabulary, batcher and held-out sets; nothing else is
//! shared between folds.

use std::fs;
use std::path::Path;

use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::fold::{FoldOutcome, FoldTrainer, HeldOutSets};
use super::loss::LossComposer;
use crate::config::TrainingConfig;
use crate::dataset::{shuffled_indices, stratified_folds, ConversationBatcher, ConversationDataset, Fold};
use crate::inference::EnsembleResult;
use crate::model::PredictorFactory;
use crate::utils::{EnsembleError, Result};

/// Stratified folds over a seeded shuffle, in original corpus indices
pub fn plan_folds(labels: &[usize], k: usize, seed: u64) -> Result<Vec<Fold>> {
    let order = shuffled_indices(labels.len(), seed);
    let shuffled: Vec<usize> = order.iter().map(|&i| labels[i]).collect();

    let to_original = |positions: Vec<usize>| {
        let mut indices: Vec<usize> = positions.into_iter().map(|p| order[p]).collect();
        indices.sort_unstable();
        indices
    };

    Ok(stratified_folds(&shuffled, k)?
        .into_iter()
        .map(|fold| Fold {
            index: fold.index,
            train: to_original(fold.train),
            validation: to_original(fold.validation),
        })
        .collect())
}

/// Everything the K folds produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub dev: EnsembleResult,
    pub test: EnsembleResult,
    pub folds: Vec<FoldOutcome>,
}

impl CrossValidationReport {
    /// Attempts summed over folds; more than the fold count means restarts
    pub fn total_attempts(&self) -> usize {
        self.folds.iter().map(|f| f.attempts).sum()
    }

    /// Write `dev_ensemble.json`, `test_ensemble.json` and `folds.json`
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        self.dev.save(&dir.join("dev_ensemble.json"))?;
        self.test.save(&dir.join("test_ensemble.json"))?;
        fs::write(dir.join("folds.json"), serde_json::to_string_pretty(&self.folds)?)?;
        Ok(())
    }
}

pub struct CrossValidator<'a, B: AutodiffBackend, F: PredictorFactory<B>> {
    trainer: FoldTrainer<'a, B, F>,
    folds: usize,
    seed: u64,
}

impl<'a, B, F> CrossValidator<'a, B, F>
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
            trainer: FoldTrainer::new(config, factory, composer, batcher, device),
            folds: config.folds,
            seed: config.seed,
        }
    }

    /// Train all folds and collect their held-out predictions
    pub fn run(
        &self,
        train: &ConversationDataset,
        held_out: HeldOutSets<'_>,
    ) -> Result<CrossValidationReport> {
        let labels = train.class_labels().ok_or_else(|| {
            EnsembleError::Dataset("training corpus contains unlabeled conversations".to_string())
        })?;
        let folds = plan_folds(&labels, self.folds, self.seed)?;

        let mut dev = EnsembleResult::new("dev");
        let mut test = EnsembleResult::new("test");
        let mut outcomes = Vec::with_capacity(folds.len());

        for fold in &folds {
            info!(
                "Fold {}/{}: {} training, {} validation conversations",
                fold.index + 1,
                folds.len(),
                fold.train.len(),
                fold.validation.len()
            );

            let outcome = self.trainer.train(
                fold.index,
                folds.len(),
                &train.subset(&fold.train),
                &train.subset(&fold.validation),
                held_out,
            )?;

            dev.push(outcome.predictions.dev.clone())?;
            test.push(outcome.predictions.test.clone())?;
            outcomes.push(outcome);
        }

        Ok(CrossValidationReport {
            dev,
            test,
            folds: outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    use crate::config::LossConfig;
    use crate::dataset::{ConversationItem, EncodedTurn, Emotion, LabelTriple, Vocabulary};
    use crate::model::{HierarchicalFactory, HierarchicalPredictorConfig, LayerAveragedEncoder};

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_planned_folds_partition_the_corpus() {
        let labels: Vec<usize> = (0..23).map(|i| if i % 3 == 0 { 3 } else { i % 3 - 1 }).collect();
        let folds = plan_folds(&labels, 4, 7).unwrap();

        let mut seen = vec![0usize; labels.len()];
        for fold in &folds {
            for &i in &fold.validation {
                seen[i] += 1;
                assert!(!fold.train.contains(&i));
            }
            assert_eq!(fold.train.len() + fold.validation.len(), labels.len());
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn test_planned_folds_keep_class_proportions() {
        let labels: Vec<usize> = (0..40).map(|i| if i < 30 { 3 } else { i % 3 }).collect();
        let folds = plan_folds(&labels, 5, 1).unwrap();

        for fold in &folds {
            let others = fold.validation.iter().filter(|&&i| labels[i] == 3).count();
            assert_eq!(fold.validation.len(), 8);
            assert_eq!(others, 6);
        }
    }

    #[test]
    fn test_different_seeds_give_different_partitions() {
        let labels = vec![0usize; 20];
        let a = plan_folds(&labels, 2, 1).unwrap();
        let b = plan_folds(&labels, 2, 2).unwrap();
        assert_ne!(a[0].validation, b[0].validation);
    }

    fn item(word: i64, emotion: Option<Emotion>) -> ConversationItem {
        let turn = EncodedTurn {
            ids: vec![word, 0],
            length: 1,
            aux_ids: vec![word],
        };
        ConversationItem {
            turns: [turn.clone(), turn.clone(), turn],
            labels: emotion.map(LabelTriple::from),
        }
    }

    #[test]
    fn test_run_collects_one_row_per_fold() {
        let config = TrainingConfig {
            folds: 2,
            batch_size: 4,
            max_epochs: 2,
            divergence_threshold: f64::MAX,
            ..TrainingConfig::default()
        };
        let predictor = HierarchicalPredictorConfig::new(7, 7, 2)
            .with_embedding_dim(3)
            .with_aux_embedding_dim(2)
            .with_hidden_size(4)
            .with_dropout(0.0);
        let factory = HierarchicalFactory::new(predictor, None).unwrap();
        let composer = LossComposer::new(&LossConfig::default()).unwrap();
        let vocab = Arc::new(Vocabulary::from_words(["a", "b", "c", "d"]));
        let batcher = ConversationBatcher::new(vocab, Arc::new(LayerAveragedEncoder::new(2, 0)));

        let train = ConversationDataset::new(
            (0..8)
                .map(|i| item(3 + (i % 4) as i64, Some(Emotion::ALL[i % 4])))
                .collect(),
        );
        let dev = ConversationDataset::new(vec![item(3, Some(Emotion::Happy)); 3]);
        let test = ConversationDataset::new(vec![item(6, None); 2]);

        let validator =
            CrossValidator::<TestBackend, _>::new(&config, &factory, &composer, &batcher, Default::default());
        let report = validator
            .run(&train, HeldOutSets { dev: &dev, test: &test })
            .unwrap();

        assert_eq!(report.dev.num_folds(), 2);
        assert_eq!(report.dev.num_examples(), 3);
        assert_eq!(report.test.num_examples(), 2);
        assert_eq!(report.total_attempts(), 2);

        let dir = TempDir::new().unwrap();
        report.save(dir.path()).unwrap();
        assert!(dir.path().join("folds.json").exists());
        assert_eq!(EnsembleResult::load(&dir.path().join("test_ensemble.json")).unwrap(), report.test);
    }

    #[test]
    fn test_unlabeled_training_corpus_is_rejected() {
        let config = TrainingConfig::default();
        let predictor = HierarchicalPredictorConfig::new(7, 7, 2);
        let factory = HierarchicalFactory::new(predictor, None).unwrap();
        let composer = LossComposer::new(&LossConfig::default()).unwrap();
        let vocab = Arc::new(Vocabulary::from_words(["a"]));
        let batcher = ConversationBatcher::new(vocab, Arc::new(LayerAveragedEncoder::new(2, 0)));

        let train = ConversationDataset::new(vec![item(3, None); 4]);
        let empty = ConversationDataset::default();
        let validator =
            CrossValidator::<TestBackend, _>::new(&config, &factory, &composer, &batcher, Default::default());

        assert!(validator
            .run(&train, HeldOutSets { dev: &empty, test: &empty })
            .is_err());
    }
}
