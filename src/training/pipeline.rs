//! End-to-end experiment: load, encode, cross-validate, vote, evaluate
//!
//! Output layout inside `<output.dir>/run_<timestamp>/`:
//! - `config.toml`: the configuration the run used
//! - `dev_ensemble.json`, `test_ensemble.json`: per-fold predictions
//! - `folds.json`: per-fold outcomes and epoch histories
//! - `metrics.json`: voted dev/test scores and encoding counters
//! - `vocab.json`: the id→word table
//! - `test<postname>.txt`: submission, when an unlabeled corpus is configured

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use burn::tensor::backend::AutodiffBackend;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cross_validation::{CrossValidationReport, CrossValidator};
use super::fold::HeldOutSets;
use super::loss::LossComposer;
use crate::config::EnsembleConfig;
use crate::dataset::{
    load_corpus, AuxTokenizer, ConversationBatcher, ConversationDataset, Corpus, EncodingStats,
    JsonVocabTokenizer, LabelMode, SentenceEncoder, UnknownPolicy, Vocabulary,
};
use crate::inference::write_submission;
use crate::model::{HierarchicalFactory, HierarchicalPredictorConfig, LayerAveragedEncoder, StaticEmbeddings};
use crate::utils::{EmotionMetrics, Result};

/// Encoded corpora and the shared read-only collaborators
pub struct PreparedData {
    pub vocab: Arc<Vocabulary>,
    pub aux_vocab_size: usize,
    pub train: ConversationDataset,
    pub dev: ConversationDataset,
    pub test: ConversationDataset,
    pub dev_gold: Vec<usize>,
    pub test_gold: Vec<usize>,
    /// Unlabeled corpus the submission is written for
    pub submission: Option<Corpus>,
    pub stats: DataStats,
}

/// Encoding counters per split
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DataStats {
    pub train: EncodingStats,
    pub dev: EncodingStats,
    pub test: EncodingStats,
}

/// Voted scores of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub output_dir: PathBuf,
    pub dev: EmotionMetrics,
    pub test: EmotionMetrics,
    pub total_attempts: usize,
    pub encoding: DataStats,
}

/// Load and encode every corpus the configuration names
pub fn prepare_data(config: &EnsembleConfig) -> Result<PreparedData> {
    let data = &config.data;

    let train_corpus = load_corpus(&data.train_path, LabelMode::Labeled)?;
    let dev_corpus = load_corpus(&data.dev_path, LabelMode::Labeled)?;
    let test_corpus = load_corpus(&data.test_path, LabelMode::Labeled)?;
    let submission = data
        .submission_input_path
        .as_deref()
        .map(|path| load_corpus(path, LabelMode::Unlabeled))
        .transpose()?;

    let vocab = Vocabulary::build(
        &[&train_corpus, &dev_corpus, &test_corpus],
        data.vocab_size,
        data.fill_vocab,
    )?;

    let aux: Box<dyn AuxTokenizer> = match &data.aux_vocab_path {
        Some(path) => Box::new(JsonVocabTokenizer::load(path, data.aux_pad_len)?),
        None => Box::new(JsonVocabTokenizer::from_vocabulary(&vocab, data.aux_pad_len)),
    };

    let fold_encoder = SentenceEncoder::new(&vocab, data.sentence_pad_len, UnknownPolicy::MapToUnk);
    let held_out_encoder = SentenceEncoder::new(&vocab, data.sentence_pad_len, UnknownPolicy::Drop);

    let (train_items, train_stats) = fold_encoder.encode_corpus(&train_corpus, aux.as_ref());
    let (dev_items, dev_stats) = held_out_encoder.encode_corpus(&dev_corpus, aux.as_ref());
    let (test_items, test_stats) = held_out_encoder.encode_corpus(&test_corpus, aux.as_ref());

    let stats = DataStats {
        train: train_stats,
        dev: dev_stats,
        test: test_stats,
    };
    let mut all = EncodingStats::default();
    for (name, split) in [("train", &stats.train), ("dev", &stats.dev), ("test", &stats.test)] {
        info!(
            "Encoded {}: {} conversations, {} empty turns, {} unknown tokens, {} truncated turns",
            name, split.conversations, split.empty_turns, split.unknown_tokens, split.truncated_turns
        );
        all.merge(split);
    }
    if all.empty_turns > 0 {
        warn!("{} turns had no known tokens and were encoded as <empty>", all.empty_turns);
    }

    let dev_gold = dev_corpus.class_labels()?;
    let test_gold = test_corpus.class_labels()?;

    Ok(PreparedData {
        vocab: Arc::new(vocab),
        aux_vocab_size: aux.vocab_size(),
        train: ConversationDataset::new(train_items),
        dev: ConversationDataset::new(dev_items),
        test: ConversationDataset::new(test_items),
        dev_gold,
        test_gold,
        submission,
        stats,
    })
}

/// Run the full cross-validated ensemble experiment
pub fn run_experiment<B: AutodiffBackend>(
    config: &EnsembleConfig,
    device: B::Device,
) -> Result<ExperimentSummary> {
    config.validate()?;

    let composer = LossComposer::new(&config.loss)?;
    let prepared = prepare_data(config)?;

    let embeddings = match &config.data.embedding_path {
        Some(path) => {
            let table = StaticEmbeddings::load_glove(
                path,
                &prepared.vocab,
                config.predictor.embedding_dim,
                config.training.seed,
            )?;
            info!(
                "Pretrained vectors cover {}/{} vocabulary entries",
                table.found, table.vocab_size
            );
            Some(Arc::new(table))
        }
        None => {
            warn!("No embedding file configured, word embeddings start random");
            None
        }
    };

    let settings = &config.predictor;
    let predictor = HierarchicalPredictorConfig::new(
        prepared.vocab.len(),
        prepared.aux_vocab_size,
        settings.contextual_dim,
    )
    .with_embedding_dim(settings.embedding_dim)
    .with_aux_embedding_dim(settings.aux_embedding_dim)
    .with_hidden_size(settings.hidden_size)
    .with_dropout(settings.dropout);
    let factory = HierarchicalFactory::new(predictor, embeddings)?;

    let contextual = Arc::new(LayerAveragedEncoder::new(settings.contextual_dim, config.training.seed));
    let batcher = ConversationBatcher::new(prepared.vocab.clone(), contextual);

    let validator =
        CrossValidator::<B, _>::new(&config.training, &factory, &composer, &batcher, device);
    let report = validator.run(
        &prepared.train,
        HeldOutSets {
            dev: &prepared.dev,
            test: &prepared.test,
        },
    )?;

    let dev_votes = report.dev.majority_vote()?;
    let test_votes = report.test.majority_vote()?;
    let dev = EmotionMetrics::from_predictions(&dev_votes, &prepared.dev_gold);
    let test = EmotionMetrics::from_predictions(&test_votes, &prepared.test_gold);
    info!("Dev (majority vote):\n{}", dev.display());
    info!("Test (majority vote):\n{}", test.display());

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let output_dir = config.output.dir.join(format!("run_{}", timestamp));

    let summary = ExperimentSummary {
        output_dir: output_dir.clone(),
        dev,
        test,
        total_attempts: report.total_attempts(),
        encoding: prepared.stats,
    };
    save_artifacts(config, &report, &summary)?;
    prepared.vocab.save(&output_dir.join("vocab.json"))?;

    if let Some(corpus) = &prepared.submission {
        let path = output_dir.join(format!("test{}.txt", config.output.postname));
        write_submission(corpus, &test_votes, &path)?;
    }

    Ok(summary)
}

fn save_artifacts(
    config: &EnsembleConfig,
    report: &CrossValidationReport,
    summary: &ExperimentSummary,
) -> Result<()> {
    let dir = &summary.output_dir;
    report.save(dir)?;
    config.save(&dir.join("config.toml"))?;
    fs::write(dir.join("metrics.json"), serde_json::to_string_pretty(summary)?)?;

    if report.total_attempts() > report.folds.len() {
        warn!(
            "{} divergence restarts across {} folds",
            report.total_attempts() - report.folds.len(),
            report.folds.len()
        );
    }
    info!("Artifacts written to {:?}", dir);
    Ok(())
}
