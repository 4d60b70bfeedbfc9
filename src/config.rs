//! Experiment configuration
//!
//! One [`EnsembleConfig`] is built at startup (from TOML, then CLI
//! overrides) and passed by reference to every stage. Nothing reads
//! configuration from global state.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dataset::NUM_CLASSES;
use crate::utils::{EnsembleError, Result};

/// Class-weight preset 1
pub const CLASS_WEIGHTS_UNIFORM_EMOTION: [f64; NUM_CLASSES] = [0.3, 0.3, 0.3, 1.7];

/// Class-weight preset 2 (default)
pub const CLASS_WEIGHTS_CALIBRATED: [f64; NUM_CLASSES] =
    [0.3198680179, 0.246494733, 0.2484349259, 1.74527696];

/// Resolve a class-weight preset number
pub fn class_weight_preset(preset: u8) -> Result<Vec<f64>> {
    match preset {
        1 => Ok(CLASS_WEIGHTS_UNIFORM_EMOTION.to_vec()),
        2 => Ok(CLASS_WEIGHTS_CALIBRATED.to_vec()),
        other => Err(EnsembleError::Config(format!(
            "unknown class-weight preset {} (expected 1 or 2)",
            other
        ))),
    }
}

/// Corpus and preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Labeled training corpus
    pub train_path: PathBuf,
    /// Labeled held-out development corpus
    pub dev_path: PathBuf,
    /// Labeled held-out test corpus
    pub test_path: PathBuf,
    /// Unlabeled corpus to write a submission for
    pub submission_input_path: Option<PathBuf>,
    /// GloVe-style word vectors
    pub embedding_path: Option<PathBuf>,
    /// JSON word→id map for the auxiliary tokenizer
    pub aux_vocab_path: Option<PathBuf>,
    /// Vocabulary size including reserved ids
    pub vocab_size: usize,
    /// Keep the full vocabulary instead of truncating to `vocab_size`
    pub fill_vocab: bool,
    pub sentence_pad_len: usize,
    pub aux_pad_len: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("data/train.txt"),
            dev_path: PathBuf::from("data/dev.txt"),
            test_path: PathBuf::from("data/test.txt"),
            submission_input_path: None,
            embedding_path: None,
            aux_vocab_path: None,
            vocab_size: 10000,
            fill_vocab: true,
            sentence_pad_len: 30,
            aux_pad_len: 30,
        }
    }
}

/// Predictor dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorSettings {
    pub embedding_dim: usize,
    pub aux_embedding_dim: usize,
    pub contextual_dim: usize,
    pub hidden_size: usize,
    pub dropout: f64,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            embedding_dim: 300,
            aux_embedding_dim: 64,
            contextual_dim: 64,
            hidden_size: 1500,
            dropout: 0.2,
        }
    }
}

/// Optimisation, stopping and restart policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub folds: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Exponential learning-rate decay per epoch
    pub lr_gamma: f64,
    pub max_epochs: usize,
    /// Epochs without improvement tolerated before stopping
    pub patience: usize,
    /// Minimum decrease that counts as an improvement
    pub min_delta: f64,
    /// Gradient-norm clip bound
    pub grad_clip: f32,
    /// Validation loss above which a run is considered diverged
    pub divergence_threshold: f64,
    /// Epoch indices up to and including this one never count as diverged
    pub divergence_warmup_epochs: usize,
    /// Restarts allowed per fold before giving up
    pub max_divergence_restarts: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            folds: 9,
            batch_size: 128,
            learning_rate: 5e-4,
            lr_gamma: 0.2,
            max_epochs: 200,
            patience: 1,
            min_delta: 0.0,
            grad_clip: 0.888,
            divergence_threshold: 1.3,
            divergence_warmup_epochs: 4,
            max_divergence_restarts: 10,
            seed: 0,
        }
    }
}

/// Per-example loss on the primary head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossMode {
    /// Cross-entropy
    Ce,
    /// Focal loss
    Focal,
}

impl FromStr for LossMode {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ce" => Ok(LossMode::Ce),
            "focal" => Ok(LossMode::Focal),
            other => Err(EnsembleError::UnknownLossMode(other.to_string())),
        }
    }
}

/// Loss composition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    pub mode: LossMode,
    pub focal_gamma: f64,
    /// Mixing weight of the binary head (λ1)
    pub lambda_binary: f64,
    /// Mixing weight of the auxiliary regression head (λ2)
    pub lambda_emotion: f64,
    /// Exponent applied to every class weight
    pub flatten: f64,
    /// Per-class weights for happy, angry, sad, others
    pub class_weights: Vec<f64>,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            mode: LossMode::Ce,
            focal_gamma: 2.0,
            lambda_binary: 0.0,
            lambda_emotion: 0.0,
            flatten: 1.0,
            class_weights: CLASS_WEIGHTS_CALIBRATED.to_vec(),
        }
    }
}

/// Where results go
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Suffix appended to the submission file name
    pub postname: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            postname: String::new(),
        }
    }
}

/// Complete experiment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub data: DataConfig,
    pub predictor: PredictorSettings,
    pub training: TrainingConfig,
    pub loss: LossConfig,
    pub output: OutputConfig,
}

impl EnsembleConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        load_toml_config(path)
    }

    /// Save as pretty TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EnsembleError::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration for values no run can use
    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        let l = &self.loss;
        let d = &self.data;
        let p = &self.predictor;

        if t.folds < 2 {
            return Err(EnsembleError::Config("folds must be at least 2".into()));
        }
        if t.batch_size == 0 {
            return Err(EnsembleError::Config("batch_size must be positive".into()));
        }
        if t.learning_rate <= 0.0 || !t.learning_rate.is_finite() {
            return Err(EnsembleError::Config("learning_rate must be positive".into()));
        }
        if t.lr_gamma <= 0.0 {
            return Err(EnsembleError::Config("lr_gamma must be positive".into()));
        }
        if t.grad_clip <= 0.0 {
            return Err(EnsembleError::Config("grad_clip must be positive".into()));
        }
        if l.class_weights.len() != NUM_CLASSES {
            return Err(EnsembleError::InvalidClassWeights(format!(
                "expected {} weights, got {}",
                NUM_CLASSES,
                l.class_weights.len()
            )));
        }
        if l.lambda_binary < 0.0 || l.lambda_emotion < 0.0 {
            return Err(EnsembleError::Config("mixing weights must be non-negative".into()));
        }
        if l.focal_gamma < 0.0 {
            return Err(EnsembleError::Config("focal_gamma must be non-negative".into()));
        }
        if d.vocab_size <= crate::dataset::vocab::NUM_RESERVED && !d.fill_vocab {
            return Err(EnsembleError::Config(format!(
                "vocab_size {} leaves no room beyond the reserved ids",
                d.vocab_size
            )));
        }
        if d.sentence_pad_len == 0 || d.aux_pad_len == 0 {
            return Err(EnsembleError::Config("pad lengths must be positive".into()));
        }
        if p.embedding_dim == 0 || p.hidden_size == 0 {
            return Err(EnsembleError::Config("predictor dimensions must be positive".into()));
        }
        if !(0.0..1.0).contains(&p.dropout) {
            return Err(EnsembleError::Config("dropout must be in [0, 1)".into()));
        }

        Ok(())
    }
}

/// Load any TOML-backed config type
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(EnsembleError::PathNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
