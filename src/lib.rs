//! # Emotion Ensemble
//!
//! K-fold ensemble training for three-turn conversational emotion
//! classification (happy, angry, sad, others) with the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: corpus loading, vocabulary, encoding, stratified folds, batching
//! - `model`: embeddings, the predictor interface and the hierarchical baseline
//! - `training`: loss composition, divergence guard, early stopping,
//!   prediction cache, fold trainer and cross-validation
//! - `inference`: batched prediction, majority voting, submission files
//! - `utils`: errors, logging and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use emotion_ensemble::backend::{default_device, TrainingBackend};
//! use emotion_ensemble::config::EnsembleConfig;
//! use emotion_ensemble::training::run_experiment;
//!
//! let config = EnsembleConfig::load("config/default.toml".as_ref())?;
//! let summary = run_experiment::<TrainingBackend>(&config, default_device())?;
//! println!("dev micro-F1: {:.4}", summary.dev.micro_f1);
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

pub use config::EnsembleConfig;
pub use dataset::{Emotion, LabelTriple, NUM_CLASSES};
pub use inference::{majority, EnsembleResult};
pub use training::{run_experiment, CrossValidator, FoldTrainer, LossComposer};
pub use utils::{EnsembleError, Result};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
