//! Training orchestration
//!
//! Leaves first:
//! - [`loss`]: composes class, binary and emotion-regression losses
//! - [`divergence`]: decides when a fold attempt has diverged
//! - [`early_stopping`]: patience-based monitor over validation losses
//! - [`checkpoint`]: keeps the best epoch's held-out predictions
//! - [`scheduler`]: per-epoch learning-rate decay
//! - [`fold`]: one fold's attempt and epoch loops
//! - [`cross_validation`]: stratified folds trained in sequence
//! - [`pipeline`]: the full experiment from corpora to artifacts

pub mod checkpoint;
pub mod cross_validation;
pub mod divergence;
pub mod early_stopping;
pub mod fold;
pub mod loss;
pub mod pipeline;
pub mod scheduler;

pub use checkpoint::{FoldPredictions, PredictionCache};
pub use cross_validation::{plan_folds, CrossValidationReport, CrossValidator};
pub use divergence::DivergenceGuard;
pub use early_stopping::{EarlyStopping, MonitorState};
pub use fold::{EpochRecord, FoldOutcome, FoldTrainer, HeldOutSets};
pub use loss::{LossBreakdown, LossComposer};
pub use pipeline::{prepare_data, run_experiment, DataStats, ExperimentSummary, PreparedData};
pub use scheduler::LearningRateScheduler;
