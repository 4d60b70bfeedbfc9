//! Inference over held-out sets and ensemble aggregation
//!
//! This module provides:
//! - Batched class prediction for a trained fold model
//! - Majority voting across fold predictions
//! - The tab-separated submission writer

pub mod ensemble;
pub mod runner;
pub mod submission;

pub use ensemble::{majority, EnsembleResult};
pub use runner::predict_classes;
pub use submission::{render_submission, write_submission};
