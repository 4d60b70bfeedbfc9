//! Error Handling Module
//!
//! Defines the error type shared by every stage of the ensemble pipeline.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for emotion-ensemble operations
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// A corpus row carried a label outside the emotion set
    #[error("Unknown label '{label}' on line {line}")]
    UnknownLabel { line: usize, label: String },

    /// A corpus row could not be split into the expected columns
    #[error("Malformed row on line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    /// Requested vocabulary is larger than the corpus allows
    #[error("Vocabulary size {requested} exceeds the {available} distinct tokens in the corpus")]
    VocabularyTooSmall { requested: usize, available: usize },

    /// Class-weight vector has the wrong shape or values
    #[error("Invalid class weights: {0}")]
    InvalidClassWeights(String),

    /// Unrecognized loss-mode name
    #[error("Unknown loss mode '{0}' (expected 'ce' or 'focal')")]
    UnknownLossMode(String),

    /// Every restart of a fold diverged
    #[error("Fold {fold} diverged on all {attempts} attempts")]
    Divergence { fold: usize, attempts: usize },

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error loading or building embeddings
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for EnsembleError {
    fn from(err: serde_json::Error) -> Self {
        EnsembleError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EnsembleError {
    fn from(err: toml::de::Error) -> Self {
        EnsembleError::Config(err.to_string())
    }
}

/// Convenience Result type for emotion-ensemble operations
pub type Result<T> = std::result::Result<T, EnsembleError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| EnsembleError::InvalidInput(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| EnsembleError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| EnsembleError::InvalidInput(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| EnsembleError::InvalidInput(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EnsembleError::Dataset("test error".to_string());
        assert_eq!(format!("{}", err), "Dataset error: test error");
    }

    #[test]
    fn test_unknown_label_mentions_line() {
        let err = EnsembleError::UnknownLabel {
            line: 7,
            label: "joyful".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("joyful"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_divergence_display() {
        let err = EnsembleError::Divergence { fold: 2, attempts: 11 };
        assert_eq!(format!("{}", err), "Fold 2 diverged on all 11 attempts");
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<i32, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));

        let with_context = result.context("Failed to read file");
        assert!(with_context.is_err());
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let with_context = opt.context("Value was None");
        assert!(with_context.is_err());
    }
}
