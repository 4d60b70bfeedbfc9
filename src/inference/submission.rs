//! Tab-separated submission file
//!
//! The file reproduces the unlabeled input line by line with the predicted
//! emotion name appended as a trailing `label` column.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::dataset::{Corpus, Emotion};
use crate::utils::{EnsembleError, Result, ResultExt};

/// Render the submission as a string
pub fn render_submission(corpus: &Corpus, predictions: &[usize]) -> Result<String> {
    if corpus.len() != predictions.len() {
        return Err(EnsembleError::InvalidInput(format!(
            "submission has {} conversations but {} predictions",
            corpus.len(),
            predictions.len()
        )));
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}\tlabel", corpus.header.trim_end());

    for (conversation, &class) in corpus.conversations.iter().zip(predictions) {
        let emotion = Emotion::from_index(class).with_context(|| {
            format!("conversation {} has invalid class {}", conversation.id, class)
        })?;
        let _ = writeln!(out, "{}\t{}", conversation.raw.trim_end(), emotion.name());
    }

    Ok(out)
}

/// Write the submission file, creating parent directories as needed
pub fn write_submission(corpus: &Corpus, predictions: &[usize], path: &Path) -> Result<()> {
    let content = render_submission(corpus, predictions)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;

    info!("Wrote {} predictions to {:?}", predictions.len(), path);
    Ok(())
}
