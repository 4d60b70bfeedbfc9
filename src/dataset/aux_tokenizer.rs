//! Auxiliary tokenizer with an independent vocabulary
//!
//! Each turn is tokenised a second time against a word→id JSON vocabulary
//! and padded to a fixed length. Id 0 is padding.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use super::text::tokenize;
use super::Vocabulary;
use crate::utils::{EnsembleError, Result};

/// Token used for misses when the vocabulary defines it
pub const AUX_UNKNOWN_TOKEN: &str = "CUSTOM_UNKNOWN";

/// Fixed-length tokenisation against a secondary vocabulary
pub trait AuxTokenizer: Send + Sync {
    /// Number of ids the tokenizer can emit (embedding table size)
    fn vocab_size(&self) -> usize;

    /// Output length of [`AuxTokenizer::tokenize`]
    fn pad_len(&self) -> usize;

    /// Tokenise `text` into exactly `pad_len()` ids
    fn tokenize(&self, text: &str) -> Vec<i64>;
}

/// Tokenizer backed by a JSON `{"word": id}` map
#[derive(Debug, Clone)]
pub struct JsonVocabTokenizer {
    word2id: HashMap<String, usize>,
    unknown_id: usize,
    vocab_size: usize,
    pad_len: usize,
}

impl JsonVocabTokenizer {
    /// Build from an in-memory vocabulary
    pub fn from_map(word2id: HashMap<String, usize>, pad_len: usize) -> Self {
        let unknown_id = word2id.get(AUX_UNKNOWN_TOKEN).copied().unwrap_or(1);
        let vocab_size = word2id
            .values()
            .max()
            .map(|&m| m + 1)
            .unwrap_or(0)
            .max(unknown_id + 1);

        Self {
            word2id,
            unknown_id,
            vocab_size,
            pad_len,
        }
    }

    /// Load a JSON vocabulary file
    pub fn load(path: &Path, pad_len: usize) -> Result<Self> {
        if !path.exists() {
            return Err(EnsembleError::PathNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let word2id: HashMap<String, usize> = serde_json::from_str(&content)?;
        let tokenizer = Self::from_map(word2id, pad_len);

        info!(
            "Loaded auxiliary vocabulary with {} ids from {:?}",
            tokenizer.vocab_size, path
        );
        Ok(tokenizer)
    }

    /// Reuse the primary vocabulary's mapping
    pub fn from_vocabulary(vocab: &Vocabulary, pad_len: usize) -> Self {
        let word2id = vocab
            .words()
            .iter()
            .enumerate()
            .map(|(id, word)| (word.clone(), id))
            .collect();
        Self::from_map(word2id, pad_len)
    }
}

impl AuxTokenizer for JsonVocabTokenizer {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn pad_len(&self) -> usize {
        self.pad_len
    }

    fn tokenize(&self, text: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = tokenize(text)
            .iter()
            .take(self.pad_len)
            .map(|token| *self.word2id.get(token).unwrap_or(&self.unknown_id) as i64)
            .collect();
        ids.resize(self.pad_len, 0);
        ids
    }
}
