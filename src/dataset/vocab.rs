//! Word vocabulary with reserved ids
//!
//! Ids 0..=2 are reserved for `<pad>`, `<unk>` and `<empty>`. The remaining
//! ids are assigned by descending corpus frequency; ties keep the order in
//! which tokens were first seen.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::text::tokenize;
use super::Corpus;
use crate::utils::{EnsembleError, Result};

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const EMPTY_TOKEN: &str = "<empty>";

pub const PAD_ID: usize = 0;
pub const UNK_ID: usize = 1;
pub const EMPTY_ID: usize = 2;

/// Number of reserved ids at the start of every vocabulary
pub const NUM_RESERVED: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    id2word: Vec<String>,
    #[serde(skip)]
    word2id: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary from tokenised corpora.
    ///
    /// `size` counts the reserved ids. When `fill` is set the full vocabulary
    /// is kept and `size` is ignored; otherwise a `size` larger than the
    /// corpus supports is an error.
    pub fn build(corpora: &[&Corpus], size: usize, fill: bool) -> Result<Self> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut seen = 0usize;

        for corpus in corpora {
            for conversation in &corpus.conversations {
                for turn in &conversation.turns {
                    for token in tokenize(turn) {
                        let entry = counts.entry(token).or_insert_with(|| {
                            seen += 1;
                            (0, seen)
                        });
                        entry.0 += 1;
                    }
                }
            }
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .filter(|(word, _)| !is_reserved(word))
            .map(|(word, (count, first))| (word, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        // `size` counts the reserved ids but is checked against distinct tokens only
        let available = ranked.len();
        let keep = if fill {
            ranked.len()
        } else if size > available {
            return Err(EnsembleError::VocabularyTooSmall {
                requested: size,
                available,
            });
        } else {
            size.saturating_sub(NUM_RESERVED)
        };

        let words = ranked.into_iter().take(keep).map(|(word, _, _)| word);
        let vocab = Self::from_words(words);

        info!(
            "Built vocabulary: {} entries ({} distinct tokens, fill={})",
            vocab.len(),
            available,
            fill
        );
        Ok(vocab)
    }

    /// Create a vocabulary from words in id order, after the reserved ids
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut id2word: Vec<String> = [PAD_TOKEN, UNK_TOKEN, EMPTY_TOKEN]
            .iter()
            .map(|s| s.to_string())
            .collect();
        id2word.extend(words.into_iter().map(Into::into));

        let word2id = index(&id2word);
        Self { id2word, word2id }
    }

    /// Save the id→word table as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Load a table written by [`Vocabulary::save`]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EnsembleError::PathNotFound(path.to_path_buf()));
        }
        let mut vocab: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        vocab.word2id = index(&vocab.id2word);
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.id2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2word.is_empty()
    }

    pub fn id(&self, word: &str) -> Option<usize> {
        self.word2id.get(word).copied()
    }

    pub fn word(&self, id: usize) -> Option<&str> {
        self.id2word.get(id).map(String::as_str)
    }

    /// Words in id order
    pub fn words(&self) -> &[String] {
        &self.id2word
    }

    /// Map ids back to words, dropping padding
    pub fn decode(&self, ids: &[i64]) -> Vec<&str> {
        ids.iter()
            .filter(|&&id| id != PAD_ID as i64)
            .filter_map(|&id| usize::try_from(id).ok())
            .filter_map(|id| self.word(id))
            .collect()
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(word, PAD_TOKEN | UNK_TOKEN | EMPTY_TOKEN)
}

fn index(id2word: &[String]) -> HashMap<String, usize> {
    id2word
        .iter()
        .enumerate()
        .map(|(id, word)| (word.clone(), id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Corpus, LabelMode};
    use tempfile::TempDir;

    #[test]
    fn test_save_load_restores_lookup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocab.json");
        let vocab = Vocabulary::from_words(["hello", "world"]);
        vocab.save(&path).unwrap();

        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded.id("world"), Some(4));
        assert_eq!(loaded.id(EMPTY_TOKEN), Some(EMPTY_ID));
    }

    fn corpus() -> Corpus {
        let content = "id\tturn1\tturn2\tturn3\tlabel\n\
            0\tb a\ta c\ta\tothers\n\
            1\tc b\td\tb\thappy\n";
        Corpus::parse(content, LabelMode::Labeled).unwrap()
    }

    #[test]
    fn test_reserved_ids() {
        let vocab = Vocabulary::from_words(["x"]);
        assert_eq!(vocab.id(PAD_TOKEN), Some(PAD_ID));
        assert_eq!(vocab.id(UNK_TOKEN), Some(UNK_ID));
        assert_eq!(vocab.id(EMPTY_TOKEN), Some(EMPTY_ID));
        assert_eq!(vocab.id("x"), Some(3));
    }

    #[test]
    fn test_frequency_order_with_first_seen_ties() {
        // counts: a=3, b=3, c=2, d=1; b is seen before a
        let corpus = corpus();
        let vocab = Vocabulary::build(&[&corpus], 4, true).unwrap();
        assert_eq!(&vocab.words()[3..], &["b", "a", "c", "d"]);
    }

    #[test]
    fn test_truncates_to_requested_size() {
        let corpus = corpus();
        let vocab = Vocabulary::build(&[&corpus], 4, false).unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.id("b"), Some(3));
        assert_eq!(vocab.id("a"), None);
    }

    #[test]
    fn test_too_small_corpus_is_an_error() {
        let corpus = corpus();
        let err = Vocabulary::build(&[&corpus], 100, false).unwrap_err();
        assert!(matches!(
            err,
            EnsembleError::VocabularyTooSmall {
                requested: 100,
                available: 4
            }
        ));
    }

    #[test]
    fn test_size_is_checked_against_distinct_tokens() {
        let corpus = corpus();
        let err = Vocabulary::build(&[&corpus], 6, false).unwrap_err();
        assert!(matches!(
            err,
            EnsembleError::VocabularyTooSmall {
                requested: 6,
                available: 4
            }
        ));

        assert!(Vocabulary::build(&[&corpus], 4, false).is_ok());
    }

    #[test]
    fn test_fill_keeps_everything() {
        let corpus = corpus();
        let vocab = Vocabulary::build(&[&corpus], 100, true).unwrap();
        assert_eq!(vocab.len(), 7);
    }

    #[test]
    fn test_decode_drops_padding() {
        let vocab = Vocabulary::from_words(["hi", "there"]);
        assert_eq!(vocab.decode(&[3, 4, 0, 0]), vec!["hi", "there"]);
    }
}
