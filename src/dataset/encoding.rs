//! Turn encoding: tokens to fixed-length id sequences
//!
//! A turn becomes `pad_len` ids plus its unpadded length. A turn that ends
//! up with no tokens is replaced by the single `<empty>` id; those
//! substitutions are counted in the returned [`EncodingStats`].

use serde::{Deserialize, Serialize};

use super::aux_tokenizer::AuxTokenizer;
use super::text::tokenize;
use super::vocab::{EMPTY_ID, UNK_ID};
use super::{Corpus, LabelTriple, Vocabulary, NUM_TURNS};

/// What to do with tokens missing from the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPolicy {
    /// Map misses to `<unk>` (fold training and validation sets)
    MapToUnk,
    /// Drop misses (held-out sets)
    Drop,
}

/// One encoded turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedTurn {
    /// Word ids padded with 0 to the configured length
    pub ids: Vec<i64>,
    /// Number of non-padding ids, always at least 1
    pub length: usize,
    /// Auxiliary-vocabulary ids, fixed length
    pub aux_ids: Vec<i64>,
}

/// One encoded conversation, optionally with its derived targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    pub turns: [EncodedTurn; NUM_TURNS],
    pub labels: Option<LabelTriple>,
}

/// Counters produced while encoding a corpus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingStats {
    pub conversations: usize,
    /// Turns replaced by `<empty>`
    pub empty_turns: usize,
    /// Tokens that missed the vocabulary (mapped or dropped)
    pub unknown_tokens: usize,
    /// Turns cut at the pad length
    pub truncated_turns: usize,
}

impl EncodingStats {
    pub fn merge(&mut self, other: &EncodingStats) {
        self.conversations += other.conversations;
        self.empty_turns += other.empty_turns;
        self.unknown_tokens += other.unknown_tokens;
        self.truncated_turns += other.truncated_turns;
    }
}

/// Encodes text against a vocabulary
pub struct SentenceEncoder<'a> {
    vocab: &'a Vocabulary,
    pad_len: usize,
    policy: UnknownPolicy,
}

impl<'a> SentenceEncoder<'a> {
    pub fn new(vocab: &'a Vocabulary, pad_len: usize, policy: UnknownPolicy) -> Self {
        Self {
            vocab,
            pad_len: pad_len.max(1),
            policy,
        }
    }

    /// Encode one turn, updating `stats`
    pub fn encode_ids(&self, text: &str, stats: &mut EncodingStats) -> (Vec<i64>, usize) {
        let mut ids = Vec::new();
        for token in tokenize(text) {
            match (self.vocab.id(&token), self.policy) {
                (Some(id), _) => ids.push(id as i64),
                (None, UnknownPolicy::MapToUnk) => {
                    stats.unknown_tokens += 1;
                    ids.push(UNK_ID as i64);
                }
                (None, UnknownPolicy::Drop) => stats.unknown_tokens += 1,
            }
        }

        if ids.is_empty() {
            stats.empty_turns += 1;
            ids.push(EMPTY_ID as i64);
        }
        if ids.len() > self.pad_len {
            stats.truncated_turns += 1;
            ids.truncate(self.pad_len);
        }

        let length = ids.len();
        ids.resize(self.pad_len, 0);
        (ids, length)
    }

    /// Encode a whole corpus. Labels are attached when the corpus has them.
    pub fn encode_corpus(
        &self,
        corpus: &Corpus,
        aux: &dyn AuxTokenizer,
    ) -> (Vec<ConversationItem>, EncodingStats) {
        let mut stats = EncodingStats::default();

        let items = corpus
            .conversations
            .iter()
            .map(|conversation| {
                let turns = conversation.turns.each_ref().map(|text| {
                    let (ids, length) = self.encode_ids(text, &mut stats);
                    EncodedTurn {
                        ids,
                        length,
                        aux_ids: aux.tokenize(text),
                    }
                });
                stats.conversations += 1;

                ConversationItem {
                    turns,
                    labels: conversation.label.map(LabelTriple::from),
                }
            })
            .collect();

        (items, stats)
    }
}
