//! Dataset module: corpus loading, vocabulary, encoding and fold splits
//!
//! Every labeled conversation carries one gold emotion. The label space is
//! fixed: `happy`, `angry`, `sad` are the three emotion classes and
//! `others` is the fourth. From the gold emotion a [`LabelTriple`] is derived
//! once, so the three training targets can never disagree.

pub mod aux_tokenizer;
pub mod burn_dataset;
pub mod encoding;
pub mod loader;
pub mod split;
pub mod text;
pub mod vocab;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::EnsembleError;

pub use aux_tokenizer::{AuxTokenizer, JsonVocabTokenizer};
pub use burn_dataset::{
    ConversationBatch, ConversationBatcher, ConversationDataset, TargetBatch, TurnBatch,
};
pub use encoding::{ConversationItem, EncodedTurn, EncodingStats, SentenceEncoder, UnknownPolicy};
pub use loader::{load_corpus, Conversation, Corpus, LabelMode};
pub use split::{shuffled_indices, stratified_folds, Fold};
pub use vocab::Vocabulary;

/// Number of classes in the primary label space
pub const NUM_CLASSES: usize = 4;

/// Number of emotion classes (everything except `others`)
pub const NUM_EMOTIONS: usize = 3;

/// Number of turns in a conversation
pub const NUM_TURNS: usize = 3;

/// The four-way label space, in class-index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Angry,
    Sad,
    Others,
}

impl Emotion {
    /// All labels ordered by class index
    pub const ALL: [Emotion; NUM_CLASSES] =
        [Emotion::Happy, Emotion::Angry, Emotion::Sad, Emotion::Others];

    /// Class index (happy=0, angry=1, sad=2, others=3)
    pub fn index(&self) -> usize {
        match self {
            Emotion::Happy => 0,
            Emotion::Angry => 1,
            Emotion::Sad => 2,
            Emotion::Others => 3,
        }
    }

    /// Label for a class index
    pub fn from_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }

    /// Label token as it appears in corpus files
    pub fn name(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
            Emotion::Sad => "sad",
            Emotion::Others => "others",
        }
    }

    /// Whether this is one of the three emotion classes
    pub fn is_emotional(&self) -> bool {
        *self != Emotion::Others
    }
}

impl FromStr for Emotion {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "happy" => Ok(Emotion::Happy),
            "angry" => Ok(Emotion::Angry),
            "sad" => Ok(Emotion::Sad),
            "others" => Ok(Emotion::Others),
            other => Err(EnsembleError::UnknownLabel {
                line: 0,
                label: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The three targets derived from one gold emotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelTriple {
    /// Four-way class index
    pub class: usize,
    /// 1 iff the class is `others`
    pub binary: usize,
    /// One-hot over happy/angry/sad, all zeros for `others`
    pub emotion: [f32; NUM_EMOTIONS],
}

impl From<Emotion> for LabelTriple {
    fn from(emotion: Emotion) -> Self {
        let class = emotion.index();
        let mut one_hot = [0.0; NUM_EMOTIONS];
        if emotion.is_emotional() {
            one_hot[class] = 1.0;
        }

        Self {
            class,
            binary: usize::from(!emotion.is_emotional()),
            emotion: one_hot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_triple_consistency() {
        for emotion in Emotion::ALL {
            let triple = LabelTriple::from(emotion);
            assert_eq!(triple.class, emotion.index());
            assert_eq!(triple.binary == 1, triple.class == 3);

            let hot: f32 = triple.emotion.iter().sum();
            if triple.class < 3 {
                assert_eq!(hot, 1.0);
                assert_eq!(triple.emotion[triple.class], 1.0);
            } else {
                assert_eq!(hot, 0.0);
            }
        }
    }

    #[test]
    fn test_emotion_parse() {
        assert_eq!("sad".parse::<Emotion>().unwrap(), Emotion::Sad);
        assert_eq!(" others".parse::<Emotion>().unwrap(), Emotion::Others);
        assert!("joy".parse::<Emotion>().is_err());
    }

    #[test]
    fn test_emotion_index_round_trip() {
        for (i, emotion) in Emotion::ALL.iter().enumerate() {
            assert_eq!(emotion.index(), i);
            assert_eq!(Emotion::from_index(i), Some(*emotion));
        }
        assert_eq!(Emotion::from_index(4), None);
    }
}
