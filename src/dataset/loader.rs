//! Corpus loader for tab-separated conversation files
//!
//! Expected layout: one header row, then one conversation per line with
//! columns `id`, `turn1`, `turn2`, `turn3` and, for labeled files, `label`.
//! Raw lines are kept so a submission can echo the unlabeled input verbatim.

use std::fs;
use std::path::Path;

use tracing::info;

use super::{Emotion, NUM_TURNS};
use crate::utils::{EnsembleError, Result};

/// Whether a corpus must carry a gold label column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    /// Fifth column is required and must be a known emotion
    Labeled,
    /// Any label column is ignored
    Unlabeled,
}

/// One three-turn conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub turns: [String; NUM_TURNS],
    pub label: Option<Emotion>,
    /// The original line without its trailing newline
    pub raw: String,
}

/// A loaded corpus file
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub header: String,
    pub conversations: Vec<Conversation>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Gold class indices, failing if any conversation is unlabeled
    pub fn class_labels(&self) -> Result<Vec<usize>> {
        self.conversations
            .iter()
            .map(|c| {
                c.label.map(|l| l.index()).ok_or_else(|| {
                    EnsembleError::Dataset(format!("conversation '{}' has no label", c.id))
                })
            })
            .collect()
    }

    /// Parse corpus text (header included)
    pub fn parse(content: &str, mode: LabelMode) -> Result<Self> {
        let mut lines = content.lines().enumerate();

        let header = match lines.next() {
            Some((_, header)) => header.trim_end_matches('\r').to_string(),
            None => return Ok(Self::default()),
        };

        let mut conversations = Vec::new();
        for (idx, line) in lines {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            conversations.push(parse_row(line, idx + 1, mode)?);
        }

        Ok(Self {
            header,
            conversations,
        })
    }
}

fn parse_row(line: &str, line_no: usize, mode: LabelMode) -> Result<Conversation> {
    let columns: Vec<&str> = line.split('\t').collect();
    let required = match mode {
        LabelMode::Labeled => NUM_TURNS + 2,
        LabelMode::Unlabeled => NUM_TURNS + 1,
    };

    if columns.len() < required {
        return Err(EnsembleError::MalformedRow {
            line: line_no,
            reason: format!("expected {} columns, found {}", required, columns.len()),
        });
    }

    let label = match mode {
        LabelMode::Labeled => {
            let token = columns[NUM_TURNS + 1].trim();
            let emotion = token.parse::<Emotion>().map_err(|_| EnsembleError::UnknownLabel {
                line: line_no,
                label: token.to_string(),
            })?;
            Some(emotion)
        }
        LabelMode::Unlabeled => None,
    };

    Ok(Conversation {
        id: columns[0].to_string(),
        turns: [
            columns[1].to_string(),
            columns[2].to_string(),
            columns[3].to_string(),
        ],
        label,
        raw: line.to_string(),
    })
}

/// Load a corpus file from disk
pub fn load_corpus(path: &Path, mode: LabelMode) -> Result<Corpus> {
    if !path.exists() {
        return Err(EnsembleError::PathNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let corpus = Corpus::parse(&content, mode)?;

    info!("Loaded {} conversations from {:?}", corpus.len(), path);
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LABELED: &str = "id\tturn1\tturn2\tturn3\tlabel\n\
        0\thi\thello\thow are you\tothers\n\
        1\tso happy\twhy\tgot a job\thappy\n";

    #[test]
    fn test_parse_labeled() {
        let corpus = Corpus::parse(LABELED, LabelMode::Labeled).unwrap();
        assert_eq!(corpus.header, "id\tturn1\tturn2\tturn3\tlabel");
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.conversations[1].turns[2], "got a job");
        assert_eq!(corpus.class_labels().unwrap(), vec![3, 0]);
    }

    #[test]
    fn test_unknown_label_is_fatal() {
        let content = "id\tturn1\tturn2\tturn3\tlabel\n0\ta\tb\tc\tjoyful\n";
        let err = Corpus::parse(content, LabelMode::Labeled).unwrap_err();
        match err {
            EnsembleError::UnknownLabel { line, label } => {
                assert_eq!(line, 2);
                assert_eq!(label, "joyful");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unlabeled_keeps_raw_line() {
        let content = "id\tturn1\tturn2\tturn3\n7\tyo\tsup\tnothing much\n";
        let corpus = Corpus::parse(content, LabelMode::Unlabeled).unwrap();
        assert_eq!(corpus.conversations[0].raw, "7\tyo\tsup\tnothing much");
        assert!(corpus.conversations[0].label.is_none());
        assert!(corpus.class_labels().is_err());
    }

    #[test]
    fn test_short_row_is_malformed() {
        let content = "header\n0\tonly two\n";
        assert!(matches!(
            Corpus::parse(content, LabelMode::Unlabeled),
            Err(EnsembleError::MalformedRow { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_corpus_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.txt");
        std::fs::write(&path, LABELED).unwrap();

        let corpus = load_corpus(&path, LabelMode::Labeled).unwrap();
        assert_eq!(corpus.len(), 2);

        let missing = load_corpus(&dir.path().join("missing.txt"), LabelMode::Labeled);
        assert!(matches!(missing, Err(EnsembleError::PathNotFound(_))));
    }
}
