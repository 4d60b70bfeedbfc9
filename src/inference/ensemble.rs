//! Ensemble results and majority voting
//!
//! An [`EnsembleResult`] holds one prediction vector per fold for a
//! held-out set: a K×N matrix. Voting runs per column.
//!
//! Ties go to the label that first reaches the winning count while scanning
//! folds in order. With votes `[1, 0, 0, 1]` label 0 reaches two votes
//! before label 1 does, so 0 wins.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::{EnsembleError, Result, ResultExt};

/// Majority label of one column of votes
pub fn majority(votes: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut winner: Option<(usize, usize)> = None;

    for &label in votes {
        let count = counts.entry(label).or_insert(0);
        *count += 1;
        if winner.map_or(true, |(_, best)| *count > best) {
            winner = Some((label, *count));
        }
    }

    winner.map(|(label, _)| label)
}

/// Per-fold predictions for one held-out set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleResult {
    /// Held-out set name, e.g. "dev" or "test"
    pub name: String,
    /// One row per fold, each of equal length
    pub votes: Vec<Vec<usize>>,
}

impl EnsembleResult {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            votes: Vec::new(),
        }
    }

    /// Append one fold's predictions
    pub fn push(&mut self, predictions: Vec<usize>) -> Result<()> {
        if let Some(first) = self.votes.first() {
            if first.len() != predictions.len() {
                return Err(EnsembleError::InvalidInput(format!(
                    "{}: fold {} has {} predictions, expected {}",
                    self.name,
                    self.votes.len(),
                    predictions.len(),
                    first.len()
                )));
            }
        }
        self.votes.push(predictions);
        Ok(())
    }

    pub fn num_folds(&self) -> usize {
        self.votes.len()
    }

    pub fn num_examples(&self) -> usize {
        self.votes.first().map(Vec::len).unwrap_or(0)
    }

    /// Column-wise majority vote
    pub fn majority_vote(&self) -> Result<Vec<usize>> {
        if self.votes.is_empty() {
            return Err(EnsembleError::InvalidInput(format!(
                "{}: no fold predictions to vote on",
                self.name
            )));
        }

        let mut column = Vec::with_capacity(self.num_folds());
        (0..self.num_examples())
            .map(|example| {
                column.clear();
                column.extend(self.votes.iter().map(|row| row[example]));
                majority(&column).with_context(|| format!("{}: empty vote column", self.name))
            })
            .collect()
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EnsembleError::PathNotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        let result: Self = serde_json::from_str(&json)?;

        if result.votes.iter().any(|row| row.len() != result.num_examples()) {
            return Err(EnsembleError::InvalidInput(format!(
                "{}: ragged vote matrix in {:?}",
                result.name, path
            )));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_simple_majority() {
        assert_eq!(majority(&[0, 0, 1]), Some(0));
        assert_eq!(majority(&[3, 2, 3, 3, 1]), Some(3));
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        assert_eq!(majority(&[0, 1]), Some(0));
        assert_eq!(majority(&[2, 1, 1, 2]), Some(1));
    }

    #[test]
    fn test_empty_votes() {
        assert_eq!(majority(&[]), None);
    }

    #[test]
    fn test_column_vote() {
        let mut result = EnsembleResult::new("dev");
        result.push(vec![0, 1, 3]).unwrap();
        result.push(vec![0, 2, 3]).unwrap();
        result.push(vec![1, 2, 0]).unwrap();

        assert_eq!(result.num_folds(), 3);
        assert_eq!(result.majority_vote().unwrap(), vec![0, 2, 3]);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut result = EnsembleResult::new("test");
        result.push(vec![0, 1]).unwrap();
        assert!(result.push(vec![0]).is_err());
    }

    #[test]
    fn test_vote_without_folds_fails() {
        assert!(EnsembleResult::new("dev").majority_vote().is_err());
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dev_ensemble.json");

        let mut result = EnsembleResult::new("dev");
        result.push(vec![0, 3]).unwrap();
        result.save(&path).unwrap();

        assert_eq!(EnsembleResult::load(&path).unwrap(), result);
    }
}
