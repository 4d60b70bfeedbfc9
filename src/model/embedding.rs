//! Embedding providers
//!
//! - [`StaticEmbeddings`]: a pretrained word-vector table aligned to the
//!   vocabulary, used to initialise the predictor's word embedding.
//! - [`ContextualEncoder`]: per-token contextual vectors computed from the
//!   detokenised turn.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::dataset::vocab::{PAD_ID, UNK_ID};
use crate::dataset::Vocabulary;
use crate::utils::{EnsembleError, Result};

/// Word-vector table with one row per vocabulary id
#[derive(Debug, Clone)]
pub struct StaticEmbeddings {
    /// Row-major `[vocab_size, dim]`
    pub weights: Vec<f32>,
    pub vocab_size: usize,
    pub dim: usize,
    /// Vocabulary words that had a pretrained vector
    pub found: usize,
}

impl StaticEmbeddings {
    /// Load a GloVe-style text file (`word v1 v2 ... vdim` per line).
    ///
    /// Words without a pretrained vector are sampled from a normal
    /// distribution matching the mean and standard deviation of every value
    /// in the file. `<pad>` and `<unk>` are zero vectors.
    pub fn load_glove(path: &Path, vocab: &Vocabulary, dim: usize, seed: u64) -> Result<Self> {
        if !path.exists() {
            return Err(EnsembleError::PathNotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let mut vectors: HashMap<String, Vec<f32>> = HashMap::new();
        let (mut sum, mut sum_sq, mut count) = (0.0f64, 0.0f64, 0usize);

        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split(' ');
            let Some(word) = parts.next() else { continue };
            let values: Vec<f32> = parts.filter_map(|v| v.parse().ok()).collect();
            if values.len() != dim {
                continue;
            }

            for &v in &values {
                sum += v as f64;
                sum_sq += (v as f64) * (v as f64);
            }
            count += values.len();

            if vocab.id(word).is_some() {
                vectors.insert(word.to_string(), values);
            }
        }

        if count == 0 {
            return Err(EnsembleError::Embedding(format!(
                "no {}-dimensional vectors found in {:?}",
                dim, path
            )));
        }

        let mean = sum / count as f64;
        let std = (sum_sq / count as f64 - mean * mean).max(0.0).sqrt();
        let table = Self::from_vectors(vocab, dim, &vectors, mean, std, seed)?;

        info!(
            "Static embeddings: {}/{} vocabulary words covered ({:.1}%)",
            table.found,
            vocab.len(),
            100.0 * table.found as f64 / vocab.len().max(1) as f64
        );
        Ok(table)
    }

    /// Assemble a table from known vectors plus normal fill
    pub fn from_vectors(
        vocab: &Vocabulary,
        dim: usize,
        vectors: &HashMap<String, Vec<f32>>,
        mean: f64,
        std: f64,
        seed: u64,
    ) -> Result<Self> {
        let normal = Normal::new(mean, std)
            .map_err(|e| EnsembleError::Embedding(format!("bad fill distribution: {}", e)))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut weights = Vec::with_capacity(vocab.len() * dim);
        let mut found = 0usize;

        for (id, word) in vocab.words().iter().enumerate() {
            if id == PAD_ID || id == UNK_ID {
                weights.extend(std::iter::repeat(0.0).take(dim));
            } else if let Some(vector) = vectors.get(word) {
                weights.extend_from_slice(vector);
                found += 1;
            } else {
                weights.extend((0..dim).map(|_| normal.sample(&mut rng) as f32));
            }
        }

        Ok(Self {
            weights,
            vocab_size: vocab.len(),
            dim,
            found,
        })
    }

    /// Row for one id
    pub fn row(&self, id: usize) -> Option<&[f32]> {
        let start = id * self.dim;
        self.weights.get(start..start + self.dim)
    }
}

/// Produces contextual vectors for detokenised turns
pub trait ContextualEncoder: Send + Sync {
    /// Vector width per token
    fn dim(&self) -> usize;

    /// Encode a batch of token sequences.
    ///
    /// Returns a row-major `[sentences.len(), max_len, dim()]` buffer.
    /// Positions past a sentence's end (or past `max_len`) are zero.
    fn encode(&self, sentences: &[Vec<&str>], max_len: usize) -> Vec<f32>;
}

/// Deterministic two-layer encoder whose output averages both layers.
///
/// Layer 0 maps each token to a fixed pseudo-random vector keyed by the
/// token text. Layer 1 averages each position with its neighbours, so the
/// output depends on the surrounding words.
#[derive(Debug, Clone)]
pub struct LayerAveragedEncoder {
    dim: usize,
    seed: u64,
}

impl LayerAveragedEncoder {
    pub fn new(dim: usize, seed: u64) -> Self {
        Self { dim, seed }
    }

    fn token_vector(&self, token: &str) -> Vec<f32> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ fnv1a(token));
        (0..self.dim).map(|_| rng.gen_range(-0.5f32..0.5)).collect()
    }
}

impl ContextualEncoder for LayerAveragedEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, sentences: &[Vec<&str>], max_len: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; sentences.len() * max_len * self.dim];

        for (s, tokens) in sentences.iter().enumerate() {
            let len = tokens.len().min(max_len);
            let layer0: Vec<Vec<f32>> = tokens[..len].iter().map(|t| self.token_vector(t)).collect();

            for pos in 0..len {
                let lo = pos.saturating_sub(1);
                let hi = (pos + 1).min(len - 1);
                let width = (hi - lo + 1) as f32;
                let base = (s * max_len + pos) * self.dim;

                for d in 0..self.dim {
                    let layer1 = (lo..=hi).map(|p| layer0[p][d]).sum::<f32>() / width;
                    out[base + d] = 0.5 * (layer0[pos][d] + layer1);
                }
            }
        }

        out
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_glove_aligns_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors.txt");
        std::fs::write(&path, "hello 1 2 3\nworld 4 5 6\nbad 1 2\n").unwrap();

        let vocab = Vocabulary::from_words(["hello", "missing"]);
        let table = StaticEmbeddings::load_glove(&path, &vocab, 3, 0).unwrap();

        assert_eq!(table.vocab_size, 5);
        assert_eq!(table.found, 1);
        assert_eq!(table.row(PAD_ID).unwrap(), &[0.0, 0.0, 0.0]);
        assert_eq!(table.row(UNK_ID).unwrap(), &[0.0, 0.0, 0.0]);
        assert_eq!(table.row(3).unwrap(), &[1.0, 2.0, 3.0]);
        assert!(table.row(4).unwrap().iter().all(|v| v.is_finite()));
        assert!(table.row(5).is_none());
    }

    #[test]
    fn test_load_glove_without_vectors_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors.txt");
        std::fs::write(&path, "hello 1 2\n").unwrap();

        let vocab = Vocabulary::from_words(["hello"]);
        assert!(StaticEmbeddings::load_glove(&path, &vocab, 3, 0).is_err());
    }

    #[test]
    fn test_contextual_encoder_shape_and_padding() {
        let encoder = LayerAveragedEncoder::new(4, 1);
        let sentences = vec![vec!["a", "b"], vec!["c"]];
        let out = encoder.encode(&sentences, 3);

        assert_eq!(out.len(), 2 * 3 * 4);
        // sentence 0, position 2 is padding
        assert!(out[8..12].iter().all(|&v| v == 0.0));
        assert!(out[0..4].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_contextual_encoder_depends_on_context() {
        let encoder = LayerAveragedEncoder::new(4, 1);
        let a = encoder.encode(&[vec!["x", "y"]], 2);
        let b = encoder.encode(&[vec!["x", "z"]], 2);
        let again = encoder.encode(&[vec!["x", "y"]], 2);

        assert_eq!(a, again);
        assert_ne!(a[0..4], b[0..4]);
    }
}
