//! Burn Dataset Integration for encoded conversations
//!
//! This module implements Burn's Dataset trait and Batcher for the encoded
//! three-turn conversations. The batcher also calls the contextual encoder,
//! so contextual vectors are computed lazily per batch.

use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;

use super::encoding::ConversationItem;
use super::{Vocabulary, NUM_EMOTIONS, NUM_TURNS};
use crate::model::embedding::ContextualEncoder;

/// Encoded conversations implementing Burn's Dataset trait
#[derive(Debug, Clone, Default)]
pub struct ConversationDataset {
    items: Vec<ConversationItem>,
}

impl ConversationDataset {
    pub fn new(items: Vec<ConversationItem>) -> Self {
        Self { items }
    }

    /// Copy out the items at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            items: indices.iter().filter_map(|&i| self.items.get(i).cloned()).collect(),
        }
    }

    /// Gold class of every item, if all are labeled
    pub fn class_labels(&self) -> Option<Vec<usize>> {
        self.items
            .iter()
            .map(|item| item.labels.map(|l| l.class))
            .collect()
    }

    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }
}

impl Dataset<ConversationItem> for ConversationDataset {
    fn get(&self, index: usize) -> Option<ConversationItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Tensors for one turn position across a batch
#[derive(Clone, Debug)]
pub struct TurnBatch<B: Backend> {
    /// Word ids `[batch, seq_len]`
    pub ids: Tensor<B, 2, Int>,
    /// 1.0 on real tokens, 0.0 on padding `[batch, seq_len]`
    pub mask: Tensor<B, 2>,
    /// Unpadded lengths `[batch]`
    pub lengths: Tensor<B, 1>,
    /// Auxiliary-vocabulary ids `[batch, aux_len]`
    pub aux_ids: Tensor<B, 2, Int>,
    /// 1.0 on non-padding auxiliary ids `[batch, aux_len]`
    pub aux_mask: Tensor<B, 2>,
    /// Non-padding auxiliary counts, at least 1 `[batch]`
    pub aux_lengths: Tensor<B, 1>,
    /// Contextual vectors `[batch, seq_len, contextual_dim]`
    pub contextual: Tensor<B, 3>,
}

/// Training targets for a batch
#[derive(Clone, Debug)]
pub struct TargetBatch<B: Backend> {
    /// Four-way class `[batch]`
    pub class: Tensor<B, 1, Int>,
    /// Others-vs-emotion `[batch]`
    pub binary: Tensor<B, 1, Int>,
    /// Emotion one-hot `[batch, 3]`
    pub emotion: Tensor<B, 2>,
}

/// A batch of conversations
#[derive(Clone, Debug)]
pub struct ConversationBatch<B: Backend> {
    pub turns: [TurnBatch<B>; NUM_TURNS],
    /// Present when every item in the batch is labeled
    pub targets: Option<TargetBatch<B>>,
    pub size: usize,
}

/// Batcher turning encoded conversations into tensors
#[derive(Clone)]
pub struct ConversationBatcher {
    vocab: Arc<Vocabulary>,
    encoder: Arc<dyn ContextualEncoder>,
}

impl std::fmt::Debug for ConversationBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationBatcher")
            .field("vocab_size", &self.vocab.len())
            .field("contextual_dim", &self.encoder.dim())
            .finish()
    }
}

impl ConversationBatcher {
    pub fn new(vocab: Arc<Vocabulary>, encoder: Arc<dyn ContextualEncoder>) -> Self {
        Self { vocab, encoder }
    }

    fn turn_batch<B: Backend>(
        &self,
        items: &[ConversationItem],
        turn: usize,
        device: &B::Device,
    ) -> TurnBatch<B> {
        let batch_size = items.len();
        let seq_len = items.first().map(|i| i.turns[turn].ids.len()).unwrap_or(1);
        let aux_len = items.first().map(|i| i.turns[turn].aux_ids.len()).unwrap_or(1);

        let mut ids = Vec::with_capacity(batch_size * seq_len);
        let mut mask = Vec::with_capacity(batch_size * seq_len);
        let mut lengths = Vec::with_capacity(batch_size);
        let mut aux_ids = Vec::with_capacity(batch_size * aux_len);
        let mut aux_mask = Vec::with_capacity(batch_size * aux_len);
        let mut aux_lengths = Vec::with_capacity(batch_size);

        for item in items {
            let encoded = &item.turns[turn];
            ids.extend_from_slice(&encoded.ids);
            mask.extend((0..seq_len).map(|pos| if pos < encoded.length { 1.0f32 } else { 0.0 }));
            lengths.push(encoded.length.max(1) as f32);

            aux_ids.extend_from_slice(&encoded.aux_ids);
            let present: Vec<f32> = encoded
                .aux_ids
                .iter()
                .map(|&id| if id != 0 { 1.0 } else { 0.0 })
                .collect();
            aux_lengths.push(present.iter().sum::<f32>().max(1.0));
            aux_mask.extend(present);
        }

        let sentences: Vec<Vec<&str>> = items
            .iter()
            .map(|item| self.vocab.decode(&item.turns[turn].ids))
            .collect();
        let contextual_dim = self.encoder.dim();
        let contextual = self.encoder.encode(&sentences, seq_len);

        TurnBatch {
            ids: Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [batch_size, seq_len]), device),
            mask: Tensor::<B, 2>::from_floats(TensorData::new(mask, [batch_size, seq_len]), device),
            lengths: Tensor::<B, 1>::from_floats(TensorData::new(lengths, [batch_size]), device),
            aux_ids: Tensor::<B, 2, Int>::from_data(
                TensorData::new(aux_ids, [batch_size, aux_len]),
                device,
            ),
            aux_mask: Tensor::<B, 2>::from_floats(
                TensorData::new(aux_mask, [batch_size, aux_len]),
                device,
            ),
            aux_lengths: Tensor::<B, 1>::from_floats(
                TensorData::new(aux_lengths, [batch_size]),
                device,
            ),
            contextual: Tensor::<B, 3>::from_floats(
                TensorData::new(contextual, [batch_size, seq_len, contextual_dim]),
                device,
            ),
        }
    }

    fn target_batch<B: Backend>(
        &self,
        items: &[ConversationItem],
        device: &B::Device,
    ) -> Option<TargetBatch<B>> {
        let labels: Vec<_> = items.iter().map(|item| item.labels).collect::<Option<_>>()?;
        let batch_size = labels.len();

        let class: Vec<i64> = labels.iter().map(|l| l.class as i64).collect();
        let binary: Vec<i64> = labels.iter().map(|l| l.binary as i64).collect();
        let emotion: Vec<f32> = labels.iter().flat_map(|l| l.emotion).collect();

        Some(TargetBatch {
            class: Tensor::<B, 1, Int>::from_data(TensorData::new(class, [batch_size]), device),
            binary: Tensor::<B, 1, Int>::from_data(TensorData::new(binary, [batch_size]), device),
            emotion: Tensor::<B, 2>::from_floats(
                TensorData::new(emotion, [batch_size, NUM_EMOTIONS]),
                device,
            ),
        })
    }
}

impl<B: Backend> Batcher<B, ConversationItem, ConversationBatch<B>> for ConversationBatcher {
    fn batch(&self, items: Vec<ConversationItem>, device: &B::Device) -> ConversationBatch<B> {
        let turns = [0, 1, 2].map(|turn| self.turn_batch::<B>(&items, turn, device));

        ConversationBatch {
            turns,
            targets: self.target_batch::<B>(&items, device),
            size: items.len(),
        }
    }
}
