//! Emotion predictor interface and the baseline hierarchical model
//!
//! The training loop only relies on [`EmotionPredictor`]: a forward pass from
//! the three encoded turns to three heads (4-way class logits, 2-way
//! others-vs-emotion logits, 3-way auxiliary regression). A
//! [`PredictorFactory`] builds a freshly initialised model for every fold
//! attempt.
//!
//! Architecture of [`HierarchicalPredictor`]:
//! - per turn: masked mean of word, auxiliary and contextual embeddings
//! - shared turn encoder (Linear + ReLU)
//! - conversation encoder over the concatenated turns (Linear + ReLU + Dropout)
//! - three linear heads

use std::sync::Arc;

use burn::{
    config::Config,
    module::{AutodiffModule, Module, Param},
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig},
    tensor::{activation::relu, backend::AutodiffBackend, backend::Backend, Tensor, TensorData},
};

use super::embedding::StaticEmbeddings;
use crate::dataset::{TurnBatch, NUM_CLASSES, NUM_EMOTIONS, NUM_TURNS};
use crate::utils::EnsembleError;

/// The three heads of a forward pass
#[derive(Debug, Clone)]
pub struct PredictorOutput<B: Backend> {
    /// `[batch, 4]`
    pub class_logits: Tensor<B, 2>,
    /// `[batch, 2]`
    pub binary_logits: Tensor<B, 2>,
    /// `[batch, 3]`
    pub emotion_scores: Tensor<B, 2>,
}

/// Anything that maps three encoded turns to the three heads
pub trait EmotionPredictor<B: Backend> {
    fn forward(&self, turns: &[TurnBatch<B>; NUM_TURNS]) -> PredictorOutput<B>;
}

/// Builds fresh trainable predictors
pub trait PredictorFactory<B: AutodiffBackend> {
    /// Inference-time form of the model
    type Inner: EmotionPredictor<B::InnerBackend> + Module<B::InnerBackend>;
    /// Trainable model
    type Model: AutodiffModule<B, InnerModule = Self::Inner> + EmotionPredictor<B>;

    fn build(&self, device: &B::Device) -> Self::Model;
}

/// Configuration for the HierarchicalPredictor model
#[derive(Config, Debug)]
pub struct HierarchicalPredictorConfig {
    /// Primary vocabulary size
    pub vocab_size: usize,

    /// Auxiliary vocabulary size
    pub aux_vocab_size: usize,

    /// Contextual vector width produced by the batcher
    pub contextual_dim: usize,

    #[config(default = "300")]
    pub embedding_dim: usize,

    #[config(default = "64")]
    pub aux_embedding_dim: usize,

    #[config(default = "1500")]
    pub hidden_size: usize,

    #[config(default = "0.2")]
    pub dropout: f64,
}

impl HierarchicalPredictorConfig {
    /// Initialise a model with default-initialised embeddings
    pub fn init<B: Backend>(&self, device: &B::Device) -> HierarchicalPredictor<B> {
        let turn_input = self.embedding_dim + self.aux_embedding_dim + self.contextual_dim;

        HierarchicalPredictor {
            word_embedding: EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device),
            aux_embedding: EmbeddingConfig::new(self.aux_vocab_size, self.aux_embedding_dim)
                .init(device),
            turn_encoder: LinearConfig::new(turn_input, self.hidden_size).init(device),
            conversation_encoder: LinearConfig::new(self.hidden_size * NUM_TURNS, self.hidden_size)
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            class_head: LinearConfig::new(self.hidden_size, NUM_CLASSES).init(device),
            binary_head: LinearConfig::new(self.hidden_size, 2).init(device),
            emotion_head: LinearConfig::new(self.hidden_size, NUM_EMOTIONS).init(device),
        }
    }

    /// Initialise a model whose word embedding is copied from `table`
    pub fn init_with_embeddings<B: Backend>(
        &self,
        table: &StaticEmbeddings,
        device: &B::Device,
    ) -> HierarchicalPredictor<B> {
        let mut model = self.init(device);
        let weights = Tensor::<B, 2>::from_floats(
            TensorData::new(table.weights.clone(), [table.vocab_size, table.dim]),
            device,
        );
        model.word_embedding.weight = Param::from_tensor(weights);
        model
    }
}

/// Baseline hierarchical emotion classifier
#[derive(Module, Debug)]
pub struct HierarchicalPredictor<B: Backend> {
    pub word_embedding: Embedding<B>,
    pub aux_embedding: Embedding<B>,
    pub turn_encoder: Linear<B>,
    pub conversation_encoder: Linear<B>,
    pub dropout: Dropout,
    pub class_head: Linear<B>,
    pub binary_head: Linear<B>,
    pub emotion_head: Linear<B>,
}

impl<B: Backend> HierarchicalPredictor<B> {
    /// Encode one turn position: `[batch, hidden]`
    fn encode_turn(&self, turn: &TurnBatch<B>) -> Tensor<B, 2> {
        let words = self.word_embedding.forward(turn.ids.clone());
        let words = masked_mean(words, turn.mask.clone(), turn.lengths.clone());

        let aux = self.aux_embedding.forward(turn.aux_ids.clone());
        let aux = masked_mean(aux, turn.aux_mask.clone(), turn.aux_lengths.clone());

        let contextual = masked_mean(turn.contextual.clone(), turn.mask.clone(), turn.lengths.clone());

        let x = Tensor::cat(vec![words, aux, contextual], 1);
        relu(self.turn_encoder.forward(x))
    }
}

impl<B: Backend> EmotionPredictor<B> for HierarchicalPredictor<B> {
    fn forward(&self, turns: &[TurnBatch<B>; NUM_TURNS]) -> PredictorOutput<B> {
        let encoded: Vec<Tensor<B, 2>> = turns.iter().map(|turn| self.encode_turn(turn)).collect();

        let conversation = Tensor::cat(encoded, 1);
        let hidden = relu(self.conversation_encoder.forward(conversation));
        let hidden = self.dropout.forward(hidden);

        PredictorOutput {
            class_logits: self.class_head.forward(hidden.clone()),
            binary_logits: self.binary_head.forward(hidden.clone()),
            emotion_scores: self.emotion_head.forward(hidden),
        }
    }
}

/// Mean over the sequence axis counting only masked-in positions.
///
/// `x: [batch, len, dim]`, `mask: [batch, len]`, `lengths: [batch]` → `[batch, dim]`
fn masked_mean<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>, lengths: Tensor<B, 1>) -> Tensor<B, 2> {
    let [batch, _, dim] = x.dims();
    let summed = (x * mask.unsqueeze_dim::<3>(2)).sum_dim(1).reshape([batch, dim]);
    summed / lengths.unsqueeze_dim::<2>(1)
}

/// Factory for [`HierarchicalPredictor`]
#[derive(Debug, Clone)]
pub struct HierarchicalFactory {
    config: HierarchicalPredictorConfig,
    embeddings: Option<Arc<StaticEmbeddings>>,
}

impl HierarchicalFactory {
    /// Create a factory, checking the embedding table matches the config
    pub fn new(
        config: HierarchicalPredictorConfig,
        embeddings: Option<Arc<StaticEmbeddings>>,
    ) -> crate::utils::Result<Self> {
        if let Some(table) = &embeddings {
            if table.dim != config.embedding_dim || table.vocab_size != config.vocab_size {
                return Err(EnsembleError::Embedding(format!(
                    "embedding table is {}x{}, predictor expects {}x{}",
                    table.vocab_size, table.dim, config.vocab_size, config.embedding_dim
                )));
            }
        }

        Ok(Self { config, embeddings })
    }

    pub fn config(&self) -> &HierarchicalPredictorConfig {
        &self.config
    }
}

impl<B: AutodiffBackend> PredictorFactory<B> for HierarchicalFactory {
    type Inner = HierarchicalPredictor<B::InnerBackend>;
    type Model = HierarchicalPredictor<B>;

    fn build(&self, device: &B::Device) -> Self::Model {
        match &self.embeddings {
            Some(table) => self.config.init_with_embeddings(table, device),
            None => self.config.init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ConversationBatch, ConversationBatcher, ConversationItem, EncodedTurn, Vocabulary};
    use crate::model::embedding::LayerAveragedEncoder;
    use burn::data::dataloader::batcher::Batcher;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny_config() -> HierarchicalPredictorConfig {
        HierarchicalPredictorConfig::new(6, 6, 4)
            .with_embedding_dim(5)
            .with_aux_embedding_dim(3)
            .with_hidden_size(8)
            .with_dropout(0.0)
    }

    fn batch(device: &<TestBackend as Backend>::Device) -> ConversationBatch<TestBackend> {
        let turn = EncodedTurn {
            ids: vec![3, 4, 0],
            length: 2,
            aux_ids: vec![5, 0],
        };
        let item = ConversationItem {
            turns: [turn.clone(), turn.clone(), turn],
            labels: None,
        };
        let vocab = Arc::new(Vocabulary::from_words(["a", "b", "c"]));
        let batcher = ConversationBatcher::new(vocab, Arc::new(LayerAveragedEncoder::new(4, 0)));
        batcher.batch(vec![item.clone(), item], device)
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model: HierarchicalPredictor<TestBackend> = tiny_config().init(&device);
        let output = model.forward(&batch(&device).turns);

        assert_eq!(output.class_logits.dims(), [2, 4]);
        assert_eq!(output.binary_logits.dims(), [2, 2]);
        assert_eq!(output.emotion_scores.dims(), [2, 3]);
    }

    #[test]
    fn test_masked_mean_ignores_padding() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::from_floats([[[1.0, 2.0], [3.0, 4.0], [100.0, 100.0]]], &device);
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0]], &device);
        let lengths = Tensor::<TestBackend, 1>::from_floats([2.0], &device);

        let mean: Vec<f32> = masked_mean(x, mask, lengths).into_data().to_vec().unwrap();
        assert_eq!(mean, vec![2.0, 3.0]);
    }

    #[test]
    fn test_embeddings_are_copied() {
        let device = Default::default();
        let vocab = Vocabulary::from_words(["a", "b", "c"]);
        let vectors = std::collections::HashMap::from([("a".to_string(), vec![1.0; 5])]);
        let table = StaticEmbeddings::from_vectors(&vocab, 5, &vectors, 0.0, 1.0, 0).unwrap();

        let model: HierarchicalPredictor<TestBackend> = tiny_config().init_with_embeddings(&table, &device);
        let weights: Vec<f32> = model.word_embedding.weight.val().into_data().to_vec().unwrap();

        assert_eq!(&weights[0..5], &[0.0; 5]);
        assert_eq!(&weights[15..20], &[1.0; 5]);
    }

    #[test]
    fn test_factory_rejects_mismatched_table() {
        let vocab = Vocabulary::from_words(["a"]);
        let table = StaticEmbeddings::from_vectors(&vocab, 7, &Default::default(), 0.0, 1.0, 0).unwrap();
        assert!(HierarchicalFactory::new(tiny_config(), Some(Arc::new(table))).is_err());
    }
}
