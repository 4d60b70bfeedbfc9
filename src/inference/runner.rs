//! Batched class prediction over an encoded dataset

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;

use crate::dataset::{ConversationBatch, ConversationBatcher, ConversationDataset};
use crate::model::EmotionPredictor;
use crate::utils::{EnsembleError, Result};

/// Argmax class of every item, in dataset order
pub fn predict_classes<B, M>(
    model: &M,
    dataset: &ConversationDataset,
    batcher: &ConversationBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<Vec<usize>>
where
    B: Backend,
    M: EmotionPredictor<B>,
{
    let len = dataset.len();
    let mut predictions = Vec::with_capacity(len);

    for start in (0..len).step_by(batch_size.max(1)) {
        let end = (start + batch_size).min(len);
        let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();

        if items.is_empty() {
            continue;
        }

        let batch: ConversationBatch<B> = batcher.batch(items, device);
        let output = model.forward(&batch.turns);
        let classes = output.class_logits.argmax(1).reshape([batch.size]);

        let values: Vec<i64> = classes
            .into_data()
            .convert::<i64>()
            .to_vec()
            .map_err(|e| EnsembleError::Inference(format!("{:?}", e)))?;
        predictions.extend(values.into_iter().map(|v| v as usize));
    }

    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use burn::tensor::{Tensor, TensorData};
    use burn_ndarray::NdArray;

    use crate::dataset::{ConversationItem, EncodedTurn, TurnBatch, Vocabulary, NUM_TURNS};
    use crate::model::embedding::LayerAveragedEncoder;
    use crate::model::PredictorOutput;

    type TestBackend = NdArray<f32>;

    /// Predicts the class equal to the first word id minus 3
    struct FirstTokenPredictor;

    impl<B: Backend> EmotionPredictor<B> for FirstTokenPredictor {
        fn forward(&self, turns: &[TurnBatch<B>; NUM_TURNS]) -> PredictorOutput<B> {
            let [batch, seq_len] = turns[0].ids.dims();
            let device = turns[0].ids.device();
            let ids: Vec<i64> = turns[0].ids.clone().into_data().convert::<i64>().to_vec().unwrap();

            let mut logits = vec![0.0f32; batch * 4];
            for row in 0..batch {
                logits[row * 4 + (ids[row * seq_len] - 3) as usize] = 1.0;
            }

            PredictorOutput {
                class_logits: Tensor::from_floats(TensorData::new(logits, [batch, 4]), &device),
                binary_logits: Tensor::zeros([batch, 2], &device),
                emotion_scores: Tensor::zeros([batch, 3], &device),
            }
        }
    }

    fn item(first_id: i64) -> ConversationItem {
        let turn = EncodedTurn {
            ids: vec![first_id, 0],
            length: 1,
            aux_ids: vec![0],
        };
        ConversationItem {
            turns: [turn.clone(), turn.clone(), turn],
            labels: None,
        }
    }

    #[test]
    fn test_predictions_keep_dataset_order_across_batches() {
        let device = Default::default();
        let vocab = Arc::new(Vocabulary::from_words(["a", "b", "c", "d"]));
        let batcher = ConversationBatcher::new(vocab, Arc::new(LayerAveragedEncoder::new(2, 0)));
        let dataset = ConversationDataset::new(vec![item(6), item(3), item(5), item(4), item(3)]);

        let predictions =
            predict_classes::<TestBackend, _>(&FirstTokenPredictor, &dataset, &batcher, 2, &device)
                .unwrap();
        assert_eq!(predictions, vec![3, 0, 2, 1, 0]);
    }

    #[test]
    fn test_empty_dataset() {
        let device = Default::default();
        let vocab = Arc::new(Vocabulary::from_words(["a"]));
        let batcher = ConversationBatcher::new(vocab, Arc::new(LayerAveragedEncoder::new(2, 0)));

        let predictions = predict_classes::<TestBackend, _>(
            &FirstTokenPredictor,
            &ConversationDataset::default(),
            &batcher,
            4,
            &device,
        )
        .unwrap();
        assert!(predictions.is_empty());
    }
}
