//! Model definitions
//!
//! - [`embedding`]: static word vectors and the contextual encoder
//! - [`predictor`]: the predictor interface and the hierarchical baseline

pub mod embedding;
pub mod predictor;

pub use embedding::{ContextualEncoder, LayerAveragedEncoder, StaticEmbeddings};
pub use predictor::{
    EmotionPredictor, HierarchicalFactory, HierarchicalPredictor, HierarchicalPredictorConfig,
    PredictorFactory, PredictorOutput,
};
