//! Backend selection
//!
//! NdArray (CPU) is always available; the `cuda` feature switches the
//! default to CUDA.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(all(not(feature = "cuda"), any(feature = "ndarray", feature = "cpu")))]
pub type DefaultBackend = burn_ndarray::NdArray<f32>;

#[cfg(all(not(feature = "cuda"), not(feature = "ndarray"), not(feature = "cpu")))]
compile_error!("At least one backend (cuda, ndarray, or cpu) must be enabled!");

/// Autodiff backend the folds train on
pub type TrainingBackend = Autodiff<DefaultBackend>;

pub fn default_device() -> <TrainingBackend as Backend>::Device {
    <TrainingBackend as Backend>::Device::default()
}

/// Human-readable backend name for logs
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(all(not(feature = "cuda"), any(feature = "ndarray", feature = "cpu")))]
    {
        "NdArray (CPU)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name_matches_features() {
        #[cfg(not(feature = "cuda"))]
        assert_eq!(backend_name(), "NdArray (CPU)");
        #[cfg(feature = "cuda")]
        assert_eq!(backend_name(), "CUDA (GPU)");
    }
}
