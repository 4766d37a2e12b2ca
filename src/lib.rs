//! # ML4F Transformer
//!
//! Sequence-to-sequence attention network for financial time-series
//! forecasting. An encoder reads a window of multivariate market features, a
//! learned bridge compresses it into the decoder's feature space, and a
//! causally masked decoder produces one prediction per step of the
//! prediction window.
//!
//! ## Modules
//!
//! - `model` - Positional encoding, attention, encoder/decoder stacks and the top-level model
//! - `tensor` - ndarray helpers (reshapes, softmax, activations)
//! - `error` - Error types
//!
//! Data loading, training and reporting are left to the caller: the crate
//! takes tensors of a defined shape and returns the forward-pass output.
//!
//! ## Example
//!
//! ```rust
//! use ml4f_transformer::prelude::*;
//! use ndarray::Array3;
//!
//! let config = TransformerConfig::default().with_layers(4);
//! let mask = build_causal_mask(config.pred_window, config.pred_window);
//! let model = Ml4fTransformer::new(config, mask);
//!
//! let x = Array3::zeros((4, 15, 5)); // [batch, context_window, d_model_e]
//! let y = Array3::zeros((4, 5, 1)); // [batch, pred_window, d_model_d]
//!
//! let prediction = model.forward(&x, &y).unwrap();
//! assert_eq!(prediction.shape(), &[4, 5]);
//! ```

pub mod error;
pub mod model;
pub mod tensor;

pub use error::{Result, TransformerError};
pub use model::{
    build_causal_mask, AttentionMask, Decoder, Encoder, Experiment, FeedForward,
    Ml4fTransformer, MultiHeadAttention, PositionalEncoding, TransformerConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default settings
pub mod defaults {
    /// Encoder feature width
    pub const D_MODEL_E: usize = 5;

    /// Decoder feature width
    pub const D_MODEL_D: usize = 1;

    /// Layers per stack
    pub const N_LAYERS: usize = 2;

    /// Attention heads
    pub const HEADS: usize = 4;

    /// Dropout rate
    pub const DROPOUT: f64 = 0.1;

    /// Encoder context length
    pub const CONTEXT_WINDOW: usize = 15;

    /// Prediction horizon
    pub const PRED_WINDOW: usize = 5;

    /// Positional encoding table length
    pub const PE_WINDOW: usize = 15;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Result, TransformerError};
    pub use crate::model::{
        build_causal_mask, AttentionMask, Experiment, Ml4fTransformer, TransformerConfig,
    };
}
