//! Encoder-decoder attention model
//!
//! Components, leaf first:
//! - `layers` - Linear, LayerNorm, Dropout
//! - `positional` - fixed sinusoidal positional encoding
//! - `mask` - causal mask builder
//! - `attention` - attention core and multi-head attention
//! - `feed_forward` - position-wise feed-forward block
//! - `encoder` / `decoder` - residual layer stacks
//! - `transformer` - top-level model with the encoder-to-decoder bridge

mod attention;
mod config;
mod decoder;
mod encoder;
mod feed_forward;
mod layers;
mod mask;
mod positional;
mod transformer;

pub use attention::{attention_weights, scaled_dot_product_attention, MultiHeadAttention, MASK_FILL};
pub use config::{Experiment, TransformerConfig, FF_EXPANSION};
pub use decoder::{Decoder, DecoderLayer};
pub use encoder::{Encoder, EncoderLayer};
pub use feed_forward::FeedForward;
pub use layers::{Dropout, LayerNorm, Linear};
pub use mask::{build_causal_mask, AttentionMask};
pub use positional::PositionalEncoding;
pub use transformer::Ml4fTransformer;
