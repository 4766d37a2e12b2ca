//! Decoder stack over the prediction window

use ndarray::Array3;
use rand::Rng;
use tracing::trace;

use super::attention::MultiHeadAttention;
use super::feed_forward::FeedForward;
use super::layers::{Dropout, LayerNorm};
use super::mask::AttentionMask;
use super::positional::PositionalEncoding;
use crate::error::Result;

/// Pre-norm residual block with three stages:
/// masked self-attention, cross-attention over the encoder memory, feed-forward.
#[derive(Debug, Clone)]
pub struct DecoderLayer {
    norm_1: LayerNorm,
    norm_2: LayerNorm,
    norm_3: LayerNorm,
    pub(crate) self_attn: MultiHeadAttention,
    pub(crate) cross_attn: MultiHeadAttention,
    pub(crate) ff: FeedForward,
    dropout_1: Dropout,
    dropout_2: Dropout,
    dropout_3: Dropout,
}

impl DecoderLayer {
    pub fn new<R: Rng + ?Sized>(
        heads: usize,
        d_model: usize,
        first_mask: AttentionMask,
        dropout: f64,
        rng: &mut R,
    ) -> Self {
        Self {
            norm_1: LayerNorm::new(d_model),
            norm_2: LayerNorm::new(d_model),
            norm_3: LayerNorm::new(d_model),
            self_attn: MultiHeadAttention::new(heads, d_model, dropout, Some(first_mask), rng),
            cross_attn: MultiHeadAttention::new(heads, d_model, dropout, None, rng),
            ff: FeedForward::new(d_model, dropout, rng),
            dropout_1: Dropout::new(dropout),
            dropout_2: Dropout::new(dropout),
            dropout_3: Dropout::new(dropout),
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.norm_1.num_parameters()
            + self.norm_2.num_parameters()
            + self.norm_3.num_parameters()
            + self.self_attn.num_parameters()
            + self.cross_attn.num_parameters()
            + self.ff.num_parameters()
    }

    /// `x` is the decoder stream, `memory` the bridged encoder output; both `[batch, pred_window, d_model]`
    pub fn forward(&self, x: &Array3<f64>, memory: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let x2 = self.norm_1.forward(x)?;
        let attended = self.self_attn.forward(&x2, &x2, &x2, training)?;
        let x = x + &self.dropout_1.forward(attended, training);

        let x2 = self.norm_2.forward(&x)?;
        let attended = self.cross_attn.forward(&x2, memory, memory, training)?;
        let x = &x + &self.dropout_2.forward(attended, training);

        let x2 = self.norm_3.forward(&x)?;
        let transformed = self.ff.forward(&x2, training)?;
        Ok(&x + &self.dropout_3.forward(transformed, training))
    }
}

/// Positional encoding, `N` decoder layers and a final normalization
#[derive(Debug, Clone)]
pub struct Decoder {
    pe: PositionalEncoding,
    pub(crate) layers: Vec<DecoderLayer>,
    norm: LayerNorm,
}

impl Decoder {
    /// Every layer starts as a copy of one template; all of them share `first_mask`.
    pub fn new<R: Rng + ?Sized>(
        n_layers: usize,
        pe_window: usize,
        heads: usize,
        d_model: usize,
        first_mask: AttentionMask,
        dropout: f64,
        rng: &mut R,
    ) -> Self {
        let template = DecoderLayer::new(heads, d_model, first_mask, dropout, rng);
        Self {
            pe: PositionalEncoding::new(pe_window, d_model),
            layers: vec![template; n_layers],
            norm: LayerNorm::new(d_model),
        }
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(DecoderLayer::num_parameters).sum::<usize>()
            + self.norm.num_parameters()
    }

    /// `[batch, pred_window, d_model_d] -> [batch, pred_window, d_model_d]`
    pub fn forward(&self, x: &Array3<f64>, memory: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let mut x = self.pe.forward(x)?;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x, memory, training)?;
            trace!(layer = i, shape = ?x.shape(), "decoder layer");
        }
        self.norm.forward(&x)
    }
}
