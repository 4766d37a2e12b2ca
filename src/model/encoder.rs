//! Encoder stack over the context window

use ndarray::Array3;
use rand::Rng;
use tracing::trace;

use super::attention::MultiHeadAttention;
use super::feed_forward::FeedForward;
use super::layers::{Dropout, LayerNorm};
use super::positional::PositionalEncoding;
use crate::error::Result;

/// Pre-norm residual block: self-attention then feed-forward
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    norm_1: LayerNorm,
    norm_2: LayerNorm,
    pub(crate) attn: MultiHeadAttention,
    pub(crate) ff: FeedForward,
    dropout_1: Dropout,
    dropout_2: Dropout,
}

impl EncoderLayer {
    pub fn new<R: Rng + ?Sized>(heads: usize, d_model: usize, dropout: f64, rng: &mut R) -> Self {
        Self {
            norm_1: LayerNorm::new(d_model),
            norm_2: LayerNorm::new(d_model),
            attn: MultiHeadAttention::new(heads, d_model, dropout, None, rng),
            ff: FeedForward::new(d_model, dropout, rng),
            dropout_1: Dropout::new(dropout),
            dropout_2: Dropout::new(dropout),
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.norm_1.num_parameters()
            + self.norm_2.num_parameters()
            + self.attn.num_parameters()
            + self.ff.num_parameters()
    }

    pub fn forward(&self, x: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let x2 = self.norm_1.forward(x)?;
        let attended = self.attn.forward(&x2, &x2, &x2, training)?;
        let x = x + &self.dropout_1.forward(attended, training);

        let x2 = self.norm_2.forward(&x)?;
        let transformed = self.ff.forward(&x2, training)?;
        Ok(&x + &self.dropout_2.forward(transformed, training))
    }
}

/// Positional encoding, `N` encoder layers and a final normalization
#[derive(Debug, Clone)]
pub struct Encoder {
    pe: PositionalEncoding,
    pub(crate) layers: Vec<EncoderLayer>,
    norm: LayerNorm,
}

impl Encoder {
    /// Every layer starts as a copy of one template and owns its parameters from then on.
    pub fn new<R: Rng + ?Sized>(
        n_layers: usize,
        pe_window: usize,
        heads: usize,
        d_model: usize,
        dropout: f64,
        rng: &mut R,
    ) -> Self {
        let template = EncoderLayer::new(heads, d_model, dropout, rng);
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
        self.layers.iter().map(EncoderLayer::num_parameters).sum::<usize>()
            + self.norm.num_parameters()
    }

    /// `[batch, context_window, d_model_e] -> [batch, context_window, d_model_e]`
    pub fn forward(&self, x: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let mut x = self.pe.forward(x)?;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x, training)?;
            trace!(layer = i, shape = ?x.shape(), "encoder layer");
        }
        self.norm.forward(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformerError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_encoder_output_shape() {
        let mut rng = StdRng::seed_from_u64(10);
        let encoder = Encoder::new(3, 15, 4, 5, 0.1, &mut rng);
        assert_eq!(encoder.n_layers(), 3);

        let x = Array3::from_shape_fn((4, 15, 5), |(b, l, d)| ((b + 2 * l + d) as f64).sin());
        let out = encoder.forward(&x, false).unwrap();
        assert_eq!(out.shape(), &[4, 15, 5]);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_layers_are_independent_copies() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut encoder = Encoder::new(2, 8, 2, 3, 0.0, &mut rng);
        assert_eq!(
            encoder.layers[0].attn.q_linear.weight,
            encoder.layers[1].attn.q_linear.weight
        );

        encoder.layers[0].attn.q_linear.weight.fill(0.5);
        assert_ne!(
            encoder.layers[0].attn.q_linear.weight,
            encoder.layers[1].attn.q_linear.weight
        );
    }

    #[test]
    fn test_parameter_count() {
        let mut rng = StdRng::seed_from_u64(10);
        let layer = EncoderLayer::new(4, 5, 0.1, &mut rng);
        let encoder = Encoder::new(2, 15, 4, 5, 0.1, &mut rng);
        assert_eq!(encoder.num_parameters(), 2 * layer.num_parameters() + 10);
    }

    #[test]
    fn test_context_longer_than_pe_window() {
        let mut rng = StdRng::seed_from_u64(10);
        let encoder = Encoder::new(1, 10, 2, 5, 0.0, &mut rng);
        let err = encoder.forward(&Array3::zeros((1, 12, 5)), false).unwrap_err();
        assert!(matches!(err, TransformerError::SequenceTooLong { .. }));
    }
}
