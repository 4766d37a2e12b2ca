//! Encoder-decoder forecasting transformer
//!
//! Data flow for `forward(x, y)`:
//!
//! 1. `x` `[batch, context_window, d_model_e]` runs through the encoder.
//! 2. The encoder output is flattened and mapped by the bridge
//!    (`linear -> ReLU -> dropout`) to `[batch, pred_window * d_model_d]`, then
//!    reshaped into the decoder memory `[batch, pred_window, d_model_d]`.
//!    The decoder never sees raw encoder features, only this projection.
//! 3. `y` `[batch, pred_window, d_model_d]` runs through the decoder, attending
//!    causally over itself and freely over the memory.
//! 4. The decoder output is flattened and mapped to `[batch, pred_window]` by
//!    `linear -> ReLU -> dropout`, plus a sigmoid for bounded experiments.

use ndarray::{Array2, Array3};
use rand::Rng;
use tracing::{debug, info};

use super::config::TransformerConfig;
use super::decoder::Decoder;
use super::encoder::Encoder;
use super::layers::{Dropout, Linear};
use super::mask::AttentionMask;
use crate::error::{Result, TransformerError};
use crate::tensor::{relu, sigmoid, to_matrix, to_tensor3};

/// Forecasting transformer with a learned encoder-to-decoder bridge
#[derive(Debug, Clone)]
pub struct Ml4fTransformer {
    config: TransformerConfig,
    pub(crate) encoder: Encoder,
    pub(crate) bridge: Linear,
    bridge_dropout: Dropout,
    pub(crate) decoder: Decoder,
    pub(crate) output: Linear,
    output_dropout: Dropout,
    training: bool,
}

impl Ml4fTransformer {
    /// Build a model with freshly initialised parameters.
    ///
    /// `first_mask` is used by every decoder self-attention sub-layer. It must
    /// be `[1, pred_window, pred_window]`; a mismatch is not detected here and
    /// surfaces as a shape error on the first forward call.
    pub fn new(config: TransformerConfig, first_mask: AttentionMask) -> Self {
        Self::with_rng(config, first_mask, &mut rand::thread_rng())
    }

    /// Build a model drawing its initial parameters from `rng`
    pub fn with_rng<R: Rng + ?Sized>(
        config: TransformerConfig,
        first_mask: AttentionMask,
        rng: &mut R,
    ) -> Self {
        let encoder = Encoder::new(
            config.n_layers,
            config.pe_window,
            config.heads,
            config.d_model_e,
            config.dropout,
            rng,
        );
        let bridge = Linear::new(config.bridge_in(), config.bridge_out(), true, rng);
        let decoder = Decoder::new(
            config.n_layers,
            config.pe_window,
            config.heads,
            config.d_model_d,
            first_mask,
            config.dropout,
            rng,
        );
        let output = Linear::new(config.bridge_out(), config.pred_window, true, rng);

        let model = Self {
            bridge_dropout: Dropout::new(config.dropout),
            output_dropout: Dropout::new(config.dropout),
            config,
            encoder,
            bridge,
            decoder,
            output,
            training: false,
        };

        info!(
            experiment = model.config.experiment.as_str(),
            n_layers = model.config.n_layers,
            heads = model.config.heads,
            d_model_e = model.config.d_model_e,
            d_model_d = model.config.d_model_d,
            parameters = model.num_parameters(),
            "built forecasting transformer"
        );

        model
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Enable dropout
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Disable dropout; forward becomes deterministic
    pub fn eval(&mut self) {
        self.training = false;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Number of learned parameters
    pub fn num_parameters(&self) -> usize {
        self.encoder.num_parameters()
            + self.bridge.num_parameters()
            + self.decoder.num_parameters()
            + self.output.num_parameters()
    }

    /// `x` `[batch, context_window, d_model_e]`, `y` `[batch, pred_window, d_model_d]`
    /// -> prediction `[batch, pred_window]`
    pub fn forward(&self, x: &Array3<f64>, y: &Array3<f64>) -> Result<Array2<f64>> {
        let batch = x.dim().0;
        if y.dim().0 != batch {
            return Err(TransformerError::shape_mismatch("target batch", batch, y.dim().0));
        }
        debug!(x = ?x.shape(), y = ?y.shape(), training = self.training, "forward");

        let enc_output = self.encoder.forward(x, self.training)?;
        let (_, enc_len, enc_width) = enc_output.dim();
        let enc_flat = to_matrix(&enc_output, (batch, enc_len * enc_width))?;

        let enc_map = relu(&self.bridge.forward(&enc_flat)?);
        let enc_map = self.bridge_dropout.forward(enc_map, self.training);
        let memory = to_tensor3(
            enc_map,
            (batch, self.config.pred_window, self.config.d_model_d),
        )?;

        let dec_output = self.decoder.forward(y, &memory, self.training)?;
        let (_, dec_len, dec_width) = dec_output.dim();
        let dec_flat = to_matrix(&dec_output, (batch, dec_len * dec_width))?;

        let mapped = relu(&self.output.forward(&dec_flat)?);
        let mapped = self.output_dropout.forward(mapped, self.training);
        let prediction = if self.config.experiment.is_bounded() {
            sigmoid(&mapped)
        } else {
            mapped
        };

        debug!(output = ?prediction.shape(), "forward done");
        Ok(prediction)
    }
}
