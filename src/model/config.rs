//! Model configuration
//!
//! Hyperparameters are fixed when a model is built and never change for the
//! lifetime of that instance.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use crate::defaults;
use crate::error::{Result, TransformerError};

/// Hidden width multiplier of the position-wise feed-forward block
pub const FF_EXPANSION: usize = 10;

/// Experiment variant, selects the activation of the output head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Experiment {
    /// Return forecasting, unbounded output
    Return,
    /// Probability-like targets, output squashed into (0, 1)
    Probability,
}

impl Default for Experiment {
    fn default() -> Self {
        Self::Return
    }
}

impl Experiment {
    /// Whether the output head ends with a sigmoid
    pub fn is_bounded(&self) -> bool {
        !matches!(self, Self::Return)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Return => "return",
            Self::Probability => "probability",
        }
    }

    /// Anything other than `"return"` selects the bounded head.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("return") {
            Self::Return
        } else {
            Self::Probability
        }
    }
}

impl FromStr for Experiment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl Serialize for Experiment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Same name mapping as `FromStr`.
impl<'de> Deserialize<'de> for Experiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Configuration of the encoder-decoder forecasting transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Experiment variant
    pub experiment: Experiment,
    /// Encoder feature width (d_model_e)
    pub d_model_e: usize,
    /// Decoder feature width (d_model_d)
    pub d_model_d: usize,
    /// Number of layers in each of the encoder and decoder stacks
    pub n_layers: usize,
    /// Number of attention heads
    pub heads: usize,
    /// Dropout probability
    pub dropout: f64,
    /// Length of the historical input sequence
    pub context_window: usize,
    /// Length of the predicted sequence
    pub pred_window: usize,
    /// Length of the positional encoding tables
    pub pe_window: usize,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            experiment: Experiment::Return,
            d_model_e: defaults::D_MODEL_E,
            d_model_d: defaults::D_MODEL_D,
            n_layers: defaults::N_LAYERS,
            heads: defaults::HEADS,
            dropout: defaults::DROPOUT,
            context_window: defaults::CONTEXT_WINDOW,
            pred_window: defaults::PRED_WINDOW,
            pe_window: defaults::PE_WINDOW,
        }
    }
}

impl TransformerConfig {
    /// Small configuration for quick experiments and tests
    pub fn small() -> Self {
        Self {
            n_layers: 1,
            heads: 2,
            context_window: 8,
            pred_window: 4,
            pe_window: 8,
            ..Default::default()
        }
    }

    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiment = experiment;
        self
    }

    pub fn with_widths(mut self, d_model_e: usize, d_model_d: usize) -> Self {
        self.d_model_e = d_model_e;
        self.d_model_d = d_model_d;
        self
    }

    pub fn with_layers(mut self, n_layers: usize) -> Self {
        self.n_layers = n_layers;
        self
    }

    pub fn with_heads(mut self, heads: usize) -> Self {
        self.heads = heads;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Set context, prediction and positional-encoding window lengths
    pub fn with_windows(mut self, context_window: usize, pred_window: usize, pe_window: usize) -> Self {
        self.context_window = context_window;
        self.pred_window = pred_window;
        self.pe_window = pe_window;
        self
    }

    /// Input width of the bridge projection (flattened encoder output)
    pub fn bridge_in(&self) -> usize {
        self.context_window * self.d_model_e
    }

    /// Output width of the bridge projection, reshaped into the decoder memory
    pub fn bridge_out(&self) -> usize {
        self.pred_window * self.d_model_d
    }

    /// Hidden width of the feed-forward block for a given model width
    pub fn ff_hidden(d_model: usize) -> usize {
        FF_EXPANSION * d_model
    }

    /// Check the configuration-only invariants.
    ///
    /// Model construction does not call this; the mask size is never checked
    /// here since the mask is supplied separately.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("d_model_e", self.d_model_e),
            ("d_model_d", self.d_model_d),
            ("n_layers", self.n_layers),
            ("heads", self.heads),
            ("context_window", self.context_window),
            ("pred_window", self.pred_window),
            ("pe_window", self.pe_window),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(TransformerError::InvalidConfig(format!("{} must be > 0", name)));
            }
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TransformerError::InvalidConfig(
                "dropout must be in [0, 1)".to_string(),
            ));
        }

        if self.context_window > self.pe_window {
            return Err(TransformerError::InvalidConfig(format!(
                "context_window ({}) exceeds pe_window ({})",
                self.context_window, self.pe_window
            )));
        }
        if self.pred_window > self.pe_window {
            return Err(TransformerError::InvalidConfig(format!(
                "pred_window ({}) exceeds pe_window ({})",
                self.pred_window, self.pe_window
            )));
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
