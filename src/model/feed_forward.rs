//! Position-wise feed-forward block

use ndarray::Array3;
use rand::Rng;

use super::config::TransformerConfig;
use super::layers::{Dropout, Linear};
use crate::error::Result;
use crate::tensor::relu;

/// `d_model -> 10 * d_model -> ReLU -> dropout -> d_model`, applied to each position independently
#[derive(Debug, Clone)]
pub struct FeedForward {
    pub(crate) linear1: Linear,
    pub(crate) linear2: Linear,
    pub(crate) dropout: Dropout,
}

impl FeedForward {
    pub fn new<R: Rng + ?Sized>(d_model: usize, dropout: f64, rng: &mut R) -> Self {
        let hidden = TransformerConfig::ff_hidden(d_model);
        Self {
            linear1: Linear::new(d_model, hidden, true, rng),
            linear2: Linear::new(hidden, d_model, true, rng),
            dropout: Dropout::new(dropout),
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.linear1.num_parameters() + self.linear2.num_parameters()
    }

    pub fn forward(&self, x: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let hidden = relu(&self.linear1.forward3(x)?);
        let hidden = self.dropout.forward(hidden, training);
        self.linear2.forward3(&hidden)
    }
}
