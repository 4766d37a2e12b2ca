//! Sinusoidal positional encoding
//!
//! Self-attention is permutation equivariant, so order information is
//! injected by adding a fixed table to the input sequence. The table is
//! computed once at construction and never updated by training.

use ndarray::{s, Array3};

use crate::error::{Result, TransformerError};

/// Fixed additive position table of shape `[1, window, d_model]`
#[derive(Debug, Clone)]
pub struct PositionalEncoding {
    table: Array3<f64>,
}

impl PositionalEncoding {
    /// Build the table for positions `0..window`.
    ///
    /// Feature `j` at position `pos` holds
    /// - `sin(pos / 10000^(2j / d_model))` for even `j`
    /// - `cos(pos / 10000^(2(j + 1) / d_model))` for odd `j`
    pub fn new(window: usize, d_model: usize) -> Self {
        let d = d_model as f64;
        let table = Array3::from_shape_fn((1, window, d_model), |(_, pos, j)| {
            let pos = pos as f64;
            if j % 2 == 0 {
                (pos / 10000f64.powf(2.0 * j as f64 / d)).sin()
            } else {
                (pos / 10000f64.powf(2.0 * (j + 1) as f64 / d)).cos()
            }
        });

        Self { table }
    }

    pub fn window(&self) -> usize {
        self.table.dim().1
    }

    pub fn d_model(&self) -> usize {
        self.table.dim().2
    }

    pub fn table(&self) -> &Array3<f64> {
        &self.table
    }

    /// Add the first `seq_len` rows of the table to every batch element
    pub fn forward(&self, x: &Array3<f64>) -> Result<Array3<f64>> {
        let (_, seq_len, features) = x.dim();
        if seq_len > self.window() {
            return Err(TransformerError::SequenceTooLong {
                len: seq_len,
                window: self.window(),
            });
        }
        if features != self.d_model() {
            return Err(TransformerError::shape_mismatch(
                "positional encoding features",
                self.d_model(),
                features,
            ));
        }

        Ok(x + &self.table.slice(s![.., ..seq_len, ..]))
    }
}
