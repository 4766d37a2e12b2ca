//! Multi-head dot-product attention
//!
//! The attention core merges batch and heads into one leading axis, computes
//! `softmax(Q·Kᵀ)·V` over the key axis and lays the heads back out side by
//! side. Scores are NOT divided by `sqrt(d)`; the unscaled form is part of
//! this architecture and is kept as is.

use ndarray::{s, Array3, Array4, Zip};
use rand::Rng;

use super::layers::{Dropout, Linear};
use super::mask::AttentionMask;
use crate::error::{Result, TransformerError};
use crate::tensor::{reshape, softmax_rows};

/// Score assigned to masked-out positions before the softmax
pub const MASK_FILL: f64 = -1e9;

/// Post-softmax attention weights.
///
/// Inputs are `[batch, seq, heads, d]`; the result is `[batch * heads, seq_q, seq_k]`
/// with row `b * heads + h` holding head `h` of batch element `b`.
pub fn attention_weights(
    k: &Array4<f64>,
    q: &Array4<f64>,
    mask: Option<&AttentionMask>,
) -> Result<Array3<f64>> {
    let (batch, seq_k, heads, d) = k.dim();
    let (batch_q, seq_q, heads_q, d_q) = q.dim();
    if (batch_q, heads_q, d_q) != (batch, heads, d) {
        return Err(TransformerError::shape_mismatch(
            "attention query [batch, heads, d]",
            (batch, heads, d),
            (batch_q, heads_q, d_q),
        ));
    }

    if let Some(mask) = mask {
        let (mask_batch, mask_q, mask_k) = mask.dim();
        if (mask_q, mask_k) != (seq_q, seq_k) {
            return Err(TransformerError::shape_mismatch(
                "attention mask [seq_q, seq_k]",
                (seq_q, seq_k),
                (mask_q, mask_k),
            ));
        }
        if mask_batch != 1 && mask_batch != batch {
            return Err(TransformerError::shape_mismatch(
                "attention mask batch",
                format!("1 or {}", batch),
                mask_batch,
            ));
        }
    }

    let mut weights = Array3::zeros((batch * heads, seq_q, seq_k));
    for b in 0..batch {
        for h in 0..heads {
            let q_bh = q.slice(s![b, .., h, ..]);
            let k_bh = k.slice(s![b, .., h, ..]);
            let mut scores = q_bh.dot(&k_bh.t());

            if let Some(mask) = mask {
                let mask_index = if mask.dim().0 == 1 { 0 } else { b };
                let allowed = mask.as_array().slice(s![mask_index, .., ..]);
                Zip::from(&mut scores).and(&allowed).for_each(|score, &keep| {
                    if !keep {
                        *score = MASK_FILL;
                    }
                });
            }

            weights
                .slice_mut(s![b * heads + h, .., ..])
                .assign(&softmax_rows(&scores));
        }
    }

    Ok(weights)
}

/// Attention core.
///
/// Takes `k`, `q`, `v` shaped `[batch, seq, heads, d]` and returns
/// `[batch, seq_q, heads * d]`. Head unification is left to the caller.
pub fn scaled_dot_product_attention(
    k: &Array4<f64>,
    q: &Array4<f64>,
    v: &Array4<f64>,
    mask: Option<&AttentionMask>,
) -> Result<Array3<f64>> {
    let (batch, seq_k, heads, d) = k.dim();
    if v.dim() != (batch, seq_k, heads, d) {
        return Err(TransformerError::shape_mismatch(
            "attention value [batch, seq_k, heads, d]",
            (batch, seq_k, heads, d),
            v.dim(),
        ));
    }

    let weights = attention_weights(k, q, mask)?;
    let seq_q = q.dim().1;

    let mut output = Array3::zeros((batch, seq_q, heads * d));
    for b in 0..batch {
        for h in 0..heads {
            let attended = weights
                .slice(s![b * heads + h, .., ..])
                .dot(&v.slice(s![b, .., h, ..]));
            output
                .slice_mut(s![b, .., h * d..(h + 1) * d])
                .assign(&attended);
        }
    }

    Ok(output)
}

/// Multi-head attention with a mask fixed at construction.
///
/// Every head works at the full model width: Q, K and V are projected from
/// `d_model` to `heads * d_model` without bias, and the concatenated heads are
/// mapped back to `d_model` with a biased projection.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    heads: usize,
    d_model: usize,
    pub(crate) q_linear: Linear,
    pub(crate) k_linear: Linear,
    pub(crate) v_linear: Linear,
    pub(crate) unify_heads: Linear,
    dropout: Dropout,
    pub(crate) mask: Option<AttentionMask>,
}

impl MultiHeadAttention {
    pub fn new<R: Rng + ?Sized>(
        heads: usize,
        d_model: usize,
        dropout: f64,
        mask: Option<AttentionMask>,
        rng: &mut R,
    ) -> Self {
        let width = heads * d_model;
        Self {
            heads,
            d_model,
            q_linear: Linear::new(d_model, width, false, rng),
            k_linear: Linear::new(d_model, width, false, rng),
            v_linear: Linear::new(d_model, width, false, rng),
            unify_heads: Linear::new(width, d_model, true, rng),
            dropout: Dropout::new(dropout),
            mask,
        }
    }

    pub fn heads(&self) -> usize {
        self.heads
    }

    pub fn d_model(&self) -> usize {
        self.d_model
    }

    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    pub fn mask(&self) -> Option<&AttentionMask> {
        self.mask.as_ref()
    }

    pub fn num_parameters(&self) -> usize {
        self.q_linear.num_parameters()
            + self.k_linear.num_parameters()
            + self.v_linear.num_parameters()
            + self.unify_heads.num_parameters()
    }

    /// `[batch, seq, heads * d_model] -> [batch, seq, heads, d_model]`
    fn split_heads(&self, x: Array3<f64>) -> Result<Array4<f64>> {
        let (batch, seq_len, _) = x.dim();
        reshape(x, (batch, seq_len, self.heads, self.d_model))
    }

    fn project(&self, linear: &Linear, x: &Array3<f64>) -> Result<Array4<f64>> {
        self.split_heads(linear.forward3(x)?)
    }

    /// Attend from `q` (`[batch, seq_q, d_model]`) over `k`/`v` (`[batch, seq_k, d_model]`)
    pub fn forward(
        &self,
        q: &Array3<f64>,
        k: &Array3<f64>,
        v: &Array3<f64>,
        training: bool,
    ) -> Result<Array3<f64>> {
        let k = self.project(&self.k_linear, k)?;
        let q = self.project(&self.q_linear, q)?;
        let v = self.project(&self.v_linear, v)?;

        let heads = scaled_dot_product_attention(&k, &q, &v, self.mask.as_ref())?;
        let output = self.unify_heads.forward3(&heads)?;
        Ok(self.dropout.forward(output, training))
    }

    /// Attention weights `[batch * heads, seq_q, seq_k]` for inspection
    pub fn attention_weights(&self, q: &Array3<f64>, k: &Array3<f64>) -> Result<Array3<f64>> {
        let k = self.project(&self.k_linear, k)?;
        let q = self.project(&self.q_linear, q)?;
        attention_weights(&k, &q, self.mask.as_ref())
    }
}
