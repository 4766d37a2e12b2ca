//! Attention masks for decoder self-attention
//!
//! A mask is a `[1 or batch, seq_q, seq_k]` boolean tensor where `true` marks
//! a key position the query may attend to. Masks are built once and shared
//! read-only by every attention sub-layer that uses them.

use ndarray::Array3;
use std::sync::Arc;

/// Shared, immutable attention mask
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionMask {
    inner: Arc<Array3<bool>>,
}

impl AttentionMask {
    pub fn from_array(mask: Array3<bool>) -> Self {
        Self {
            inner: Arc::new(mask),
        }
    }

    /// No-lookahead mask: query row `r` may see keys `0..=r`.
    ///
    /// Built as the strictly upper triangle of a `[1, pred_dim + 1, context_dim + 1]`
    /// ones tensor with its last row and first column dropped, then transposed.
    /// The result has shape `[1, context_dim, pred_dim]`, which is
    /// `[1, pred_dim, pred_dim]` for decoder self-attention.
    pub fn causal(pred_dim: usize, context_dim: usize) -> Self {
        let upper = Array3::from_shape_fn((1, pred_dim + 1, context_dim + 1), |(_, r, c)| c > r);
        let mut mask = upper.slice(ndarray::s![.., ..pred_dim, 1..]).to_owned();
        mask.swap_axes(1, 2);
        Self::from_array(mask.as_standard_layout().into_owned())
    }

    /// Mask that lets every query see every key
    pub fn full(rows: usize, cols: usize) -> Self {
        Self::from_array(Array3::from_elem((1, rows, cols), true))
    }

    /// `(mask_batch, seq_q, seq_k)`
    pub fn dim(&self) -> (usize, usize, usize) {
        self.inner.dim()
    }

    /// Whether query `row` may attend to key `col` in the first mask slice
    pub fn allows(&self, row: usize, col: usize) -> bool {
        self.inner.get([0, row, col]).copied().unwrap_or(false)
    }

    pub fn as_array(&self) -> &Array3<bool> {
        &self.inner
    }

    /// Number of holders sharing this mask instance
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

/// Build the decoder's causal self-attention mask
pub fn build_causal_mask(pred_dim: usize, context_dim: usize) -> AttentionMask {
    AttentionMask::causal(pred_dim, context_dim)
}
