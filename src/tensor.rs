//! Tensor helpers shared by the model layers
//!
//! Reshapes follow the logical (row-major) element order, so they behave like
//! a contiguous `view` regardless of the source array's memory layout. Arrays
//! already in standard layout are reshaped in place; other layouts are copied
//! into standard order first.

use ndarray::{Array, Array2, Array3, Axis, CowArray, Dimension, IntoDimension, Ix2};

use crate::error::Result;

/// Matrix view of a rank-3 tensor with the same element count
pub fn to_matrix(x: &Array3<f64>, shape: (usize, usize)) -> Result<CowArray<'_, f64, Ix2>> {
    Ok(x.to_shape(shape)?)
}

/// Reshape an owned tensor, reusing its buffer when it is in standard layout
pub fn reshape<D, E>(x: Array<f64, D>, shape: E) -> Result<Array<f64, E::Dim>>
where
    D: Dimension,
    E: IntoDimension,
{
    let x = if x.is_standard_layout() {
        x
    } else {
        x.as_standard_layout().into_owned()
    };
    Ok(x.into_shape(shape)?)
}

/// Reshape an owned matrix into a rank-3 tensor with the same element count
pub fn to_tensor3(x: Array2<f64>, shape: (usize, usize, usize)) -> Result<Array3<f64>> {
    reshape(x, shape)
}

/// Softmax over each row of a score matrix
pub fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let max_scores = scores.map_axis(Axis(1), |row| {
        row.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    });
    let exp_scores = (scores - &max_scores.insert_axis(Axis(1))).mapv(f64::exp);
    let sum_exp = exp_scores.sum_axis(Axis(1)).insert_axis(Axis(1));
    &exp_scores / &sum_exp
}

/// Rectified linear unit
pub fn relu<D: Dimension>(x: &Array<f64, D>) -> Array<f64, D> {
    x.mapv(|v| v.max(0.0))
}

/// Logistic sigmoid
pub fn sigmoid<D: Dimension>(x: &Array<f64, D>) -> Array<f64, D> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}
