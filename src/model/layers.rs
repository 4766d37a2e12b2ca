//! Basic neural network layers
//!
//! Linear projection, layer normalization and dropout over `[batch, seq, features]`
//! tensors. Weights are stored as `[out_features, in_features]`.

use ndarray::{Array, Array1, Array2, Array3, ArrayBase, Axis, Data, Dimension, Ix2};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::error::{Result, TransformerError};
use crate::tensor::{to_matrix, to_tensor3};

/// Fully connected layer
#[derive(Debug, Clone)]
pub struct Linear {
    pub(crate) weight: Array2<f64>,
    pub(crate) bias: Option<Array1<f64>>,
}

impl Linear {
    /// Create a layer with weights drawn from U(-1/sqrt(in), 1/sqrt(in))
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, bias: bool, rng: &mut R) -> Self {
        if in_features == 0 {
            return Self {
                weight: Array2::zeros((out_features, 0)),
                bias: bias.then(|| Array1::zeros(out_features)),
            };
        }

        let bound = 1.0 / (in_features as f64).sqrt();
        let dist = Uniform::new(-bound, bound);
        let weight = Array2::random_using((out_features, in_features), &dist, rng);
        let bias = bias.then(|| Array1::random_using(out_features, dist, rng));

        Self { weight, bias }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }

    /// `[rows, in_features] -> [rows, out_features]`
    pub fn forward<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix2>) -> Result<Array2<f64>> {
        if x.ncols() != self.in_features() {
            return Err(TransformerError::shape_mismatch(
                "linear input features",
                self.in_features(),
                x.ncols(),
            ));
        }

        let out = x.dot(&self.weight.t());
        Ok(match &self.bias {
            Some(bias) => out + bias,
            None => out,
        })
    }

    /// `[batch, seq, in_features] -> [batch, seq, out_features]`
    pub fn forward3(&self, x: &Array3<f64>) -> Result<Array3<f64>> {
        let (batch, seq_len, features) = x.dim();
        if features != self.in_features() {
            return Err(TransformerError::shape_mismatch(
                "linear input features",
                self.in_features(),
                features,
            ));
        }

        let out = self.forward(&to_matrix(x, (batch * seq_len, features))?)?;
        to_tensor3(out, (batch, seq_len, self.out_features()))
    }
}

/// Layer normalization over the trailing feature axis
#[derive(Debug, Clone)]
pub struct LayerNorm {
    pub(crate) gamma: Array1<f64>,
    pub(crate) beta: Array1<f64>,
    eps: f64,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Array1::ones(dim),
            beta: Array1::zeros(dim),
            eps: 1e-5,
        }
    }

    pub fn dim(&self) -> usize {
        self.gamma.len()
    }

    pub fn num_parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }

    pub fn forward(&self, x: &Array3<f64>) -> Result<Array3<f64>> {
        let (batch, seq_len, features) = x.dim();
        if features != self.dim() {
            return Err(TransformerError::shape_mismatch(
                "layer norm features",
                self.dim(),
                features,
            ));
        }
        if features == 0 {
            return Ok(x.clone());
        }

        let rows = to_matrix(x, (batch * seq_len, features))?;
        let mean = rows.mean_axis(Axis(1)).unwrap_or_default().insert_axis(Axis(1));
        let centered = &rows - &mean;
        let var = centered
            .mapv(|v| v * v)
            .mean_axis(Axis(1))
            .unwrap_or_default()
            .insert_axis(Axis(1));
        let std = var.mapv(|v| (v + self.eps).sqrt());

        let normalized = &centered / &std;
        let out = &normalized * &self.gamma + &self.beta;
        to_tensor3(out, (batch, seq_len, features))
    }
}

/// Inverted dropout, identity outside training
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    rate: f64,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn forward<D: Dimension>(&self, mut x: Array<f64, D>, training: bool) -> Array<f64, D> {
        if !training || self.rate <= 0.0 {
            return x;
        }
        if self.rate >= 1.0 {
            x.fill(0.0);
            return x;
        }

        let keep = 1.0 - self.rate;
        let mut rng = rand::thread_rng();
        x.mapv_inplace(|v| if rng.gen_bool(keep) { v / keep } else { 0.0 });
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_forward() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut linear = Linear::new(3, 2, true, &mut rng);
        linear.weight = array![[1.0, 0.0, -1.0], [0.5, 0.5, 0.5]];
        linear.bias = Some(array![1.0, -1.0]);

        let out = linear.forward(&array![[1.0, 2.0, 3.0]]).unwrap();
        assert_relative_eq!(out[[0, 0]], -1.0);
        assert_relative_eq!(out[[0, 1]], 2.0);
    }

    #[test]
    fn test_linear_without_bias() {
        let mut rng = StdRng::seed_from_u64(7);
        let linear = Linear::new(4, 6, false, &mut rng);
        assert!(linear.bias.is_none());
        assert_eq!(linear.num_parameters(), 24);

        let x = Array3::zeros((2, 3, 4));
        let out = linear.forward3(&x).unwrap();
        assert_eq!(out.shape(), &[2, 3, 6]);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_linear_init_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let linear = Linear::new(16, 8, true, &mut rng);
        let bound = 0.25;
        assert!(linear.weight.iter().all(|w| w.abs() <= bound));
        assert_eq!(linear.num_parameters(), 16 * 8 + 8);
    }

    #[test]
    fn test_linear_shape_mismatch() {
        let mut rng = StdRng::seed_from_u64(7);
        let linear = Linear::new(3, 2, true, &mut rng);
        let err = linear.forward3(&Array3::zeros((1, 2, 4))).unwrap_err();
        assert!(matches!(err, TransformerError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_layer_norm_statistics() {
        let norm = LayerNorm::new(4);
        let x = Array3::from_shape_fn((2, 3, 4), |(b, l, d)| (b + l * d) as f64 * 1.5);
        let out = norm.forward(&x).unwrap();

        for b in 0..2 {
            for l in 1..3 {
                let row = out.slice(ndarray::s![b, l, ..]);
                assert_relative_eq!(row.mean().unwrap(), 0.0, epsilon = 1e-9);
                let var = row.mapv(|v| v * v).mean().unwrap();
                assert_relative_eq!(var, 1.0, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_layer_norm_single_feature_is_zero() {
        let norm = LayerNorm::new(1);
        let x = Array3::from_shape_fn((2, 5, 1), |(b, l, _)| (b * 5 + l) as f64 - 3.0);
        let out = norm.forward(&x).unwrap();
        assert!(out.iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn test_dropout_identity_in_eval() {
        let dropout = Dropout::new(0.5);
        let x = Array3::from_elem((2, 2, 2), 3.0);
        assert_eq!(dropout.forward(x.clone(), false), x);
    }

    #[test]
    fn test_dropout_training_scales_kept_values() {
        let dropout = Dropout::new(0.5);
        let x = Array2::from_elem((50, 50), 1.0);
        let out = dropout.forward(x, true);

        assert!(out.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-12));
        let kept = out.iter().filter(|&&v| v > 0.0).count();
        assert!(kept > 1000 && kept < 1500);
    }
}
