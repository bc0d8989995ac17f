//! Minimal layer implementations

use super::Layer;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fully connected layer: `y = x · Wᵀ + b`
#[derive(Clone, Debug)]
pub struct Linear {
    /// Weight matrix, shape `(out_features, in_features)`
    weight: Array2<f32>,
    /// Optional bias, shape `(out_features,)`
    bias: Option<Array1<f32>>,
}

impl Linear {
    /// Create a layer with seeded uniform initialization in `±1/sqrt(in_features)`
    pub fn new(in_features: usize, out_features: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weight = Array2::from_shape_fn((out_features, in_features), |_| {
            rng.random_range(-bound..bound)
        });
        let bias = Array1::from_shape_fn(out_features, |_| rng.random_range(-bound..bound));
        Self {
            weight,
            bias: Some(bias),
        }
    }

    /// Create a layer from explicit parameters
    pub fn from_weights(weight: Array2<f32>, bias: Option<Array1<f32>>) -> Self {
        Self { weight, bias }
    }

    /// Drop the bias term
    pub fn without_bias(mut self) -> Self {
        self.bias = None;
        self
    }

    /// Input width
    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    /// Output width
    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }
}

impl Layer for Linear {
    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let output = input.dot(&self.weight.t());
        match &self.bias {
            Some(bias) => output + bias,
            None => output,
        }
    }

    fn kind(&self) -> &str {
        "Linear"
    }
}

/// Rectified linear unit
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Layer for Relu {
    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.mapv(|x| x.max(0.0))
    }

    fn kind(&self) -> &str {
        "Relu"
    }
}

/// Hyperbolic tangent
#[derive(Clone, Copy, Debug, Default)]
pub struct Tanh;

impl Layer for Tanh {
    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.mapv(f32::tanh)
    }

    fn kind(&self) -> &str {
        "Tanh"
    }
}

/// Sign activation, mapping each value to -1, 0 or +1
#[derive(Clone, Copy, Debug, Default)]
pub struct Sign;

impl Layer for Sign {
    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.mapv(sign)
    }

    fn kind(&self) -> &str {
        "Sign"
    }
}

/// Sign with `sign(0) = 0`, unlike `f32::signum`
pub(crate) fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
