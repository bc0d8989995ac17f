//! Model collaborator
//!
//! The estimation engine observes a model through two capabilities: running a
//! forward pass, and swapping the module registered under a name. Layers are shared
//! as `Arc<dyn Layer>` so the interceptor can keep the original alive while a
//! recording wrapper stands in its place.
//!
//! # Example
//!
//! ```
//! use infoplane::model::{Linear, Model, Relu, Sequential};
//! use ndarray::Array2;
//!
//! let model = Sequential::new()
//!     .with_layer("fc1", Linear::new(4, 10, 7))
//!     .with_layer("relu1", Relu)
//!     .with_layer("fc2", Linear::new(10, 2, 8));
//!
//! let output = model.forward(&Array2::zeros((3, 4)));
//! assert_eq!(output.dim(), (3, 2));
//! ```

mod layers;


pub use layers::{Linear, Relu, Sign, Tanh};
pub(crate) use layers::sign;

use crate::error::{Error, Result};
use ndarray::Array2;
use std::sync::Arc;

/// A unary forward computation over a batch (one sample per row)
pub trait Layer: Send + Sync {
    /// Compute the layer output for a batch
    fn forward(&self, input: &Array2<f32>) -> Array2<f32>;

    /// Short type name for logging
    fn kind(&self) -> &str {
        "Layer"
    }
}

/// A model exposing named, swappable sub-modules
pub trait Model {
    /// Run a full forward pass
    fn forward(&self, input: &Array2<f32>) -> Array2<f32>;

    /// Currently installed module under `name`
    fn layer(&self, name: &str) -> Option<Arc<dyn Layer>>;

    /// Install `layer` under `name`, returning the module it replaced
    fn set_layer(&mut self, name: &str, layer: Arc<dyn Layer>) -> Result<Arc<dyn Layer>>;

    /// Names of all sub-modules in execution order
    fn layer_names(&self) -> Vec<String>;
}

/// Feed-forward stack of named layers
#[derive(Clone, Default)]
pub struct Sequential {
    layers: Vec<(String, Arc<dyn Layer>)>,
}

impl Sequential {
    /// Create an empty model
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append a layer
    pub fn with_layer<L: Layer + 'static>(mut self, name: &str, layer: L) -> Self {
        self.push(name, Arc::new(layer));
        self
    }

    /// Append an already shared layer
    pub fn push(&mut self, name: &str, layer: Arc<dyn Layer>) {
        self.layers.push((name.to_string(), layer));
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the model has no layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Model for Sequential {
    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        self.layers
            .iter()
            .fold(input.clone(), |x, (_, layer)| layer.forward(&x))
    }

    fn layer(&self, name: &str) -> Option<Arc<dyn Layer>> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, layer)| Arc::clone(layer))
    }

    fn set_layer(&mut self, name: &str, layer: Arc<dyn Layer>) -> Result<Arc<dyn Layer>> {
        let slot = self
            .layers
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))?;
        Ok(std::mem::replace(&mut slot.1, layer))
    }

    fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|(n, _)| n.clone()).collect()
    }
}

impl std::fmt::Debug for Sequential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.layers
                    .iter()
                    .map(|(name, layer)| format!("{}: {}", name, layer.kind())),
            )
            .finish()
    }
}
