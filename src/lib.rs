//! # Infoplane: information-plane tracking for neural network training
//!
//! Infoplane estimates, for every observed hidden layer T, the mutual information
//! I(X; T) with the network input and I(T; Y) with the target, and reports the
//! resulting trajectory through the information plane as training progresses.
//!
//! ## Architecture
//!
//! - **mutual_info**: estimation session, interception, quantization, estimators
//! - **model**: the layer/model abstraction the session instruments
//! - **data**: evaluation batches
//! - **config**: Declarative YAML configuration
//! - **train**: callback integration for training loops
//!
//! ## Example
//!
//! ```
//! use infoplane::{BatchLoader, Linear, MemorySink, Method, MutualInfo, Relu, Sequential};
//! use ndarray::{Array1, Array2};
//!
//! let mut model = Sequential::new()
//!     .with_layer("fc1", Linear::new(4, 8, 3))
//!     .with_layer("relu1", Relu);
//!
//! let mut mi = MutualInfo::with_method(Method::Quantile)?;
//! mi.register_from(&model, "relu1")?;
//!
//! let inputs = Array2::from_shape_fn((50, 4), |(i, j)| ((i * 13 + j) % 17) as f32);
//! let labels = Array1::from_shape_fn(50, |i| (i % 2) as i64);
//! mi.prepare(BatchLoader::new(inputs, labels, 10)?)?;
//!
//! // Every 5 batches by default
//! assert!(!mi.update(&mut model, 0, 3)?);
//! assert!(mi.update(&mut model, 0, 5)?);
//!
//! let point = mi.information()["relu1"];
//! assert!(point.info_x >= 0.0 && point.info_y >= 0.0);
//!
//! mi.plot(&mut MemorySink::new(), 0)?;
//! # Ok::<(), infoplane::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod model;
pub mod mutual_info;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use config::{load_config, MutualInfoConfig};
pub use data::{Batch, BatchLoader, DataSource};
pub use error::{Error, Result};
pub use model::{Layer, Linear, Model, Relu, Sequential, Tanh};
pub use mutual_info::{
    InformationPoint, JsonLinesSink, MemorySink, Method, MutualInfo, PlotSink, Schedule,
};
pub use train::{MutualInfoCallback, TrainerCallback};
