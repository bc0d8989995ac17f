//! Training loop integration
//!
//! The crate does not ship a trainer. Loops that fire [`TrainerCallback`] events
//! get information-plane tracking by adding a [`MutualInfoCallback`].
//!
//! # Example
//!
//! ```
//! use infoplane::config::MutualInfoConfig;
//! use infoplane::data::BatchLoader;
//! use infoplane::model::{Linear, Sequential};
//! use infoplane::mutual_info::{MemorySink, MutualInfo};
//! use infoplane::train::{CallbackContext, CallbackManager, MutualInfoCallback};
//! use ndarray::{Array1, Array2};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! let model = Sequential::new().with_layer("fc", Linear::new(2, 4, 0));
//! let mut session = MutualInfo::new(MutualInfoConfig::default())?;
//! session.register_from(&model, "fc")?;
//! let inputs = Array2::from_shape_fn((20, 2), |(i, j)| (i + j) as f32);
//! let targets = Array1::from_shape_fn(20, |i| (i % 2) as i64);
//! session.prepare(BatchLoader::new(inputs, targets, 5)?)?;
//!
//! let model = Arc::new(Mutex::new(model));
//! let mut callbacks = CallbackManager::new();
//! callbacks.add(MutualInfoCallback::new(model, session, MemorySink::new()));
//!
//! for step in 0..10 {
//!     let ctx = CallbackContext { step, global_step: step, ..Default::default() };
//!     callbacks.on_step_end(&ctx);
//! }
//! callbacks.on_epoch_end(&CallbackContext::default());
//! # Ok::<(), infoplane::Error>(())
//! ```

pub mod callback;

pub use callback::{
    CallbackAction, CallbackContext, CallbackManager, MutualInfoCallback, TrainerCallback,
};
