//! Non-destructive activation capture
//!
//! Recording works by swapping a registered layer for a [`RecordingLayer`] that
//! forwards to the original and copies its output into a shared
//! [`ActivationStore`]. Detaching puts the original `Arc` back, so the model ends up
//! holding exactly the module it started with.

use crate::error::{Error, Result};
use crate::model::{Layer, Model};
use ndarray::Array2;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Batches recorded for one layer during a single pass
#[derive(Clone, Debug, Default)]
pub struct ActivationBuffer {
    batches: Vec<Array2<f32>>,
    samples: usize,
}

impl ActivationBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch
    pub fn push(&mut self, batch: Array2<f32>) {
        self.samples += batch.nrows();
        self.batches.push(batch);
    }

    /// Total number of recorded samples
    pub fn len(&self) -> usize {
        self.samples
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Recorded batches in arrival order
    pub fn batches(&self) -> &[Array2<f32>] {
        &self.batches
    }

    /// Consume the buffer, returning its batches
    pub fn into_batches(self) -> Vec<Array2<f32>> {
        self.batches
    }
}

/// State shared between the session and every installed [`RecordingLayer`]
#[derive(Debug)]
pub struct ActivationStore {
    active: AtomicBool,
    capacity: Option<usize>,
    buffers: Mutex<BTreeMap<String, ActivationBuffer>>,
}

impl ActivationStore {
    /// Create a store keeping at most `capacity` samples per layer
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            active: AtomicBool::new(false),
            capacity,
            buffers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Whether a recording pass is in progress
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Record `output` for `layer` unless its buffer already holds `capacity` samples
    ///
    /// Returns whether the batch was kept.
    pub fn save(&self, layer: &str, output: &Array2<f32>) -> bool {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(layer.to_string()).or_default();
        if self.capacity.is_some_and(|cap| buffer.len() >= cap) {
            return false;
        }
        buffer.push(output.clone());
        true
    }

    /// Number of samples recorded for `layer`
    pub fn sample_count(&self, layer: &str) -> usize {
        self.buffers.lock().get(layer).map_or(0, ActivationBuffer::len)
    }

    /// Remove and return every buffer
    pub fn drain(&self) -> BTreeMap<String, ActivationBuffer> {
        std::mem::take(&mut *self.buffers.lock())
    }
}

/// Layer wrapper that records the wrapped layer's output
pub struct RecordingLayer {
    name: String,
    original: Arc<dyn Layer>,
    store: Arc<ActivationStore>,
}

impl RecordingLayer {
    /// Wrap `original`, recording into `store` under `name`
    pub fn new(name: &str, original: Arc<dyn Layer>, store: Arc<ActivationStore>) -> Self {
        Self {
            name: name.to_string(),
            original,
            store,
        }
    }

    /// The wrapped layer
    pub fn original(&self) -> &Arc<dyn Layer> {
        &self.original
    }
}

impl Layer for RecordingLayer {
    /// # Panics
    ///
    /// Panics when called outside an active pass: a wrapper still installed after
    /// the pass finished means the model was not restored.
    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        assert!(
            self.store.is_active(),
            "recording wrapper for layer '{}' invoked outside an active session",
            self.name
        );
        let output = self.original.forward(input);
        self.store.save(&self.name, &output);
        output
    }

    fn kind(&self) -> &str {
        "RecordingLayer"
    }
}

/// A registered layer: its original module and the wrapper currently installed
#[derive(Clone)]
pub struct LayerHandle {
    original: Arc<dyn Layer>,
    wrapper: Option<Arc<dyn Layer>>,
}

impl LayerHandle {
    /// The uninstrumented module, as last seen in the model
    pub fn original(&self) -> &Arc<dyn Layer> {
        &self.original
    }

    /// Whether a recording wrapper is installed
    pub fn is_wrapped(&self) -> bool {
        self.wrapper.is_some()
    }
}

/// Registry of observed layers that installs and removes recording wrappers
pub struct Interceptor {
    handles: BTreeMap<String, LayerHandle>,
    store: Arc<ActivationStore>,
}

impl Interceptor {
    /// Create an interceptor recording at most `capacity` samples per layer
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            handles: BTreeMap::new(),
            store: Arc::new(ActivationStore::new(capacity)),
        }
    }

    /// Register `layer` under `name`
    ///
    /// Registering the same module twice is a no-op. Registering a different module
    /// under a known name fails.
    pub fn register(&mut self, name: &str, layer: Arc<dyn Layer>) -> Result<()> {
        if self.is_active() {
            return Err(Error::SessionActive(format!(
                "cannot register '{}' while recording",
                name
            )));
        }
        if let Some(handle) = self.handles.get(name) {
            if Arc::ptr_eq(&handle.original, &layer) {
                debug!(layer = name, "layer already registered");
                return Ok(());
            }
            return Err(Error::DuplicateLayer(name.to_string()));
        }
        self.handles.insert(
            name.to_string(),
            LayerHandle {
                original: layer,
                wrapper: None,
            },
        );
        Ok(())
    }

    /// Register the module currently installed in `model` under `name`
    pub fn register_from(&mut self, model: &dyn Model, name: &str) -> Result<()> {
        let layer = model
            .layer(name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))?;
        self.register(name, layer)
    }

    /// Install a recording wrapper on every registered layer that lacks one
    ///
    /// The wrapper goes around the module `model` holds right now, which is not
    /// necessarily the one registered: training may have swapped in updated weights.
    /// The replaced module becomes the handle's original, so [`detach`](Self::detach)
    /// puts back exactly what it took out. On failure every wrapper installed so far
    /// is removed again.
    pub fn attach(&mut self, model: &mut dyn Model) -> Result<()> {
        let mut result = Ok(());
        for (name, handle) in self.handles.iter_mut() {
            if handle.wrapper.is_some() {
                continue;
            }
            let Some(live) = model.layer(name) else {
                result = Err(Error::LayerNotFound(name.clone()));
                break;
            };
            if !Arc::ptr_eq(&live, &handle.original) {
                debug!(
                    layer = %name,
                    kind = live.kind(),
                    "module was replaced since registration, following it"
                );
            }
            let wrapper: Arc<dyn Layer> = Arc::new(RecordingLayer::new(
                name,
                live,
                Arc::clone(&self.store),
            ));
            match model.set_layer(name, Arc::clone(&wrapper)) {
                Ok(previous) => {
                    handle.original = previous;
                    handle.wrapper = Some(wrapper);
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        if let Err(e) = result {
            warn!(error = %e, "failed to attach recording wrappers, restoring model");
            self.detach(model)?;
            return Err(e);
        }
        self.store.set_active(true);
        Ok(())
    }

    /// Put back the module each installed wrapper replaced
    pub fn detach(&mut self, model: &mut dyn Model) -> Result<()> {
        self.store.set_active(false);
        for (name, handle) in self.handles.iter_mut() {
            if handle.wrapper.take().is_some() {
                model.set_layer(name, Arc::clone(&handle.original))?;
            }
        }
        Ok(())
    }

    /// Whether recording wrappers are live
    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }

    /// Names of registered layers, sorted
    pub fn layer_names(&self) -> Vec<String> {
        self.handles.keys().cloned().collect()
    }

    /// Handle registered under `name`
    pub fn handle(&self, name: &str) -> Option<&LayerHandle> {
        self.handles.get(name)
    }

    /// Number of registered layers
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if no layer is registered
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Shared activation store
    pub fn store(&self) -> &Arc<ActivationStore> {
        &self.store
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("layers", &self.layer_names())
            .field("active", &self.is_active())
            .finish()
    }
}
