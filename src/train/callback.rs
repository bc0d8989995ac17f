//! Callback system for training events
//!
//! Provides extensible hooks for training loop events:
//! - `on_train_begin` / `on_train_end`
//! - `on_epoch_begin` / `on_epoch_end`
//! - `on_step_begin` / `on_step_end`
//!
//! [`MutualInfoCallback`] plugs an estimation session into any loop that fires
//! these events.
//!
//! # Example
//!
//! ```rust
//! use infoplane::train::callback::{TrainerCallback, CallbackContext, CallbackAction};
//!
//! struct PrintCallback;
//!
//! impl TrainerCallback for PrintCallback {
//!     fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
//!         println!("Epoch {} finished with loss {:.4}", ctx.epoch, ctx.loss);
//!         CallbackAction::Continue
//!     }
//! }
//! ```

use crate::model::Model;
use crate::mutual_info::{MutualInfo, PlotSink};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Context passed to callbacks with current training state
#[derive(Clone, Debug, Default)]
pub struct CallbackContext {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    /// Total epochs planned
    pub max_epochs: usize,
    /// Current step within epoch (0-indexed)
    pub step: usize,
    /// Total steps in epoch
    pub steps_per_epoch: usize,
    /// Global step count
    pub global_step: usize,
    /// Current loss value
    pub loss: f32,
}

/// Action to take after a callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// Continue training normally
    Continue,
    /// Stop training
    Stop,
    /// Skip rest of current epoch
    SkipEpoch,
}

/// Trait for training callbacks
///
/// All methods have default no-op implementations, so you only need to
/// implement the events you care about.
pub trait TrainerCallback: Send {
    /// Called before training starts
    fn on_train_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called after training ends
    fn on_train_end(&mut self, _ctx: &CallbackContext) {}

    /// Called before each epoch
    fn on_epoch_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called after each epoch
    fn on_epoch_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called before each training step
    fn on_step_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called after each training step
    fn on_step_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Get callback name for logging
    fn name(&self) -> &str {
        "TrainerCallback"
    }
}

// =============================================================================
// Mutual Information Callback
// =============================================================================

/// Runs estimation passes from inside a training loop
///
/// After every step the session's listen schedule is checked with the number of
/// batches completed in the epoch; at epoch end the results are plotted and
/// drained. The model is shared with the loop through a mutex so the callback
/// can swap layers between steps.
pub struct MutualInfoCallback<M: Model + Send, S: PlotSink + Send> {
    model: Arc<Mutex<M>>,
    session: MutualInfo,
    sink: S,
    passes: usize,
}

impl<M: Model + Send, S: PlotSink + Send> MutualInfoCallback<M, S> {
    /// Create a callback for a prepared session
    pub fn new(model: Arc<Mutex<M>>, session: MutualInfo, sink: S) -> Self {
        Self {
            model,
            session,
            sink,
            passes: 0,
        }
    }

    /// The estimation session
    pub fn session(&self) -> &MutualInfo {
        &self.session
    }

    /// Mutable access to the estimation session
    pub fn session_mut(&mut self) -> &mut MutualInfo {
        &mut self.session
    }

    /// The plot sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Number of passes run so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Consume the callback, returning the session and sink
    pub fn into_parts(self) -> (MutualInfo, S) {
        (self.session, self.sink)
    }
}

impl<M: Model + Send, S: PlotSink + Send> TrainerCallback for MutualInfoCallback<M, S> {
    fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        let mut model = self.model.lock();
        match self.session.update(&mut *model, ctx.epoch, ctx.step + 1) {
            Ok(true) => self.passes += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(epoch = ctx.epoch, step = ctx.step, error = %e, "mutual information pass failed");
            }
        }
        CallbackAction::Continue
    }

    fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        if let Err(e) = self.session.plot(&mut self.sink, ctx.epoch) {
            warn!(epoch = ctx.epoch, error = %e, "mutual information plot failed");
        }
        CallbackAction::Continue
    }

    fn name(&self) -> &str {
        "MutualInfoCallback"
    }
}

// =============================================================================
// Callback Manager
// =============================================================================

/// Manages multiple callbacks
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
}

impl CallbackManager {
    /// Create new callback manager
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Add a callback
    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Get number of callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Names of registered callbacks
    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    /// Fire train begin event
    pub fn on_train_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        for cb in &mut self.callbacks {
            if cb.on_train_begin(ctx) == CallbackAction::Stop {
                return CallbackAction::Stop;
            }
        }
        CallbackAction::Continue
    }

    /// Fire train end event
    pub fn on_train_end(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_train_end(ctx);
        }
    }

    /// Fire epoch begin event
    pub fn on_epoch_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        for cb in &mut self.callbacks {
            match cb.on_epoch_begin(ctx) {
                CallbackAction::Stop => return CallbackAction::Stop,
                CallbackAction::SkipEpoch => return CallbackAction::SkipEpoch,
                _ => {}
            }
        }
        CallbackAction::Continue
    }

    /// Fire epoch end event
    pub fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        for cb in &mut self.callbacks {
            if cb.on_epoch_end(ctx) == CallbackAction::Stop {
                return CallbackAction::Stop;
            }
        }
        CallbackAction::Continue
    }

    /// Fire step begin event
    pub fn on_step_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        for cb in &mut self.callbacks {
            if cb.on_step_begin(ctx) == CallbackAction::Stop {
                return CallbackAction::Stop;
            }
        }
        CallbackAction::Continue
    }

    /// Fire step end event
    pub fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        for cb in &mut self.callbacks {
            if cb.on_step_end(ctx) == CallbackAction::Stop {
                return CallbackAction::Stop;
            }
        }
        CallbackAction::Continue
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MutualInfoConfig;
    use crate::data::BatchLoader;
    use crate::model::{Linear, Sequential, Tanh};
    use crate::mutual_info::{MemorySink, Schedule, INFORMATION_PLANE_TITLE};
    use ndarray::{Array1, Array2};

    struct CountingCallback {
        steps: Arc<Mutex<usize>>,
    }

    impl TrainerCallback for CountingCallback {
        fn on_step_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
            *self.steps.lock() += 1;
            CallbackAction::Continue
        }
    }

    struct StopAtEpoch(usize);

    impl TrainerCallback for StopAtEpoch {
        fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
            if ctx.epoch >= self.0 {
                CallbackAction::Stop
            } else {
                CallbackAction::Continue
            }
        }

        fn name(&self) -> &str {
            "StopAtEpoch"
        }
    }

    fn prepared_session(schedule: Schedule) -> (Arc<Mutex<Sequential>>, MutualInfo) {
        let model = Sequential::new()
            .with_layer("hidden", Linear::new(3, 6, 11))
            .with_layer("act", Tanh);
        let config = MutualInfoConfig::default()
            .with_listen_schedule(schedule)
            .with_parallel(false);
        let mut session = MutualInfo::new(config).unwrap();
        session.register_from(&model, "hidden").unwrap();

        let inputs = Array2::from_shape_fn((40, 3), |(i, j)| ((i * 5 + j) % 9) as f32 / 9.0);
        let targets = Array1::from_shape_fn(40, |i| (i % 2) as i64);
        session
            .prepare(BatchLoader::new(inputs, targets, 10).unwrap())
            .unwrap();
        (Arc::new(Mutex::new(model)), session)
    }

    #[test]
    fn test_callback_context_default() {
        let ctx = CallbackContext::default();
        assert_eq!(ctx.epoch, 0);
        assert_eq!(ctx.loss, 0.0);
    }

    #[test]
    fn test_manager_fires_all_callbacks() {
        let steps = Arc::new(Mutex::new(0));
        let mut manager = CallbackManager::new();
        manager.add(CountingCallback {
            steps: Arc::clone(&steps),
        });
        manager.add(CountingCallback {
            steps: Arc::clone(&steps),
        });
        assert_eq!(manager.len(), 2);

        manager.on_step_end(&CallbackContext::default());
        assert_eq!(*steps.lock(), 2);
    }

    #[test]
    fn test_manager_propagates_stop() {
        let mut manager = CallbackManager::default();
        manager.add(StopAtEpoch(1));
        assert_eq!(manager.names(), vec!["StopAtEpoch"]);

        let mut ctx = CallbackContext::default();
        assert_eq!(manager.on_epoch_end(&ctx), CallbackAction::Continue);
        ctx.epoch = 1;
        assert_eq!(manager.on_epoch_end(&ctx), CallbackAction::Stop);
    }

    #[test]
    fn test_mutual_info_callback_follows_schedule() {
        let (model, session) = prepared_session(Schedule::every_batches(2));
        let mut callback = MutualInfoCallback::new(Arc::clone(&model), session, MemorySink::new());

        let mut ctx = CallbackContext {
            steps_per_epoch: 4,
            max_epochs: 1,
            ..Default::default()
        };
        for step in 0..4 {
            ctx.step = step;
            ctx.global_step = step;
            assert_eq!(callback.on_step_end(&ctx), CallbackAction::Continue);
        }

        // batches completed 2 and 4
        assert_eq!(callback.passes(), 2);
        assert!(callback.session().information().contains_key("hidden"));
        assert!(!callback.session().is_active());

        callback.on_epoch_end(&ctx);
        assert!(callback.session().information().is_empty());
        assert_eq!(
            callback.sink().events_for(INFORMATION_PLANE_TITLE).count(),
            1
        );
    }

    #[test]
    fn test_mutual_info_callback_restores_model() {
        let (model, session) = prepared_session(Schedule::always());
        let original = model.lock().layer("hidden").unwrap();
        let mut callback = MutualInfoCallback::new(Arc::clone(&model), session, MemorySink::new());

        callback.on_step_end(&CallbackContext::default());
        assert_eq!(callback.passes(), 1);

        let restored = model.lock().layer("hidden").unwrap();
        assert!(Arc::ptr_eq(&original, &restored));
        assert_eq!(callback.name(), "MutualInfoCallback");
    }

    #[test]
    fn test_mutual_info_callback_in_manager() {
        let (model, session) = prepared_session(Schedule::always());
        let mut manager = CallbackManager::new();
        manager.add(MutualInfoCallback::new(model, session, MemorySink::new()));

        let ctx = CallbackContext::default();
        assert_eq!(manager.on_step_end(&ctx), CallbackAction::Continue);
        assert_eq!(manager.on_epoch_end(&ctx), CallbackAction::Continue);
    }
}
