//! Mutual information estimation for hidden layers
//!
//! Tracks how much a network's hidden representations know about its input and
//! its target, the two coordinates of the information plane.
//!
//! # Architecture
//!
//! - **Interceptor**: swaps registered layers for recording wrappers during a pass
//! - **Quantizer**: turns recorded activations into symbols
//! - **Estimator**: histogram or KSG mutual information, in bits
//! - **Schedule**: decides which training steps run a pass
//! - **Dispatch**: quantizes and estimates every layer on the rayon pool
//! - **Report**: drains results into a [`PlotSink`]
//!
//! # Example
//!
//! ```
//! use infoplane::data::BatchLoader;
//! use infoplane::model::{Linear, Relu, Sequential};
//! use infoplane::mutual_info::{MemorySink, MutualInfo, Schedule};
//! use infoplane::config::MutualInfoConfig;
//! use ndarray::{Array1, Array2};
//!
//! let mut model = Sequential::new()
//!     .with_layer("fc1", Linear::new(4, 10, 1))
//!     .with_layer("relu", Relu);
//!
//! let config = MutualInfoConfig::default().with_listen_schedule(Schedule::always());
//! let mut mi = MutualInfo::new(config)?;
//! mi.register_from(&model, "fc1")?;
//!
//! let inputs = Array2::from_shape_fn((64, 4), |(i, j)| ((i * 7 + j * 3) % 11) as f32);
//! let labels = Array1::from_shape_fn(64, |i| (i % 2) as i64);
//! mi.prepare(BatchLoader::new(inputs, labels, 16)?)?;
//!
//! assert!(mi.update(&mut model, 0, 0)?);
//! assert!(mi.information().contains_key("fc1"));
//!
//! let mut sink = MemorySink::new();
//! mi.plot(&mut sink, 0)?;
//! assert!(mi.information().is_empty());
//! # Ok::<(), infoplane::Error>(())
//! ```

mod dispatch;
mod estimate;
mod interceptor;
mod kmeans;
mod quantize;
mod report;
mod schedule;


pub use dispatch::{dispatch, run_job, Job, JobContext, JobResult, References};
pub use estimate::{
    digamma, entropy, mutual_info_histogram, mutual_info_knn, Estimator, DEFAULT_KNN_NEIGHBORS,
};
pub use interceptor::{ActivationBuffer, ActivationStore, Interceptor, LayerHandle, RecordingLayer};
pub use kmeans::{minibatch_kmeans, KMeansParams};
pub use quantize::{
    compression, count_unique_rows, unique_rows, BinSearch, Method, Quantized, Quantizer, Symbols,
    MIN_BINS,
};
pub use report::{
    plot_information_plane, plot_quantized_dispersion, plot_quantized_hist, JsonLinesSink,
    MemorySink, PlotEvent, PlotOptions, PlotSink, DISPERSION_WINDOW, INFORMATION_PLANE_TITLE,
};
pub use schedule::Schedule;

use crate::config::{validate_config, MutualInfoConfig};
use crate::data::DataSource;
use crate::error::{Error, Result};
use crate::model::{Layer, Model};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reserved name of the input reference
pub const INPUT_LAYER: &str = "input";

/// Reserved name of the target reference
pub const TARGET_LAYER: &str = "target";

/// Information-plane coordinates of one layer, in bits
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InformationPoint {
    /// I(X; T): information the layer keeps about the input
    pub info_x: f64,
    /// I(T; Y): information the layer carries about the target
    pub info_y: f64,
}

/// Estimation session for one model
///
/// Lifecycle: register layers, [`prepare`](Self::prepare) once with the evaluation
/// data, then call [`update`](Self::update) (or the start/finish pair) from the
/// training loop and [`plot`](Self::plot) to drain results.
pub struct MutualInfo {
    config: MutualInfoConfig,
    quantizer: Quantizer,
    estimator: Estimator,
    interceptor: Interceptor,
    eval_loader: Option<Box<dyn DataSource>>,
    references: Option<References>,
    n_bins: BTreeMap<String, usize>,
    quantized: BTreeMap<String, Symbols>,
    information: BTreeMap<String, InformationPoint>,
}

impl MutualInfo {
    /// Create a session from a validated configuration
    pub fn new(config: MutualInfoConfig) -> Result<Self> {
        validate_config(&config).map_err(|e| Error::ConfigError(e.to_string()))?;
        Ok(Self {
            quantizer: config.quantizer(),
            estimator: config.estimator(),
            interceptor: Interceptor::new(config.estimate_size),
            config,
            eval_loader: None,
            references: None,
            n_bins: BTreeMap::new(),
            quantized: BTreeMap::new(),
            information: BTreeMap::new(),
        })
    }

    /// Create a session with default settings for `method`
    pub fn with_method(method: Method) -> Result<Self> {
        Self::new(MutualInfoConfig::new(method))
    }

    /// Session configuration
    pub fn config(&self) -> &MutualInfoConfig {
        &self.config
    }

    /// Quantization method
    pub fn method(&self) -> Method {
        self.config.method
    }

    /// Observe `layer` under `name`
    pub fn register(&mut self, name: &str, layer: Arc<dyn Layer>) -> Result<()> {
        if name == INPUT_LAYER || name == TARGET_LAYER {
            return Err(Error::InvalidParameter(format!(
                "layer name '{}' is reserved",
                name
            )));
        }
        self.interceptor.register(name, layer)
    }

    /// Observe the module `model` currently holds under `name`
    pub fn register_from(&mut self, model: &dyn Model, name: &str) -> Result<()> {
        let layer = model
            .layer(name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))?;
        self.register(name, layer)
    }

    /// Fix the evaluation data and quantize the input and target references
    ///
    /// Batches are taken in order until the sample cap is reached. The same source
    /// feeds every later pass.
    pub fn prepare<D: DataSource + 'static>(&mut self, loader: D) -> Result<()> {
        if self.eval_loader.is_some() {
            return Err(Error::AlreadyPrepared);
        }
        let cap = self.config.estimate_size;
        let budget = cap.map(|cap| loader.batches_for(cap));
        debug!(
            batch_size = loader.batch_size(),
            ?budget,
            "drawing reference batches"
        );
        let mut inputs: Vec<Array2<f32>> = Vec::with_capacity(budget.unwrap_or_default());
        let mut targets: Vec<Array1<i64>> = Vec::with_capacity(budget.unwrap_or_default());
        let mut samples = 0;
        for batch in loader.batches() {
            samples += batch.len();
            inputs.push(batch.inputs);
            targets.push(batch.targets);
            if cap.is_some_and(|cap| samples >= cap) {
                break;
            }
        }

        let input = self.quantizer.process(INPUT_LAYER, &inputs, None)?;
        let target = self.quantizer.process_targets(&targets)?;
        info!(
            method = %self.config.method,
            samples = input.symbols.len(),
            input_bins = input.n_bins,
            "prepared mutual information references"
        );

        self.n_bins.insert(INPUT_LAYER.to_string(), input.n_bins);
        self.references = Some(References {
            input: input.symbols,
            target,
        });
        self.eval_loader = Some(Box::new(loader));
        Ok(())
    }

    /// Whether `prepare` has run
    pub fn is_prepared(&self) -> bool {
        self.eval_loader.is_some()
    }

    /// Whether a recording pass is in progress
    pub fn is_active(&self) -> bool {
        self.interceptor.is_active()
    }

    /// Install recording wrappers if the listen schedule permits `(epoch, batch)`
    ///
    /// Returns whether recording started. Before `prepare` this is a no-op.
    pub fn start_listening(&mut self, model: &mut dyn Model, epoch: usize, batch: usize) -> Result<bool> {
        if !self.is_prepared() {
            debug!("mutual information session not prepared, skipping pass");
            return Ok(false);
        }
        if self.is_active() {
            return Err(Error::SessionActive(
                "previous pass has not finished".to_string(),
            ));
        }
        if !self.config.listen_schedule.permits(epoch, batch) {
            return Ok(false);
        }
        self.interceptor.attach(model)?;
        debug!(epoch, batch, layers = self.interceptor.len(), "recording activations");
        Ok(true)
    }

    /// Restore the original layers and compute the pass results
    ///
    /// Does nothing if no pass is active.
    pub fn finish_listening(&mut self, model: &mut dyn Model) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.interceptor.detach(model)?;
        self.save_information()
    }

    /// Run one gated pass over the evaluation data
    ///
    /// Returns whether a pass ran.
    pub fn update(&mut self, model: &mut dyn Model, epoch: usize, batch: usize) -> Result<bool> {
        if !self.start_listening(model, epoch, batch)? {
            return Ok(false);
        }
        let cap = self.config.estimate_size;
        if let Some(loader) = self.eval_loader.as_ref() {
            let mut fed = 0;
            let mut batches = 0;
            for batch in loader.batches() {
                model.forward(&batch.inputs);
                fed += batch.len();
                batches += 1;
                if cap.is_some_and(|cap| fed >= cap) {
                    break;
                }
            }
            let budget = cap.map(|cap| loader.batches_for(cap));
            if budget.is_some_and(|budget| batches > budget) {
                debug!(batches, ?budget, "evaluation batches ran short of the nominal size");
            }
        }
        self.finish_listening(model)?;
        Ok(true)
    }

    /// Record activations while `evaluate` runs
    ///
    /// Recording happens only if the listen schedule permits `(epoch, batch)`;
    /// `evaluate` runs either way.
    pub fn listen<R, F>(&mut self, model: &mut dyn Model, epoch: usize, batch: usize, evaluate: F) -> Result<R>
    where
        F: FnOnce(&mut dyn Model) -> R,
    {
        self.start_listening(model, epoch, batch)?;
        let result = evaluate(&mut *model);
        self.finish_listening(model)?;
        Ok(result)
    }

    /// Quantize every recorded layer and estimate its information
    fn save_information(&mut self) -> Result<()> {
        let references = self.references.as_ref().ok_or(Error::NotPrepared)?;
        let buffers = self.interceptor.store().drain();

        let jobs: Vec<Job> = buffers
            .into_iter()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(layer, buffer)| {
                let n_bins = match self.config.method {
                    Method::Sign | Method::Knn => None,
                    _ => self.n_bins.get(&layer).copied(),
                };
                Job {
                    layer,
                    batches: buffer.into_batches(),
                    n_bins,
                }
            })
            .collect();

        for name in self.interceptor.layer_names() {
            if !jobs.iter().any(|job| job.layer == name) {
                warn!(layer = %name, "no activations recorded for registered layer");
            }
        }

        let ctx = JobContext {
            quantizer: &self.quantizer,
            estimator: self.estimator,
            references,
        };
        let results = dispatch(jobs, &ctx, self.config.parallel)?;

        self.quantized.clear();
        self.quantized
            .insert(INPUT_LAYER.to_string(), references.input.clone());
        for result in results {
            info!(
                layer = %result.layer,
                info_x = result.info_x,
                info_y = result.info_y,
                "layer information"
            );
            self.information.insert(
                result.layer.clone(),
                InformationPoint {
                    info_x: result.info_x,
                    info_y: result.info_y,
                },
            );
            self.n_bins.insert(result.layer.clone(), result.quantized.n_bins);
            self.quantized.insert(result.layer, result.quantized.symbols);
        }
        Ok(())
    }

    /// Send accumulated results to `sink` and clear them
    ///
    /// Fails if a pass is still recording. The dispersion plot is drawn when the
    /// dispersion schedule permits `epoch`.
    pub fn plot(&mut self, sink: &mut dyn PlotSink, epoch: usize) -> Result<()> {
        if self.is_active() {
            return Err(Error::SessionActive(
                "wait for the pass to finish before plotting".to_string(),
            ));
        }
        if self.information.is_empty() {
            return Ok(());
        }
        if self.config.dispersion_schedule.permits(epoch, 0) {
            plot_quantized_dispersion(sink, &self.quantized, &self.n_bins)?;
            if self.config.debug {
                plot_quantized_hist(sink, &self.quantized)?;
            }
        }
        let information = self.take_information();
        plot_information_plane(sink, &information)
    }

    /// Results accumulated since the last drain
    pub fn information(&self) -> &BTreeMap<String, InformationPoint> {
        &self.information
    }

    /// Remove and return accumulated results
    pub fn take_information(&mut self) -> BTreeMap<String, InformationPoint> {
        std::mem::take(&mut self.information)
    }

    /// Symbols of the last pass, including the input reference
    pub fn quantized(&self) -> &BTreeMap<String, Symbols> {
        &self.quantized
    }

    /// Bin count chosen per layer
    pub fn n_bins(&self) -> &BTreeMap<String, usize> {
        &self.n_bins
    }

    /// Input and target references, once prepared
    pub fn references(&self) -> Option<&References> {
        self.references.as_ref()
    }

    /// Registered layer names
    pub fn layer_names(&self) -> Vec<String> {
        self.interceptor.layer_names()
    }

    /// Layer registry
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }
}

impl std::fmt::Debug for MutualInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutualInfo")
            .field("method", &self.config.method)
            .field("interceptor", &self.interceptor)
            .field("prepared", &self.is_prepared())
            .field("n_bins", &self.n_bins)
            .field("information", &self.information)
            .finish()
    }
}
