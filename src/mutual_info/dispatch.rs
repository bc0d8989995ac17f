//! Per-layer fan-out of quantization and MI estimation
//!
//! Each [`Job`] owns the activations of one layer. Workers read the shared
//! [`JobContext`] but never write to it; results come back as values and are
//! merged by the caller once every job has finished.

use super::estimate::Estimator;
use super::quantize::{Quantized, Quantizer, Symbols};
use crate::error::Result;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

/// Reference symbols fixed at preparation time
#[derive(Clone, Debug, PartialEq)]
pub struct References {
    /// Quantized model input
    pub input: Symbols,
    /// Quantized target labels
    pub target: Symbols,
}

/// Work item: one layer's recorded batches
#[derive(Clone, Debug)]
pub struct Job {
    /// Layer name
    pub layer: String,
    /// Recorded batches, in arrival order
    pub batches: Vec<Array2<f32>>,
    /// Bin count already chosen for this layer
    pub n_bins: Option<usize>,
}

/// Outcome of one job
#[derive(Clone, Debug, PartialEq)]
pub struct JobResult {
    /// Layer name
    pub layer: String,
    /// Quantized activations and their bin count
    pub quantized: Quantized,
    /// I(input; layer) in bits
    pub info_x: f64,
    /// I(layer; target) in bits
    pub info_y: f64,
}

/// Read-only state shared by all workers
#[derive(Clone, Copy, Debug)]
pub struct JobContext<'a> {
    /// Quantizer for layer activations
    pub quantizer: &'a Quantizer,
    /// Estimator matching the quantizer's method
    pub estimator: Estimator,
    /// Input and target references
    pub references: &'a References,
}

/// Quantize one layer and estimate both MI values
pub fn run_job(job: Job, ctx: &JobContext<'_>) -> Result<JobResult> {
    let quantized = ctx.quantizer.process(&job.layer, &job.batches, job.n_bins)?;
    let info_x = ctx
        .estimator
        .estimate(&ctx.references.input, &quantized.symbols)?;
    let info_y = ctx
        .estimator
        .estimate(&quantized.symbols, &ctx.references.target)?;
    debug!(
        layer = %job.layer,
        n_bins = quantized.n_bins,
        info_x,
        info_y,
        "estimated layer information"
    );
    Ok(JobResult {
        layer: job.layer,
        quantized,
        info_x,
        info_y,
    })
}

/// Run every job and wait for all of them
///
/// With `parallel` the jobs run on the rayon pool, otherwise in order on the
/// calling thread. Either way the call returns only once every job is done; the
/// first error is returned if any job fails.
pub fn dispatch(jobs: Vec<Job>, ctx: &JobContext<'_>, parallel: bool) -> Result<Vec<JobResult>> {
    debug!(jobs = jobs.len(), parallel, "dispatching layer jobs");
    if parallel {
        jobs.into_par_iter().map(|job| run_job(job, ctx)).collect()
    } else {
        jobs.into_iter().map(|job| run_job(job, ctx)).collect()
    }
}
