//! Activation quantization
//!
//! Maps recorded activations to symbols that the MI estimators can count:
//! - **Fixed**: per-dimension `mean ± 2σ` range split into `n_bins` levels
//! - **FixedFlat**: same, with one range shared by every element
//! - **Quantile**: per-dimension percentile breakpoints
//! - **Kmeans**: minibatch k-means cluster index
//! - **Sign**: distinct sign patterns
//! - **Knn**: no discretization, continuous vectors for the KSG estimator
//!
//! Histogram methods pick their bin count once per layer with [`Quantizer::adjust_bins`].

use super::kmeans::{minibatch_kmeans, KMeansParams};
use crate::error::{Error, Result};
use crate::model::sign;
use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Smallest bin count the search may settle on
pub const MIN_BINS: usize = 2;

/// Quantization method
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Per-dimension fixed-range histogram
    #[default]
    Fixed,
    /// Fixed-range histogram over the flattened tensor
    FixedFlat,
    /// Per-dimension quantile histogram
    Quantile,
    /// Minibatch k-means clusters
    Kmeans,
    /// Sign patterns
    Sign,
    /// Continuous passthrough for the k-nearest-neighbor estimator
    Knn,
}

impl Method {
    /// All methods, in declaration order
    pub const ALL: [Method; 6] = [
        Method::Fixed,
        Method::FixedFlat,
        Method::Quantile,
        Method::Kmeans,
        Method::Sign,
        Method::Knn,
    ];

    /// Convert method to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Fixed => "fixed",
            Method::FixedFlat => "fixed_flat",
            Method::Quantile => "quantile",
            Method::Kmeans => "kmeans",
            Method::Sign => "sign",
            Method::Knn => "knn",
        }
    }

    /// Whether the bin count is chosen by the adaptive search
    pub fn searches_bins(&self) -> bool {
        matches!(self, Method::Fixed | Method::FixedFlat | Method::Quantile)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantized representation of one layer
#[derive(Clone, Debug, PartialEq)]
pub enum Symbols {
    /// One integer symbol per sample
    Discrete(Array1<i64>),
    /// One continuous vector per sample
    Continuous(Array2<f64>),
}

impl Symbols {
    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            Symbols::Discrete(s) => s.len(),
            Symbols::Continuous(s) => s.nrows(),
        }
    }

    /// Check if there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discrete symbols, if this is a discrete representation
    pub fn as_discrete(&self) -> Option<&Array1<i64>> {
        match self {
            Symbols::Discrete(s) => Some(s),
            Symbols::Continuous(_) => None,
        }
    }

    /// Continuous vectors, if this is a continuous representation
    pub fn as_continuous(&self) -> Option<&Array2<f64>> {
        match self {
            Symbols::Continuous(s) => Some(s),
            Symbols::Discrete(_) => None,
        }
    }

    /// Number of occurrences of each distinct symbol, in symbol order
    ///
    /// Continuous vectors are counted by exact row equality.
    pub fn counts(&self) -> Vec<usize> {
        match self {
            Symbols::Discrete(s) => {
                let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
                for &v in s {
                    *counts.entry(v).or_default() += 1;
                }
                counts.into_values().collect()
            }
            Symbols::Continuous(s) => {
                let mut counts: BTreeMap<Vec<u64>, usize> = BTreeMap::new();
                for row in s.rows() {
                    let key = row.iter().map(|v| v.to_bits()).collect();
                    *counts.entry(key).or_default() += 1;
                }
                counts.into_values().collect()
            }
        }
    }
}

/// Quantized layer together with the bin count that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct Quantized {
    /// Symbols, one per sample
    pub symbols: Symbols,
    /// Bin count (distinct patterns for `Sign`, 0 for `Knn`)
    pub n_bins: usize,
}

/// Outcome of the adaptive bin-count search
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinSearch {
    /// Selected bin count
    pub n_bins: usize,
    /// Number of digitizations performed
    pub trials: usize,
    /// Compression of the last digitization
    pub compression: f64,
}

/// Stateless quantizer for one estimation method
#[derive(Clone, Debug)]
pub struct Quantizer {
    method: Method,
    estimate_size: Option<usize>,
    compression_range: (f64, f64),
    n_bins_default: usize,
    max_trials_adjust: usize,
    kmeans: KMeansParams,
}

impl Quantizer {
    /// Create a quantizer with default search parameters
    pub fn new(method: Method) -> Self {
        Self {
            method,
            estimate_size: None,
            compression_range: (0.50, 0.999),
            n_bins_default: 20,
            max_trials_adjust: 10,
            kmeans: KMeansParams::default(),
        }
    }

    /// Cap the number of samples kept per layer
    pub fn with_estimate_size(mut self, estimate_size: Option<usize>) -> Self {
        self.estimate_size = estimate_size;
        self
    }

    /// Set the acceptable `(min, max)` compression window
    pub fn with_compression_range(mut self, min: f64, max: f64) -> Self {
        self.compression_range = (min, max);
        self
    }

    /// Set the starting bin count and trial budget of the search
    pub fn with_bin_search(mut self, n_bins_default: usize, max_trials_adjust: usize) -> Self {
        self.n_bins_default = n_bins_default;
        self.max_trials_adjust = max_trials_adjust;
        self
    }

    /// Set k-means parameters
    pub fn with_kmeans(mut self, params: KMeansParams) -> Self {
        self.kmeans = params;
        self
    }

    /// Quantization method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Sample cap
    pub fn estimate_size(&self) -> Option<usize> {
        self.estimate_size
    }

    /// Concatenate recorded batches and truncate to the sample cap
    pub fn collect(&self, layer_name: &str, batches: &[Array2<f32>]) -> Result<Array2<f32>> {
        if batches.is_empty() {
            return Err(Error::EmptyActivations(layer_name.to_string()));
        }
        let views: Vec<ArrayView2<f32>> = batches.iter().map(|b| b.view()).collect();
        let joined = concatenate(Axis(0), &views).map_err(|_| Error::ShapeMismatch {
            expected: vec![batches[0].ncols()],
            got: batches.iter().map(|b| b.ncols()).collect(),
        })?;
        Ok(match self.estimate_size {
            Some(cap) if joined.nrows() > cap => joined.slice(s![..cap, ..]).to_owned(),
            _ => joined,
        })
    }

    /// Concatenate label batches and truncate to the sample cap
    pub fn collect_labels(&self, batches: &[Array1<i64>]) -> Result<Array1<i64>> {
        if batches.is_empty() {
            return Err(Error::EmptyActivations("target".to_string()));
        }
        let mut labels: Vec<i64> = batches.iter().flat_map(|b| b.iter().copied()).collect();
        if let Some(cap) = self.estimate_size {
            labels.truncate(cap);
        }
        Ok(Array1::from(labels))
    }

    /// Quantize a layer's recorded batches
    ///
    /// `n_bins` is the bin count already chosen for this layer, if any; histogram
    /// methods run the adaptive search only when it is `None`.
    pub fn process(
        &self,
        layer_name: &str,
        batches: &[Array2<f32>],
        n_bins: Option<usize>,
    ) -> Result<Quantized> {
        let activations = self.collect(layer_name, batches)?;
        if activations.nrows() == 0 {
            return Err(Error::EmptyActivations(layer_name.to_string()));
        }

        let quantized = match self.method {
            Method::Fixed | Method::FixedFlat | Method::Quantile => {
                let n_bins = match n_bins {
                    Some(n) => n,
                    None => {
                        let search = self.adjust_bins(&activations)?;
                        debug!(
                            layer = layer_name,
                            n_bins = search.n_bins,
                            trials = search.trials,
                            compression = search.compression,
                            "selected bin count"
                        );
                        search.n_bins
                    }
                };
                Quantized {
                    symbols: Symbols::Discrete(self.quantize(&activations, n_bins)?),
                    n_bins,
                }
            }
            Method::Kmeans => {
                let n_bins = n_bins.unwrap_or_else(|| self.n_bins_default.min(activations.nrows()));
                Quantized {
                    symbols: Symbols::Discrete(self.quantize(&activations, n_bins)?),
                    n_bins,
                }
            }
            Method::Sign => {
                let (n_unique, inverse) = unique_rows(&self.digitize(&activations, 0)?);
                Quantized {
                    symbols: Symbols::Discrete(inverse),
                    n_bins: n_unique,
                }
            }
            Method::Knn => Quantized {
                symbols: Symbols::Continuous(activations.mapv(f64::from)),
                n_bins: 0,
            },
        };
        Ok(quantized)
    }

    /// Quantize label batches
    ///
    /// Labels pass through unchanged, except for `Knn`, which needs them as a
    /// continuous column vector.
    pub fn process_targets(&self, batches: &[Array1<i64>]) -> Result<Symbols> {
        let labels = self.collect_labels(batches)?;
        Ok(match self.method {
            Method::Knn => {
                let n = labels.len();
                Symbols::Continuous(labels.mapv(|v| v as f64).into_shape_with_order((n, 1))?)
            }
            _ => Symbols::Discrete(labels),
        })
    }

    /// Map activations to per-dimension integer levels
    ///
    /// `Kmeans` returns a single column of cluster indices and `Sign` ignores
    /// `n_bins`. `Knn` does not digitize.
    pub fn digitize(&self, activations: &Array2<f32>, n_bins: usize) -> Result<Array2<i64>> {
        match self.method {
            Method::Fixed => Ok(digitize_fixed(activations, n_bins)),
            Method::FixedFlat => Ok(digitize_fixed_flat(activations, n_bins)),
            Method::Quantile => Ok(digitize_quantile(activations, n_bins)),
            Method::Kmeans => {
                let labels = minibatch_kmeans(activations, n_bins, &self.kmeans);
                let n = labels.len();
                Ok(labels.into_shape_with_order((n, 1))?)
            }
            Method::Sign => Ok(activations.mapv(|v| sign(v) as i64)),
            Method::Knn => Err(Error::InvalidParameter(
                "knn method keeps activations continuous".to_string(),
            )),
        }
    }

    /// Digitize and collapse duplicate rows into a dense symbol alphabet
    ///
    /// K-means cluster indices are already symbols and are returned as-is.
    pub fn quantize(&self, activations: &Array2<f32>, n_bins: usize) -> Result<Array1<i64>> {
        let digitized = self.digitize(activations, n_bins)?;
        if self.method == Method::Kmeans {
            return Ok(digitized.column(0).to_owned());
        }
        Ok(unique_rows(&digitized).1)
    }

    /// Search for a bin count whose compression lies inside the configured window
    ///
    /// Compression is the fraction of samples that collide with an earlier sample
    /// after digitization. Above the window the bin count doubles, below it halves.
    /// Halving down to [`MIN_BINS`] ends the search without digitizing again. The
    /// search also stops after `max_trials_adjust` digitizations and keeps the last
    /// bin count it tried.
    pub fn adjust_bins(&self, activations: &Array2<f32>) -> Result<BinSearch> {
        let n = activations.nrows();
        if n == 0 {
            return Err(Error::EmptyActivations("bin search".to_string()));
        }
        let (compression_min, compression_max) = self.compression_range;
        let max_trials = self.max_trials_adjust.max(1);

        let mut n_bins = self.n_bins_default.max(MIN_BINS);
        let mut trials = 0;
        loop {
            let digitized = self.digitize(activations, n_bins)?;
            trials += 1;
            let compression = compression(n, count_unique_rows(&digitized));
            let last_trial = trials >= max_trials;

            if compression > compression_max && !last_trial {
                n_bins *= 2;
            } else if compression < compression_min && !last_trial && n_bins > MIN_BINS {
                n_bins = (n_bins / 2).max(MIN_BINS);
                if n_bins == MIN_BINS {
                    return Ok(BinSearch {
                        n_bins,
                        trials,
                        compression,
                    });
                }
            } else {
                return Ok(BinSearch {
                    n_bins,
                    trials,
                    compression,
                });
            }
        }
    }
}

/// Fraction of samples lost to collisions: `(n - unique) / n`
pub fn compression(n_samples: usize, n_unique: usize) -> f64 {
    if n_samples == 0 {
        return 0.0;
    }
    (n_samples - n_unique.min(n_samples)) as f64 / n_samples as f64
}

/// Number of distinct rows
pub fn count_unique_rows(digitized: &Array2<i64>) -> usize {
    digitized
        .rows()
        .into_iter()
        .map(|row| row.to_vec())
        .collect::<HashSet<_>>()
        .len()
}

/// Distinct rows in lexicographic order, and the index of each row's pattern
pub fn unique_rows(digitized: &Array2<i64>) -> (usize, Array1<i64>) {
    let mut patterns: BTreeMap<Vec<i64>, i64> = digitized
        .rows()
        .into_iter()
        .map(|row| (row.to_vec(), 0))
        .collect();
    for (id, value) in patterns.values_mut().enumerate() {
        *value = id as i64;
    }
    let inverse = digitized
        .rows()
        .into_iter()
        .map(|row| patterns[&row.to_vec()])
        .collect();
    (patterns.len(), inverse)
}

/// Sample mean and unbiased standard deviation
fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(c, s), v| (c + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    if count < 2 {
        return (mean, 0.0);
    }
    let ss: f64 = values.map(|v| (v - mean) * (v - mean)).sum();
    (mean, (ss / (count - 1) as f64).sqrt())
}

fn level(x: f64, mean: f64, std: f64, n_bins: usize) -> i64 {
    let lo = mean - 2.0 * std;
    let width = 4.0 * std;
    if width <= 0.0 || !width.is_finite() {
        return 0;
    }
    let v = n_bins as f64 * (x - lo) / width;
    v.clamp(0.0, n_bins as f64) as i64
}

fn digitize_fixed(activations: &Array2<f32>, n_bins: usize) -> Array2<i64> {
    let stats: Vec<(f64, f64)> = activations
        .columns()
        .into_iter()
        .map(|col| mean_std(col.iter().map(|&v| f64::from(v))))
        .collect();
    Array2::from_shape_fn(activations.dim(), |(i, j)| {
        let (mean, std) = stats[j];
        level(f64::from(activations[[i, j]]), mean, std, n_bins)
    })
}

fn digitize_fixed_flat(activations: &Array2<f32>, n_bins: usize) -> Array2<i64> {
    let (mean, std) = mean_std(activations.iter().map(|&v| f64::from(v)));
    activations.mapv(|v| level(f64::from(v), mean, std, n_bins))
}

/// Linear-interpolated percentile of sorted data, `q` in `[0, 100]`
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn digitize_quantile(activations: &Array2<f32>, n_bins: usize) -> Array2<i64> {
    let n_edges = n_bins.max(1);
    let mut digitized = Array2::zeros(activations.dim());
    if activations.nrows() == 0 {
        return digitized;
    }
    for (j, col) in activations.columns().into_iter().enumerate() {
        let mut sorted: Vec<f64> = col.iter().map(|&v| f64::from(v)).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let edges: Vec<f64> = (0..n_edges)
            .map(|e| {
                let q = if n_edges == 1 {
                    0.0
                } else {
                    100.0 * e as f64 / (n_edges - 1) as f64
                };
                percentile(&sorted, q)
            })
            .collect();
        // right-inclusive: edges[i-1] < x <= edges[i]
        for (i, &v) in col.iter().enumerate() {
            let x = f64::from(v);
            digitized[[i, j]] = edges.partition_point(|&e| e < x) as i64;
        }
    }
    digitized
}
