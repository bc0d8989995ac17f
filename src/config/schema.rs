//! YAML schema for the estimation session

use crate::mutual_info::{Estimator, KMeansParams, Method, Quantizer, Schedule};
use serde::{Deserialize, Serialize};

/// Mutual information session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutualInfoConfig {
    /// Quantization method
    #[serde(default)]
    pub method: Method,

    /// Maximum number of evaluation samples (all available if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_size: Option<usize>,

    /// Acceptable compression window `[min, max]` for the bin search
    #[serde(default = "default_compression_range")]
    pub compression_range: [f64; 2],

    /// Starting bin count of the search (fixed bin count for k-means)
    #[serde(default = "default_n_bins")]
    pub n_bins_default: usize,

    /// Maximum number of digitizations per bin search
    #[serde(default = "default_max_trials")]
    pub max_trials_adjust: usize,

    /// Neighbor count of the KSG estimator
    #[serde(default = "default_knn_neighbors")]
    pub knn_neighbors: usize,

    /// Minibatch k-means parameters
    #[serde(default)]
    pub kmeans: KMeansParams,

    /// Estimate layers on the rayon pool
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Also plot per-layer symbol histograms
    #[serde(default)]
    pub debug: bool,

    /// Gate for estimation passes
    #[serde(default = "default_listen_schedule")]
    pub listen_schedule: Schedule,

    /// Gate for dispersion plots, checked at epoch granularity
    #[serde(default)]
    pub dispersion_schedule: Schedule,
}

fn default_compression_range() -> [f64; 2] {
    [0.50, 0.999]
}

fn default_n_bins() -> usize {
    20
}

fn default_max_trials() -> usize {
    10
}

fn default_knn_neighbors() -> usize {
    crate::mutual_info::DEFAULT_KNN_NEIGHBORS
}

fn default_true() -> bool {
    true
}

fn default_listen_schedule() -> Schedule {
    Schedule::every_batches(5)
}

impl Default for MutualInfoConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            estimate_size: None,
            compression_range: default_compression_range(),
            n_bins_default: default_n_bins(),
            max_trials_adjust: default_max_trials(),
            knn_neighbors: default_knn_neighbors(),
            kmeans: KMeansParams::default(),
            parallel: true,
            debug: false,
            listen_schedule: default_listen_schedule(),
            dispersion_schedule: Schedule::default(),
        }
    }
}

impl MutualInfoConfig {
    /// Default configuration for `method`
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Cap the number of evaluation samples
    pub fn with_estimate_size(mut self, estimate_size: usize) -> Self {
        self.estimate_size = Some(estimate_size);
        self
    }

    /// Set the compression window the bin search aims for
    pub fn with_compression_range(mut self, min: f64, max: f64) -> Self {
        self.compression_range = [min, max];
        self
    }

    /// Set the starting bin count and the digitization budget of the bin search
    pub fn with_bin_search(mut self, n_bins_default: usize, max_trials_adjust: usize) -> Self {
        self.n_bins_default = n_bins_default;
        self.max_trials_adjust = max_trials_adjust;
        self
    }

    /// Set the neighbor count of the KSG estimator
    pub fn with_knn_neighbors(mut self, k: usize) -> Self {
        self.knn_neighbors = k;
        self
    }

    /// Set the minibatch k-means parameters
    pub fn with_kmeans(mut self, params: KMeansParams) -> Self {
        self.kmeans = params;
        self
    }

    /// Estimate layers on the rayon pool instead of one after another
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Also plot per-layer symbol histograms
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the gate deciding which `(epoch, batch)` steps record a pass
    pub fn with_listen_schedule(mut self, schedule: Schedule) -> Self {
        self.listen_schedule = schedule;
        self
    }

    /// Set the gate deciding which epochs draw the dispersion plot
    pub fn with_dispersion_schedule(mut self, schedule: Schedule) -> Self {
        self.dispersion_schedule = schedule;
        self
    }

    /// Build the quantizer this configuration describes
    pub fn quantizer(&self) -> Quantizer {
        let [min, max] = self.compression_range;
        Quantizer::new(self.method)
            .with_estimate_size(self.estimate_size)
            .with_compression_range(min, max)
            .with_bin_search(self.n_bins_default, self.max_trials_adjust)
            .with_kmeans(self.kmeans)
    }

    /// Estimator matching the quantization method
    pub fn estimator(&self) -> Estimator {
        match self.method {
            Method::Knn => Estimator::Knn {
                k: self.knn_neighbors,
            },
            _ => Estimator::Histogram,
        }
    }
}
