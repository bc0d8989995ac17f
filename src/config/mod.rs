//! Declarative YAML configuration
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! # Example
//!
//! ```yaml
//! method: quantile
//! estimate_size: 2000
//! compression_range: [0.5, 0.999]
//! n_bins_default: 20
//! parallel: true
//!
//! listen_schedule:
//!   start_epoch: 1
//!   batch_interval: 5
//!
//! kmeans:
//!   seed: 7
//!   iterations: 50
//! ```

mod load;
mod schema;
mod validate;

#[cfg(test)]
mod tests;


pub use load::{from_yaml_str, load_config, save_config, to_yaml};
pub use schema::MutualInfoConfig;
pub use validate::{validate_config, ValidationError};
