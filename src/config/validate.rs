//! Configuration validation

use super::schema::MutualInfoConfig;
use crate::mutual_info::{Schedule, MIN_BINS};

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid compression range: [{0}, {1}] (must satisfy 0 <= min < max <= 1)")]
    InvalidCompressionRange(f64, f64),

    #[error("Invalid default bin count: {0} (must be >= 2)")]
    InvalidBinCount(usize),

    #[error("Invalid bin search trials: {0} (must be > 0)")]
    InvalidTrials(usize),

    #[error("Invalid KNN neighbor count: {0} (must be > 0)")]
    InvalidNeighbors(usize),

    #[error("Invalid estimate size: {0} (must be > 0)")]
    InvalidEstimateSize(usize),

    #[error("Invalid k-means batch size: {0} (must be > 0)")]
    InvalidKMeansBatch(usize),

    #[error("Invalid {0} schedule: intervals must be > 0")]
    InvalidSchedule(&'static str),
}

/// Validate a session configuration
///
/// Checks:
/// - The compression window lies inside [0, 1] and is non-empty
/// - Counts and sizes are positive
/// - Schedule intervals are nonzero
pub fn validate_config(config: &MutualInfoConfig) -> Result<(), ValidationError> {
    let [min, max] = config.compression_range;
    if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min >= max {
        return Err(ValidationError::InvalidCompressionRange(min, max));
    }

    if config.n_bins_default < MIN_BINS {
        return Err(ValidationError::InvalidBinCount(config.n_bins_default));
    }

    if config.max_trials_adjust == 0 {
        return Err(ValidationError::InvalidTrials(config.max_trials_adjust));
    }

    if config.knn_neighbors == 0 {
        return Err(ValidationError::InvalidNeighbors(config.knn_neighbors));
    }

    if let Some(size) = config.estimate_size {
        if size == 0 {
            return Err(ValidationError::InvalidEstimateSize(size));
        }
    }

    if config.kmeans.batch_size == 0 {
        return Err(ValidationError::InvalidKMeansBatch(config.kmeans.batch_size));
    }

    check_schedule(&config.listen_schedule, "listen")?;
    check_schedule(&config.dispersion_schedule, "dispersion")?;

    Ok(())
}

fn check_schedule(schedule: &Schedule, which: &'static str) -> Result<(), ValidationError> {
    if schedule.epoch_interval == 0 || schedule.batch_interval == Some(0) {
        return Err(ValidationError::InvalidSchedule(which));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutual_info::Method;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&MutualInfoConfig::default()).is_ok());
        for method in Method::ALL {
            assert!(validate_config(&MutualInfoConfig::new(method)).is_ok());
        }
    }

    #[test]
    fn test_inverted_compression_range() {
        let config = MutualInfoConfig::default().with_compression_range(0.9, 0.5);
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidCompressionRange(0.9, 0.5))
        );
    }

    #[test]
    fn test_compression_range_outside_unit_interval() {
        let config = MutualInfoConfig::default().with_compression_range(0.5, 1.5);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_single_bin_rejected() {
        let config = MutualInfoConfig::default().with_bin_search(1, 10);
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidBinCount(1))
        );
    }

    #[test]
    fn test_zero_trials_rejected() {
        let config = MutualInfoConfig::default().with_bin_search(20, 0);
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidTrials(0))
        );
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let config = MutualInfoConfig::new(Method::Knn).with_knn_neighbors(0);
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidNeighbors(0))
        );
    }

    #[test]
    fn test_zero_estimate_size_rejected() {
        let config = MutualInfoConfig::default().with_estimate_size(0);
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidEstimateSize(0))
        );
    }

    #[test]
    fn test_zero_interval_schedule_rejected() {
        let config = MutualInfoConfig::default().with_listen_schedule(Schedule::every_batches(0));
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidSchedule("listen"))
        );

        let config =
            MutualInfoConfig::default().with_dispersion_schedule(Schedule::every_epochs(0));
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidSchedule("dispersion"))
        );
    }
}
