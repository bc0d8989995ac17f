//! Scheduling gate for estimation passes
//!
//! Estimating MI on every batch would dominate training time, so passes are gated
//! on explicit epoch and batch counters supplied by the caller.

use serde::{Deserialize, Serialize};

/// Predicate over `(epoch, batch)` deciding whether work should run this step
///
/// `epoch` is 0-indexed. `batch` is the number of batches completed so far in the
/// current epoch, so a gate firing "every 5 batches" fires at 5, 10, 15, ...
///
/// # Example
///
/// ```
/// use infoplane::mutual_info::Schedule;
///
/// let gate = Schedule::every_batches(5).starting_epoch(1);
/// assert!(!gate.permits(0, 5));
/// assert!(gate.permits(1, 5));
/// assert!(!gate.permits(1, 6));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// First epoch at which the gate may fire
    #[serde(default)]
    pub start_epoch: usize,

    /// Fire on every N-th epoch counted from `start_epoch`
    #[serde(default = "default_interval")]
    pub epoch_interval: usize,

    /// Within a permitted epoch, fire only when `batch` is a nonzero multiple of N
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_interval: Option<usize>,
}

fn default_interval() -> usize {
    1
}

impl Default for Schedule {
    fn default() -> Self {
        Self::always()
    }
}

impl Schedule {
    /// Gate that always permits
    pub fn always() -> Self {
        Self {
            start_epoch: 0,
            epoch_interval: 1,
            batch_interval: None,
        }
    }

    /// Fire every `n` batches in every epoch
    pub fn every_batches(n: usize) -> Self {
        Self {
            batch_interval: Some(n),
            ..Self::always()
        }
    }

    /// Fire once per `n` epochs, regardless of the batch counter
    pub fn every_epochs(n: usize) -> Self {
        Self {
            epoch_interval: n,
            ..Self::always()
        }
    }

    /// Suppress the gate before `epoch`
    pub fn starting_epoch(mut self, epoch: usize) -> Self {
        self.start_epoch = epoch;
        self
    }

    /// Decide whether to run at `(epoch, batch)`
    pub fn permits(&self, epoch: usize, batch: usize) -> bool {
        if epoch < self.start_epoch || self.epoch_interval == 0 {
            return false;
        }
        if !(epoch - self.start_epoch).is_multiple_of(self.epoch_interval) {
            return false;
        }
        match self.batch_interval {
            Some(0) => false,
            Some(n) => batch > 0 && batch.is_multiple_of(n),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_every_five_batches_from_epoch_one() {
        let gate = Schedule::every_batches(5).starting_epoch(1);

        for batch in 0..50 {
            assert!(!gate.permits(0, batch), "fired in epoch 0 at batch {}", batch);
        }
        let fired: Vec<usize> = (0..=20).filter(|&b| gate.permits(1, b)).collect();
        assert_eq!(fired, vec![5, 10, 15, 20]);
        assert!(gate.permits(7, 35));
    }

    #[test]
    fn test_every_epochs_ignores_batch() {
        let gate = Schedule::every_epochs(2);
        assert!(gate.permits(0, 0));
        assert!(gate.permits(0, 17));
        assert!(!gate.permits(1, 0));
        assert!(gate.permits(4, 3));
    }

    #[test]
    fn test_zero_intervals_never_fire() {
        assert!(!Schedule::every_batches(0).permits(3, 10));
        assert!(!Schedule::every_epochs(0).permits(0, 0));
    }

    #[test]
    fn test_always() {
        assert!(Schedule::always().permits(0, 0));
        assert_eq!(Schedule::default(), Schedule::always());
    }

    #[test]
    fn test_yaml_defaults() {
        let gate: Schedule = serde_yaml::from_str("batch_interval: 5").unwrap();
        assert_eq!(gate, Schedule::every_batches(5));
    }

    proptest! {
        #[test]
        fn prop_gate_is_pure(epoch in 0usize..100, batch in 0usize..1000, n in 1usize..20, start in 0usize..10) {
            let gate = Schedule::every_batches(n).starting_epoch(start);
            prop_assert_eq!(gate.permits(epoch, batch), gate.permits(epoch, batch));
            if gate.permits(epoch, batch) {
                prop_assert!(epoch >= start);
                prop_assert!(batch > 0 && batch % n == 0);
            }
        }
    }
}
