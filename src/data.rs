//! Batched (input, label) data sources
//!
//! The estimation engine only needs to iterate a fixed evaluation set in a stable
//! order, so the data collaborator is kept to a batch size and a batch iterator.

use crate::error::{Error, Result};
use ndarray::{s, Array1, Array2};

/// A batch of flattened inputs with their integer class labels
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// Inputs, one sample per row
    pub inputs: Array2<f32>,
    /// Class labels, one per row of `inputs`
    pub targets: Array1<i64>,
}

impl Batch {
    /// Create a batch, checking that inputs and targets have the same number of samples
    pub fn new(inputs: Array2<f32>, targets: Array1<i64>) -> Result<Self> {
        if inputs.nrows() != targets.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![inputs.nrows()],
                got: vec![targets.len()],
            });
        }
        Ok(Self { inputs, targets })
    }

    /// Number of samples in the batch
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    /// Check if the batch holds no samples
    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }
}

/// Source of evaluation batches
///
/// Every call to [`DataSource::batches`] must yield the same samples in the same
/// order: the reference sample drawn by `prepare` and the activations recorded in
/// later passes are paired row by row.
pub trait DataSource: Send {
    /// Nominal number of samples per batch
    fn batch_size(&self) -> usize;

    /// Number of nominal batches needed to cover `samples`
    fn batches_for(&self, samples: usize) -> usize {
        samples.div_ceil(self.batch_size().max(1))
    }

    /// Iterate over all batches
    fn batches(&self) -> Box<dyn Iterator<Item = Batch> + '_>;
}

/// In-memory data source that slices a dataset into fixed-size batches
#[derive(Clone, Debug)]
pub struct BatchLoader {
    inputs: Array2<f32>,
    targets: Array1<i64>,
    batch_size: usize,
}

impl BatchLoader {
    /// Create a loader over `inputs` (one sample per row) and their labels
    pub fn new(inputs: Array2<f32>, targets: Array1<i64>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter(
                "batch_size must be > 0".to_string(),
            ));
        }
        if inputs.nrows() != targets.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![inputs.nrows()],
                got: vec![targets.len()],
            });
        }
        Ok(Self {
            inputs,
            targets,
            batch_size,
        })
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    /// Check if the loader holds no samples
    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }

    /// Number of batches, counting a trailing short batch
    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }
}

impl DataSource for BatchLoader {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn batches(&self) -> Box<dyn Iterator<Item = Batch> + '_> {
        let n = self.len();
        Box::new((0..n).step_by(self.batch_size).map(move |start| {
            let end = (start + self.batch_size).min(n);
            Batch {
                inputs: self.inputs.slice(s![start..end, ..]).to_owned(),
                targets: self.targets.slice(s![start..end]).to_owned(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn loader(n: usize, batch_size: usize) -> BatchLoader {
        let inputs = Array::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f32);
        let targets = Array1::from_shape_fn(n, |i| (i % 2) as i64);
        BatchLoader::new(inputs, targets, batch_size).unwrap()
    }

    #[test]
    fn test_batches_cover_dataset_in_order() {
        let loader = loader(10, 4);
        let batches: Vec<Batch> = loader.batches().collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(loader.num_batches(), 3);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[2].len(), 2);
        assert_eq!(batches[1].inputs[[0, 0]], 12.0);
        assert_eq!(batches[2].targets.to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_batches_are_repeatable() {
        let loader = loader(7, 3);
        let first: Vec<Batch> = loader.batches().collect();
        let second: Vec<Batch> = loader.batches().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_batches_for_rounds_up_to_whole_batches() {
        let loader = loader(10, 4);
        assert_eq!(loader.batches_for(0), 0);
        assert_eq!(loader.batches_for(4), 1);
        assert_eq!(loader.batches_for(9), 3);

        let taken: usize = loader.batches().take(loader.batches_for(9)).map(|b| b.len()).sum();
        assert!(taken >= 9);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let result = BatchLoader::new(Array2::zeros((2, 2)), Array1::zeros(2), 0);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_rejects_mismatched_rows() {
        let result = BatchLoader::new(Array2::zeros((3, 2)), Array1::zeros(2), 1);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));

        let batch = Batch::new(Array2::zeros((1, 2)), Array1::zeros(2));
        assert!(batch.is_err());
    }
}
