//! Minibatch k-means clustering (Sculley, 2010)

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters for minibatch k-means
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansParams {
    /// RNG seed for initialization and minibatch sampling
    #[serde(default)]
    pub seed: u64,

    /// Samples drawn per minibatch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of minibatch updates
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

fn default_batch_size() -> usize {
    256
}

fn default_iterations() -> usize {
    100
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            seed: 0,
            batch_size: default_batch_size(),
            iterations: default_iterations(),
        }
    }
}

/// Cluster the rows of `data` into at most `n_clusters` groups
///
/// Returns the cluster index of every row. The number of clusters is capped at the
/// number of rows; centers are seeded with k-means++.
pub fn minibatch_kmeans(data: &Array2<f32>, n_clusters: usize, params: &KMeansParams) -> Array1<i64> {
    let n = data.nrows();
    if n == 0 {
        return Array1::zeros(0);
    }
    let k = n_clusters.clamp(1, n);
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut centers = init_centers(data, k, &mut rng);
    let mut counts = vec![0usize; k];

    let batch = params.batch_size.clamp(1, n);
    for _ in 0..params.iterations {
        let picked = index::sample(&mut rng, n, batch);
        let assigned: Vec<(usize, usize)> = picked
            .iter()
            .map(|i| (i, nearest(&centers, data.row(i))))
            .collect();

        for (i, c) in assigned {
            counts[c] += 1;
            let eta = 1.0 / counts[c] as f64;
            for (center, &x) in centers[c].iter_mut().zip(data.row(i).iter()) {
                *center += eta * (f64::from(x) - *center);
            }
        }
    }

    data.rows()
        .into_iter()
        .map(|row| nearest(&centers, row) as i64)
        .collect()
}

/// k-means++ seeding: each new center is drawn with probability proportional to
/// its squared distance from the closest center chosen so far
fn init_centers(data: &Array2<f32>, k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = data.nrows();
    let to_center = |i: usize| -> Vec<f64> { data.row(i).iter().map(|&v| f64::from(v)).collect() };

    let mut centers = vec![to_center(rng.random_range(0..n))];
    let mut dist: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(&centers[0], row))
        .collect();

    while centers.len() < k {
        let total: f64 = dist.iter().sum();
        let next = if total > 0.0 {
            let mut r = rng.random::<f64>() * total;
            dist.iter()
                .position(|&d| {
                    r -= d;
                    r < 0.0
                })
                .unwrap_or(n - 1)
        } else {
            rng.random_range(0..n)
        };
        let center = to_center(next);
        for (d, row) in dist.iter_mut().zip(data.rows()) {
            *d = d.min(squared_distance(&center, row));
        }
        centers.push(center);
    }
    centers
}

fn squared_distance(center: &[f64], row: ArrayView1<f32>) -> f64 {
    center
        .iter()
        .zip(row.iter())
        .map(|(&m, &x)| {
            let d = f64::from(x) - m;
            d * d
        })
        .sum()
}

fn nearest(centers: &[Vec<f64>], row: ArrayView1<f32>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, center) in centers.iter().enumerate() {
        let dist = squared_distance(center, row);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn two_blobs() -> Array2<f32> {
        Array::from_shape_fn((40, 2), |(i, j)| {
            let offset = if i < 20 { -10.0 } else { 10.0 };
            offset + ((i * 7 + j * 3) % 5) as f32 * 0.1
        })
    }

    #[test]
    fn test_separates_well_spaced_blobs() {
        let labels = minibatch_kmeans(&two_blobs(), 2, &KMeansParams::default());

        assert_eq!(labels.len(), 40);
        let first = labels[0];
        assert!(labels.iter().take(20).all(|&l| l == first));
        assert!(labels.iter().skip(20).all(|&l| l != first));
    }

    #[test]
    fn test_is_deterministic_for_seed() {
        let params = KMeansParams {
            seed: 11,
            ..KMeansParams::default()
        };
        let a = minibatch_kmeans(&two_blobs(), 4, &params);
        let b = minibatch_kmeans(&two_blobs(), 4, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn test_caps_clusters_at_sample_count() {
        let data = Array::from_shape_fn((3, 1), |(i, _)| i as f32);
        let labels = minibatch_kmeans(&data, 20, &KMeansParams::default());
        assert!(labels.iter().all(|&l| (0..3).contains(&l)));
    }

    #[test]
    fn test_empty_input() {
        let labels = minibatch_kmeans(&Array2::zeros((0, 3)), 5, &KMeansParams::default());
        assert!(labels.is_empty());
    }
}
