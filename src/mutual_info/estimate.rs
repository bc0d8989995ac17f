//! Mutual information estimators, in bits
//!
//! - Histogram: plug-in estimate from the contingency table of two symbol sequences
//! - KNN: Kraskov–Stögbauer–Grassberger (estimator 1) on continuous vectors

use super::quantize::Symbols;
use crate::error::{Error, Result};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::f64::consts::LOG2_E;

/// Neighbor count used by the KSG estimator unless configured otherwise
pub const DEFAULT_KNN_NEIGHBORS: usize = 3;

/// MI estimator matching a quantization method
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Estimator {
    /// Contingency-table estimate on discrete symbols
    Histogram,
    /// KSG estimate on continuous vectors with `k` neighbors
    Knn { k: usize },
}

impl Estimator {
    /// Estimate I(x; y) in bits
    pub fn estimate(&self, x: &Symbols, y: &Symbols) -> Result<f64> {
        if x.len() != y.len() {
            return Err(Error::EstimatorMismatch(format!(
                "sample counts differ: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        match (self, x, y) {
            (Estimator::Histogram, Symbols::Discrete(x), Symbols::Discrete(y)) => {
                Ok(mutual_info_histogram(x, y))
            }
            (Estimator::Knn { k }, Symbols::Continuous(x), Symbols::Continuous(y)) => {
                mutual_info_knn(x, y, *k)
            }
            (Estimator::Histogram, _, _) => Err(Error::EstimatorMismatch(
                "histogram estimator needs discrete symbols".to_string(),
            )),
            (Estimator::Knn { .. }, _, _) => Err(Error::EstimatorMismatch(
                "knn estimator needs continuous vectors".to_string(),
            )),
        }
    }
}

/// Mutual information between two discrete sequences of equal length, in bits
///
/// Returns 0 for empty input. The result is clipped at zero to absorb rounding.
pub fn mutual_info_histogram(x: &Array1<i64>, y: &Array1<i64>) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }

    let mut joint: HashMap<(i64, i64), usize> = HashMap::new();
    let mut px: HashMap<i64, usize> = HashMap::new();
    let mut py: HashMap<i64, usize> = HashMap::new();
    for (&a, &b) in x.iter().zip(y.iter()) {
        *joint.entry((a, b)).or_default() += 1;
        *px.entry(a).or_default() += 1;
        *py.entry(b).or_default() += 1;
    }

    let n = n as f64;
    let nats: f64 = joint
        .iter()
        .map(|(&(a, b), &count)| {
            let count = count as f64;
            let expected = px[&a] as f64 * py[&b] as f64;
            count / n * (count * n / expected).ln()
        })
        .sum();
    nats.max(0.0) * LOG2_E
}

/// Shannon entropy of a discrete sequence, in bits
pub fn entropy(x: &Array1<i64>) -> f64 {
    let n = x.len();
    if n == 0 {
        return 0.0;
    }
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for &v in x {
        *counts.entry(v).or_default() += 1;
    }
    -counts
        .values()
        .map(|&c| {
            let p = c as f64 / n as f64;
            p * p.log2()
        })
        .sum::<f64>()
}

/// KSG estimate of I(x; y) in bits, with rows as samples
///
/// Uses the max-norm in the joint space. For each sample, `eps` is the distance to
/// its k-th joint neighbor and the marginal counts include points strictly inside
/// `eps`. Negative estimates are clipped to zero.
pub fn mutual_info_knn(x: &Array2<f64>, y: &Array2<f64>, k: usize) -> Result<f64> {
    let n = x.nrows();
    if y.nrows() != n {
        return Err(Error::EstimatorMismatch(format!(
            "sample counts differ: {} vs {}",
            n,
            y.nrows()
        )));
    }
    if k == 0 || n <= k {
        return Err(Error::InvalidParameter(format!(
            "knn estimator needs more than k={} samples, got {}",
            k, n
        )));
    }

    // one row of distances at a time keeps memory linear in n
    let mut dx = vec![0.0f64; n];
    let mut dy = vec![0.0f64; n];
    let mut joint = Vec::with_capacity(n - 1);
    let mut marginal_sum = 0.0;
    for i in 0..n {
        chebyshev_row(x, i, &mut dx);
        chebyshev_row(y, i, &mut dy);

        joint.clear();
        joint.extend((0..n).filter(|&j| j != i).map(|j| dx[j].max(dy[j])));
        let (_, eps, _) = joint.select_nth_unstable_by(k - 1, |a, b| a.total_cmp(b));
        let eps = *eps;

        let nx = (0..n).filter(|&j| j != i && dx[j] < eps).count();
        let ny = (0..n).filter(|&j| j != i && dy[j] < eps).count();
        marginal_sum += digamma((nx + 1) as f64) + digamma((ny + 1) as f64);
    }

    let nats = digamma(k as f64) + digamma(n as f64) - marginal_sum / n as f64;
    Ok(nats.max(0.0) * LOG2_E)
}

/// Max-norm distance from row `i` to every row, written into `out`
fn chebyshev_row(points: &Array2<f64>, i: usize, out: &mut [f64]) {
    let anchor = points.row(i);
    for (d, row) in out.iter_mut().zip(points.rows()) {
        *d = anchor
            .iter()
            .zip(row.iter())
            .fold(0.0f64, |acc, (a, b)| acc.max((a - b).abs()));
    }
}

/// Digamma function for positive arguments
pub fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2
            * (1.0 / 12.0
                - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use proptest::prelude::*;

    #[test]
    fn test_self_information_equals_entropy() {
        let x = array![0, 1, 2, 3, 0, 1, 2, 3];
        assert_abs_diff_eq!(mutual_info_histogram(&x, &x), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(entropy(&x), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_independent_sequences_have_zero_information() {
        let x = array![0, 0, 1, 1];
        let y = array![0, 1, 0, 1];
        assert_abs_diff_eq!(mutual_info_histogram(&x, &y), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_relabeling_preserves_information() {
        let x = array![0, 1, 1, 2, 2, 2];
        let y = array![7, -3, -3, 5, 5, 5];
        assert_abs_diff_eq!(
            mutual_info_histogram(&x, &y),
            entropy(&x),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_empty_sequences() {
        let empty: Array1<i64> = Array1::zeros(0);
        assert_eq!(mutual_info_histogram(&empty, &empty), 0.0);
        assert_eq!(entropy(&empty), 0.0);
    }

    #[test]
    fn test_digamma_known_values() {
        let euler_gamma = 0.577_215_664_901_532_9;
        assert_abs_diff_eq!(digamma(1.0), -euler_gamma, epsilon = 1e-10);
        assert_abs_diff_eq!(digamma(2.0), 1.0 - euler_gamma, epsilon = 1e-10);
        assert_abs_diff_eq!(digamma(0.5), -euler_gamma - 2.0 * 2f64.ln(), epsilon = 1e-10);
        assert_abs_diff_eq!(digamma(100.0), 4.600_161_852_738_087, epsilon = 1e-10);
    }

    #[test]
    fn test_knn_detects_dependence() {
        let x = Array::from_shape_fn((200, 1), |(i, _)| ((i * 37) % 200) as f64 / 200.0);
        let y = x.mapv(|v| 2.0 * v + 1.0);
        let noise = Array::from_shape_fn((200, 1), |(i, _)| ((i * 61) % 199) as f64 / 199.0);

        let dependent = mutual_info_knn(&x, &y, 3).unwrap();
        let independent = mutual_info_knn(&x, &noise, 3).unwrap();

        assert!(dependent > 2.0, "dependent MI too small: {}", dependent);
        assert!(independent < dependent);
        assert!(independent >= 0.0);
    }

    #[test]
    fn test_knn_handles_thousands_of_samples() {
        let n = 3_000;
        let x = Array::from_shape_fn((n, 2), |(i, j)| ((i * 7919 + j * 104_729) % n) as f64 / n as f64);
        let y = Array::from_shape_fn((n, 1), |(i, _)| {
            x[[i, 0]] + 0.01 * (((i * 31) % 97) as f64 / 97.0 - 0.5)
        });

        let mi = mutual_info_knn(&x, &y, 3).unwrap();
        assert!(mi.is_finite());
        assert!(mi > 1.0, "dependent MI too small: {}", mi);
    }

    #[test]
    fn test_knn_rejects_too_few_samples() {
        let x = Array2::zeros((3, 1));
        assert!(matches!(
            mutual_info_knn(&x, &x, 3),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_estimator_rejects_mismatched_representations() {
        let discrete = Symbols::Discrete(array![0, 1]);
        let continuous = Symbols::Continuous(array![[0.0], [1.0]]);

        assert!(Estimator::Histogram.estimate(&discrete, &continuous).is_err());
        assert!(Estimator::Knn { k: 1 }.estimate(&discrete, &discrete).is_err());
        assert!(Estimator::Histogram
            .estimate(&discrete, &Symbols::Discrete(array![0]))
            .is_err());
    }

    proptest! {
        #[test]
        fn prop_histogram_mi_is_non_negative_and_bounded(
            pairs in proptest::collection::vec((0i64..6, 0i64..4), 1..200)
        ) {
            let x: Array1<i64> = pairs.iter().map(|p| p.0).collect();
            let y: Array1<i64> = pairs.iter().map(|p| p.1).collect();
            let mi = mutual_info_histogram(&x, &y);

            prop_assert!(mi >= 0.0);
            prop_assert!(mi <= entropy(&x) + 1e-9);
            prop_assert!(mi <= entropy(&y) + 1e-9);
            prop_assert!((mi - mutual_info_histogram(&y, &x)).abs() < 1e-9);
        }
    }
}
