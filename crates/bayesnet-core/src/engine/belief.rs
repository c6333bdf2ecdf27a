//! Posterior marginal distributions.

use std::ops::Index;

use crate::engine::numeric_kernels::{self, max_abs_delta};

/// A posterior marginal over one variable's outcomes.
///
/// Equality via `PartialEq` is exact; use [`approx_eq`](Self::approx_eq) when
/// comparing results of different algorithms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Belief {
    probabilities: Vec<f64>,
}

/// Alias matching the query API's vocabulary.
pub type ProbabilityVector = Belief;

impl Belief {
    /// Wraps an already normalized vector.
    pub(crate) fn from_normalized(probabilities: Vec<f64>) -> Self {
        debug_assert!(
            numeric_kernels::is_distribution(&probabilities, 1e-6),
            "belief must be a distribution: {:?}",
            probabilities
        );
        Self { probabilities }
    }

    pub fn one_hot(len: usize, outcome: usize) -> Self {
        Self {
            probabilities: numeric_kernels::one_hot(len, outcome),
        }
    }

    pub fn uniform(len: usize) -> Self {
        Self {
            probabilities: numeric_kernels::uniform(len),
        }
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn probability(&self, outcome: usize) -> Option<f64> {
        self.probabilities.get(outcome).copied()
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Outcome index with the highest probability (first one on ties).
    pub fn most_likely(&self) -> Option<(usize, f64)> {
        self.probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
    }

    /// Shannon entropy in nats.
    pub fn entropy(&self) -> f64 {
        numeric_kernels::entropy(&self.probabilities)
    }

    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// Largest absolute per-outcome difference; infinite on length mismatch.
    pub fn max_abs_diff(&self, other: &Belief) -> f64 {
        max_abs_delta(&self.probabilities, &other.probabilities)
    }

    /// Same length and every entry within `tolerance`.
    pub fn approx_eq(&self, other: &Belief, tolerance: f64) -> bool {
        self.max_abs_diff(other) <= tolerance
    }

    /// Compares against a raw vector, e.g. an expected fixture value.
    pub fn approx_eq_slice(&self, expected: &[f64], tolerance: f64) -> bool {
        max_abs_delta(&self.probabilities, expected) <= tolerance
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.probabilities
    }
}

impl Index<usize> for Belief {
    type Output = f64;

    fn index(&self, outcome: usize) -> &f64 {
        &self.probabilities[outcome]
    }
}

impl AsRef<[f64]> for Belief {
    fn as_ref(&self) -> &[f64] {
        &self.probabilities
    }
}
