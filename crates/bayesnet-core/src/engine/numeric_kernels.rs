//! Numeric kernels for probability vectors.
//!
//! Small, allocation-free helpers shared by the CPT validator, the factor
//! algebra and the message-passing loop.

/// Tolerance for a CPT row (or any distribution) to count as summing to one.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Mass at or below which a vector is treated as numerically collapsed.
///
/// Renormalizing below this floor would divide by (effectively) zero.
pub const MESSAGE_MASS_FLOOR: f64 = 1e-300;

/// Uniform distribution over `len` outcomes.
pub fn uniform(len: usize) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    vec![1.0 / len as f64; len]
}

/// Indicator vector selecting `index` out of `len` outcomes.
pub fn one_hot(len: usize, index: usize) -> Vec<f64> {
    let mut out = vec![0.0; len];
    if let Some(slot) = out.get_mut(index) {
        *slot = 1.0;
    }
    out
}

/// Normalizes `values` in place and returns the mass it had before.
///
/// Returns `None` (leaving `values` untouched) when the mass is at or below
/// [`MESSAGE_MASS_FLOOR`] or is not finite.
pub fn normalize_in_place(values: &mut [f64]) -> Option<f64> {
    let mass: f64 = values.iter().sum();
    if !mass.is_finite() || mass <= MESSAGE_MASS_FLOOR {
        return None;
    }
    for v in values.iter_mut() {
        *v /= mass;
    }
    Some(mass)
}

/// Largest absolute elementwise difference. Vectors of different length
/// compare as infinitely far apart.
pub fn max_abs_delta(lhs: &[f64], rhs: &[f64]) -> f64 {
    if lhs.len() != rhs.len() {
        return f64::INFINITY;
    }
    lhs.iter()
        .zip(rhs)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

/// Elementwise multiply `acc *= other`.
#[inline]
pub fn multiply_into(acc: &mut [f64], other: &[f64]) {
    debug_assert_eq!(acc.len(), other.len());
    for (a, b) in acc.iter_mut().zip(other) {
        *a *= *b;
    }
}

/// Linear blend `damping * previous + (1 - damping) * fresh`, renormalized.
///
/// Both inputs are distributions, so the blend has unit mass up to rounding.
pub fn damped_blend(previous: &[f64], fresh: &mut [f64], damping: f64) {
    if damping <= 0.0 {
        return;
    }
    for (f, p) in fresh.iter_mut().zip(previous) {
        *f = damping * p + (1.0 - damping) * *f;
    }
    let _ = normalize_in_place(fresh);
}

/// Whether every entry is finite and non-negative and the sum is within
/// `tolerance` of one.
pub fn is_distribution(values: &[f64], tolerance: f64) -> bool {
    !values.is_empty()
        && values.iter().all(|v| v.is_finite() && *v >= 0.0)
        && (values.iter().sum::<f64>() - 1.0).abs() <= tolerance
}

/// Shannon entropy in nats; zero-probability outcomes contribute nothing.
pub fn entropy(values: &[f64]) -> f64 {
    values
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}
