//! Error types for network construction and inference.

use thiserror::Error;

/// Errors that can occur while building a network or running inference.
///
/// Construction-time variants (`Structure`, `Distribution` from
/// [`NetworkBuilder::build`](crate::engine::network::NetworkBuilder::build)) abort
/// that network. Query-time variants never corrupt the engine's existing evidence or
/// caches, so the call can be retried after correcting its input.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// Dangling or cyclic parent reference, duplicate variable, or an
    /// elimination order that exceeds the configured width guard.
    #[error("structure error: {0}")]
    Structure(String),

    /// Malformed CPT (row count, row width, row sum, negative mass) or evidence
    /// with zero probability under the model.
    #[error("distribution error: {0}")]
    Distribution(String),

    /// Outcome not part of a variable's domain, or an invalid domain.
    #[error("domain error: {0}")]
    Domain(String),

    /// A query or evidence operation named a variable the bound network lacks.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Loopy propagation failed numerically or, under a strict policy, ran out
    /// of iterations.
    #[error("convergence error: {0}")]
    Convergence(#[from] ConvergenceError),

    /// Invalid algorithm configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// The engine was queried before a network was bound.
    #[error("no network bound to inference engine")]
    Unbound,
}

/// Numerical failures of iterative inference.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvergenceError {
    /// A message's probability mass collapsed to (near) zero.
    #[error("message mass collapsed to {mass:e} in round {iteration} ({edge})")]
    MassCollapse {
        iteration: usize,
        edge: String,
        mass: f64,
    },

    /// The iteration cap was reached before messages stabilized.
    #[error("no convergence after {iterations} rounds (max delta {max_delta:e})")]
    IterationLimit { iterations: usize, max_delta: f64 },
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, InferenceError>;
