//! # Bayesnet Core
//!
//! Probabilistic inference over discrete Bayesian networks: build a network,
//! bind it to an [`InferenceEngine`], set evidence and query posterior beliefs
//! with exact, loopy or sampling-based algorithms.

pub mod engine;

// Re-export commonly used types
pub use engine::belief::{Belief, ProbabilityVector};
pub use engine::belief_propagation::{BeliefPropagationConfig, ConvergencePolicy};
pub use engine::elimination::{EliminationConfig, EliminationOrder};
pub use engine::errors::{ConvergenceError, InferenceError, Result};
pub use engine::evidence::Evidence;
pub use engine::inference::{
    AlgorithmConfig, AlgorithmKind, CancellationToken, InferenceDiagnostics, InferenceEngine,
    MarginalSolver, Posterior,
};
pub use engine::network::{Network, NetworkBuilder, Outcome, VariableId};
pub use engine::sampling::SamplingConfig;
