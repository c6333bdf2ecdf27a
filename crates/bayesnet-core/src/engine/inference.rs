//! Inference engine: binds a shared network, owns evidence and cached beliefs,
//! and dispatches to one algorithm variant chosen at construction time.
//!
//! ## Variants
//!
//! Every algorithm implements [`MarginalSolver`]. [`AlgorithmConfig`] is the
//! tagged configuration that selects one:
//!
//! - [`AlgorithmConfig::Exact`]: variable elimination
//! - [`AlgorithmConfig::Loopy`]: synchronous loopy belief propagation
//! - [`AlgorithmConfig::Sampling`]: likelihood weighting
//!
//! The engine never switches variants on its own.
//!
//! ## State
//!
//! The network is shared read-only (`Arc<Network>`). Evidence, the cached
//! posterior and the last run's diagnostics belong to the engine alone; the
//! `&mut self` API makes the caller serialize writers. Any evidence change drops
//! the cache, and the next [`InferenceEngine::beliefs`] call recomputes.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bayesnet_core::engine::inference::{AlgorithmConfig, InferenceEngine};
//! use bayesnet_core::engine::network::NetworkBuilder;
//!
//! let mut b = NetworkBuilder::new();
//! b.add_variable("rain", ["yes", "no"]).unwrap();
//! b.add_variable("wet", ["yes", "no"]).unwrap();
//! b.add_parent("wet", "rain").unwrap();
//! b.set_prior("rain", &[0.2, 0.8]).unwrap();
//! b.set_cpt("wet", vec![vec![0.9, 0.1], vec![0.1, 0.9]]).unwrap();
//! let network = Arc::new(b.build().unwrap());
//!
//! let mut engine = InferenceEngine::with_network(network, AlgorithmConfig::default()).unwrap();
//! engine.set_evidence("wet", "yes").unwrap();
//! let rain = engine.beliefs("rain").unwrap();
//! assert!((rain[0] - 0.18 / 0.26).abs() < 1e-9);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::belief::Belief;
use crate::engine::belief_propagation::{BeliefPropagationConfig, LoopyBeliefPropagation};
use crate::engine::elimination::{EliminationConfig, VariableElimination};
use crate::engine::errors::{ConvergenceError, InferenceError, Result};
use crate::engine::evidence::Evidence;
use crate::engine::network::{Network, Outcome, VariableId};
use crate::engine::sampling::{LikelihoodWeighting, SamplingConfig};

/// Which algorithm produced a posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlgorithmKind {
    Exact,
    Loopy,
    Sampling,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlgorithmKind::Exact => "variable-elimination",
            AlgorithmKind::Loopy => "loopy-belief-propagation",
            AlgorithmKind::Sampling => "likelihood-weighting",
        })
    }
}

/// Tagged algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "algorithm", rename_all = "snake_case"))]
pub enum AlgorithmConfig {
    Exact(EliminationConfig),
    Loopy(BeliefPropagationConfig),
    Sampling(SamplingConfig),
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        AlgorithmConfig::Exact(EliminationConfig::default())
    }
}

impl AlgorithmConfig {
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            AlgorithmConfig::Exact(_) => AlgorithmKind::Exact,
            AlgorithmConfig::Loopy(_) => AlgorithmKind::Loopy,
            AlgorithmConfig::Sampling(_) => AlgorithmKind::Sampling,
        }
    }

    /// Validates the configuration and builds the matching solver.
    pub fn into_solver(self) -> Result<Box<dyn MarginalSolver>> {
        Ok(match self {
            AlgorithmConfig::Exact(config) => Box::new(VariableElimination::new(config)?),
            AlgorithmConfig::Loopy(config) => Box::new(LoopyBeliefPropagation::new(config)?),
            AlgorithmConfig::Sampling(config) => Box::new(LikelihoodWeighting::new(config)?),
        })
    }
}

/// Cooperative cancellation flag, checked between rounds or sample batches.
///
/// Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Runtime diagnostics of one inference run.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceDiagnostics {
    pub algorithm: AlgorithmKind,
    /// Exact runs always converge; loopy runs converge when the max message
    /// delta drops below tolerance; sampling runs converge unless cancelled.
    pub converged: bool,
    /// Synchronous rounds (loopy) or samples drawn (sampling); zero for exact.
    pub iterations: usize,
    /// Max absolute message change of the last loopy round.
    pub final_max_delta: f64,
    pub cancelled: bool,
    /// `P(evidence)` when the algorithm computes it.
    pub evidence_probability: Option<f64>,
    /// Kish effective sample size of a weighted sampling run.
    pub effective_sample_size: Option<f64>,
    /// Non-fatal numerical failure that ended the run early.
    pub failure: Option<ConvergenceError>,
}

impl InferenceDiagnostics {
    pub(crate) fn new(algorithm: AlgorithmKind) -> Self {
        Self {
            algorithm,
            converged: true,
            iterations: 0,
            final_max_delta: 0.0,
            cancelled: false,
            evidence_probability: None,
            effective_sample_size: None,
            failure: None,
        }
    }
}

/// Marginals of every variable, indexed by [`VariableId`], plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    pub beliefs: Vec<Belief>,
    pub diagnostics: InferenceDiagnostics,
}

impl Posterior {
    pub fn belief(&self, variable: VariableId) -> Option<&Belief> {
        self.beliefs.get(variable.index())
    }
}

/// The contract shared by all inference algorithms.
///
/// Implementations never mutate the network. They must return the exact
/// one-hot vector for every evidence variable.
pub trait MarginalSolver: Send + Sync + fmt::Debug {
    fn kind(&self) -> AlgorithmKind;

    /// Computes every variable's marginal given `evidence`.
    fn solve(
        &self,
        network: &Network,
        evidence: &Evidence,
        cancel: &CancellationToken,
    ) -> Result<Posterior>;
}

/// Rejects evidence that names a variable or outcome `network` lacks, e.g.
/// evidence observed against a different network.
pub(crate) fn check_evidence(network: &Network, evidence: &Evidence) -> Result<()> {
    for (id, outcome) in evidence.iter() {
        network
            .resolve_id(id)?
            .outcome_index(&Outcome::Index(outcome))?;
    }
    Ok(())
}

/// One-hot beliefs for evidence variables, `None` elsewhere.
pub(crate) fn clamp_evidence(network: &Network, evidence: &Evidence) -> Vec<Option<Belief>> {
    network
        .variables()
        .iter()
        .map(|v| evidence.get(v.id()).map(|o| Belief::one_hot(v.cardinality(), o)))
        .collect()
}

/// Binds one network and answers belief queries under changing evidence.
#[derive(Debug)]
pub struct InferenceEngine {
    solver: Box<dyn MarginalSolver>,
    network: Option<Arc<Network>>,
    evidence: Evidence,
    cached: Option<Posterior>,
    last_diagnostics: Option<InferenceDiagnostics>,
    cancel: CancellationToken,
}

impl InferenceEngine {
    /// Creates an unbound engine for the given algorithm.
    pub fn new(config: AlgorithmConfig) -> Result<Self> {
        Ok(Self::with_solver(config.into_solver()?))
    }

    /// Creates an engine around a custom solver.
    pub fn with_solver(solver: Box<dyn MarginalSolver>) -> Self {
        Self {
            solver,
            network: None,
            evidence: Evidence::new(),
            cached: None,
            last_diagnostics: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an engine already bound to `network`.
    pub fn with_network(network: Arc<Network>, config: AlgorithmConfig) -> Result<Self> {
        let mut engine = Self::new(config)?;
        engine.bind(network);
        Ok(engine)
    }

    /// Associates the engine with `network`, resetting evidence and caches.
    pub fn bind(&mut self, network: Arc<Network>) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            algorithm = %self.solver.kind(),
            variables = network.len(),
            "binding inference engine"
        );
        self.network = Some(network);
        self.evidence = Evidence::new();
        self.cached = None;
        self.last_diagnostics = None;
    }

    pub fn network(&self) -> Option<&Arc<Network>> {
        self.network.as_ref()
    }

    pub fn algorithm(&self) -> AlgorithmKind {
        self.solver.kind()
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    /// Diagnostics of the most recent run, if any ran since binding.
    pub fn diagnostics(&self) -> Option<&InferenceDiagnostics> {
        self.last_diagnostics.as_ref()
    }

    /// Handle to the flag checked between rounds. Cancelled runs return their
    /// best-effort beliefs without caching them; reset the token to compute
    /// fully again.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn bound(&self) -> Result<&Arc<Network>> {
        self.network.as_ref().ok_or(InferenceError::Unbound)
    }

    /// Observes `outcome` (label or index) on `variable`.
    ///
    /// On error the evidence and caches are left as they were.
    pub fn set_evidence(&mut self, variable: &str, outcome: impl Into<Outcome>) -> Result<()> {
        let network = Arc::clone(self.bound()?);
        let outcome = outcome.into();
        if self.evidence.observe(&network, variable, outcome.clone())? {
            #[cfg(feature = "tracing")]
            tracing::debug!(variable, %outcome, "evidence set");
            self.invalidate();
        }
        Ok(())
    }

    /// Removes the observation on `variable`, if any.
    pub fn clear_evidence(&mut self, variable: &str) -> Result<()> {
        let id = self
            .bound()?
            .variable_id(variable)
            .ok_or_else(|| InferenceError::UnknownVariable(variable.to_owned()))?;
        if self.evidence.clear(id) {
            #[cfg(feature = "tracing")]
            tracing::debug!(variable, "evidence cleared");
            self.invalidate();
        }
        Ok(())
    }

    pub fn clear_all_evidence(&mut self) {
        if self.evidence.clear_all() {
            self.invalidate();
        }
    }

    /// Drops cached beliefs so the next query recomputes.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Marginal of `variable` under the current evidence.
    pub fn beliefs(&mut self, variable: &str) -> Result<Belief> {
        let id = self
            .bound()?
            .variable_id(variable)
            .ok_or_else(|| InferenceError::UnknownVariable(variable.to_owned()))?;
        self.beliefs_by_id(id)
    }

    /// Marginal of the variable with the given id.
    pub fn beliefs_by_id(&mut self, id: VariableId) -> Result<Belief> {
        let network = Arc::clone(self.bound()?);
        let variable = network.resolve_id(id)?;
        if let Some(outcome) = self.evidence.get(id) {
            return Ok(Belief::one_hot(variable.cardinality(), outcome));
        }
        if let Some(cached) = &self.cached {
            if let Some(belief) = cached.belief(id) {
                return Ok(belief.clone());
            }
        }
        let posterior = self.compute(&network)?;
        posterior
            .belief(id)
            .cloned()
            .ok_or_else(|| InferenceError::UnknownVariable(id.to_string()))
    }

    /// Marginals of every variable, in id order.
    pub fn all_beliefs(&mut self) -> Result<Vec<(VariableId, Belief)>> {
        let network = Arc::clone(self.bound()?);
        let posterior = match &self.cached {
            Some(cached) => cached.clone(),
            None => self.compute(&network)?,
        };
        Ok(network
            .variables()
            .iter()
            .map(|v| v.id())
            .zip(posterior.beliefs)
            .collect())
    }

    fn compute(&mut self, network: &Network) -> Result<Posterior> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            algorithm = %self.solver.kind(),
            evidence = self.evidence.len(),
            "computing posterior"
        );
        let posterior = self.solver.solve(network, &self.evidence, &self.cancel)?;
        self.last_diagnostics = Some(posterior.diagnostics.clone());
        if !posterior.diagnostics.cancelled {
            self.cached = Some(posterior.clone());
        }
        Ok(posterior)
    }
}
