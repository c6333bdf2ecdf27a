//! Loopy sum-product belief propagation.
//!
//! The network is turned into a bipartite factor graph: one factor per CPT
//! (scope = parents plus the child) and one variable node per random variable,
//! with an edge wherever a factor mentions a variable. Every edge carries a
//! variable-to-factor and a factor-to-variable message over the variable's
//! domain.
//!
//! The schedule is synchronous: a round computes every new message from the
//! previous round's complete snapshot into fresh buffers, and the buffers are
//! swapped at the round barrier. Results therefore do not depend on the order
//! messages are visited in, which is what lets the `parallel` feature compute a
//! round with rayon.
//!
//! Evidence variables send the one-hot vector at their observed outcome for the
//! whole run. Messages are renormalized after every update; a message whose
//! mass collapses is a [`ConvergenceError::MassCollapse`], and the run falls back
//! to the last complete round. On tree-shaped factor graphs the fixed point is
//! exact; with cycles it is an approximation.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::engine::belief::Belief;
use crate::engine::errors::{ConvergenceError, InferenceError, Result};
use crate::engine::evidence::Evidence;
use crate::engine::factor::Factor;
use crate::engine::inference::{
    check_evidence, AlgorithmKind, CancellationToken, InferenceDiagnostics, MarginalSolver,
    Posterior,
};
use crate::engine::network::{Network, VariableId};
use crate::engine::numeric_kernels::{
    damped_blend, max_abs_delta, multiply_into, normalize_in_place, one_hot, uniform,
};

/// What to do when a run ends without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConvergencePolicy {
    /// Return the best current estimate flagged as non-converged.
    #[default]
    BestEffort,
    /// Fail with [`InferenceError::Convergence`].
    Strict,
}

/// Configuration for loopy belief propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BeliefPropagationConfig {
    /// Maximum synchronous message-passing rounds.
    pub max_iterations: usize,
    /// Convergence threshold on max absolute message delta.
    pub convergence_tolerance: f64,
    /// Damping factor in [0, 1). Zero is the plain synchronous update; higher
    /// values slow updates and help oscillating graphs settle.
    pub damping: f64,
    pub policy: ConvergencePolicy,
}

impl Default for BeliefPropagationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance: 1e-4,
            damping: 0.0,
            policy: ConvergencePolicy::BestEffort,
        }
    }
}

impl BeliefPropagationConfig {
    fn validate(self) -> Result<Self> {
        if self.max_iterations == 0 {
            return Err(InferenceError::Validation(
                "loopy_bp: max_iterations must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(InferenceError::Validation(
                "loopy_bp: damping must be in [0, 1)".into(),
            ));
        }
        if self.convergence_tolerance <= 0.0 || !self.convergence_tolerance.is_finite() {
            return Err(InferenceError::Validation(
                "loopy_bp: convergence_tolerance must be finite and > 0".into(),
            ));
        }
        Ok(self)
    }
}

/// Runtime diagnostics emitted by loopy belief propagation.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefPropagationDiagnostics {
    /// Iteration limit configured for this run.
    pub max_iterations: usize,
    /// Number of complete synchronous rounds.
    pub iterations_run: usize,
    /// Whether convergence tolerance was reached before the iteration limit.
    pub converged: bool,
    /// Max absolute message delta of the last complete round.
    pub final_max_message_delta: f64,
    pub variable_count: usize,
    pub factor_count: usize,
    pub edge_count: usize,
    pub cancelled: bool,
    pub failure: Option<ConvergenceError>,
}

#[derive(Debug, Clone, Copy)]
struct FactorEdge {
    factor: usize,
    variable: VariableId,
    /// Position of `variable` in the factor's scope.
    slot: usize,
}

/// Bipartite factor graph of a network.
#[derive(Debug, Clone)]
pub struct FactorGraph {
    factors: Vec<Factor>,
    edges: Vec<FactorEdge>,
    /// Per factor, its edges in scope order.
    factor_edges: Vec<SmallVec<[usize; 6]>>,
    /// Per variable, the edges to every factor mentioning it.
    variable_edges: Vec<SmallVec<[usize; 4]>>,
    cardinalities: Vec<usize>,
}

impl FactorGraph {
    /// One factor per CPT, factor `i` belonging to variable `i`.
    pub fn from_network(network: &Network) -> Self {
        let mut factors = Vec::with_capacity(network.len());
        let mut edges = Vec::new();
        let mut factor_edges = Vec::with_capacity(network.len());
        let mut variable_edges = vec![SmallVec::new(); network.len()];
        for (index, variable) in network.variables().iter().enumerate() {
            let factor = Factor::from_cpt(variable);
            let mut slots = SmallVec::new();
            for (slot, &member) in factor.scope().iter().enumerate() {
                let edge = edges.len();
                edges.push(FactorEdge {
                    factor: index,
                    variable: member,
                    slot,
                });
                slots.push(edge);
                variable_edges[member.index()].push(edge);
            }
            factor_edges.push(slots);
            factors.push(factor);
        }
        let cardinalities = network.variables().iter().map(|v| v.cardinality()).collect();
        Self {
            factors,
            edges,
            factor_edges,
            variable_edges,
            cardinalities,
        }
    }

    pub fn variable_count(&self) -> usize {
        self.variable_edges.len()
    }

    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the factor graph is a forest, in which case propagation is exact.
    pub fn is_forest(&self) -> bool {
        // Node ids: variables first, then factors.
        let nodes = self.variable_count() + self.factor_count();
        let mut component = vec![usize::MAX; nodes];
        let mut components = 0;
        for start in 0..nodes {
            if component[start] != usize::MAX {
                continue;
            }
            component[start] = components;
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                let incident: &[usize] = if node < self.variable_count() {
                    &self.variable_edges[node]
                } else {
                    &self.factor_edges[node - self.variable_count()]
                };
                for &edge in incident {
                    let e = self.edges[edge];
                    let other = if node < self.variable_count() {
                        self.variable_count() + e.factor
                    } else {
                        e.variable.index()
                    };
                    if component[other] == usize::MAX {
                        component[other] = components;
                        stack.push(other);
                    }
                }
            }
            components += 1;
        }
        self.edge_count() + components == nodes
    }
}

/// Message buffers of one round.
#[derive(Debug, Clone)]
struct Messages {
    var_to_factor: Vec<Vec<f64>>,
    factor_to_var: Vec<Vec<f64>>,
}

/// Edge index and pre-normalization mass of a collapsed message.
type Collapse = (usize, f64);

/// Synchronous loopy sum-product solver.
#[derive(Debug, Clone)]
pub struct LoopyBeliefPropagation {
    config: BeliefPropagationConfig,
}

impl LoopyBeliefPropagation {
    pub fn new(config: BeliefPropagationConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> BeliefPropagationConfig {
        self.config
    }

    /// Runs propagation and returns per-variable beliefs (indexed by id) with
    /// diagnostics.
    ///
    /// If the product of a variable's incoming messages collapses when beliefs
    /// are read out, that variable gets a uniform belief and
    /// `diagnostics.failure` holds a [`ConvergenceError::MassCollapse`] naming
    /// it. Check `failure` before trusting a uniform result.
    ///
    /// Evidence naming a variable or outcome outside `network` fails with
    /// `UnknownVariable` or `Domain`.
    pub fn run(
        &self,
        network: &Network,
        evidence: &Evidence,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Belief>, BeliefPropagationDiagnostics)> {
        check_evidence(network, evidence)?;
        let graph = FactorGraph::from_network(network);
        let observed = evidence.as_dense(network.len());
        let mut diagnostics = BeliefPropagationDiagnostics {
            max_iterations: self.config.max_iterations,
            iterations_run: 0,
            converged: false,
            final_max_message_delta: f64::INFINITY,
            variable_count: graph.variable_count(),
            factor_count: graph.factor_count(),
            edge_count: graph.edge_count(),
            cancelled: false,
            failure: None,
        };

        let mut messages = initial_messages(&graph, &observed);

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                diagnostics.cancelled = true;
                break;
            }

            let next = match self.round(&graph, &observed, &messages) {
                Ok(next) => next,
                Err((edge, mass)) => {
                    diagnostics.failure = Some(ConvergenceError::MassCollapse {
                        iteration: iteration + 1,
                        edge: describe_edge(network, &graph, edge),
                        mass,
                    });
                    break;
                }
            };

            let max_delta = next
                .var_to_factor
                .iter()
                .zip(&messages.var_to_factor)
                .chain(next.factor_to_var.iter().zip(&messages.factor_to_var))
                .map(|(fresh, old)| max_abs_delta(fresh, old))
                .fold(0.0, f64::max);

            messages = next;
            diagnostics.iterations_run = iteration + 1;
            diagnostics.final_max_message_delta = max_delta;
            if max_delta < self.config.convergence_tolerance {
                diagnostics.converged = true;
                break;
            }
        }

        let beliefs = self.extract_beliefs(network, &graph, &observed, &messages, &mut diagnostics);

        #[cfg(feature = "tracing")]
        {
            tracing::debug!(
                iterations = diagnostics.iterations_run,
                converged = diagnostics.converged,
                max_delta = diagnostics.final_max_message_delta,
                edges = diagnostics.edge_count,
                "loopy belief propagation finished"
            );
            if let Some(failure) = &diagnostics.failure {
                tracing::warn!(
                    %failure,
                    "loopy belief propagation fell back to last complete round"
                );
            } else if !diagnostics.converged && !diagnostics.cancelled {
                tracing::warn!(
                    iterations = diagnostics.iterations_run,
                    max_delta = diagnostics.final_max_message_delta,
                    "loopy belief propagation hit its iteration cap"
                );
            }
        }

        if self.config.policy == ConvergencePolicy::Strict && !diagnostics.cancelled {
            if let Some(failure) = diagnostics.failure.clone() {
                return Err(failure.into());
            }
            if !diagnostics.converged {
                return Err(ConvergenceError::IterationLimit {
                    iterations: diagnostics.iterations_run,
                    max_delta: diagnostics.final_max_message_delta,
                }
                .into());
            }
        }

        Ok((beliefs, diagnostics))
    }

    /// One synchronous round: every message is computed from `previous` only.
    fn round(
        &self,
        graph: &FactorGraph,
        observed: &[Option<usize>],
        previous: &Messages,
    ) -> std::result::Result<Messages, Collapse> {
        let mut factor_to_var = sweep(graph.edge_count(), |edge| {
            factor_to_variable(graph, previous, edge)
        })?;
        let mut var_to_factor = sweep(graph.edge_count(), |edge| {
            variable_to_factor(graph, observed, previous, edge)
        })?;

        if self.config.damping > 0.0 {
            for (fresh, old) in factor_to_var.iter_mut().zip(&previous.factor_to_var) {
                damped_blend(old, fresh, self.config.damping);
            }
            for (edge, (fresh, old)) in var_to_factor
                .iter_mut()
                .zip(&previous.var_to_factor)
                .enumerate()
            {
                if observed[graph.edges[edge].variable.index()].is_none() {
                    damped_blend(old, fresh, self.config.damping);
                }
            }
        }

        Ok(Messages {
            var_to_factor,
            factor_to_var,
        })
    }

    fn extract_beliefs(
        &self,
        network: &Network,
        graph: &FactorGraph,
        observed: &[Option<usize>],
        messages: &Messages,
        diagnostics: &mut BeliefPropagationDiagnostics,
    ) -> Vec<Belief> {
        (0..graph.variable_count())
            .map(|v| {
                let card = graph.cardinalities[v];
                if let Some(outcome) = observed[v] {
                    return Belief::one_hot(card, outcome);
                }
                let mut product = vec![1.0; card];
                for &edge in &graph.variable_edges[v] {
                    multiply_into(&mut product, &messages.factor_to_var[edge]);
                }
                let mass: f64 = product.iter().sum();
                match normalize_in_place(&mut product) {
                    Some(_) => Belief::from_normalized(product),
                    None => {
                        diagnostics.converged = false;
                        let name = network
                            .variable(VariableId(v as u32))
                            .map_or("?", |var| var.name());
                        diagnostics.failure.get_or_insert(ConvergenceError::MassCollapse {
                            iteration: diagnostics.iterations_run,
                            edge: format!("belief of '{}'", name),
                            mass,
                        });
                        Belief::uniform(card)
                    }
                }
            })
            .collect()
    }
}

impl MarginalSolver for LoopyBeliefPropagation {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Loopy
    }

    fn solve(
        &self,
        network: &Network,
        evidence: &Evidence,
        cancel: &CancellationToken,
    ) -> Result<Posterior> {
        let (beliefs, bp) = self.run(network, evidence, cancel)?;
        let mut diagnostics = InferenceDiagnostics::new(AlgorithmKind::Loopy);
        diagnostics.converged = bp.converged;
        diagnostics.iterations = bp.iterations_run;
        diagnostics.final_max_delta = bp.final_max_message_delta;
        diagnostics.cancelled = bp.cancelled;
        diagnostics.failure = bp.failure;
        Ok(Posterior { beliefs, diagnostics })
    }
}

fn initial_messages(graph: &FactorGraph, observed: &[Option<usize>]) -> Messages {
    let var_to_factor = graph
        .edges
        .iter()
        .map(|e| {
            let card = graph.cardinalities[e.variable.index()];
            match observed[e.variable.index()] {
                Some(outcome) => one_hot(card, outcome),
                None => uniform(card),
            }
        })
        .collect();
    let factor_to_var = graph
        .edges
        .iter()
        .map(|e| uniform(graph.cardinalities[e.variable.index()]))
        .collect();
    Messages {
        var_to_factor,
        factor_to_var,
    }
}

/// Normalized marginal of the factor times all other incoming messages.
fn factor_to_variable(
    graph: &FactorGraph,
    previous: &Messages,
    edge: usize,
) -> std::result::Result<Vec<f64>, Collapse> {
    let e = graph.edges[edge];
    let incoming: SmallVec<[&[f64]; 6]> = graph.factor_edges[e.factor]
        .iter()
        .map(|&other| previous.var_to_factor[other].as_slice())
        .collect();
    let mut message = graph.factors[e.factor].weighted_marginal(e.slot, &incoming);
    let mass: f64 = message.iter().sum();
    normalize_in_place(&mut message).ok_or((edge, mass))?;
    Ok(message)
}

/// Normalized product of all other incoming factor messages, or the one-hot
/// vector for an evidence variable.
fn variable_to_factor(
    graph: &FactorGraph,
    observed: &[Option<usize>],
    previous: &Messages,
    edge: usize,
) -> std::result::Result<Vec<f64>, Collapse> {
    let variable = graph.edges[edge].variable.index();
    let card = graph.cardinalities[variable];
    if let Some(outcome) = observed[variable] {
        return Ok(one_hot(card, outcome));
    }
    let mut message = vec![1.0; card];
    for &other in graph.variable_edges[variable].iter().filter(|&&other| other != edge) {
        multiply_into(&mut message, &previous.factor_to_var[other]);
    }
    let mass: f64 = message.iter().sum();
    normalize_in_place(&mut message).ok_or((edge, mass))?;
    Ok(message)
}

/// Computes one message per edge; with the `parallel` feature, concurrently.
fn sweep<F>(len: usize, compute: F) -> std::result::Result<Vec<Vec<f64>>, Collapse>
where
    F: Fn(usize) -> std::result::Result<Vec<f64>, Collapse> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        (0..len).into_par_iter().map(compute).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..len).map(compute).collect()
    }
}

fn describe_edge(network: &Network, graph: &FactorGraph, edge: usize) -> String {
    let e = graph.edges[edge];
    let name = |id: VariableId| network.variable(id).map_or("?", |v| v.name());
    format!(
        "factor of '{}' <-> '{}'",
        name(VariableId(e.factor as u32)),
        name(e.variable)
    )
}
