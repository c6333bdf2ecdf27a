//! Exact inference by variable elimination.
//!
//! For each unobserved query variable the solver:
//! 1. keeps only the CPT factors of the query's and the evidence's ancestors
//!    (everything else is barren and sums to one),
//! 2. reduces those factors to the observed outcomes,
//! 3. sums out the remaining hidden variables in the configured order,
//! 4. multiplies what is left and normalizes onto the query.
//!
//! The unnormalized mass of step 4 is `P(evidence)`, reported in the
//! diagnostics. Cost is exponential in the induced width of the order, so the
//! optional `max_induced_width` guard refuses work up front.

use std::collections::BTreeSet;

use crate::engine::belief::Belief;
use crate::engine::errors::{InferenceError, Result};
use crate::engine::evidence::Evidence;
use crate::engine::factor::Factor;
use crate::engine::inference::{
    check_evidence, clamp_evidence, AlgorithmKind, CancellationToken, InferenceDiagnostics,
    MarginalSolver, Posterior,
};
use crate::engine::network::{simulate_elimination, Network, VariableId};
use crate::engine::numeric_kernels::{normalize_in_place, MESSAGE_MASS_FLOOR};

/// Heuristic for choosing the order hidden variables are summed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EliminationOrder {
    /// Greedily eliminate the variable adding the fewest fill-in edges.
    #[default]
    MinFill,
    /// Greedily eliminate the variable with the fewest neighbours.
    MinDegree,
    /// Network topological order.
    Topological,
}

/// Configuration for variable elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EliminationConfig {
    pub order: EliminationOrder,
    /// Refuse queries whose elimination order exceeds this induced width.
    pub max_induced_width: Option<usize>,
}

impl EliminationConfig {
    fn validate(self) -> Result<Self> {
        if self.max_induced_width == Some(0) {
            return Err(InferenceError::Validation(
                "variable_elimination: max_induced_width must be > 0".into(),
            ));
        }
        Ok(self)
    }
}

/// Exact marginals by variable elimination.
#[derive(Debug, Clone)]
pub struct VariableElimination {
    config: EliminationConfig,
}

impl VariableElimination {
    pub fn new(config: EliminationConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> EliminationConfig {
        self.config
    }

    /// Exact marginal of a single unobserved variable together with `P(evidence)`.
    pub fn query(
        &self,
        network: &Network,
        evidence: &Evidence,
        query: VariableId,
    ) -> Result<(Belief, f64)> {
        check_evidence(network, evidence)?;
        let variable = network.resolve_id(query)?;
        if let Some(outcome) = evidence.get(query) {
            let probability = self.evidence_probability(network, evidence)?;
            return Ok((Belief::one_hot(variable.cardinality(), outcome), probability));
        }

        let relevant = relevant_variables(network, evidence, Some(query));
        let factors = reduced_factors(network, evidence, &relevant)?;
        let hidden: Vec<VariableId> = relevant
            .iter()
            .copied()
            .filter(|v| *v != query && !evidence.contains(*v))
            .collect();
        let result = self.eliminate(network, factors, &hidden)?.project(&[query]);

        let mut values = result.values().to_vec();
        let mass = normalize_in_place(&mut values).ok_or_else(zero_evidence)?;
        Ok((Belief::from_normalized(values), mass))
    }

    /// `P(evidence)`; one for empty evidence.
    pub fn evidence_probability(&self, network: &Network, evidence: &Evidence) -> Result<f64> {
        check_evidence(network, evidence)?;
        let relevant = relevant_variables(network, evidence, None);
        let factors = reduced_factors(network, evidence, &relevant)?;
        let hidden: Vec<VariableId> = relevant
            .iter()
            .copied()
            .filter(|v| !evidence.contains(*v))
            .collect();
        let mass = self.eliminate(network, factors, &hidden)?.total();
        if mass <= MESSAGE_MASS_FLOOR {
            return Err(zero_evidence());
        }
        Ok(mass)
    }

    /// Sums `hidden` out of the product of `factors`.
    fn eliminate(
        &self,
        network: &Network,
        mut factors: Vec<Factor>,
        hidden: &[VariableId],
    ) -> Result<Factor> {
        let order = self.order(network, &factors, hidden);
        if let Some(limit) = self.config.max_induced_width {
            let width = simulate_elimination(&mut interaction_graph(network, &factors), &order);
            if width > limit {
                return Err(InferenceError::Structure(format!(
                    "elimination order has induced width {}, limit is {}",
                    width, limit
                )));
            }
        }

        for variable in order {
            let (touching, rest): (Vec<Factor>, Vec<Factor>) =
                factors.into_iter().partition(|f| f.contains(variable));
            factors = rest;
            if touching.is_empty() {
                continue;
            }
            let combined = touching
                .iter()
                .skip(1)
                .fold(touching[0].clone(), |acc, f| acc.product(f));
            factors.push(combined.sum_out(variable));
        }

        Ok(factors.iter().fold(Factor::unit(), |acc, f| acc.product(f)))
    }

    fn order(
        &self,
        network: &Network,
        factors: &[Factor],
        hidden: &[VariableId],
    ) -> Vec<VariableId> {
        match self.config.order {
            EliminationOrder::Topological => {
                let hidden: BTreeSet<VariableId> = hidden.iter().copied().collect();
                network
                    .topological_order()
                    .iter()
                    .copied()
                    .filter(|v| hidden.contains(v))
                    .collect()
            }
            EliminationOrder::MinFill => {
                greedy_order(interaction_graph(network, factors), hidden, fill_in)
            }
            EliminationOrder::MinDegree => {
                greedy_order(interaction_graph(network, factors), hidden, |graph, v| {
                    graph[v.index()].len()
                })
            }
        }
    }
}

impl MarginalSolver for VariableElimination {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Exact
    }

    fn solve(
        &self,
        network: &Network,
        evidence: &Evidence,
        cancel: &CancellationToken,
    ) -> Result<Posterior> {
        check_evidence(network, evidence)?;
        let mut diagnostics = InferenceDiagnostics::new(AlgorithmKind::Exact);
        let mut beliefs = clamp_evidence(network, evidence);
        let mut evidence_probability = None;

        for variable in network.variables() {
            if beliefs[variable.id().index()].is_some() {
                continue;
            }
            if cancel.is_cancelled() {
                diagnostics.cancelled = true;
                diagnostics.converged = false;
                break;
            }
            let (belief, mass) = self.query(network, evidence, variable.id())?;
            evidence_probability.get_or_insert(mass);
            beliefs[variable.id().index()] = Some(belief);
        }

        if evidence_probability.is_none() && !diagnostics.cancelled {
            evidence_probability = Some(self.evidence_probability(network, evidence)?);
        }
        diagnostics.evidence_probability = evidence_probability;

        let beliefs = network
            .variables()
            .iter()
            .zip(beliefs)
            .map(|(v, b)| b.unwrap_or_else(|| Belief::uniform(v.cardinality())))
            .collect();
        Ok(Posterior { beliefs, diagnostics })
    }
}

fn zero_evidence() -> InferenceError {
    InferenceError::Distribution("evidence has zero probability under the model".into())
}

/// Ancestral closure of the query and the evidence, sorted by id.
fn relevant_variables(
    network: &Network,
    evidence: &Evidence,
    query: Option<VariableId>,
) -> Vec<VariableId> {
    let mut seen = vec![false; network.len()];
    let mut stack: Vec<VariableId> = evidence.iter().map(|(v, _)| v).chain(query).collect();
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut seen[id.index()], true) {
            continue;
        }
        stack.extend(network.parents(id).iter().copied());
    }
    (0..network.len())
        .filter(|&i| seen[i])
        .map(|i| VariableId(i as u32))
        .collect()
}

fn reduced_factors(
    network: &Network,
    evidence: &Evidence,
    relevant: &[VariableId],
) -> Result<Vec<Factor>> {
    relevant
        .iter()
        .filter_map(|&id| network.variable(id))
        .map(|variable| {
            let own = variable.id();
            let mut factor = Factor::from_cpt(variable);
            for &member in variable.parents().iter().chain(std::iter::once(&own)) {
                if let Some(outcome) = evidence.get(member) {
                    factor = factor.reduce(member, outcome)?;
                }
            }
            Ok(factor)
        })
        .collect()
}

/// Undirected graph connecting variables that share a factor.
fn interaction_graph(network: &Network, factors: &[Factor]) -> Vec<BTreeSet<VariableId>> {
    let mut graph = vec![BTreeSet::new(); network.len()];
    for factor in factors {
        let scope = factor.scope();
        for (offset, &lhs) in scope.iter().enumerate() {
            for &rhs in &scope[offset + 1..] {
                graph[lhs.index()].insert(rhs);
                graph[rhs.index()].insert(lhs);
            }
        }
    }
    graph
}

/// Number of edges eliminating `v` would add between its neighbours.
fn fill_in(graph: &[BTreeSet<VariableId>], v: VariableId) -> usize {
    let neighbors: Vec<VariableId> = graph[v.index()].iter().copied().collect();
    let mut missing = 0;
    for (offset, &lhs) in neighbors.iter().enumerate() {
        for rhs in &neighbors[offset + 1..] {
            if !graph[lhs.index()].contains(rhs) {
                missing += 1;
            }
        }
    }
    missing
}

/// Repeatedly eliminates the cheapest remaining variable; ties go to the
/// lowest id so orders are deterministic.
fn greedy_order(
    mut graph: Vec<BTreeSet<VariableId>>,
    hidden: &[VariableId],
    cost: impl Fn(&[BTreeSet<VariableId>], VariableId) -> usize,
) -> Vec<VariableId> {
    let mut remaining: BTreeSet<VariableId> = hidden.iter().copied().collect();
    let mut order = Vec::with_capacity(remaining.len());
    while let Some(next) = remaining.iter().copied().min_by_key(|&v| (cost(&graph[..], v), v)) {
        remaining.remove(&next);
        simulate_elimination(&mut graph, &[next]);
        order.push(next);
    }
    order
}
