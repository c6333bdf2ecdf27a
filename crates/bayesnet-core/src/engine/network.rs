//! # Bayesian Network
//!
//! The directed graphical model the engines run on.
//!
//! ## Key Components
//!
//! - **Domain**: the finite, ordered outcome labels of one variable
//! - **Cpt**: the conditional probability table of one variable, one row per
//!   joint outcome of its parents
//! - **NetworkBuilder**: the only mutation path; collects variables, parent
//!   edges and CPT rows, then validates everything in [`NetworkBuilder::build`]
//! - **Network**: the frozen, arena-indexed result; `Send + Sync` and meant to be
//!   shared as `Arc<Network>` by any number of inference engines
//!
//! ## Row order
//!
//! CPT rows are laid out row-major over the parents' domains in declaration
//! order, with the last parent varying fastest. For parents `a ∈ {t, f}` and
//! `b ∈ {hi, lo}` the rows are `(t,hi) (t,lo) (f,hi) (f,lo)`.
//!
//! ## Example
//!
//! ```rust
//! use bayesnet_core::engine::network::NetworkBuilder;
//!
//! let mut builder = NetworkBuilder::new();
//! builder.add_variable("rain", ["yes", "no"]).unwrap();
//! builder.add_variable("wet", ["yes", "no"]).unwrap();
//! builder.add_parent("wet", "rain").unwrap();
//! builder.set_prior("rain", &[0.2, 0.8]).unwrap();
//! builder.set_cpt("wet", vec![vec![0.9, 0.1], vec![0.1, 0.9]]).unwrap();
//! let network = builder.build().unwrap();
//! assert_eq!(network.len(), 2);
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::errors::{InferenceError, Result};
use crate::engine::numeric_kernels::DISTRIBUTION_TOLERANCE;

/// Parent and child lists are short in practice; keep them inline.
pub type Adjacency = SmallVec<[VariableId; 4]>;

/// A unique identifier for a variable in a network.
///
/// Ids are dense arena indices assigned in insertion order, so they are stable
/// and give deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableId(pub u32);

impl VariableId {
    /// Position of the variable in the network's arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An outcome addressed either by position in the domain or by label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    Index(usize),
    Label(String),
}

impl From<usize> for Outcome {
    fn from(index: usize) -> Self {
        Outcome::Index(index)
    }
}

impl From<&str> for Outcome {
    fn from(label: &str) -> Self {
        Outcome::Label(label.to_owned())
    }
}

impl From<String> for Outcome {
    fn from(label: String) -> Self {
        Outcome::Label(label)
    }
}

impl From<&String> for Outcome {
    fn from(label: &String) -> Self {
        Outcome::Label(label.clone())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Index(i) => write!(f, "{}", i),
            Outcome::Label(l) => write!(f, "'{}'", l),
        }
    }
}

/// The ordered outcome labels of a categorical variable.
///
/// Always non-empty with unique labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    outcomes: Vec<Arc<str>>,
}

impl Domain {
    /// Creates a domain, rejecting empty label sets and duplicate labels.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcomes: Vec<Arc<str>> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            if outcomes.iter().any(|o| &**o == label) {
                return Err(InferenceError::Domain(format!(
                    "duplicate outcome label '{}'",
                    label
                )));
            }
            outcomes.push(Arc::from(label));
        }
        if outcomes.is_empty() {
            return Err(InferenceError::Domain(
                "a domain needs at least one outcome".into(),
            ));
        }
        Ok(Self { outcomes })
    }

    /// Number of outcomes.
    #[inline]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome(&self, index: usize) -> Option<&str> {
        self.outcomes.get(index).map(|o| &**o)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.outcomes.iter().position(|o| &**o == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.outcomes.iter().map(|o| &**o)
    }
}

/// Conditional probability table of one variable.
///
/// Stored flat: `row_count()` rows of `cardinality()` entries each.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpt {
    cardinality: usize,
    parent_cardinalities: SmallVec<[usize; 4]>,
    table: Vec<f64>,
}

impl Cpt {
    /// Number of outcomes of the owning variable (the row width).
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn parent_cardinalities(&self) -> &[usize] {
        &self.parent_cardinalities
    }

    /// Product of the parents' domain sizes (1 without parents).
    #[inline]
    pub fn row_count(&self) -> usize {
        self.table.len() / self.cardinality
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        let start = row.checked_mul(self.cardinality)?;
        let end = start.checked_add(self.cardinality)?;
        self.table.get(start..end)
    }

    /// Flat row-major table; equals the factor table over `parents ++ [self]`.
    pub fn as_slice(&self) -> &[f64] {
        &self.table
    }

    /// Row index of a joint parent assignment, or `None` if any index is out
    /// of range or the arity is wrong.
    pub fn row_index(&self, parent_outcomes: &[usize]) -> Option<usize> {
        if parent_outcomes.len() != self.parent_cardinalities.len() {
            return None;
        }
        let mut index = 0usize;
        for (&outcome, &card) in parent_outcomes.iter().zip(&self.parent_cardinalities) {
            if outcome >= card {
                return None;
            }
            index = index * card + outcome;
        }
        Some(index)
    }

    /// `P(outcome | parent_outcomes)`.
    pub fn probability(&self, outcome: usize, parent_outcomes: &[usize]) -> Option<f64> {
        if outcome >= self.cardinality {
            return None;
        }
        let row = self.row_index(parent_outcomes)?;
        self.table.get(row * self.cardinality + outcome).copied()
    }
}

/// A categorical random variable of a built network.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    name: Arc<str>,
    domain: Domain,
    parents: Adjacency,
    cpt: Cpt,
}

impl Variable {
    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Number of outcomes.
    pub fn cardinality(&self) -> usize {
        self.domain.len()
    }

    /// Parents in declaration order (the CPT's row-major order).
    pub fn parents(&self) -> &[VariableId] {
        &self.parents
    }

    pub fn cpt(&self) -> &Cpt {
        &self.cpt
    }

    /// CPT row selected by a full network assignment indexed by variable id.
    pub fn cpt_row_for(&self, assignment: &[usize]) -> Option<&[f64]> {
        let mut index = 0usize;
        for (&parent, &card) in self.parents.iter().zip(&self.cpt.parent_cardinalities) {
            let outcome = *assignment.get(parent.index())?;
            if outcome >= card {
                return None;
            }
            index = index * card + outcome;
        }
        self.cpt.row(index)
    }

    /// Resolves an outcome reference against this variable's domain.
    pub fn outcome_index(&self, outcome: &Outcome) -> Result<usize> {
        match outcome {
            Outcome::Index(i) if *i < self.domain.len() => Ok(*i),
            Outcome::Index(i) => Err(InferenceError::Domain(format!(
                "outcome index {} out of range for '{}' ({} outcomes)",
                i,
                self.name,
                self.domain.len()
            ))),
            Outcome::Label(label) => self.domain.index_of(label).ok_or_else(|| {
                InferenceError::Domain(format!("'{}' has no outcome '{}'", self.name, label))
            }),
        }
    }
}

/// Undirected moral graph: parents of each variable married, directions dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoralGraph {
    adjacency: Vec<BTreeSet<VariableId>>,
}

impl MoralGraph {
    pub fn neighbors(&self, id: VariableId) -> impl Iterator<Item = VariableId> + '_ {
        self.adjacency
            .get(id.index())
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn degree(&self, id: VariableId) -> usize {
        self.adjacency.get(id.index()).map_or(0, BTreeSet::len)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Whether the undirected graph contains a cycle (is not a forest).
    pub fn has_cycle(&self) -> bool {
        let mut components = UnionFind::new(self.adjacency.len());
        for (lhs, neighbors) in self.adjacency.iter().enumerate() {
            for rhs in neighbors.iter().map(|v| v.index()).filter(|&rhs| rhs > lhs) {
                if !components.union(lhs, rhs) {
                    return true;
                }
            }
        }
        false
    }

    pub(crate) fn into_sets(self) -> Vec<BTreeSet<VariableId>> {
        self.adjacency
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Returns false if `a` and `b` were already connected.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[ra] = rb;
        true
    }
}

/// A validated, immutable Bayesian network.
#[derive(Debug, Clone)]
pub struct Network {
    variables: Vec<Variable>,
    children: Vec<Adjacency>,
    by_name: FxHashMap<Arc<str>, VariableId>,
    topological: Vec<VariableId>,
}

impl Network {
    /// Starts a new builder.
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    pub fn variable_id(&self, name: &str) -> Option<VariableId> {
        self.by_name.get(name).copied()
    }

    /// Looks a variable up by name, failing with `UnknownVariable`.
    pub fn resolve(&self, name: &str) -> Result<&Variable> {
        self.variable_id(name)
            .and_then(|id| self.variable(id))
            .ok_or_else(|| InferenceError::UnknownVariable(name.to_owned()))
    }

    /// Looks a variable up by id, failing with `UnknownVariable`.
    pub fn resolve_id(&self, id: VariableId) -> Result<&Variable> {
        self.variable(id)
            .ok_or_else(|| InferenceError::UnknownVariable(id.to_string()))
    }

    pub fn parents(&self, id: VariableId) -> &[VariableId] {
        match self.variable(id) {
            Some(variable) => variable.parents(),
            None => &[],
        }
    }

    pub fn children(&self, id: VariableId) -> &[VariableId] {
        match self.children.get(id.index()) {
            Some(children) => children,
            None => &[],
        }
    }

    /// Parents always precede their children. Ties are broken by id.
    pub fn topological_order(&self) -> &[VariableId] {
        &self.topological
    }

    pub fn moral_graph(&self) -> MoralGraph {
        let mut adjacency = vec![BTreeSet::new(); self.variables.len()];
        for variable in &self.variables {
            let child = variable.id;
            for (offset, &parent) in variable.parents.iter().enumerate() {
                adjacency[child.index()].insert(parent);
                adjacency[parent.index()].insert(child);
                for &spouse in &variable.parents[offset + 1..] {
                    adjacency[parent.index()].insert(spouse);
                    adjacency[spouse.index()].insert(parent);
                }
            }
        }
        MoralGraph { adjacency }
    }

    /// Whether the moral graph has a cycle, i.e. exact elimination is not
    /// guaranteed to be cheap and loopy propagation is only approximate.
    pub fn moral_graph_has_cycle(&self) -> bool {
        self.moral_graph().has_cycle()
    }

    /// Parents, children and the children's other parents, sorted by id.
    pub fn markov_blanket(&self, id: VariableId) -> Vec<VariableId> {
        let mut blanket: BTreeSet<VariableId> = self.parents(id).iter().copied().collect();
        for &child in self.children(id) {
            blanket.insert(child);
            blanket.extend(self.parents(child).iter().copied());
        }
        blanket.remove(&id);
        blanket.into_iter().collect()
    }

    /// Induced width of eliminating every variable in `order` on the moral graph.
    ///
    /// `order` must be a permutation of all variables.
    pub fn induced_width(&self, order: &[VariableId]) -> Result<usize> {
        let mut seen = vec![false; self.variables.len()];
        for &id in order {
            match seen.get_mut(id.index()) {
                Some(flag) if !*flag => *flag = true,
                _ => {
                    return Err(InferenceError::Structure(format!(
                        "elimination order repeats or does not know variable {}",
                        id
                    )))
                }
            }
        }
        if order.len() != self.variables.len() {
            return Err(InferenceError::Structure(format!(
                "elimination order covers {} of {} variables",
                order.len(),
                self.variables.len()
            )));
        }
        let mut graph = self.moral_graph().into_sets();
        Ok(simulate_elimination(&mut graph, order))
    }
}

/// Eliminates `order` from an interaction graph in place, returning the
/// largest neighbourhood seen (the induced width).
pub(crate) fn simulate_elimination(
    graph: &mut [BTreeSet<VariableId>],
    order: &[VariableId],
) -> usize {
    let mut width = 0;
    for &id in order {
        let neighbors: Vec<VariableId> =
            std::mem::take(&mut graph[id.index()]).into_iter().collect();
        width = width.max(neighbors.len());
        for &n in &neighbors {
            graph[n.index()].remove(&id);
        }
        for (offset, &lhs) in neighbors.iter().enumerate() {
            for &rhs in &neighbors[offset + 1..] {
                graph[lhs.index()].insert(rhs);
                graph[rhs.index()].insert(lhs);
            }
        }
    }
    width
}

#[derive(Debug, Clone)]
struct PendingVariable {
    name: Arc<str>,
    domain: Domain,
    parents: Vec<Arc<str>>,
    table: Option<Vec<Vec<f64>>>,
    rows: Vec<(Vec<Outcome>, Vec<f64>)>,
}

/// Collects variables, parent edges and CPT rows; validates on [`build`](Self::build).
///
/// Parent edges may name variables that are added later; dangling names are
/// reported by `build`.
#[derive(Debug, Clone, Default)]
pub struct NetworkBuilder {
    variables: Vec<PendingVariable>,
    by_name: FxHashMap<Arc<str>, VariableId>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable with the given outcome labels.
    pub fn add_variable<I, S>(&mut self, name: &str, outcomes: I) -> Result<VariableId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.by_name.contains_key(name) {
            return Err(InferenceError::Structure(format!(
                "variable '{}' declared twice",
                name
            )));
        }
        let domain = Domain::new(outcomes).map_err(|err| match err {
            InferenceError::Domain(msg) => InferenceError::Domain(format!("'{}': {}", name, msg)),
            other => other,
        })?;
        let id = VariableId(u32::try_from(self.variables.len()).map_err(|_| {
            InferenceError::Structure("too many variables for a 32-bit id".into())
        })?);
        let name: Arc<str> = Arc::from(name);
        self.by_name.insert(name.clone(), id);
        self.variables.push(PendingVariable {
            name,
            domain,
            parents: Vec::new(),
            table: None,
            rows: Vec::new(),
        });
        Ok(id)
    }

    /// Declares `parent` as the next parent of `child`.
    ///
    /// Parent order defines the CPT row order.
    pub fn add_parent(&mut self, child: &str, parent: &str) -> Result<&mut Self> {
        if child == parent {
            return Err(InferenceError::Structure(format!(
                "variable '{}' cannot be its own parent",
                child
            )));
        }
        let pending = self.pending_mut(child)?;
        if pending.parents.iter().any(|p| &**p == parent) {
            return Err(InferenceError::Structure(format!(
                "'{}' is already a parent of '{}'",
                parent, child
            )));
        }
        pending.parents.push(Arc::from(parent));
        Ok(self)
    }

    /// Sets the full CPT in canonical row order, replacing any earlier table.
    pub fn set_cpt(&mut self, variable: &str, rows: Vec<Vec<f64>>) -> Result<&mut Self> {
        self.pending_mut(variable)?.table = Some(rows);
        Ok(self)
    }

    /// Sets the distribution of a parentless variable.
    pub fn set_prior(&mut self, variable: &str, row: &[f64]) -> Result<&mut Self> {
        self.set_cpt(variable, vec![row.to_vec()])
    }

    /// Sets the CPT row for one joint parent assignment (labels or indices, in
    /// parent order). Rows set this way override the full table.
    pub fn set_cpt_row<I, O>(
        &mut self,
        variable: &str,
        parent_outcomes: I,
        row: &[f64],
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        let key: Vec<Outcome> = parent_outcomes.into_iter().map(Into::into).collect();
        self.pending_mut(variable)?.rows.push((key, row.to_vec()));
        Ok(self)
    }

    fn pending_mut(&mut self, name: &str) -> Result<&mut PendingVariable> {
        let id = self.by_name.get(name).copied().ok_or_else(|| {
            InferenceError::Structure(format!("unknown variable '{}'", name))
        })?;
        Ok(&mut self.variables[id.index()])
    }

    /// Validates structure and distributions and freezes the network.
    pub fn build(self) -> Result<Network> {
        let parents = self.resolve_parents()?;
        let topological = topological_sort(&self.variables, &parents)?;

        let mut children = vec![Adjacency::new(); self.variables.len()];
        for (child, list) in parents.iter().enumerate() {
            for parent in list {
                children[parent.index()].push(VariableId(child as u32));
            }
        }

        let mut variables = Vec::with_capacity(self.variables.len());
        for (index, (pending, parent_ids)) in self.variables.iter().zip(parents).enumerate() {
            let parent_domains: Vec<&Domain> = parent_ids
                .iter()
                .map(|p| &self.variables[p.index()].domain)
                .collect();
            let parent_names: Vec<&str> = parent_ids
                .iter()
                .map(|p| &*self.variables[p.index()].name)
                .collect();
            let cpt = build_cpt(pending, &parent_domains, &parent_names)?;
            variables.push(Variable {
                id: VariableId(index as u32),
                name: pending.name.clone(),
                domain: pending.domain.clone(),
                parents: parent_ids,
                cpt,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            variables = variables.len(),
            edges = children.iter().map(|c| c.len()).sum::<usize>(),
            "built bayesian network"
        );

        Ok(Network {
            variables,
            children,
            by_name: self.by_name,
            topological,
        })
    }

    fn resolve_parents(&self) -> Result<Vec<Adjacency>> {
        self.variables
            .iter()
            .map(|pending| {
                pending
                    .parents
                    .iter()
                    .map(|parent| {
                        self.by_name.get(parent).copied().ok_or_else(|| {
                            InferenceError::Structure(format!(
                                "'{}' declares unknown parent '{}'",
                                pending.name, parent
                            ))
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

/// Kahn's algorithm with an id-ordered ready queue.
fn topological_sort(
    variables: &[PendingVariable],
    parents: &[Adjacency],
) -> Result<Vec<VariableId>> {
    let mut in_degree: Vec<usize> = parents.iter().map(|p| p.len()).collect();
    let mut children = vec![Vec::new(); variables.len()];
    for (child, list) in parents.iter().enumerate() {
        for parent in list {
            children[parent.index()].push(child);
        }
    }

    let mut ready: BTreeSet<usize> = (0..variables.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(variables.len());
    while let Some(next) = ready.pop_first() {
        order.push(VariableId(next as u32));
        for &child in &children[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() != variables.len() {
        let cyclic: Vec<&str> = (0..variables.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| &*variables[i].name)
            .collect();
        return Err(InferenceError::Structure(format!(
            "parent edges form a cycle through: {}",
            cyclic.join(", ")
        )));
    }
    Ok(order)
}

fn build_cpt(
    pending: &PendingVariable,
    parent_domains: &[&Domain],
    parent_names: &[&str],
) -> Result<Cpt> {
    let name = &pending.name;
    let cardinality = pending.domain.len();
    let parent_cardinalities: SmallVec<[usize; 4]> =
        parent_domains.iter().map(|d| d.len()).collect();
    let row_count = parent_cardinalities
        .iter()
        .try_fold(1usize, |acc, &c| acc.checked_mul(c))
        .ok_or_else(|| {
            InferenceError::Distribution(format!("CPT of '{}' has too many rows", name))
        })?;

    let mut rows: Vec<Option<Vec<f64>>> = match &pending.table {
        Some(table) if table.len() != row_count => {
            return Err(InferenceError::Distribution(format!(
                "CPT of '{}' has {} rows, expected {}",
                name,
                table.len(),
                row_count
            )))
        }
        Some(table) => table.iter().cloned().map(Some).collect(),
        None => vec![None; row_count],
    };

    for (key, row) in &pending.rows {
        if key.len() != parent_domains.len() {
            return Err(InferenceError::Distribution(format!(
                "CPT row of '{}' addresses {} parents, '{}' has {}",
                name,
                key.len(),
                name,
                parent_domains.len()
            )));
        }
        let mut index = 0usize;
        for ((outcome, domain), parent) in key.iter().zip(parent_domains).zip(parent_names) {
            let position = match outcome {
                Outcome::Index(i) if *i < domain.len() => *i,
                Outcome::Label(label) => domain.index_of(label).ok_or_else(|| {
                    InferenceError::Domain(format!("'{}' has no outcome '{}'", parent, label))
                })?,
                Outcome::Index(i) => {
                    return Err(InferenceError::Domain(format!(
                        "outcome index {} out of range for '{}' ({} outcomes)",
                        i,
                        parent,
                        domain.len()
                    )))
                }
            };
            index = index * domain.len() + position;
        }
        rows[index] = Some(row.clone());
    }

    let mut table = Vec::with_capacity(row_count * cardinality);
    for (index, row) in rows.into_iter().enumerate() {
        let label = || describe_row(index, parent_domains, parent_names);
        let row = row.ok_or_else(|| {
            InferenceError::Distribution(format!("CPT of '{}' is missing row {}", name, label()))
        })?;
        if row.len() != cardinality {
            return Err(InferenceError::Distribution(format!(
                "CPT row {} of '{}' has {} entries, expected {}",
                label(),
                name,
                row.len(),
                cardinality
            )));
        }
        if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(InferenceError::Distribution(format!(
                "CPT row {} of '{}' contains invalid probability {}",
                label(),
                name,
                bad
            )));
        }
        let sum: f64 = row.iter().sum();
        if (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
            return Err(InferenceError::Distribution(format!(
                "CPT row {} of '{}' sums to {}",
                label(),
                name,
                sum
            )));
        }
        table.extend_from_slice(&row);
    }

    Ok(Cpt {
        cardinality,
        parent_cardinalities,
        table,
    })
}

/// Human-readable parent assignment for row `index`, e.g. `(a=false, b=lu)`.
fn describe_row(mut index: usize, parent_domains: &[&Domain], parent_names: &[&str]) -> String {
    let mut parts: VecDeque<String> = VecDeque::with_capacity(parent_domains.len());
    for (domain, name) in parent_domains.iter().zip(parent_names).rev() {
        let outcome = index % domain.len();
        index /= domain.len();
        parts.push_front(format!("{}={}", name, domain.outcome(outcome).unwrap_or("?")));
    }
    format!("({})", parts.into_iter().collect::<Vec<_>>().join(", "))
}
