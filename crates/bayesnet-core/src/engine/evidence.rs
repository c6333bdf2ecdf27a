//! Hard evidence: observed outcomes clamped onto variables.
//!
//! An [`Evidence`] set maps each observed variable to exactly one outcome index.
//! Setting a variable again overwrites its earlier observation. Every mutator
//! reports whether the set actually changed, which is what the inference engine
//! uses to decide whether cached beliefs survive.

use std::collections::BTreeMap;

use crate::engine::errors::{InferenceError, Result};
use crate::engine::network::{Network, Outcome, VariableId};

/// Observed outcomes, ordered by variable id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evidence {
    observed: BTreeMap<VariableId, usize>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes `outcome` on `variable`, validated against `network`.
    ///
    /// On error the set is left unchanged. Returns whether the set changed.
    pub fn set(
        &mut self,
        network: &Network,
        variable: VariableId,
        outcome: impl Into<Outcome>,
    ) -> Result<bool> {
        let var = network.resolve_id(variable)?;
        let index = var.outcome_index(&outcome.into())?;
        Ok(self.observed.insert(variable, index) != Some(index))
    }

    /// Like [`set`](Self::set), addressing the variable by name.
    pub fn observe(
        &mut self,
        network: &Network,
        variable: &str,
        outcome: impl Into<Outcome>,
    ) -> Result<bool> {
        let id = network
            .variable_id(variable)
            .ok_or_else(|| InferenceError::UnknownVariable(variable.to_owned()))?;
        self.set(network, id, outcome)
    }

    /// Removes the observation on `variable`. Returns whether there was one.
    pub fn clear(&mut self, variable: VariableId) -> bool {
        self.observed.remove(&variable).is_some()
    }

    /// Removes every observation. Returns whether the set was non-empty.
    pub fn clear_all(&mut self) -> bool {
        let had_any = !self.observed.is_empty();
        self.observed.clear();
        had_any
    }

    pub fn get(&self, variable: VariableId) -> Option<usize> {
        self.observed.get(&variable).copied()
    }

    pub fn contains(&self, variable: VariableId) -> bool {
        self.observed.contains_key(&variable)
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, usize)> + '_ {
        self.observed.iter().map(|(&v, &o)| (v, o))
    }

    /// Dense per-variable view (`None` for unobserved), indexed by id.
    pub fn as_dense(&self, len: usize) -> Vec<Option<usize>> {
        let mut dense = vec![None; len];
        for (variable, outcome) in self.iter() {
            if let Some(slot) = dense.get_mut(variable.index()) {
                *slot = Some(outcome);
            }
        }
        dense
    }
}
