//! Discrete factors (potential tables) and the operations elimination and
//! message passing need: product, evidence reduction, summing out, and the
//! message-weighted marginal used for factor-to-variable messages.
//!
//! Tables are row-major over the scope with the last variable varying fastest,
//! which makes a CPT table directly usable as the factor over
//! `parents ++ [child]`.

use smallvec::{smallvec, SmallVec};

use crate::engine::errors::{InferenceError, Result};
use crate::engine::network::{Variable, VariableId};

type Dims = SmallVec<[usize; 6]>;

/// A non-negative table over the joint outcomes of `scope`.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    scope: SmallVec<[VariableId; 6]>,
    cardinalities: Dims,
    values: Vec<f64>,
}

impl Factor {
    /// Creates a factor, checking that `values` matches the scope's size.
    pub fn new(scope: &[VariableId], cardinalities: &[usize], values: Vec<f64>) -> Result<Self> {
        if scope.len() != cardinalities.len() {
            return Err(InferenceError::Structure(format!(
                "factor scope has {} variables but {} cardinalities",
                scope.len(),
                cardinalities.len()
            )));
        }
        for (offset, v) in scope.iter().enumerate() {
            if scope[offset + 1..].contains(v) {
                return Err(InferenceError::Structure(format!(
                    "factor scope repeats variable {}",
                    v
                )));
            }
        }
        let expected: usize = cardinalities.iter().product();
        if values.len() != expected {
            return Err(InferenceError::Distribution(format!(
                "factor table has {} entries, scope needs {}",
                values.len(),
                expected
            )));
        }
        Ok(Self {
            scope: scope.iter().copied().collect(),
            cardinalities: cardinalities.iter().copied().collect(),
            values,
        })
    }

    /// The factor `P(child | parents)` over `parents ++ [child]`.
    pub fn from_cpt(variable: &Variable) -> Self {
        let mut scope: SmallVec<[VariableId; 6]> = variable.parents().iter().copied().collect();
        scope.push(variable.id());
        let mut cardinalities: Dims =
            variable.cpt().parent_cardinalities().iter().copied().collect();
        cardinalities.push(variable.cardinality());
        Self {
            scope,
            cardinalities,
            values: variable.cpt().as_slice().to_vec(),
        }
    }

    /// The empty-scope factor with value one.
    pub fn unit() -> Self {
        Self {
            scope: SmallVec::new(),
            cardinalities: SmallVec::new(),
            values: vec![1.0],
        }
    }

    pub fn scope(&self) -> &[VariableId] {
        &self.scope
    }

    pub fn cardinalities(&self) -> &[usize] {
        &self.cardinalities
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn contains(&self, variable: VariableId) -> bool {
        self.scope.contains(&variable)
    }

    pub fn position(&self, variable: VariableId) -> Option<usize> {
        self.scope.iter().position(|v| *v == variable)
    }

    /// Sum of all entries.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    fn strides(&self) -> Dims {
        let mut strides: Dims = smallvec![0; self.scope.len()];
        let mut acc = 1;
        for k in (0..self.scope.len()).rev() {
            strides[k] = acc;
            acc *= self.cardinalities[k];
        }
        strides
    }

    /// Strides of `self` laid over another scope; zero where `self` does not
    /// mention the variable.
    fn strides_over(&self, scope: &[VariableId]) -> Dims {
        let own = self.strides();
        scope
            .iter()
            .map(|v| self.position(*v).map_or(0, |p| own[p]))
            .collect()
    }

    /// Pointwise product over the union of both scopes.
    pub fn product(&self, other: &Factor) -> Factor {
        let mut scope = self.scope.clone();
        let mut cardinalities = self.cardinalities.clone();
        for (v, c) in other.scope.iter().zip(&other.cardinalities) {
            if !scope.contains(v) {
                scope.push(*v);
                cardinalities.push(*c);
            }
        }
        let lhs = self.strides_over(&scope);
        let rhs = other.strides_over(&scope);
        let len: usize = cardinalities.iter().product();
        let mut values = Vec::with_capacity(len);
        let mut odometer = Odometer::new(&cardinalities);
        let (mut i, mut j) = (0usize, 0usize);
        for _ in 0..len {
            values.push(self.values[i] * other.values[j]);
            odometer.advance(|k, wrapped| {
                if wrapped {
                    i -= lhs[k] * (cardinalities[k] - 1);
                    j -= rhs[k] * (cardinalities[k] - 1);
                } else {
                    i += lhs[k];
                    j += rhs[k];
                }
            });
        }
        Factor {
            scope,
            cardinalities,
            values,
        }
    }

    /// Sums out every variable not in `keep`; the result's scope is `keep`
    /// restricted to variables `self` mentions, in `keep` order.
    pub fn project(&self, keep: &[VariableId]) -> Factor {
        let scope: SmallVec<[VariableId; 6]> =
            keep.iter().copied().filter(|v| self.contains(*v)).collect();
        let cardinalities: Dims = scope
            .iter()
            .filter_map(|v| self.position(*v).map(|p| self.cardinalities[p]))
            .collect();
        let target = Factor {
            scope,
            cardinalities,
            values: Vec::new(),
        };
        let out_strides = target.strides_over(&self.scope);
        let mut values = vec![0.0; target.cardinalities.iter().product()];
        let mut odometer = Odometer::new(&self.cardinalities);
        let mut out = 0usize;
        for &value in &self.values {
            values[out] += value;
            odometer.advance(|k, wrapped| {
                if wrapped {
                    out -= out_strides[k] * (self.cardinalities[k] - 1);
                } else {
                    out += out_strides[k];
                }
            });
        }
        Factor { values, ..target }
    }

    /// Sums `variable` out of the factor.
    pub fn sum_out(&self, variable: VariableId) -> Factor {
        let keep: SmallVec<[VariableId; 6]> =
            self.scope.iter().copied().filter(|v| *v != variable).collect();
        self.project(&keep)
    }

    /// Clamps `variable` to `outcome`, dropping it from the scope.
    ///
    /// Fails with `Domain` if `outcome` is out of range for `variable`.
    pub fn reduce(&self, variable: VariableId, outcome: usize) -> Result<Factor> {
        let Some(p) = self.position(variable) else {
            return Ok(self.clone());
        };
        if outcome >= self.cardinalities[p] {
            return Err(InferenceError::Domain(format!(
                "outcome index {} out of range for {} ({} outcomes)",
                outcome, variable, self.cardinalities[p]
            )));
        }
        let mut scope = self.scope.clone();
        let mut cardinalities = self.cardinalities.clone();
        scope.remove(p);
        cardinalities.remove(p);
        let mut values = Vec::with_capacity(cardinalities.iter().product());
        let mut odometer = Odometer::new(&self.cardinalities);
        for &value in &self.values {
            if odometer.digits[p] == outcome {
                values.push(value);
            }
            odometer.advance(|_, _| {});
        }
        Ok(Factor {
            scope,
            cardinalities,
            values,
        })
    }

    /// Unnormalized marginal over the variable at scope position `target` of
    /// this table multiplied by one incoming vector per other position.
    ///
    /// `incoming[target]` is ignored. This is the sum-product
    /// factor-to-variable update.
    pub(crate) fn weighted_marginal(&self, target: usize, incoming: &[&[f64]]) -> Vec<f64> {
        debug_assert_eq!(incoming.len(), self.scope.len());
        let mut out = vec![0.0; self.cardinalities[target]];
        let mut odometer = Odometer::new(&self.cardinalities);
        for &value in &self.values {
            if value != 0.0 {
                let mut weight = value;
                for (k, &digit) in odometer.digits.iter().enumerate() {
                    if k != target {
                        weight *= incoming[k][digit];
                    }
                }
                out[odometer.digits[target]] += weight;
            }
            odometer.advance(|_, _| {});
        }
        out
    }
}

/// Mixed-radix counter over a factor's scope, last digit fastest.
struct Odometer {
    digits: Dims,
    radices: Dims,
}

impl Odometer {
    fn new(radices: &[usize]) -> Self {
        Self {
            digits: smallvec![0; radices.len()],
            radices: radices.iter().copied().collect(),
        }
    }

    /// Steps to the next assignment, calling `on_digit(k, wrapped)` for each
    /// digit it touches: `wrapped` digits went from max back to zero.
    #[inline]
    fn advance(&mut self, mut on_digit: impl FnMut(usize, bool)) {
        for k in (0..self.digits.len()).rev() {
            if self.digits[k] + 1 < self.radices[k] {
                self.digits[k] += 1;
                on_digit(k, false);
                return;
            }
            if self.digits[k] > 0 {
                on_digit(k, true);
            }
            self.digits[k] = 0;
        }
    }
}
