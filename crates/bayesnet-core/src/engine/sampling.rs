//! Likelihood weighting.
//!
//! Each sample walks the network in topological order. Unobserved variables
//! are drawn from their CPT row given the parents already sampled; observed
//! variables are clamped to their evidence and multiply the sample weight by
//! `P(observed | parents)`. Marginals are the weight-normalized outcome counts.
//!
//! The generator is ChaCha8 seeded from the configuration, so a run is fully
//! determined by `(network, evidence, seed, samples)`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::engine::belief::Belief;
use crate::engine::errors::{InferenceError, Result};
use crate::engine::evidence::Evidence;
use crate::engine::inference::{
    check_evidence, clamp_evidence, AlgorithmKind, CancellationToken, InferenceDiagnostics,
    MarginalSolver, Posterior,
};
use crate::engine::network::Network;
use crate::engine::numeric_kernels::normalize_in_place;

/// Samples drawn between cancellation checks.
const CANCELLATION_BATCH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SamplingConfig {
    pub samples: usize,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 10_000,
            seed: 0x5eed,
        }
    }
}

impl SamplingConfig {
    fn validate(self) -> Result<Self> {
        if self.samples == 0 {
            return Err(InferenceError::Validation(
                "likelihood_weighting: samples must be > 0".into(),
            ));
        }
        Ok(self)
    }
}

/// Result of a weighted sampling run before normalization.
#[derive(Debug, Clone)]
struct WeightedCounts {
    /// Per variable, accumulated weight per outcome.
    tallies: Vec<Vec<f64>>,
    total_weight: f64,
    total_squared_weight: f64,
    drawn: usize,
    cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct LikelihoodWeighting {
    config: SamplingConfig,
}

impl LikelihoodWeighting {
    pub fn new(config: SamplingConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> SamplingConfig {
        self.config
    }

    fn draw(
        &self,
        network: &Network,
        evidence: &Evidence,
        cancel: &CancellationToken,
    ) -> Result<WeightedCounts> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let observed = evidence.as_dense(network.len());
        let mut counts = WeightedCounts {
            tallies: network.variables().iter().map(|v| vec![0.0; v.cardinality()]).collect(),
            total_weight: 0.0,
            total_squared_weight: 0.0,
            drawn: 0,
            cancelled: false,
        };
        let mut assignment = vec![0usize; network.len()];

        while counts.drawn < self.config.samples {
            if cancel.is_cancelled() {
                counts.cancelled = true;
                break;
            }
            let batch = CANCELLATION_BATCH.min(self.config.samples - counts.drawn);
            for _ in 0..batch {
                let mut weight = 1.0;
                for &id in network.topological_order() {
                    let variable = network.resolve_id(id)?;
                    let row = variable.cpt_row_for(&assignment).ok_or_else(|| {
                        InferenceError::Distribution(format!(
                            "no CPT row for '{}'",
                            variable.name()
                        ))
                    })?;
                    assignment[id.index()] = match observed[id.index()] {
                        Some(outcome) => {
                            weight *= row[outcome];
                            outcome
                        }
                        None => sample_row(row, rng.gen_range(0.0..1.0)),
                    };
                    if weight == 0.0 {
                        break;
                    }
                }
                counts.drawn += 1;
                if weight == 0.0 {
                    continue;
                }
                counts.total_weight += weight;
                counts.total_squared_weight += weight * weight;
                for (tally, &outcome) in counts.tallies.iter_mut().zip(&assignment) {
                    tally[outcome] += weight;
                }
            }
        }
        Ok(counts)
    }
}

/// Inverse-CDF draw from a normalized row given `u` in [0, 1).
fn sample_row(row: &[f64], u: f64) -> usize {
    let mut cumulative = 0.0;
    for (outcome, &p) in row.iter().enumerate() {
        cumulative += p;
        if u < cumulative {
            return outcome;
        }
    }
    // Rounding can leave the cumulative sum a hair below 1.
    row.iter().rposition(|&p| p > 0.0).unwrap_or(0)
}

impl MarginalSolver for LikelihoodWeighting {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Sampling
    }

    fn solve(
        &self,
        network: &Network,
        evidence: &Evidence,
        cancel: &CancellationToken,
    ) -> Result<Posterior> {
        check_evidence(network, evidence)?;
        let counts = self.draw(network, evidence, cancel)?;
        if counts.drawn > 0 && counts.total_weight <= 0.0 {
            return Err(InferenceError::Distribution(format!(
                "evidence has zero weight in all {} samples",
                counts.drawn
            )));
        }

        let clamped = clamp_evidence(network, evidence);
        let beliefs = network
            .variables()
            .iter()
            .zip(clamped)
            .zip(counts.tallies)
            .map(|((variable, clamp), mut tally)| {
                if let Some(belief) = clamp {
                    return belief;
                }
                match normalize_in_place(&mut tally) {
                    Some(_) => Belief::from_normalized(tally),
                    None => Belief::uniform(variable.cardinality()),
                }
            })
            .collect();

        let mut diagnostics = InferenceDiagnostics::new(AlgorithmKind::Sampling);
        diagnostics.iterations = counts.drawn;
        diagnostics.cancelled = counts.cancelled;
        diagnostics.converged = !counts.cancelled;
        if counts.drawn > 0 {
            diagnostics.evidence_probability = Some(counts.total_weight / counts.drawn as f64);
            diagnostics.effective_sample_size =
                Some(counts.total_weight * counts.total_weight / counts.total_squared_weight);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            samples = counts.drawn,
            ess = ?diagnostics.effective_sample_size,
            cancelled = counts.cancelled,
            "likelihood weighting finished"
        );

        Ok(Posterior { beliefs, diagnostics })
    }
}
