//! The inference engine for discrete Bayesian networks.
//!
//! This module provides:
//! - **network**: Variables, domains, CPTs and the validated immutable DAG
//! - **evidence**: Hard observations clamped onto variables
//! - **factor**: Dense factor tables shared by the exact and loopy algorithms
//! - **elimination**: Exact variable elimination
//! - **belief_propagation**: Synchronous loopy sum-product message passing
//! - **sampling**: Seeded likelihood weighting
//! - **inference**: The solver contract and the query-facing engine

pub mod belief;
pub mod belief_propagation;
pub mod elimination;
pub mod errors;
pub mod evidence;
pub mod factor;
pub mod inference;
pub mod network;
pub mod numeric_kernels;
pub mod sampling;
