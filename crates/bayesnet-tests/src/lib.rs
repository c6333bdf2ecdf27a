//! Shared networks and assertions for the bayesnet integration suites.

use std::sync::Arc;

use bayesnet_core::{Belief, Network, NetworkBuilder};

/// `a` and `b` are parents of `c`; `c = x` with 0.7 when `a = false, b = lu`.
pub fn two_parent_scenario() -> Arc<Network> {
    let mut b = NetworkBuilder::new();
    b.add_variable("a", ["true", "false"]).unwrap();
    b.add_variable("b", ["hi", "lu"]).unwrap();
    b.add_variable("c", ["x", "y"]).unwrap();
    b.add_parent("c", "a").unwrap();
    b.add_parent("c", "b").unwrap();
    b.set_prior("a", &[0.4, 0.6]).unwrap();
    b.set_prior("b", &[0.5, 0.5]).unwrap();
    b.set_cpt_row("c", ["true", "hi"], &[0.9, 0.1]).unwrap();
    b.set_cpt_row("c", ["true", "lu"], &[0.6, 0.4]).unwrap();
    b.set_cpt_row("c", ["false", "hi"], &[0.2, 0.8]).unwrap();
    b.set_cpt_row("c", ["false", "lu"], &[0.7, 0.3]).unwrap();
    Arc::new(b.build().unwrap())
}

/// Classic cloudy/sprinkler/rain/wet-grass network. Its moral graph has a cycle.
pub fn sprinkler() -> Arc<Network> {
    let mut b = NetworkBuilder::new();
    for name in ["cloudy", "sprinkler", "rain", "wet"] {
        b.add_variable(name, ["t", "f"]).unwrap();
    }
    b.add_parent("sprinkler", "cloudy").unwrap();
    b.add_parent("rain", "cloudy").unwrap();
    b.add_parent("wet", "sprinkler").unwrap();
    b.add_parent("wet", "rain").unwrap();
    b.set_prior("cloudy", &[0.5, 0.5]).unwrap();
    b.set_cpt("sprinkler", vec![vec![0.1, 0.9], vec![0.5, 0.5]]).unwrap();
    b.set_cpt("rain", vec![vec![0.8, 0.2], vec![0.2, 0.8]]).unwrap();
    b.set_cpt(
        "wet",
        vec![vec![0.99, 0.01], vec![0.9, 0.1], vec![0.9, 0.1], vec![0.0, 1.0]],
    )
    .unwrap();
    Arc::new(b.build().unwrap())
}

/// Single-parent tree with mixed domain sizes, so its moral graph is a forest.
///
/// ```text
/// weather -> traffic -> late
///        \-> umbrella
/// ```
pub fn commute_tree() -> Arc<Network> {
    let mut b = NetworkBuilder::new();
    b.add_variable("weather", ["sun", "rain", "snow"]).unwrap();
    b.add_variable("traffic", ["light", "heavy"]).unwrap();
    b.add_variable("umbrella", ["yes", "no"]).unwrap();
    b.add_variable("late", ["no", "slightly", "very"]).unwrap();
    b.add_parent("traffic", "weather").unwrap();
    b.add_parent("umbrella", "weather").unwrap();
    b.add_parent("late", "traffic").unwrap();
    b.set_prior("weather", &[0.6, 0.3, 0.1]).unwrap();
    b.set_cpt("traffic", vec![vec![0.8, 0.2], vec![0.4, 0.6], vec![0.1, 0.9]])
        .unwrap();
    b.set_cpt("umbrella", vec![vec![0.05, 0.95], vec![0.9, 0.1], vec![0.6, 0.4]])
        .unwrap();
    b.set_cpt("late", vec![vec![0.85, 0.1, 0.05], vec![0.3, 0.5, 0.2]])
        .unwrap();
    Arc::new(b.build().unwrap())
}

/// Binary chain `x0 -> x1 -> ... -> x{len-1}` with alternating CPTs.
pub fn chain(len: usize) -> Arc<Network> {
    let mut b = NetworkBuilder::new();
    for i in 0..len {
        b.add_variable(&format!("x{}", i), ["0", "1"]).unwrap();
    }
    b.set_prior("x0", &[0.35, 0.65]).unwrap();
    for i in 1..len {
        let (child, parent) = (format!("x{}", i), format!("x{}", i - 1));
        b.add_parent(&child, &parent).unwrap();
        let rows = if i % 2 == 0 {
            vec![vec![0.9, 0.1], vec![0.25, 0.75]]
        } else {
            vec![vec![0.3, 0.7], vec![0.8, 0.2]]
        };
        b.set_cpt(&child, rows).unwrap();
    }
    Arc::new(b.build().unwrap())
}

pub fn assert_distribution(belief: &Belief, context: &str) {
    assert!(
        (belief.sum() - 1.0).abs() <= 1e-9,
        "{}: belief {:?} sums to {}",
        context,
        belief.probabilities(),
        belief.sum()
    );
    assert!(
        belief.probabilities().iter().all(|p| (0.0..=1.0 + 1e-12).contains(p)),
        "{}: belief {:?} has entries outside [0, 1]",
        context,
        belief.probabilities()
    );
}

pub fn assert_close(actual: &Belief, expected: &[f64], tol: f64, context: &str) {
    assert!(
        actual.approx_eq_slice(expected, tol),
        "{}: expected {:?}, got {:?}",
        context,
        expected,
        actual.probabilities()
    );
}
