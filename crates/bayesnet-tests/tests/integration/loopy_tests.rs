use bayesnet_core::engine::belief_propagation::FactorGraph;
use bayesnet_core::{
    AlgorithmConfig, BeliefPropagationConfig, ConvergenceError, ConvergencePolicy, InferenceEngine,
    InferenceError, Network,
};
use std::sync::Arc;

use bayesnet_tests::{assert_distribution, chain, commute_tree, sprinkler};

fn loopy(config: BeliefPropagationConfig) -> AlgorithmConfig {
    AlgorithmConfig::Loopy(config)
}

fn agree_with_exact(network: Arc<Network>, evidence: &[(&str, &str)]) {
    assert!(!network.moral_graph_has_cycle());
    let mut exact =
        InferenceEngine::with_network(Arc::clone(&network), AlgorithmConfig::default()).unwrap();
    let mut approx =
        InferenceEngine::with_network(network, loopy(BeliefPropagationConfig::default())).unwrap();
    for (variable, outcome) in evidence {
        exact.set_evidence(variable, *outcome).unwrap();
        approx.set_evidence(variable, *outcome).unwrap();
    }
    let exact_beliefs = exact.all_beliefs().unwrap();
    let approx_beliefs = approx.all_beliefs().unwrap();
    for ((id, lhs), (_, rhs)) in exact_beliefs.iter().zip(&approx_beliefs) {
        assert!(
            lhs.approx_eq(rhs, 1e-6),
            "{}: exact {:?} vs loopy {:?}",
            id,
            lhs.probabilities(),
            rhs.probabilities()
        );
    }
    assert!(approx.diagnostics().unwrap().converged);
}

#[test]
fn loopy_is_exact_on_forests() {
    agree_with_exact(commute_tree(), &[]);
    agree_with_exact(commute_tree(), &[("late", "very"), ("umbrella", "no")]);
    agree_with_exact(chain(8), &[("x7", "1")]);
    agree_with_exact(chain(8), &[("x7", "1"), ("x3", "0")]);
}

#[test]
fn factor_graph_reports_forest_shape() {
    assert!(FactorGraph::from_network(&commute_tree()).is_forest());
    assert!(!FactorGraph::from_network(&sprinkler()).is_forest());
}

#[test]
fn loopy_graph_converges_to_a_reasonable_estimate() {
    let mut engine =
        InferenceEngine::with_network(sprinkler(), loopy(BeliefPropagationConfig::default()))
            .unwrap();
    engine.set_evidence("wet", "t").unwrap();
    let rain = engine.beliefs("rain").unwrap();
    assert_distribution(&rain, "loopy rain");
    assert!(rain[0] > 0.5);
    assert!(engine.diagnostics().unwrap().converged);
}

#[test]
fn damping_keeps_the_fixed_point() {
    let plain = BeliefPropagationConfig {
        convergence_tolerance: 1e-9,
        max_iterations: 1_000,
        ..Default::default()
    };
    let damped = BeliefPropagationConfig { damping: 0.6, ..plain };
    let mut lhs = InferenceEngine::with_network(sprinkler(), loopy(plain)).unwrap();
    let mut rhs = InferenceEngine::with_network(sprinkler(), loopy(damped)).unwrap();
    lhs.set_evidence("wet", "t").unwrap();
    rhs.set_evidence("wet", "t").unwrap();
    let a = lhs.beliefs("cloudy").unwrap();
    let b = rhs.beliefs("cloudy").unwrap();
    assert!(a.approx_eq(&b, 1e-6), "{:?} vs {:?}", a, b);
}

#[test]
fn strict_policy_surfaces_iteration_limit() {
    let config = BeliefPropagationConfig {
        max_iterations: 1,
        policy: ConvergencePolicy::Strict,
        ..Default::default()
    };
    let mut engine = InferenceEngine::with_network(chain(6), loopy(config)).unwrap();
    engine.set_evidence("x5", "0").unwrap();
    match engine.beliefs("x0") {
        Err(InferenceError::Convergence(ConvergenceError::IterationLimit { iterations, .. })) => {
            assert_eq!(iterations, 1)
        }
        other => panic!("expected iteration limit, got {:?}", other),
    }
    assert_eq!(engine.evidence().len(), 1);
}

#[test]
fn best_effort_policy_flags_non_convergence() {
    let config = BeliefPropagationConfig {
        max_iterations: 1,
        ..Default::default()
    };
    let mut engine = InferenceEngine::with_network(chain(6), loopy(config)).unwrap();
    engine.set_evidence("x5", "0").unwrap();
    assert_distribution(&engine.beliefs("x0").unwrap(), "capped run");
    let diagnostics = engine.diagnostics().unwrap();
    assert!(!diagnostics.converged);
    assert_eq!(diagnostics.iterations, 1);
    assert!(diagnostics.failure.is_none());
}

#[test]
fn mass_collapse_falls_back_instead_of_failing() {
    // Two deterministic copies of one coin observed with different faces.
    let mut b = Network::builder();
    for name in ["coin", "left", "right"] {
        b.add_variable(name, ["heads", "tails"]).unwrap();
    }
    b.add_parent("left", "coin").unwrap();
    b.add_parent("right", "coin").unwrap();
    b.set_prior("coin", &[0.5, 0.5]).unwrap();
    b.set_cpt("left", vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    b.set_cpt("right", vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let network = Arc::new(b.build().unwrap());

    let mut engine =
        InferenceEngine::with_network(network, loopy(BeliefPropagationConfig::default())).unwrap();
    engine.set_evidence("left", "heads").unwrap();
    engine.set_evidence("right", "tails").unwrap();
    assert_distribution(&engine.beliefs("coin").unwrap(), "collapsed run");
    let diagnostics = engine.diagnostics().unwrap();
    assert!(!diagnostics.converged);
    assert!(matches!(
        diagnostics.failure,
        Some(ConvergenceError::MassCollapse { .. })
    ));
}
