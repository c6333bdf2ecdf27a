use bayesnet_core::engine::elimination::VariableElimination;
use bayesnet_core::{
    AlgorithmConfig, EliminationConfig, EliminationOrder, Evidence, InferenceEngine, InferenceError,
};

use bayesnet_tests::{assert_close, chain, commute_tree, sprinkler};

fn exact_engine(network: std::sync::Arc<bayesnet_core::Network>) -> InferenceEngine {
    InferenceEngine::with_network(network, AlgorithmConfig::default()).unwrap()
}

#[test]
fn sprinkler_marginals_match_hand_computation() {
    let mut engine = exact_engine(sprinkler());
    assert_close(&engine.beliefs("wet").unwrap(), &[0.6471, 0.3529], 1e-9, "P(wet)");

    engine.set_evidence("wet", "t").unwrap();
    assert_close(
        &engine.beliefs("rain").unwrap(),
        &[0.4581 / 0.6471, 0.1890 / 0.6471],
        1e-9,
        "P(rain | wet)",
    );
}

#[test]
fn explaining_away() {
    let mut engine = exact_engine(sprinkler());
    engine.set_evidence("wet", "t").unwrap();
    let rain_given_wet = engine.beliefs("rain").unwrap()[0];
    engine.set_evidence("sprinkler", "t").unwrap();
    let rain_given_both = engine.beliefs("rain").unwrap()[0];
    assert!(rain_given_both < rain_given_wet);
}

#[test]
fn commute_tree_prior_and_posterior() {
    let mut engine = exact_engine(commute_tree());
    assert_close(
        &engine.beliefs("late").unwrap(),
        &[0.6355, 0.256, 0.1085],
        1e-9,
        "P(late)",
    );
    engine.set_evidence("umbrella", "yes").unwrap();
    assert_close(
        &engine.beliefs("weather").unwrap(),
        &[0.03 / 0.36, 0.27 / 0.36, 0.06 / 0.36],
        1e-9,
        "P(weather | umbrella)",
    );
}

#[test]
fn elimination_orders_agree() {
    let net = chain(10);
    let mut evidence = Evidence::new();
    evidence.observe(&net, "x9", "1").unwrap();
    evidence.observe(&net, "x4", "0").unwrap();
    let query = net.variable_id("x0").unwrap();

    let answers: Vec<_> = [
        EliminationOrder::MinFill,
        EliminationOrder::MinDegree,
        EliminationOrder::Topological,
    ]
    .into_iter()
    .map(|order| {
        VariableElimination::new(EliminationConfig {
            order,
            max_induced_width: None,
        })
        .unwrap()
        .query(&net, &evidence, query)
        .unwrap()
    })
    .collect();
    for (belief, p_evidence) in &answers[1..] {
        assert!(belief.approx_eq(&answers[0].0, 1e-12));
        assert!((p_evidence - answers[0].1).abs() < 1e-12);
    }
}

#[test]
fn width_guard_refuses_wide_orders() {
    let config = AlgorithmConfig::Exact(EliminationConfig {
        max_induced_width: Some(1),
        ..Default::default()
    });
    let mut engine = InferenceEngine::with_network(sprinkler(), config).unwrap();
    engine.set_evidence("wet", "t").unwrap();
    assert!(matches!(engine.beliefs("rain"), Err(InferenceError::Structure(_))));

    let mut tree = InferenceEngine::with_network(commute_tree(), config).unwrap();
    tree.set_evidence("late", "no").unwrap();
    assert!(tree.beliefs("weather").is_ok());
}
