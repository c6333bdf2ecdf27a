use std::sync::Arc;
use std::thread;

use bayesnet_core::{
    AlgorithmConfig, AlgorithmKind, BeliefPropagationConfig, CancellationToken, EliminationConfig,
    Evidence, InferenceEngine, InferenceError, NetworkBuilder, SamplingConfig,
};

use bayesnet_tests::{
    assert_close, assert_distribution, commute_tree, sprinkler, two_parent_scenario,
};

fn all_variants() -> Vec<AlgorithmConfig> {
    vec![
        AlgorithmConfig::Exact(EliminationConfig::default()),
        AlgorithmConfig::Loopy(BeliefPropagationConfig::default()),
        AlgorithmConfig::Sampling(SamplingConfig {
            samples: 40_000,
            seed: 17,
        }),
    ]
}

#[test]
fn two_parent_scenario_every_variant() {
    for config in all_variants() {
        let kind = config.kind();
        let mut engine = InferenceEngine::with_network(two_parent_scenario(), config).unwrap();
        engine.set_evidence("a", "false").unwrap();
        engine.set_evidence("b", "lu").unwrap();
        let c = engine.beliefs("c").unwrap();
        assert_eq!(c.len(), 2);
        assert_close(&c, &[0.7, 0.3], 0.01, &kind.to_string());
        assert_eq!(engine.beliefs("a").unwrap().probabilities(), &[0.0, 1.0]);
        assert_eq!(engine.algorithm(), kind);
    }
}

#[test]
fn evidence_by_index_matches_evidence_by_label() {
    let mut by_label =
        InferenceEngine::with_network(two_parent_scenario(), AlgorithmConfig::default()).unwrap();
    let mut by_index =
        InferenceEngine::with_network(two_parent_scenario(), AlgorithmConfig::default()).unwrap();
    by_label.set_evidence("c", "x").unwrap();
    by_index.set_evidence("c", 0usize).unwrap();
    let a = by_label.beliefs("a").unwrap();
    assert_eq!(a, by_index.beliefs("a").unwrap());
    assert_close(&a, &[0.30 / 0.57, 0.27 / 0.57], 1e-9, "diagnostic query");
}

#[test]
fn requery_is_idempotent_for_every_variant() {
    for config in all_variants() {
        let mut engine = InferenceEngine::with_network(sprinkler(), config).unwrap();
        engine.set_evidence("wet", "t").unwrap();
        let first = engine.beliefs("rain").unwrap();
        let second = engine.beliefs("rain").unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.all_beliefs().unwrap()[2].1, first);
    }
}

#[test]
fn clearing_then_resetting_reproduces_beliefs() {
    for config in all_variants() {
        let mut engine = InferenceEngine::with_network(commute_tree(), config).unwrap();
        engine.set_evidence("late", "very").unwrap();
        let before = engine.beliefs("weather").unwrap();

        engine.clear_evidence("late").unwrap();
        let prior = engine.beliefs("weather").unwrap();
        assert_ne!(before, prior);

        engine.set_evidence("late", "very").unwrap();
        assert_eq!(engine.beliefs("weather").unwrap(), before);

        engine.clear_all_evidence();
        assert!(engine.evidence().is_empty());
        assert_eq!(engine.beliefs("weather").unwrap(), prior);
    }
}

#[test]
fn every_belief_is_a_distribution() {
    let observations: [(&str, &str); 3] = [("wet", "t"), ("sprinkler", "f"), ("cloudy", "t")];
    for config in all_variants() {
        let mut engine = InferenceEngine::with_network(sprinkler(), config).unwrap();
        for (variable, outcome) in observations {
            engine.set_evidence(variable, outcome).unwrap();
            for (id, belief) in engine.all_beliefs().unwrap() {
                assert_distribution(&belief, &format!("{} after {}={}", id, variable, outcome));
            }
        }
    }
}

#[test]
fn query_errors_leave_engine_usable() {
    let mut engine =
        InferenceEngine::with_network(sprinkler(), AlgorithmConfig::default()).unwrap();
    engine.set_evidence("wet", "t").unwrap();
    let rain = engine.beliefs("rain").unwrap();

    assert!(matches!(engine.beliefs("mud"), Err(InferenceError::UnknownVariable(_))));
    assert!(matches!(engine.set_evidence("wet", "soaked"), Err(InferenceError::Domain(_))));
    assert!(matches!(engine.set_evidence("wet", 5usize), Err(InferenceError::Domain(_))));
    assert!(matches!(engine.clear_evidence("mud"), Err(InferenceError::UnknownVariable(_))));

    assert_eq!(engine.beliefs("rain").unwrap(), rain);
}

#[test]
fn impossible_evidence_is_reported_not_cached() {
    let mut engine =
        InferenceEngine::with_network(sprinkler(), AlgorithmConfig::default()).unwrap();
    engine.set_evidence("sprinkler", "f").unwrap();
    engine.set_evidence("rain", "f").unwrap();
    engine.set_evidence("wet", "t").unwrap();
    assert!(matches!(engine.beliefs("cloudy"), Err(InferenceError::Distribution(_))));

    engine.clear_evidence("wet").unwrap();
    assert_distribution(&engine.beliefs("cloudy").unwrap(), "after clearing impossible evidence");
}

#[test]
fn diagnostics_describe_the_last_run() {
    let mut engine = InferenceEngine::with_network(
        commute_tree(),
        AlgorithmConfig::Loopy(BeliefPropagationConfig::default()),
    )
    .unwrap();
    assert!(engine.diagnostics().is_none());
    engine.set_evidence("umbrella", "yes").unwrap();
    engine.beliefs("weather").unwrap();
    let diagnostics = engine.diagnostics().unwrap();
    assert_eq!(diagnostics.algorithm, AlgorithmKind::Loopy);
    assert!(diagnostics.converged);
    assert!(diagnostics.iterations > 0);
    assert!(diagnostics.final_max_delta < 1e-4);

    let mut exact =
        InferenceEngine::with_network(commute_tree(), AlgorithmConfig::default()).unwrap();
    exact.set_evidence("umbrella", "yes").unwrap();
    exact.beliefs("weather").unwrap();
    let p = exact.diagnostics().unwrap().evidence_probability.unwrap();
    assert!((p - 0.36).abs() < 1e-9);
}

#[test]
fn invalid_configurations_are_rejected() {
    let bad = [
        AlgorithmConfig::Loopy(BeliefPropagationConfig {
            max_iterations: 0,
            ..Default::default()
        }),
        AlgorithmConfig::Sampling(SamplingConfig { samples: 0, seed: 0 }),
        AlgorithmConfig::Exact(EliminationConfig {
            max_induced_width: Some(0),
            ..Default::default()
        }),
    ];
    for config in bad {
        assert!(matches!(InferenceEngine::new(config), Err(InferenceError::Validation(_))));
    }
}

#[test]
fn engines_share_one_network_across_threads() {
    let network = sprinkler();
    let handles: Vec<_> = ["t", "f"]
        .into_iter()
        .flat_map(|outcome| all_variants().into_iter().map(move |config| (outcome, config)))
        .map(|(outcome, config)| {
            let network = Arc::clone(&network);
            thread::spawn(move || {
                let mut engine = InferenceEngine::with_network(network, config).unwrap();
                engine.set_evidence("cloudy", outcome).unwrap();
                engine.beliefs("rain").unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_distribution(&handle.join().unwrap(), "threaded query");
    }
    assert_eq!(Arc::strong_count(&network), 1);
}

#[test]
fn evidence_from_another_network_is_rejected_by_every_solver() {
    // Variable 0 has four outcomes here but two in the scenario network, and
    // variable 3 does not exist there at all.
    let mut other = NetworkBuilder::new();
    for name in ["w", "x", "y", "z"] {
        other.add_variable(name, ["0", "1", "2", "3"]).unwrap();
        other.set_prior(name, &[0.25; 4]).unwrap();
    }
    let other = other.build().unwrap();
    let mut out_of_range = Evidence::new();
    out_of_range.observe(&other, "w", 3usize).unwrap();
    let mut unknown = Evidence::new();
    unknown.observe(&other, "z", 3usize).unwrap();

    let scenario = two_parent_scenario();
    let cancel = CancellationToken::new();
    for config in all_variants() {
        let solver = config.into_solver().unwrap();
        assert!(
            matches!(
                solver.solve(&scenario, &out_of_range, &cancel),
                Err(InferenceError::Domain(_))
            ),
            "{}",
            config.kind()
        );
        assert!(
            matches!(
                solver.solve(&scenario, &unknown, &cancel),
                Err(InferenceError::UnknownVariable(_))
            ),
            "{}",
            config.kind()
        );
    }
}
