use bayesnet_core::{AlgorithmConfig, InferenceEngine, SamplingConfig};

use bayesnet_tests::commute_tree;

fn sampler(samples: usize, seed: u64) -> AlgorithmConfig {
    AlgorithmConfig::Sampling(SamplingConfig { samples, seed })
}

#[test]
fn likelihood_weighting_approaches_exact_marginals() {
    let evidence = [("late", "very"), ("umbrella", "no")];
    let mut exact =
        InferenceEngine::with_network(commute_tree(), AlgorithmConfig::default()).unwrap();
    let mut sampled = InferenceEngine::with_network(commute_tree(), sampler(20_000, 2024)).unwrap();
    for (variable, outcome) in evidence {
        exact.set_evidence(variable, outcome).unwrap();
        sampled.set_evidence(variable, outcome).unwrap();
    }
    let sampled_beliefs = sampled.all_beliefs().unwrap();
    for ((id, lhs), (_, rhs)) in exact.all_beliefs().unwrap().iter().zip(&sampled_beliefs) {
        assert!(
            lhs.approx_eq(rhs, 0.02),
            "{}: exact {:?} vs sampled {:?}",
            id,
            lhs.probabilities(),
            rhs.probabilities()
        );
    }

    let diagnostics = sampled.diagnostics().unwrap();
    assert_eq!(diagnostics.iterations, 20_000);
    assert!(diagnostics.converged);
    let ess = diagnostics.effective_sample_size.unwrap();
    assert!(ess > 1_000.0 && ess <= 20_000.0, "ess = {}", ess);
}

#[test]
fn seeds_fix_the_estimate() {
    let run = |seed: u64| {
        let mut engine =
            InferenceEngine::with_network(commute_tree(), sampler(2_000, seed)).unwrap();
        engine.set_evidence("traffic", "heavy").unwrap();
        engine.beliefs("weather").unwrap()
    };
    assert_eq!(run(5), run(5));
    assert_ne!(run(5), run(6));
}

#[test]
fn cancelled_sampling_returns_partial_estimate() {
    let mut engine = InferenceEngine::with_network(commute_tree(), sampler(50_000, 1)).unwrap();
    let token = engine.cancellation_token();
    token.cancel();
    let weather = engine.beliefs("weather").unwrap();
    assert_eq!(weather.len(), 3);
    assert!(engine.diagnostics().unwrap().cancelled);

    token.reset();
    engine.beliefs("weather").unwrap();
    let diagnostics = engine.diagnostics().unwrap();
    assert!(!diagnostics.cancelled);
    assert_eq!(diagnostics.iterations, 50_000);
}
