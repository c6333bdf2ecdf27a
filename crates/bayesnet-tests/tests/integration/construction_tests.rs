use bayesnet_core::{InferenceError, Network, NetworkBuilder, VariableId};

use bayesnet_tests::{commute_tree, sprinkler, two_parent_scenario};

fn two_node_builder() -> NetworkBuilder {
    let mut b = Network::builder();
    b.add_variable("a", ["0", "1"]).unwrap();
    b.add_variable("b", ["0", "1"]).unwrap();
    b
}

#[test]
fn row_summing_to_point_nine_is_a_distribution_error() {
    let mut b = two_node_builder();
    b.add_parent("b", "a").unwrap();
    b.set_prior("a", &[0.5, 0.5]).unwrap();
    b.set_cpt("b", vec![vec![0.5, 0.4], vec![0.5, 0.5]]).unwrap();
    match b.build() {
        Err(InferenceError::Distribution(msg)) => assert!(msg.contains("sums to"), "{}", msg),
        other => panic!("expected distribution error, got {:?}", other),
    }
}

#[test]
fn parent_cycle_is_a_structure_error() {
    let mut b = two_node_builder();
    b.add_parent("b", "a").unwrap();
    b.add_parent("a", "b").unwrap();
    b.set_cpt("a", vec![vec![0.5, 0.5], vec![0.5, 0.5]]).unwrap();
    b.set_cpt("b", vec![vec![0.5, 0.5], vec![0.5, 0.5]]).unwrap();
    assert!(matches!(b.build(), Err(InferenceError::Structure(_))));
}

#[test]
fn dangling_parent_and_duplicate_name_are_structure_errors() {
    let mut b = two_node_builder();
    b.add_parent("b", "ghost").unwrap();
    b.set_prior("a", &[0.5, 0.5]).unwrap();
    b.set_cpt("b", vec![vec![0.5, 0.5]]).unwrap();
    assert!(matches!(b.build(), Err(InferenceError::Structure(_))));

    let mut b = two_node_builder();
    assert!(matches!(
        b.add_variable("a", ["x"]),
        Err(InferenceError::Structure(_))
    ));
    assert!(matches!(
        b.add_parent("ghost", "a"),
        Err(InferenceError::Structure(_))
    ));
}

#[test]
fn empty_or_repeated_outcomes_are_domain_errors() {
    let mut b = Network::builder();
    let empty: [&str; 0] = [];
    assert!(matches!(b.add_variable("v", empty), Err(InferenceError::Domain(_))));
    assert!(matches!(
        b.add_variable("w", ["on", "on"]),
        Err(InferenceError::Domain(_))
    ));
}

#[test]
fn missing_and_negative_rows_are_rejected() {
    let mut b = Network::builder();
    b.add_variable("a", ["true", "false"]).unwrap();
    b.add_variable("c", ["x", "y"]).unwrap();
    b.add_parent("c", "a").unwrap();
    b.set_prior("a", &[0.5, 0.5]).unwrap();
    b.set_cpt_row("c", ["true"], &[0.5, 0.5]).unwrap();
    match b.build() {
        Err(InferenceError::Distribution(msg)) => assert!(msg.contains("a=false"), "{}", msg),
        other => panic!("expected missing row, got {:?}", other),
    }

    let mut b = Network::builder();
    b.add_variable("a", ["true", "false"]).unwrap();
    b.set_prior("a", &[1.2, -0.2]).unwrap();
    assert!(matches!(b.build(), Err(InferenceError::Distribution(_))));
}

#[test]
fn topology_queries() {
    let net = sprinkler();
    let id = |name: &str| net.variable_id(name).unwrap();
    assert_eq!(net.len(), 4);
    assert_eq!(net.parents(id("wet")), &[id("sprinkler"), id("rain")]);
    assert_eq!(net.children(id("cloudy")), &[id("sprinkler"), id("rain")]);
    assert_eq!(net.topological_order()[0], id("cloudy"));
    assert_eq!(
        net.markov_blanket(id("sprinkler")),
        vec![id("cloudy"), id("rain"), id("wet")]
    );
    assert!(net.moral_graph_has_cycle());
    assert!(!commute_tree().moral_graph_has_cycle());
    assert!(net.variable(VariableId(9)).is_none());
    assert!(matches!(net.resolve("mud"), Err(InferenceError::UnknownVariable(_))));
}

#[test]
fn induced_width_depends_on_order() {
    let net = two_parent_scenario();
    let order = |names: &[&str]| -> Vec<VariableId> {
        names.iter().map(|n| net.variable_id(n).unwrap()).collect()
    };
    assert_eq!(net.induced_width(&order(&["a", "b", "c"])).unwrap(), 2);
    assert!(matches!(
        net.induced_width(&order(&["a", "a", "c"])),
        Err(InferenceError::Structure(_))
    ));
    assert!(matches!(
        net.induced_width(&order(&["a", "b"])),
        Err(InferenceError::Structure(_))
    ));
}

#[test]
fn cpt_row_order_puts_last_parent_fastest() {
    let net = two_parent_scenario();
    let c = net.resolve("c").unwrap();
    assert_eq!(c.cpt().row_count(), 4);
    assert_eq!(c.cpt().row(3), Some(&[0.7, 0.3][..]));
    assert_eq!(c.cpt().row_index(&[1, 0]), Some(2));
    assert_eq!(c.cpt().probability(0, &[0, 1]), Some(0.6));
}
