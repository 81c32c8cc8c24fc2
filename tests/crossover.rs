#![allow(clippy::unwrap_used)]

mod common;

use common::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use treegraft::config::{CutPointStrategy, OperatorConfig};
use treegraft::engines::variation::{CrossoverEngine, CutPoint, NoOpReason, Ptc2, SelectionMode};
use treegraft::grammar::{Grammar, TableGrammar};
use treegraft::tree::Tree;

fn engine(grammar: &Arc<TableGrammar>, config: OperatorConfig) -> CrossoverEngine {
    let grammar: Arc<dyn Grammar> = grammar.clone();
    CrossoverEngine::new(grammar, config).unwrap()
}

/// Length 12 donor whose branches have lengths 1, 2, 3, 4 and 7.
fn scenario_donor(grammar: &TableGrammar) -> Tree {
    build(
        grammar,
        &node(
            "Add",
            vec![
                node(
                    "Add",
                    vec![
                        node("Neg", vec![leaf("X")]),
                        node("Add", vec![leaf("X"), node("Neg", vec![leaf("Y")])]),
                    ],
                ),
                node("Neg", vec![node("Add", vec![leaf("Y"), leaf("X")])]),
            ],
        ),
    )
}

#[test]
fn test_candidates_respect_remaining_budget() {
    let grammar = arithmetic_grammar();
    let engine = engine(&grammar, operators(10, 3));
    let recipient = build(&grammar, &node("Add", vec![leaf("X"), leaf("Y")]));
    let donor = scenario_donor(&grammar);
    assert_eq!(donor.length(), 12);

    let cut = CutPoint::existing(&recipient, find(&recipient, "Y")).unwrap();
    let allowed = engine.allowed_branches(&recipient, &donor, &cut).unwrap();

    let lengths: Vec<usize> = allowed.iter().map(|b| donor.subtree_length(b.unwrap())).collect();
    assert!(lengths.iter().all(|&l| l <= 8));
    assert!(!lengths.contains(&12));
    for expected in [1, 2, 4] {
        assert!(lengths.contains(&expected), "missing length {}", expected);
    }
    assert!(allowed.iter().all(|b| donor.subtree_depth(b.unwrap()) <= 2));
}

#[test]
fn test_crossover_at_cut_point_stays_within_bounds() {
    let grammar = arithmetic_grammar();
    let engine = engine(&grammar, operators(10, 3));
    let donor = scenario_donor(&grammar);

    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut recipient = build(&grammar, &node("Add", vec![leaf("X"), leaf("Y")]));
        let cut = CutPoint::existing(&recipient, find(&recipient, "Y")).unwrap();
        let outcome = engine.cross_at(&mut recipient, &donor, &cut, None, None, &mut rng).unwrap();

        assert!(outcome.performed);
        assert_eq!(outcome.selection, Some(SelectionMode::Random));
        assert_eq!(outcome.cut_point_symbol.as_deref(), Some("Y"));
        assert_eq!(outcome.removed_branch.as_deref(), Some("Y"));
        assert!(recipient.length() <= 10);
        assert!(recipient.depth() <= 3);
        // donor untouched
        assert_eq!(donor.length(), 12);
    }
}

#[test]
fn test_no_fitting_branch_leaves_recipient_unchanged() {
    let grammar = statement_grammar();
    let engine = engine(&grammar, operators(50, 8));
    let mut recipient = build(
        &grammar,
        &node("Root", vec![node("Assign", vec![leaf("VarA"), leaf("VarB")])]),
    );
    let before = recipient.clone();
    // no variable anywhere in the donor, and the target slot only takes variables
    let donor = build(&grammar, &node("Plus", vec![leaf("One"), leaf("Two")]));
    let cut = CutPoint::existing(&recipient, find(&recipient, "VarA")).unwrap();
    let mut rng = StdRng::seed_from_u64(1);

    let outcome = engine.cross_at(&mut recipient, &donor, &cut, None, None, &mut rng).unwrap();
    assert!(!outcome.performed);
    assert_eq!(outcome.reason, Some(NoOpReason::NoAllowedBranch));
    assert_eq!(outcome.reason.unwrap().code(), 5);
    assert_eq!(outcome.allowed_branches, 0);
    assert!(recipient.same_structure(&before));
}

#[test]
fn test_length_budget_excludes_everything() {
    let grammar = arithmetic_grammar();
    // budget is 3 - 4 + 1 = 0 nodes
    let engine = engine(&grammar, operators(3, 10));
    let mut recipient = build(&grammar, &node("Root", vec![node("Neg", vec![node("Neg", vec![leaf("X")])])]));
    let before = recipient.clone();
    let donor = build(&grammar, &node("Neg", vec![leaf("Y")]));
    let cut = CutPoint::existing(&recipient, find(&recipient, "X")).unwrap();
    let mut rng = StdRng::seed_from_u64(2);

    let outcome = engine.cross_at(&mut recipient, &donor, &cut, None, None, &mut rng).unwrap();
    assert_eq!(outcome.reason, Some(NoOpReason::NoAllowedBranch));
    assert!(recipient.same_structure(&before));
}

#[test]
fn test_probability_gate_skips() {
    let grammar = arithmetic_grammar();
    let config = OperatorConfig {
        crossover_probability: 0.0,
        ..operators(20, 5)
    };
    let engine = engine(&grammar, config);
    let mut recipient = build(&grammar, &node("Root", vec![node("Add", vec![leaf("X"), leaf("Y")])]));
    let before = recipient.clone();
    let donor = build(&grammar, &node("Root", vec![leaf("X")]));
    let mut rng = StdRng::seed_from_u64(3);

    let outcome = engine.crossover(&mut recipient, &donor, None, None, &mut rng).unwrap();
    assert_eq!(outcome.reason, Some(NoOpReason::Probability));
    assert_eq!(outcome.reason.unwrap().code(), 3);
    assert!(recipient.same_structure(&before));
}

#[test]
fn test_tree_without_cut_points_is_configuration_error() {
    let grammar = arithmetic_grammar();
    let engine = engine(&grammar, operators(20, 5));
    let mut recipient = build(&grammar, &node("Root", vec![leaf("X")]));
    let donor = build(&grammar, &node("Root", vec![leaf("Y")]));
    let mut rng = StdRng::seed_from_u64(3);

    assert!(engine.crossover(&mut recipient, &donor, None, None, &mut rng).is_err());
}

#[test]
fn test_semantic_guidance_without_evaluator_falls_back() {
    let grammar = arithmetic_grammar();
    let config = OperatorConfig {
        semantic_guidance: true,
        ..operators(20, 5)
    };
    let engine = engine(&grammar, config);
    let mut recipient = build(&grammar, &node("Root", vec![node("Add", vec![leaf("X"), leaf("Y")])]));
    let donor = build(&grammar, &node("Root", vec![node("Neg", vec![leaf("X")])]));
    let mut rng = StdRng::seed_from_u64(5);

    let outcome = engine.crossover(&mut recipient, &donor, None, None, &mut rng).unwrap();
    assert!(outcome.performed);
    assert_eq!(outcome.reason, Some(NoOpReason::NoSemantics));
}

#[test]
fn test_grafted_root_matches_slot_type() {
    let grammar = statement_grammar();
    let engine = engine(&grammar, operators(50, 8));
    let donor = build(
        &grammar,
        &node(
            "Root",
            vec![node(
                "Stmts",
                vec![
                    node("Assign", vec![leaf("VarB"), node("Plus", vec![leaf("One"), leaf("VarA")])]),
                    node("Assign", vec![leaf("VarA"), leaf("Two")]),
                ],
            )],
        ),
    );

    for seed in 0..40 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut recipient = build(
            &grammar,
            &node(
                "Root",
                vec![node(
                    "Stmts",
                    vec![
                        node("Assign", vec![leaf("VarA"), leaf("VarB")]),
                        node("Assign", vec![leaf("VarB"), leaf("One")]),
                    ],
                )],
            ),
        );
        let outcome = engine.crossover(&mut recipient, &donor, None, None, &mut rng).unwrap();
        assert!(outcome.performed);

        // every parent/child pair must still be legal
        for id in recipient.prefix(recipient.root()) {
            let parent = recipient[id].symbol().clone();
            for (i, &child) in recipient.children(id).iter().enumerate() {
                assert!(
                    grammar.is_allowed_child(&parent, recipient[child].symbol(), i),
                    "{} may not hold {} at {}",
                    parent.name,
                    recipient[child].symbol().name,
                    i
                );
            }
        }
    }
}

#[test]
fn test_plain_random_and_symbol_weighted_strategies() {
    let grammar = arithmetic_grammar();
    let mut weights = std::collections::HashMap::new();
    weights.insert("Neg".to_string(), 5.0);
    for strategy in [CutPointStrategy::PlainRandom, CutPointStrategy::SymbolWeighted { weights }] {
        let config = OperatorConfig {
            cut_point_strategy: strategy,
            ..operators(15, 4)
        };
        let engine = engine(&grammar, config);
        let donor = scenario_donor(&grammar);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut recipient = build(
                &grammar,
                &node("Root", vec![node("Add", vec![node("Neg", vec![leaf("X")]), leaf("Y")])]),
            );
            engine.crossover(&mut recipient, &donor, None, None, &mut rng).unwrap();
            assert!(recipient.length() <= 15);
            assert!(recipient.depth() <= 4);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn crossover_output_respects_size_limits(seed in any::<u64>()) {
        let grammar = arithmetic_grammar();
        let max_length = 25;
        let max_depth = 6;
        let ptc2 = Ptc2::new(grammar.as_ref(), 100);
        let mut rng = StdRng::seed_from_u64(seed);

        let grow = |rng: &mut StdRng| {
            let mut tree = Tree::new(grammar.root_symbol());
            let root = tree.root();
            ptc2.grow(&mut tree, root, max_length, max_depth, rng).unwrap();
            tree
        };
        let mut recipient = grow(&mut rng);
        let donor = grow(&mut rng);

        let engine = engine(&grammar, operators(max_length, max_depth));
        let result = engine.crossover(&mut recipient, &donor, None, None, &mut rng);
        if let Ok(outcome) = result {
            if outcome.performed {
                prop_assert!(recipient.length() <= max_length);
                prop_assert!(recipient.depth() <= max_depth);
            }
        }
    }
}
