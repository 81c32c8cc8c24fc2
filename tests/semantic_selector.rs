#![allow(clippy::unwrap_used)]

mod common;

use common::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use treegraft::config::{OperatorConfig, SemanticsConfig};
use treegraft::engines::semantics::{EvaluationResponse, SemanticSelector, StatementAnchor};
use treegraft::engines::variation::{CrossoverEngine, CutPoint, Equivalence, NoOpReason, SelectionMode};
use treegraft::grammar::{Grammar, TableGrammar};
use treegraft::tree::{to_source, Tree};

fn recipient(grammar: &TableGrammar) -> Tree {
    build(
        grammar,
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
    )
}

/// Offers `a`, `1`, `2` and `(1 + 2)` for an expression slot, in that order.
fn donor(grammar: &TableGrammar) -> Tree {
    build(
        grammar,
        &node(
            "Root",
            vec![node("Assign", vec![leaf("VarA"), node("Plus", vec![leaf("One"), leaf("Two")])])],
        ),
    )
}

fn semantic_engine(grammar: &Arc<TableGrammar>, max_compares: usize, semantics: SemanticsConfig) -> CrossoverEngine {
    let grammar: Arc<dyn Grammar> = grammar.clone();
    let config = OperatorConfig {
        semantic_guidance: true,
        max_compares,
        ..operators(50, 8)
    };
    CrossoverEngine::new(grammar, config)
        .unwrap()
        .with_semantics(semantics)
        .unwrap()
}

/// Traces of `a` as the assignment `a = <expr>` would produce for `a = [0, 0]`, `b = [1, 2]`.
fn faithful_evaluator() -> StubEvaluator {
    StubEvaluator::new(vec![
        ("    a = b\n", ints("a", &[1, 2])),
        ("    a = a\n", ints("a", &[0, 0])),
        ("    a = 1\n", ints("a", &[1, 1])),
        ("    a = 2\n", ints("a", &[2, 2])),
        ("    a = (1 + 2)\n", ints("a", &[3, 3])),
    ])
}

#[test]
fn test_closest_different_candidate_wins_with_earliest_tie() {
    let grammar = statement_grammar();
    let engine = semantic_engine(&grammar, 10, semantics_for_a());
    let donor = donor(&grammar);

    for seed in 0..5 {
        let mut tree = recipient(&grammar);
        let cut = CutPoint::existing(&tree, find(&tree, "VarB")).unwrap();
        let mut evaluator = faithful_evaluator();
        let mut rng = StdRng::seed_from_u64(seed);

        let outcome = engine
            .cross_at(&mut tree, &donor, &cut, Some(&mut evaluator), None, &mut rng)
            .unwrap();

        // `1` and `2` are both one step from [1, 2]; `1` is sampled first
        assert!(outcome.performed);
        assert_eq!(outcome.selection, Some(SelectionMode::Semantic));
        assert_eq!(outcome.added_branch.as_deref(), Some("One"));
        assert_eq!(outcome.type_selected.as_deref(), Some("Int"));
        assert_eq!(outcome.equivalence, Some(Equivalence::Different));
        assert_eq!(outcome.allowed_branches, 4);
        assert_eq!(outcome.sampled_branches, 4);
        assert_eq!(outcome.no_change_detected, 0);
        assert_eq!(outcome.reason, None);
        assert_eq!(evaluator.call_count(), 5);
        assert_eq!(to_source(&tree, tree.root()), "a = 1\nb = 1\n");
    }
}

#[test]
fn test_identical_behaviour_falls_back_to_sampled_candidates() {
    let grammar = statement_grammar();
    let engine = semantic_engine(&grammar, 10, semantics_for_a());
    let donor = donor(&grammar);
    let names: HashSet<&str> = ["VarA", "One", "Two", "(Plus One Two)"].into_iter().collect();

    for seed in 0..10 {
        let mut tree = recipient(&grammar);
        let cut = CutPoint::existing(&tree, find(&tree, "VarB")).unwrap();
        let mut evaluator = StubEvaluator::new(vec![("a = ", ints("a", &[5, 5]))]);
        let mut rng = StdRng::seed_from_u64(seed);

        let outcome = engine
            .cross_at(&mut tree, &donor, &cut, Some(&mut evaluator), None, &mut rng)
            .unwrap();

        assert!(outcome.performed);
        assert_eq!(outcome.selection, Some(SelectionMode::RandomNoDifference));
        assert_eq!(outcome.no_change_detected, 4);
        assert_eq!(outcome.equivalence, Some(Equivalence::Equivalent));
        assert!(names.contains(outcome.added_branch.as_deref().unwrap()));
    }
}

#[test]
fn test_failed_samples_fall_back_to_full_candidate_set() {
    let grammar = statement_grammar();
    let selector = SemanticSelector::new(grammar.as_ref(), semantics_for_a()).unwrap();
    let engine = semantic_engine(&grammar, 1, semantics_for_a());
    let donor = donor(&grammar);
    let mut picked = HashSet::new();

    for seed in 0..30 {
        let mut tree = recipient(&grammar);
        let before = tree.clone();
        let cut = CutPoint::existing(&tree, find(&tree, "VarB")).unwrap();
        let allowed = engine.allowed_branches(&tree, &donor, &cut).unwrap();
        // only the baseline evaluates
        let mut evaluator = StubEvaluator::new(vec![("    a = b\n", ints("a", &[1, 2]))]);
        let mut rng = StdRng::seed_from_u64(seed);

        let choice = selector
            .select(&mut tree, &cut, &donor, &allowed, &[0], &mut evaluator, None, &mut rng)
            .unwrap();

        assert_eq!(choice.mode, SelectionMode::RandomAfterFailures);
        assert_eq!(choice.sampled, 1);
        assert!(choice.index < allowed.len());
        assert!(tree.same_structure(&before));
        picked.insert(choice.index);
    }
    assert!(picked.iter().any(|&i| i != 0), "fallback only ever used the failed sample");
}

#[test]
fn test_no_difference_picks_among_all_samples() {
    let grammar = statement_grammar();
    let selector = SemanticSelector::new(grammar.as_ref(), semantics_for_a()).unwrap();
    let engine = semantic_engine(&grammar, 2, semantics_for_a());
    let donor = donor(&grammar);
    let mut picked = HashSet::new();

    for seed in 0..40 {
        let mut tree = recipient(&grammar);
        let cut = CutPoint::existing(&tree, find(&tree, "VarB")).unwrap();
        let allowed = engine.allowed_branches(&tree, &donor, &cut).unwrap();
        // `a = 1` fails, `a = a` matches the baseline
        let mut evaluator = StubEvaluator::new(vec![
            ("    a = b\n", ints("a", &[1, 2])),
            ("    a = a\n", ints("a", &[1, 2])),
        ]);
        let mut rng = StdRng::seed_from_u64(seed);

        let choice = selector
            .select(&mut tree, &cut, &donor, &allowed, &[1, 0], &mut evaluator, None, &mut rng)
            .unwrap();

        assert_eq!(choice.mode, SelectionMode::RandomNoDifference);
        assert_eq!(choice.no_change_detected, 1);
        assert_eq!(evaluator.call_count(), 3);
        if choice.index == 0 {
            assert_eq!(choice.equivalence, Some(Equivalence::Equivalent));
        } else {
            assert_eq!(choice.equivalence, None);
        }
        picked.insert(choice.index);
    }
    assert_eq!(picked, HashSet::from([0, 1]));
}

#[test]
fn test_per_call_values_override_settings() {
    let grammar = statement_grammar();
    let engine = semantic_engine(&grammar, 10, semantics_for_a());
    let donor = donor(&grammar);
    let mut values = BTreeMap::new();
    values.insert("a".to_string(), vec![json!(3), json!(4)]);
    values.insert("b".to_string(), vec![json!(5), json!(6)]);

    let mut tree = recipient(&grammar);
    let cut = CutPoint::existing(&tree, find(&tree, "VarB")).unwrap();
    let mut evaluator = faithful_evaluator();
    let mut rng = StdRng::seed_from_u64(8);
    engine
        .cross_at(&mut tree, &donor, &cut, Some(&mut evaluator), Some(&values), &mut rng)
        .unwrap();
    assert!(evaluator.call_count() > 1);
    for script in &evaluator.scripts {
        assert!(script.contains("a_setting = [3, 4]\nb_setting = [5, 6]\n"));
        assert!(!script.contains("a_setting = [0, 0]"));
    }

    // without per-call values the configured settings apply again
    let selector = SemanticSelector::new(grammar.as_ref(), semantics_for_a()).unwrap();
    let tree = recipient(&grammar);
    let mut evaluator = faithful_evaluator();
    let assign = StatementAnchor::Node(find(&tree, "Assign"));
    selector.evaluate(&tree, assign, &mut evaluator, Some(&values));
    selector.evaluate(&tree, assign, &mut evaluator, None);
    assert!(evaluator.scripts[0].contains("a_setting = [3, 4]\n"));
    assert!(evaluator.scripts[1].contains("a_setting = [0, 0]\nb_setting = [1, 2]\n"));
}

#[test]
fn test_failed_baseline_still_grafts() {
    let grammar = statement_grammar();
    let engine = semantic_engine(&grammar, 10, semantics_for_a());
    let donor = donor(&grammar);
    let mut tree = recipient(&grammar);
    let cut = CutPoint::existing(&tree, find(&tree, "VarB")).unwrap();
    let mut evaluator = StubEvaluator::new(Vec::new());
    let mut rng = StdRng::seed_from_u64(11);

    let outcome = engine
        .cross_at(&mut tree, &donor, &cut, Some(&mut evaluator), None, &mut rng)
        .unwrap();

    assert!(outcome.performed);
    assert_eq!(outcome.selection, Some(SelectionMode::RandomAfterFailures));
    assert_eq!(evaluator.call_count(), 1);
}

#[test]
fn test_missing_statement_category_picks_randomly() {
    let grammar = statement_grammar();
    let semantics = SemanticsConfig {
        statement_groups: vec!["<code>".to_string()],
        ..semantics_for_a()
    };
    let engine = semantic_engine(&grammar, 10, semantics);
    let donor = donor(&grammar);
    let mut tree = recipient(&grammar);
    let cut = CutPoint::existing(&tree, find(&tree, "VarB")).unwrap();
    let mut evaluator = faithful_evaluator();
    let mut rng = StdRng::seed_from_u64(4);

    let outcome = engine
        .cross_at(&mut tree, &donor, &cut, Some(&mut evaluator), None, &mut rng)
        .unwrap();

    assert!(outcome.performed);
    assert_eq!(outcome.selection, Some(SelectionMode::RandomNoStatement));
    assert_eq!(outcome.reason, Some(NoOpReason::NoStatement));
    assert_eq!(outcome.reason.unwrap().code(), 6);
    assert_eq!(evaluator.call_count(), 0);
}

#[test]
fn test_statement_anchor() {
    let grammar = statement_grammar();
    let selector = SemanticSelector::new(grammar.as_ref(), semantics_for_a()).unwrap();
    let tree = recipient(&grammar);
    let stmts = find(&tree, "Stmts");
    let assign = find(&tree, "Assign");

    assert_eq!(
        selector.find_statement(&tree, assign, 1),
        Some(StatementAnchor::Node(assign))
    );
    assert_eq!(
        selector.find_statement(&tree, stmts, 0),
        Some(StatementAnchor::Slot { parent: stmts, index: 0 })
    );
    assert_eq!(selector.find_statement(&tree, tree.root(), 0), None);
}

#[test]
fn test_trace_script_sent_to_evaluator() {
    let grammar = statement_grammar();
    let selector = SemanticSelector::new(grammar.as_ref(), semantics_for_a()).unwrap();
    let tree = recipient(&grammar);
    let assign = find(&tree, "Assign");
    let mut evaluator = faithful_evaluator();

    let response = selector.evaluate(&tree, StatementAnchor::Node(assign), &mut evaluator, None);
    assert_eq!(response, ints("a", &[1, 2]));

    let script = &evaluator.scripts[0];
    assert!(script.contains("variables = ['a']\n"));
    assert!(script.contains("a_setting = [0, 0]\nb_setting = [1, 2]\n"));
    assert!(script.contains("for a, in zip(a_setting):\n    loopBreakConst = 1500\n    loopBreak = 0\n    a = b\n"));
}

#[test]
fn test_explicit_inputs_replace_settings() {
    let grammar = statement_grammar();
    let mut inputs = BTreeMap::new();
    inputs.insert("a".to_string(), vec![json!(3), json!(4)]);
    let selector = SemanticSelector::new(grammar.as_ref(), semantics_for_a())
        .unwrap()
        .with_input_values(&inputs);
    let tree = recipient(&grammar);
    let mut evaluator = faithful_evaluator();

    let response = selector.evaluate(&tree, StatementAnchor::Node(find(&tree, "Assign")), &mut evaluator, None);
    assert!(matches!(response, EvaluationResponse::Snapshot(_)));
    assert!(evaluator.scripts[0].contains("a_setting = [3, 4]\n"));
    assert!(!evaluator.scripts[0].contains("b_setting"));
}

#[test]
fn test_empty_slot_anchor_reports_error() {
    let grammar = statement_grammar();
    let selector = SemanticSelector::new(grammar.as_ref(), semantics_for_a()).unwrap();
    let tree = recipient(&grammar);
    let stmts = find(&tree, "Stmts");
    let mut evaluator = faithful_evaluator();

    let response = selector.evaluate(&tree, StatementAnchor::Slot { parent: stmts, index: 5 }, &mut evaluator, None);
    assert!(response.is_error());
    assert_eq!(evaluator.call_count(), 0);
}
