#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use treegraft::config::{OperatorConfig, SemanticsConfig, VariableSpec};
use treegraft::engines::semantics::{EvaluationRequest, EvaluationResponse, Evaluator, SemanticSnapshot, VariableType};
use treegraft::grammar::{Grammar, GrammarDefinition, Symbol, TableGrammar};
use treegraft::tree::{NodeId, Tree};

/// `Root -> Expr`, `Expr := Add(Expr, Expr) | Neg(Expr) | X | Y`.
pub fn arithmetic_grammar() -> Arc<TableGrammar> {
    let expr = ["Add", "Neg", "X", "Y"];
    let definition = GrammarDefinition::new("Root")
        .symbol(Symbol::new("Root", 1, 1))
        .symbol(Symbol::new("Add", 2, 2))
        .symbol(Symbol::new("Neg", 1, 1))
        .symbol(Symbol::terminal("X"))
        .symbol(Symbol::terminal("Y"))
        .allow("Root", None, &expr)
        .allow("Add", None, &expr)
        .allow("Neg", None, &expr);
    Arc::new(TableGrammar::new(definition).unwrap())
}

/// Like [`arithmetic_grammar`] plus `Sum`, which takes one to three arguments.
pub fn variadic_grammar() -> Arc<TableGrammar> {
    let expr = ["Sum", "Neg", "X", "Y"];
    let definition = GrammarDefinition::new("Root")
        .symbol(Symbol::new("Root", 1, 1))
        .symbol(Symbol::new("Sum", 1, 3))
        .symbol(Symbol::new("Neg", 1, 1))
        .symbol(Symbol::terminal("X"))
        .symbol(Symbol::terminal("Y"))
        .allow("Root", None, &expr)
        .allow("Sum", None, &expr)
        .allow("Neg", None, &expr);
    Arc::new(TableGrammar::new(definition).unwrap())
}

/// Assignment statements over the variables `a` and `b`.
///
/// `Root -> Stmts | Assign`, `Stmts -> (Stmts | Assign) (Stmts | Assign)`,
/// `Assign -> Var Expr`, `Expr := Plus(Expr, Expr) | One | Two | Var`.
pub fn statement_grammar() -> Arc<TableGrammar> {
    let expr = ["Plus", "One", "Two", "VarA", "VarB"];
    let definition = GrammarDefinition::new("Root")
        .symbol(Symbol::new("Root", 1, 1))
        .symbol(Symbol::production("Stmts", &["", "", ""]))
        .symbol(Symbol::production("Assign", &["", " = ", "\n"]))
        .symbol(Symbol::production("Plus", &["(", " + ", ")"]))
        .symbol(Symbol::production("One", &["1"]))
        .symbol(Symbol::production("Two", &["2"]))
        .symbol(Symbol::production("VarA", &["a"]))
        .symbol(Symbol::production("VarB", &["b"]))
        .allow("Root", None, &["Stmts", "Assign"])
        .allow("Stmts", None, &["Stmts", "Assign"])
        .allow("Assign", Some(0), &["VarA", "VarB"])
        .allow("Assign", Some(1), &expr)
        .allow("Plus", None, &expr)
        .group("<assign>", &["Assign"]);
    Arc::new(TableGrammar::new(definition).unwrap())
}

pub fn symbol(grammar: &TableGrammar, name: &str) -> Arc<Symbol> {
    grammar.symbol(name).unwrap()
}

/// Builds a tree from nested `(name, children)` descriptions.
pub enum Shape {
    Leaf(&'static str),
    Node(&'static str, Vec<Shape>),
}

pub fn leaf(name: &'static str) -> Shape {
    Shape::Leaf(name)
}

pub fn node(name: &'static str, children: Vec<Shape>) -> Shape {
    Shape::Node(name, children)
}

pub fn build(grammar: &TableGrammar, shape: &Shape) -> Tree {
    let (name, children) = match shape {
        Shape::Leaf(name) => (*name, &[][..]),
        Shape::Node(name, children) => (*name, children.as_slice()),
    };
    let mut tree = Tree::new(symbol(grammar, name));
    let root = tree.root();
    for child in children {
        attach(grammar, &mut tree, root, child);
    }
    tree
}

fn attach(grammar: &TableGrammar, tree: &mut Tree, parent: NodeId, shape: &Shape) -> NodeId {
    let (name, children) = match shape {
        Shape::Leaf(name) => (*name, &[][..]),
        Shape::Node(name, children) => (*name, children.as_slice()),
    };
    let id = tree.add_child(parent, symbol(grammar, name)).unwrap();
    for child in children {
        attach(grammar, tree, id, child);
    }
    id
}

/// First node in prefix order whose symbol is `name`.
pub fn find(tree: &Tree, name: &str) -> NodeId {
    tree.prefix(tree.root())
        .into_iter()
        .find(|&id| tree[id].symbol().name == name)
        .unwrap()
}

pub fn operators(max_tree_length: usize, max_tree_depth: usize) -> OperatorConfig {
    OperatorConfig {
        max_tree_length,
        max_tree_depth,
        ..OperatorConfig::default()
    }
}

pub fn semantics_for_a() -> SemanticsConfig {
    SemanticsConfig {
        statement_groups: vec!["<assign>".to_string()],
        variables: vec![VariableSpec::new("a", VariableType::Int)],
        variable_settings: "a = [0, 0]\nb = [1, 2]".to_string(),
        ..SemanticsConfig::default()
    }
}

pub fn ints(name: &str, values: &[i64]) -> EvaluationResponse {
    let snapshot: SemanticSnapshot = [(
        name.to_string(),
        values.iter().map(|v| serde_json::json!(v)).collect(),
    )]
    .into_iter()
    .collect();
    EvaluationResponse::Snapshot(snapshot)
}

/// Evaluator answering from a list of `(script fragment, response)` pairs;
/// the first fragment contained in the script wins, otherwise an error.
pub struct StubEvaluator {
    rules: Vec<(String, EvaluationResponse)>,
    pub calls: Arc<AtomicUsize>,
    pub scripts: Vec<String>,
}

impl StubEvaluator {
    pub fn new(rules: Vec<(&str, EvaluationResponse)>) -> Self {
        Self {
            rules: rules.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
            scripts: Vec::new(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Evaluator for StubEvaluator {
    fn evaluate(&mut self, request: &EvaluationRequest) -> EvaluationResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scripts.push(request.source_text.clone());
        self.rules
            .iter()
            .find(|(fragment, _)| request.source_text.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| EvaluationResponse::Error("Timeout occurred.".to_string()))
    }
}
