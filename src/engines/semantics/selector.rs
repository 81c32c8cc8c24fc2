//! Semantic-guided choice among candidate branches.
//!
//! Each sampled branch is grafted into the recipient, the enclosing statement
//! is executed by the evaluation service, and the graft is undone again. The
//! branch whose traced behaviour is closest to, but not identical with, the
//! original statement wins.

use super::client::{EvaluationRequest, EvaluationResponse, Evaluator};
use super::distance::{closest_different, group_distances};
use super::script::{build_trace_script, settings_from_values};
use super::snapshot::{SemanticSnapshot, VariableType, VariableValues};
use crate::config::{ConfigSection, SemanticsConfig};
use crate::engines::variation::{CutPoint, Equivalence, Graft, NoOpReason, SelectionMode};
use crate::error::{Result, TreegraftError};
use crate::grammar::Grammar;
use crate::tree::{format_program, NodeId, Tree};
use rand::Rng;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// The statement evaluated around a cut point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementAnchor {
    /// The cut child is itself a statement: evaluate whatever occupies the slot.
    Slot { parent: NodeId, index: usize },
    /// A statement ancestor of the cut point.
    Node(NodeId),
}

impl StatementAnchor {
    pub fn resolve(&self, tree: &Tree) -> Option<NodeId> {
        match *self {
            StatementAnchor::Slot { parent, index } => tree.children(parent).get(index).copied(),
            StatementAnchor::Node(id) => tree.get(id).map(|_| id),
        }
    }
}

/// Result of a semantic selection over `allowed` candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticChoice {
    /// Index into the full candidate list.
    pub index: usize,
    pub mode: SelectionMode,
    pub sampled: usize,
    pub no_change_detected: usize,
    pub type_selected: Option<String>,
    pub equivalence: Option<Equivalence>,
    pub reason: Option<NoOpReason>,
}

impl SemanticChoice {
    fn fallback(index: usize, mode: SelectionMode, sampled: usize) -> Self {
        Self {
            index,
            mode,
            sampled,
            no_change_detected: 0,
            type_selected: None,
            equivalence: None,
            reason: None,
        }
    }
}

pub struct SemanticSelector {
    config: SemanticsConfig,
    statement_symbols: HashSet<String>,
    settings: String,
    next_id: AtomicU64,
}

impl SemanticSelector {
    pub fn new(grammar: &dyn Grammar, config: SemanticsConfig) -> Result<Self> {
        config.validate()?;
        let statement_symbols: HashSet<String> = config
            .statement_groups
            .iter()
            .flat_map(|group| grammar.symbols_in_group(group))
            .map(|symbol| symbol.name.clone())
            .collect();
        if statement_symbols.is_empty() {
            log::warn!(
                "None of the statement groups {:?} exist in the grammar; semantic selection will never find a statement",
                config.statement_groups
            );
        }
        let settings = config.variable_settings.clone();
        Ok(Self {
            config,
            statement_symbols,
            settings,
            next_id: AtomicU64::new(0),
        })
    }

    /// Binds the traced variables to explicit per-case inputs instead of the configured settings.
    pub fn with_input_values(mut self, values: &VariableValues) -> Self {
        self.settings = settings_from_values(values);
        self
    }

    pub fn config(&self) -> &SemanticsConfig {
        &self.config
    }

    pub fn is_statement(&self, tree: &Tree, id: NodeId) -> bool {
        tree.get(id)
            .map(|node| self.statement_symbols.contains(&node.symbol().name))
            .unwrap_or(false)
    }

    /// Nearest statement at or above the slot `index` of `parent`.
    pub fn find_statement(&self, tree: &Tree, parent: NodeId, index: usize) -> Option<StatementAnchor> {
        if let Some(&child) = tree.children(parent).get(index) {
            if self.is_statement(tree, child) {
                return Some(StatementAnchor::Slot { parent, index });
            }
        }
        let mut current = Some(parent);
        while let Some(id) = current {
            if self.is_statement(tree, id) {
                return Some(StatementAnchor::Node(id));
            }
            current = tree.parent(id);
        }
        None
    }

    /// Executes the anchored statement against `before` (the variable values
    /// in effect ahead of the statement), or the configured inputs when absent.
    pub fn evaluate(
        &self,
        tree: &Tree,
        anchor: StatementAnchor,
        evaluator: &mut dyn Evaluator,
        before: Option<&VariableValues>,
    ) -> EvaluationResponse {
        let Some(statement) = anchor.resolve(tree) else {
            return EvaluationResponse::Error("Statement slot is empty".to_string());
        };
        let body = match format_program(tree, statement, self.config.loop_break_const, "    ") {
            Ok(body) => body,
            Err(e) => return EvaluationResponse::Error(e.to_string()),
        };
        let settings = match before {
            Some(values) => Cow::Owned(settings_from_values(values)),
            None => Cow::Borrowed(self.settings.as_str()),
        };
        let variables = self.config.variable_names();
        let request = EvaluationRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            source_text: build_trace_script(&self.config.helper_code, &variables, &settings, &body),
            variable_names: variables,
            timeout_seconds: self.config.timeout_seconds,
        };
        let response = evaluator.evaluate(&request);
        if let EvaluationResponse::Error(message) = &response {
            log::debug!("Evaluation {} failed: {}", request.id, message);
        }
        response
    }

    /// Whether two snapshots agree on every traced variable.
    pub fn equivalence(&self, a: &SemanticSnapshot, b: &SemanticSnapshot) -> Equivalence {
        if a.same_on(b, &self.config.variable_names()) {
            Equivalence::Equivalent
        } else {
            Equivalence::Different
        }
    }

    /// Picks one of `allowed` for the cut point, comparing the `sampled` indices semantically.
    ///
    /// The recipient is restored after every trial graft. A sample that fails
    /// to evaluate is left out of the ranking but stays eligible for the
    /// random pick when no variable changes.
    #[allow(clippy::too_many_arguments)]
    pub fn select<R: Rng>(
        &self,
        recipient: &mut Tree,
        cut: &CutPoint,
        donor: &Tree,
        allowed: &[Option<NodeId>],
        sampled: &[usize],
        evaluator: &mut dyn Evaluator,
        before: Option<&VariableValues>,
        rng: &mut R,
    ) -> Result<SemanticChoice> {
        if sampled.is_empty() || sampled.iter().any(|&i| i >= allowed.len()) {
            return Err(TreegraftError::Configuration(format!(
                "Semantic selection needs sampled indices into {} candidates, got {:?}",
                allowed.len(),
                sampled
            )));
        }
        let Some(anchor) = self.find_statement(recipient, cut.parent, cut.child_index) else {
            let index = sampled[rng.gen_range(0..sampled.len())];
            return Ok(SemanticChoice {
                reason: Some(NoOpReason::NoStatement),
                ..SemanticChoice::fallback(index, SelectionMode::RandomNoStatement, sampled.len())
            });
        };

        let baseline = match self.evaluate(recipient, anchor, evaluator, before) {
            EvaluationResponse::Snapshot(snapshot) => snapshot,
            EvaluationResponse::Error(message) => {
                log::warn!("Baseline evaluation failed ({}); choosing among all candidates", message);
                let index = rng.gen_range(0..allowed.len());
                return Ok(SemanticChoice::fallback(index, SelectionMode::RandomAfterFailures, sampled.len()));
            }
        };

        let mut responses = Vec::with_capacity(sampled.len());
        for &i in sampled {
            let graft = Graft::apply(recipient, cut, donor, allowed[i])?;
            let response = self.evaluate(recipient, anchor, evaluator, before);
            graft.undo(recipient)?;
            responses.push(response);
        }
        let snapshots: Vec<Option<&SemanticSnapshot>> = responses.iter().map(EvaluationResponse::snapshot).collect();

        if snapshots.iter().all(Option::is_none) {
            log::warn!("All {} sampled candidates failed to evaluate", sampled.len());
            let index = rng.gen_range(0..allowed.len());
            return Ok(SemanticChoice::fallback(index, SelectionMode::RandomAfterFailures, sampled.len()));
        }

        let mut groups: BTreeMap<VariableType, Vec<(String, VariableType)>> = BTreeMap::new();
        for variable in &self.config.variables {
            let differs = snapshots
                .iter()
                .flatten()
                .any(|snapshot| baseline.differs_on(snapshot, &variable.name));
            if differs {
                groups
                    .entry(variable.variable_type)
                    .or_default()
                    .push((variable.name.clone(), variable.variable_type));
            }
        }
        let variables = self.config.variable_names();
        let no_change_detected = snapshots
            .iter()
            .flatten()
            .filter(|snapshot| baseline.same_on(snapshot, &variables))
            .count();

        let ranked = if groups.is_empty() {
            None
        } else {
            let types: Vec<VariableType> = groups.keys().copied().collect();
            let chosen_type = types[rng.gen_range(0..types.len())];
            let scores = group_distances(&baseline, &snapshots, &groups[&chosen_type]);
            closest_different(&scores).map(|k| (k, chosen_type))
        };

        let choice = match ranked {
            Some((k, chosen_type)) => {
                let index = sampled[k];
                let equivalence = snapshots[k].map(|s| self.equivalence(&baseline, s));
                SemanticChoice {
                    index,
                    mode: SelectionMode::Semantic,
                    sampled: sampled.len(),
                    no_change_detected,
                    type_selected: Some(chosen_type.to_string()),
                    equivalence,
                    reason: allowed[index].is_none().then_some(NoOpReason::NoSelectedBranch),
                }
            }
            None => {
                let k = rng.gen_range(0..sampled.len());
                let equivalence = snapshots[k].map(|s| self.equivalence(&baseline, s));
                SemanticChoice {
                    no_change_detected,
                    equivalence,
                    ..SemanticChoice::fallback(sampled[k], SelectionMode::RandomNoDifference, sampled.len())
                }
            }
        };
        log::debug!(
            "Semantic selection picked candidate {} of {} ({:?}, {} unchanged)",
            choice.index,
            allowed.len(),
            choice.mode,
            choice.no_change_detected
        );
        Ok(choice)
    }
}
