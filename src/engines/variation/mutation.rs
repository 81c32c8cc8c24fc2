use super::outcome::{MutationKind, MutationOutcome, NoOpReason};
use super::ptc2::{initial_local_parameter, Ptc2};
use super::sampling::weighted_index;
use crate::config::{ConfigSection, OperatorConfig, SemanticsConfig};
use crate::engines::semantics::{EvaluationResponse, Evaluator, SemanticSelector, VariableValues};
use crate::error::{Result, TreegraftError};
use crate::grammar::{Grammar, Symbol};
use crate::tree::{NodeId, Tree};
use rand::Rng;
use std::sync::Arc;

/// A freshly grown replacement for one child, not yet committed.
struct Replacement {
    parent: NodeId,
    index: usize,
    old: NodeId,
    new: NodeId,
    cut_point_symbol: String,
    removed_branch: String,
}

impl Replacement {
    fn undo(self, tree: &mut Tree) -> Result<()> {
        let new = tree.replace_subtree(self.parent, self.index, self.old)?;
        tree.discard(new)
    }

    fn commit(self, tree: &mut Tree, kind: MutationKind, attempts: usize, semantic_tries: usize) -> Result<MutationOutcome> {
        let added_branch = tree.sexpr(self.new);
        tree.discard(self.old)?;
        Ok(MutationOutcome {
            kind,
            cut_point_symbol: Some(self.cut_point_symbol),
            removed_branch: Some(self.removed_branch),
            added_branch: Some(added_branch),
            attempts,
            semantic_tries,
            reason: None,
        })
    }
}

/// Replaces a random child with a freshly grown subtree, optionally until
/// its enclosing statement behaves differently.
pub struct MutationEngine {
    grammar: Arc<dyn Grammar>,
    config: OperatorConfig,
    selector: Option<SemanticSelector>,
}

impl MutationEngine {
    pub fn new(grammar: Arc<dyn Grammar>, config: OperatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            grammar,
            config,
            selector: None,
        })
    }

    pub fn with_semantics(self, semantics: SemanticsConfig) -> Result<Self> {
        let selector = SemanticSelector::new(self.grammar.as_ref(), semantics)?;
        Ok(self.with_selector(selector))
    }

    pub fn with_selector(mut self, selector: SemanticSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn mutate<R: Rng>(
        &self,
        tree: &mut Tree,
        mut evaluator: Option<&mut dyn Evaluator>,
        before: Option<&VariableValues>,
        rng: &mut R,
    ) -> Result<MutationOutcome> {
        let root = tree.root();
        let parents: Vec<NodeId> = tree
            .prefix(root)
            .into_iter()
            .filter(|&n| n != root && !tree[n].is_leaf())
            .collect();
        if parents.is_empty() {
            log::debug!("No mutation point in {}", tree);
            return Ok(MutationOutcome::unchanged(0, 0, NoOpReason::NoMutationPoint));
        }

        let selector = if self.config.semantic_guidance {
            self.selector.as_ref()
        } else {
            None
        };
        let semantic_budget = self.config.max_compares;
        let mut semantic_tries = 0;

        for attempt in 1..=self.config.max_tries {
            let parent = parents[rng.gen_range(0..parents.len())];
            let index = rng.gen_range(0..tree.children(parent).len());
            let Some(replacement) = self.try_replace(tree, parent, index, rng)? else {
                continue;
            };

            let semantic = match (selector, evaluator.as_deref_mut()) {
                (Some(selector), Some(evaluator)) if semantic_tries < semantic_budget => Some((selector, evaluator)),
                _ => None,
            };
            let Some((selector, evaluator)) = semantic else {
                return replacement.commit(tree, MutationKind::Random, attempt, semantic_tries);
            };

            let Some(anchor) = selector.find_statement(tree, parent, index) else {
                log::debug!("Mutation point has no enclosing statement; keeping plain mutation");
                return replacement.commit(tree, MutationKind::Random, attempt, semantic_tries);
            };

            // baseline runs against the original child, swapped back in temporarily
            let candidate = tree.replace_subtree(parent, index, replacement.old)?;
            let baseline = selector.evaluate(tree, anchor, evaluator, before);
            tree.replace_subtree(parent, index, candidate)?;

            let EvaluationResponse::Snapshot(baseline) = baseline else {
                log::warn!("Baseline evaluation failed; keeping plain mutation");
                return replacement.commit(tree, MutationKind::Random, attempt, semantic_tries);
            };

            let changed = match selector.evaluate(tree, anchor, evaluator, before) {
                EvaluationResponse::Snapshot(snapshot) => !baseline.same_on(&snapshot, &selector.config().variable_names()),
                EvaluationResponse::Error(_) => false,
            };
            if changed {
                return replacement.commit(tree, MutationKind::Semantic, attempt, semantic_tries);
            }
            replacement.undo(tree)?;
            semantic_tries += 1;
        }

        log::debug!(
            "Mutation gave up after {} attempts ({} semantic tries)",
            self.config.max_tries,
            semantic_tries
        );
        Ok(MutationOutcome::unchanged(self.config.max_tries, semantic_tries, NoOpReason::NoAllowedSymbol))
    }

    /// Grows a new subtree in place of child `index` of `parent`, or `None`
    /// when no symbol fits that slot.
    fn try_replace<R: Rng>(&self, tree: &mut Tree, parent: NodeId, index: usize, rng: &mut R) -> Result<Option<Replacement>> {
        let grammar = self.grammar.as_ref();
        let child = tree.children(parent)[index];
        let child_symbol = tree.symbol(child)?.clone();
        let parent_symbol = tree.symbol(parent)?.clone();

        let max_length = (self.config.max_tree_length + tree.subtree_length(child)).saturating_sub(tree.length());
        let max_depth = self.config.max_tree_depth.saturating_sub(tree.branch_level(child));

        let candidates: Vec<Arc<Symbol>> = grammar
            .allowed_child_symbols(&parent_symbol, index)
            .into_iter()
            .filter(|s| {
                (s.name != child_symbol.name || grammar.min_child_count(s) > 0)
                    && s.initial_frequency > 0.0
                    && grammar.min_expr_depth(s) <= max_depth
                    && grammar.min_expr_length(s) <= max_length
            })
            .collect();
        let weights: Vec<f64> = candidates.iter().map(|s| s.initial_frequency).collect();
        let Some(chosen) = weighted_index(&weights, rng) else {
            return Ok(None);
        };
        let symbol = candidates[chosen].clone();

        let seed = tree.new_detached(symbol.clone());
        if let Some(node) = tree.get_mut(seed) {
            node.local_parameter = initial_local_parameter(&symbol, rng);
        }
        match Ptc2::new(grammar, self.config.max_tries).grow(tree, seed, max_length, max_depth, rng) {
            Ok(()) => {}
            Err(TreegraftError::Generation(message)) => {
                log::debug!("{}", message);
                tree.discard(seed)?;
                return Ok(None);
            }
            Err(e) => {
                tree.discard(seed)?;
                return Err(e);
            }
        }

        let removed_branch = tree.sexpr(child);
        let old = tree.replace_subtree(parent, index, seed)?;
        Ok(Some(Replacement {
            parent,
            index,
            old,
            new: seed,
            cut_point_symbol: child_symbol.name.clone(),
            removed_branch,
        }))
    }
}
