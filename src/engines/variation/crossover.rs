use super::cut_points::{select_branch, select_cut_point, CutPoint};
use super::graft::Graft;
use super::outcome::{CrossoverOutcome, NoOpReason, SelectionMode};
use crate::config::{ConfigSection, OperatorConfig, SemanticsConfig};
use crate::engines::semantics::{Evaluator, SemanticSelector, VariableValues};
use crate::error::Result;
use crate::grammar::Grammar;
use crate::tree::{NodeId, Tree};
use rand::Rng;
use std::sync::Arc;

/// Grammar-constrained subtree crossover, optionally semantic-guided.
pub struct CrossoverEngine {
    grammar: Arc<dyn Grammar>,
    config: OperatorConfig,
    selector: Option<SemanticSelector>,
}

impl CrossoverEngine {
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

    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    pub fn selector(&self) -> Option<&SemanticSelector> {
        self.selector.as_ref()
    }

    /// Replaces a randomly chosen branch of `recipient` with a fitting branch of `donor`.
    ///
    /// `recipient` is modified in place; `donor` is only read. `before` holds
    /// the recipient's variable values ahead of the evaluated statement.
    pub fn crossover<R: Rng>(
        &self,
        recipient: &mut Tree,
        donor: &Tree,
        evaluator: Option<&mut dyn Evaluator>,
        before: Option<&VariableValues>,
        rng: &mut R,
    ) -> Result<CrossoverOutcome> {
        if rng.gen::<f64>() >= self.config.crossover_probability {
            return Ok(CrossoverOutcome::skipped(NoOpReason::Probability));
        }
        let cut = select_cut_point(
            recipient,
            self.grammar.as_ref(),
            &self.config.cut_point_strategy,
            self.config.internal_cut_point_probability,
            self.config.max_tree_length,
            self.config.max_tree_depth,
            rng,
        )?;
        self.cross_at(recipient, donor, &cut, evaluator, before, rng)
    }

    /// Crossover at a given cut point.
    pub fn cross_at<R: Rng>(
        &self,
        recipient: &mut Tree,
        donor: &Tree,
        cut: &CutPoint,
        evaluator: Option<&mut dyn Evaluator>,
        before: Option<&VariableValues>,
        rng: &mut R,
    ) -> Result<CrossoverOutcome> {
        let allowed = self.allowed_branches(recipient, donor, cut)?;

        let mut outcome = CrossoverOutcome {
            cut_point_symbol: Some(match cut.child {
                Some(child) => recipient.symbol(child)?.name.clone(),
                None => recipient.symbol(cut.parent)?.name.clone(),
            }),
            allowed_branches: allowed.len(),
            ..CrossoverOutcome::default()
        };
        if allowed.is_empty() {
            log::debug!(
                "No donor branch fits cut point {:?} of {}",
                outcome.cut_point_symbol,
                recipient
            );
            outcome.reason = Some(NoOpReason::NoAllowedBranch);
            return Ok(outcome);
        }

        let semantic = match (self.config.semantic_guidance, &self.selector, evaluator) {
            (true, Some(selector), Some(evaluator)) => Some((selector, evaluator)),
            (true, _, _) => {
                outcome.reason = Some(NoOpReason::NoSemantics);
                None
            }
            _ => None,
        };

        let index = match semantic {
            Some((selector, evaluator)) => {
                let sampled = self.sample_candidates(donor, &allowed, rng);
                let choice = selector.select(recipient, cut, donor, &allowed, &sampled, evaluator, before, rng)?;
                outcome.sampled_branches = choice.sampled;
                outcome.no_change_detected = choice.no_change_detected;
                outcome.type_selected = choice.type_selected;
                outcome.selection = Some(choice.mode);
                outcome.equivalence = choice.equivalence;
                outcome.reason = choice.reason;
                choice.index
            }
            None => {
                outcome.selection = Some(SelectionMode::Random);
                select_branch(
                    donor,
                    &allowed,
                    &self.config.cut_point_strategy,
                    self.config.internal_cut_point_probability,
                    rng,
                )
                .unwrap_or_else(|| rng.gen_range(0..allowed.len()))
            }
        };

        outcome.removed_branch = cut.child.map(|child| recipient.sexpr(child));
        let graft = Graft::apply(recipient, cut, donor, allowed[index])?;
        outcome.added_branch = graft.inserted().map(|id| recipient.sexpr(id));
        graft.commit(recipient)?;
        outcome.performed = true;

        log::debug!(
            "Crossover at {:?}: {:?} -> {:?} ({} allowed, {:?})",
            outcome.cut_point_symbol,
            outcome.removed_branch,
            outcome.added_branch,
            outcome.allowed_branches,
            outcome.selection
        );
        Ok(outcome)
    }

    /// Donor branches (postfix order) that fit the cut point's budget and type,
    /// followed by `None` when removing the child is legal.
    pub fn allowed_branches(&self, recipient: &Tree, donor: &Tree, cut: &CutPoint) -> Result<Vec<Option<NodeId>>> {
        let grammar = self.grammar.as_ref();
        let child_length = cut.child.map(|c| recipient.subtree_length(c)).unwrap_or(0);
        let max_length = (self.config.max_tree_length + child_length).saturating_sub(recipient.length());
        recipient.node(cut.parent)?;
        let max_depth = self
            .config
            .max_tree_depth
            .saturating_sub(recipient.branch_level(cut.parent) + 1);

        let mut allowed: Vec<Option<NodeId>> = donor
            .postfix(donor.root())
            .into_iter()
            .filter(|&id| {
                donor.subtree_length(id) <= max_length
                    && donor.subtree_depth(id) <= max_depth
                    && cut.accepts(recipient, grammar, donor, Some(id))
            })
            .map(Some)
            .collect();
        if cut.accepts(recipient, grammar, donor, None) {
            allowed.push(None);
        }
        Ok(allowed)
    }

    /// Up to `max_compares` distinct candidate indices, in draw order.
    fn sample_candidates<R: Rng>(&self, donor: &Tree, allowed: &[Option<NodeId>], rng: &mut R) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..allowed.len()).collect();
        if pool.len() <= self.config.max_compares {
            return pool;
        }
        let mut sampled = Vec::with_capacity(self.config.max_compares);
        while sampled.len() < self.config.max_compares && !pool.is_empty() {
            let remaining: Vec<Option<NodeId>> = pool.iter().map(|&i| allowed[i]).collect();
            let k = select_branch(
                donor,
                &remaining,
                &self.config.cut_point_strategy,
                self.config.internal_cut_point_probability,
                rng,
            )
            .unwrap_or_else(|| rng.gen_range(0..pool.len()));
            sampled.push(pool.remove(k));
        }
        sampled
    }
}
