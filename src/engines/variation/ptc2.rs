//! Probabilistic tree creation (PTC2) under a hard length/depth budget.
//!
//! Growth happens on a private draft. Only a draft that meets the budget is
//! written into the tree, so failed attempts never touch it.

use super::sampling::weighted_index;
use crate::error::{Result, TreegraftError};
use crate::grammar::{Grammar, Symbol};
use crate::tree::{NodeId, Tree};
use rand::Rng;
use std::sync::Arc;

struct DraftNode {
    symbol: Arc<Symbol>,
    children: Vec<Option<usize>>,
    local_parameter: Option<f64>,
}

/// An open argument slot waiting for a subtree.
struct ExtensionPoint {
    parent: usize,
    arg: usize,
    depth_budget: usize,
    min_length: usize,
    max_length: usize,
}

/// Fresh local parameter for symbols that carry one.
pub fn initial_local_parameter<R: Rng>(symbol: &Symbol, rng: &mut R) -> Option<f64> {
    symbol.has_local_parameters.then(|| rng.gen_range(-1.0..=1.0))
}

pub struct Ptc2<'g> {
    grammar: &'g dyn Grammar,
    max_tries: usize,
}

impl<'g> Ptc2<'g> {
    pub fn new(grammar: &'g dyn Grammar, max_tries: usize) -> Self {
        Self {
            grammar,
            max_tries: max_tries.max(1),
        }
    }

    /// Grows children below the childless node `seed` so that the seed's
    /// subtree has at most `max_length` nodes and at most `max_depth` edges.
    pub fn grow<R: Rng>(&self, tree: &mut Tree, seed: NodeId, max_length: usize, max_depth: usize, rng: &mut R) -> Result<()> {
        let seed_node = tree.node(seed)?;
        if !seed_node.is_leaf() {
            return Err(TreegraftError::InvalidTree(format!(
                "Seed {} already has children",
                seed
            )));
        }
        let seed_symbol = seed_node.symbol().clone();

        let min_length = self.grammar.min_expr_length(&seed_symbol);
        let min_depth = self.grammar.min_expr_depth(&seed_symbol);
        if min_length > max_length {
            return Err(TreegraftError::Configuration(format!(
                "Symbol '{}' needs at least {} nodes, budget is {}",
                seed_symbol.name, min_length, max_length
            )));
        }
        if min_depth > max_depth {
            return Err(TreegraftError::Configuration(format!(
                "Symbol '{}' needs depth {}, budget is {}",
                seed_symbol.name, min_depth, max_depth
            )));
        }
        if seed_symbol.max_arity == 0 {
            return Ok(());
        }

        let upper = max_length
            .min(self.grammar.max_expr_length(&seed_symbol, max_depth))
            .max(min_length);

        for attempt in 0..self.max_tries {
            let target = rng.gen_range(min_length..=upper);
            if let Some(draft) = self.try_create(&seed_symbol, target, max_length, max_depth, rng) {
                log::debug!(
                    "PTC2 grew '{}' to {} nodes (target {}) on attempt {}",
                    seed_symbol.name,
                    draft.len(),
                    target,
                    attempt + 1
                );
                return self.materialize(tree, seed, &draft, 0);
            }
        }

        Err(TreegraftError::Generation(format!(
            "PTC2 could not grow '{}' within length {} and depth {} after {} attempts",
            seed_symbol.name, max_length, max_depth, self.max_tries
        )))
    }

    fn try_create<R: Rng>(
        &self,
        seed: &Arc<Symbol>,
        target: usize,
        max_length: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> Option<Vec<DraftNode>> {
        let mut draft = vec![DraftNode {
            symbol: seed.clone(),
            children: Vec::new(),
            local_parameter: None,
        }];
        let mut current_length = 1usize;
        let mut open: Vec<ExtensionPoint> = Vec::new();
        let mut min_open = 0usize;
        let mut max_open = 0usize;

        let arity = self.sample_arity(seed, target.saturating_sub(current_length), max_depth, rng)?;
        for arg in 0..arity {
            let point = self.extension_point(seed, 0, arg, max_depth.saturating_sub(1));
            min_open = min_open.saturating_add(point.min_length);
            max_open = max_open.saturating_add(point.max_length);
            open.push(point);
        }

        while !open.is_empty() && min_open.saturating_add(current_length) < target {
            let point = open.swap_remove(rng.gen_range(0..open.len()));
            min_open = min_open.saturating_sub(point.min_length);
            max_open = max_open.saturating_sub(point.max_length);

            let remaining = target.saturating_sub(current_length).saturating_sub(min_open);
            let parent_symbol = draft[point.parent].symbol.clone();
            let mut symbols: Vec<Arc<Symbol>> = self
                .grammar
                .allowed_child_symbols(&parent_symbol, point.arg)
                .into_iter()
                .filter(|s| {
                    s.initial_frequency > 0.0
                        && self.grammar.min_expr_depth(s) <= point.depth_budget
                        && self.grammar.min_expr_length(s) <= remaining
                })
                .collect();
            if max_open < target.saturating_sub(current_length) {
                let needed = target - current_length - max_open;
                symbols.retain(|s| self.grammar.max_expr_length(s, point.depth_budget) >= needed);
            }

            if symbols.is_empty() {
                let length = self.fill_minimal(&mut draft, point.parent, point.depth_budget, &parent_symbol, point.arg, rng)?;
                current_length += length;
                continue;
            }

            let weights: Vec<f64> = symbols.iter().map(|s| s.initial_frequency).collect();
            let chosen = symbols[weighted_index(&weights, rng)?].clone();
            let node = self.push_node(&mut draft, point.parent, point.arg, chosen.clone(), rng);
            current_length += 1;

            let arity = self.sample_arity(&chosen, target.saturating_sub(current_length), point.depth_budget, rng)?;
            for arg in 0..arity {
                let child_point = self.extension_point(&chosen, node, arg, point.depth_budget.saturating_sub(1));
                min_open = min_open.saturating_add(child_point.min_length);
                max_open = max_open.saturating_add(child_point.max_length);
                open.push(child_point);
            }
        }

        while !open.is_empty() {
            let point = open.swap_remove(rng.gen_range(0..open.len()));
            let parent_symbol = draft[point.parent].symbol.clone();
            let length = self.fill_minimal(&mut draft, point.parent, point.depth_budget, &parent_symbol, point.arg, rng)?;
            current_length += length;
        }

        let complete = draft.iter().all(|n| n.children.iter().all(Option::is_some));
        if !complete || current_length > max_length || self.draft_depth(&draft, 0) > max_depth {
            return None;
        }
        Some(draft)
    }

    /// Slots are filled in pop order, so the argument position is stored explicitly.
    fn push_node<R: Rng>(&self, draft: &mut Vec<DraftNode>, parent: usize, arg: usize, symbol: Arc<Symbol>, rng: &mut R) -> usize {
        let local_parameter = initial_local_parameter(&symbol, rng);
        draft.push(DraftNode {
            symbol,
            children: Vec::new(),
            local_parameter,
        });
        let id = draft.len() - 1;
        let slots = &mut draft[parent].children;
        if slots.len() <= arg {
            slots.resize(arg + 1, None);
        }
        slots[arg] = Some(id);
        id
    }

    fn extension_point(&self, parent_symbol: &Symbol, parent: usize, arg: usize, depth_budget: usize) -> ExtensionPoint {
        let allowed: Vec<Arc<Symbol>> = self
            .grammar
            .allowed_child_symbols(parent_symbol, arg)
            .into_iter()
            .filter(|s| self.grammar.min_expr_depth(s) <= depth_budget)
            .collect();
        ExtensionPoint {
            parent,
            arg,
            depth_budget,
            min_length: allowed
                .iter()
                .map(|s| self.grammar.min_expr_length(s))
                .min()
                .unwrap_or(usize::MAX),
            max_length: allowed
                .iter()
                .map(|s| self.grammar.max_expr_length(s, depth_budget))
                .max()
                .unwrap_or(0),
        }
    }

    /// Arity for `symbol` given the nodes still available below it.
    fn sample_arity<R: Rng>(&self, symbol: &Symbol, available: usize, depth_budget: usize, rng: &mut R) -> Option<usize> {
        let min_arity = self.grammar.min_child_count(symbol);
        let mut max_arity = self.grammar.max_child_count(symbol).min(available);
        if depth_budget == 0 {
            max_arity = 0;
        }
        if min_arity > max_arity {
            // mandatory children stay; the final budget check decides
            return Some(min_arity);
        }

        // shortest completion of the first `k` arguments must fit
        let shortest = |k: usize| -> usize {
            (0..k)
                .map(|arg| {
                    self.grammar
                        .allowed_child_symbols(symbol, arg)
                        .iter()
                        .map(|s| self.grammar.min_expr_length(s))
                        .min()
                        .unwrap_or(usize::MAX)
                })
                .fold(0usize, usize::saturating_add)
        };
        while max_arity > min_arity && shortest(max_arity) > available {
            max_arity -= 1;
        }
        Some(rng.gen_range(min_arity..=max_arity))
    }

    /// Appends the smallest derivation for `arg` below `parent`. Returns its node count.
    fn fill_minimal<R: Rng>(
        &self,
        draft: &mut Vec<DraftNode>,
        parent: usize,
        depth_budget: usize,
        parent_symbol: &Symbol,
        arg: usize,
        rng: &mut R,
    ) -> Option<usize> {
        let candidates: Vec<Arc<Symbol>> = self
            .grammar
            .allowed_child_symbols(parent_symbol, arg)
            .into_iter()
            .filter(|s| self.grammar.min_expr_depth(s) <= depth_budget)
            .collect();
        let shortest = candidates
            .iter()
            .map(|s| self.grammar.min_expr_length(s))
            .min()?;
        if shortest == usize::MAX {
            return None;
        }
        let minimal: Vec<Arc<Symbol>> = candidates
            .into_iter()
            .filter(|s| self.grammar.min_expr_length(s) == shortest)
            .collect();
        let weights: Vec<f64> = minimal.iter().map(|s| s.initial_frequency).collect();
        let index = weighted_index(&weights, rng).unwrap_or_else(|| rng.gen_range(0..minimal.len()));
        let chosen = minimal[index].clone();

        let node = self.push_node(draft, parent, arg, chosen.clone(), rng);
        let mut length = 1;
        for child_arg in 0..self.grammar.min_child_count(&chosen) {
            if depth_budget == 0 {
                return None;
            }
            length += self.fill_minimal(draft, node, depth_budget - 1, &chosen, child_arg, rng)?;
        }
        Some(length)
    }

    fn draft_depth(&self, draft: &[DraftNode], node: usize) -> usize {
        draft[node]
            .children
            .iter()
            .flatten()
            .map(|&c| self.draft_depth(draft, c) + 1)
            .max()
            .unwrap_or(0)
    }

    fn materialize(&self, tree: &mut Tree, target: NodeId, draft: &[DraftNode], node: usize) -> Result<()> {
        for &child in draft[node].children.iter().flatten() {
            let id = tree.add_child(target, draft[child].symbol.clone())?;
            if let Some(n) = tree.get_mut(id) {
                n.local_parameter = draft[child].local_parameter;
            }
            self.materialize(tree, id, draft, child)?;
        }
        Ok(())
    }
}
