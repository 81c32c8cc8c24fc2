//! Attachment points in a recipient tree and the branches that may fill them.

use super::sampling::{biased_pick, weighted_index};
use crate::config::CutPointStrategy;
use crate::error::{Result, TreegraftError};
use crate::grammar::{Grammar, Symbol};
use crate::tree::{NodeId, Tree};
use rand::Rng;
use std::sync::Arc;

/// An existing `(parent, child)` slot, or an empty slot at `child_index == child count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutPoint {
    pub parent: NodeId,
    pub child: Option<NodeId>,
    pub child_index: usize,
}

impl CutPoint {
    pub fn existing(tree: &Tree, child: NodeId) -> Result<Self> {
        let parent = tree.parent(child).ok_or_else(|| {
            TreegraftError::InvalidTree(format!("Node {} has no parent to cut from", child))
        })?;
        let child_index = tree
            .child_index(child)
            .ok_or_else(|| TreegraftError::InvalidTree(format!("Node {} is not a child of {}", child, parent)))?;
        Ok(Self {
            parent,
            child: Some(child),
            child_index,
        })
    }

    pub fn empty_slot(tree: &Tree, parent: NodeId) -> Self {
        Self {
            parent,
            child: None,
            child_index: tree.children(parent).len(),
        }
    }

    pub fn is_empty_slot(&self) -> bool {
        self.child.is_none()
    }

    /// Symbols legally placeable at this point.
    pub fn required_symbols(&self, tree: &Tree, grammar: &dyn Grammar) -> Result<Vec<Arc<Symbol>>> {
        let parent = tree.symbol(self.parent)?;
        Ok(grammar.allowed_child_symbols(parent, self.child_index))
    }

    /// Whether `candidate` (a branch of `donor`, or `None` for "insert nothing") may fill this point.
    ///
    /// Removing is allowed only for the last existing child of a parent above its minimum arity.
    pub fn accepts(&self, tree: &Tree, grammar: &dyn Grammar, donor: &Tree, candidate: Option<NodeId>) -> bool {
        let Some(parent) = tree.get(self.parent) else {
            return false;
        };
        let parent_symbol = parent.symbol();

        let Some(branch) = candidate else {
            return self.child.is_some()
                && grammar.min_child_count(parent_symbol) < parent.child_count()
                && self.child_index + 1 == parent.child_count();
        };

        let Some(root) = donor.get(branch) else {
            return false;
        };
        if !grammar.contains_symbol(root.symbol())
            || !grammar.is_allowed_child(parent_symbol, root.symbol(), self.child_index)
        {
            return false;
        }
        donor.postfix(branch).into_iter().all(|id| {
            let node = &donor[id];
            grammar.contains_symbol(node.symbol())
                && node.child_count() >= grammar.min_child_count(node.symbol())
                && node.child_count() <= grammar.max_child_count(node.symbol())
        })
    }
}

/// Cut points split by whether the current child has children of its own.
/// Empty slots are counted as internal.
#[derive(Debug, Clone, Default)]
pub struct CutPointSet {
    pub internal: Vec<CutPoint>,
    pub leaf: Vec<CutPoint>,
}

impl CutPointSet {
    pub fn len(&self) -> usize {
        self.internal.len() + self.leaf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.leaf.is_empty()
    }

    pub fn all(&self) -> Vec<CutPoint> {
        self.internal.iter().chain(&self.leaf).copied().collect()
    }
}

/// Lists every cut point below non-root nodes that have children, in postfix order.
pub fn enumerate_cut_points(
    tree: &Tree,
    grammar: &dyn Grammar,
    max_branch_length: usize,
    max_branch_depth: usize,
) -> CutPointSet {
    let mut set = CutPointSet::default();
    let root = tree.root();
    for n in tree.postfix(root) {
        if n == root {
            continue;
        }
        let node = &tree[n];
        if node.is_leaf() {
            continue;
        }
        for (i, &child) in node.children().iter().enumerate() {
            if tree.subtree_length(child) <= max_branch_length && tree.subtree_depth(child) <= max_branch_depth {
                let point = CutPoint {
                    parent: n,
                    child: Some(child),
                    child_index: i,
                };
                if tree[child].is_leaf() {
                    set.leaf.push(point);
                } else {
                    set.internal.push(point);
                }
            }
        }
        if node.child_count() < grammar.max_child_count(node.symbol()) {
            set.internal.push(CutPoint::empty_slot(tree, n));
        }
    }
    set
}

/// Draws a cut point according to `strategy`.
pub fn select_cut_point<R: Rng>(
    tree: &Tree,
    grammar: &dyn Grammar,
    strategy: &CutPointStrategy,
    internal_probability: f64,
    max_branch_length: usize,
    max_branch_depth: usize,
    rng: &mut R,
) -> Result<CutPoint> {
    if !(0.0..=1.0).contains(&internal_probability) {
        return Err(TreegraftError::Configuration(format!(
            "Internal cut point probability must be between 0 and 1, got {}",
            internal_probability
        )));
    }

    let set = enumerate_cut_points(tree, grammar, max_branch_length, max_branch_depth);
    let chosen = match strategy {
        CutPointStrategy::PlainRandom => {
            let all = set.all();
            if all.is_empty() {
                None
            } else {
                Some(all[rng.gen_range(0..all.len())])
            }
        }
        CutPointStrategy::ProbabilityWeighted => {
            biased_pick(&set.internal, &set.leaf, internal_probability, rng)
        }
        CutPointStrategy::SymbolWeighted { weights } => {
            let all = set.all();
            let w: Vec<f64> = all
                .iter()
                .map(|p| match p.child {
                    Some(child) => weights.get(&tree[child].symbol().name).copied().unwrap_or(1.0),
                    None => 1.0,
                })
                .collect();
            match weighted_index(&w, rng) {
                Some(i) => Some(all[i]),
                None if !all.is_empty() => Some(all[rng.gen_range(0..all.len())]),
                None => None,
            }
        }
    };

    chosen.ok_or_else(|| {
        TreegraftError::Configuration(format!(
            "Tree {} offers no cut point below its root",
            tree
        ))
    })
}

/// Draws one of `candidates` (donor branches, `None` = empty branch) according to `strategy`.
///
/// Empty branches count as leaves. Under symbol weighting the empty branch is
/// only drawn when no donor branch fits.
pub fn select_branch<R: Rng>(
    donor: &Tree,
    candidates: &[Option<NodeId>],
    strategy: &CutPointStrategy,
    internal_probability: f64,
    rng: &mut R,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    match strategy {
        CutPointStrategy::PlainRandom => Some(rng.gen_range(0..candidates.len())),
        CutPointStrategy::ProbabilityWeighted => {
            let (internal, leaf): (Vec<usize>, Vec<usize>) = (0..candidates.len())
                .partition(|&i| candidates[i].map(|id| !donor[id].is_leaf()).unwrap_or(false));
            biased_pick(&internal, &leaf, internal_probability, rng)
        }
        // symbol weights steer cut points only; donor branches are drawn uniformly
        CutPointStrategy::SymbolWeighted { .. } => {
            let branches: Vec<usize> = (0..candidates.len()).filter(|&i| candidates[i].is_some()).collect();
            if branches.is_empty() {
                Some(rng.gen_range(0..candidates.len()))
            } else {
                Some(branches[rng.gen_range(0..branches.len())])
            }
        }
    }
}
