use super::node::{Node, NodeId};
use crate::error::{Result, TreegraftError};
use crate::grammar::Symbol;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Arena-backed symbolic expression tree.
///
/// Detached subtrees may live in the arena next to the rooted one; they are
/// invisible to `length`, `depth` and traversals from the root until inserted.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
    length: usize,
    depth: usize,
}

impl Tree {
    pub fn new(root_symbol: Arc<Symbol>) -> Self {
        Self {
            nodes: vec![Some(Node::new(root_symbol))],
            free: Vec::new(),
            root: NodeId(0),
            length: 1,
            depth: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node count of the rooted tree.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Edge count from the root to its deepest leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| TreegraftError::InvalidTree(format!("Stale node id {}", id)))
    }

    pub fn symbol(&self, id: NodeId) -> Result<&Arc<Symbol>> {
        self.node(id).map(Node::symbol)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Allocates a parentless node that can later be inserted.
    pub fn new_detached(&mut self, symbol: Arc<Symbol>) -> NodeId {
        self.alloc(Node::new(symbol))
    }

    pub fn add_child(&mut self, parent: NodeId, symbol: Arc<Symbol>) -> Result<NodeId> {
        let index = self.node(parent)?.child_count();
        let child = self.new_detached(symbol);
        self.insert_subtree(parent, index, child)?;
        Ok(child)
    }

    /// True when `ancestor` lies on the parent chain of `node`, or equals it.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.get(id).is_some() && self.is_ancestor(self.root, id)
    }

    pub fn insert_subtree(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        let child_count = self.node(parent)?.child_count();
        let child_node = self.node(child)?;
        if child_node.parent.is_some() || child == self.root {
            return Err(TreegraftError::InvalidTree(format!(
                "Node {} is already attached",
                child
            )));
        }
        if index > child_count {
            return Err(TreegraftError::InvalidTree(format!(
                "Child index {} out of range for {} children",
                index, child_count
            )));
        }
        if self.is_ancestor(child, parent) {
            return Err(TreegraftError::InvalidTree(format!(
                "Inserting {} below {} would create a cycle",
                child, parent
            )));
        }

        if let Some(node) = self.get_mut(parent) {
            node.children.insert(index, child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        self.refresh_metrics();
        Ok(())
    }

    /// Detaches the child at `index`; the subtree stays in the arena.
    pub fn remove_subtree(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let node = self
            .get_mut(parent)
            .ok_or_else(|| TreegraftError::InvalidTree(format!("Stale node id {}", parent)))?;
        if index >= node.children.len() {
            return Err(TreegraftError::InvalidTree(format!(
                "Child index {} out of range for {} children",
                index,
                node.children.len()
            )));
        }
        let child = node.children.remove(index);
        if let Some(node) = self.get_mut(child) {
            node.parent = None;
        }
        self.refresh_metrics();
        Ok(child)
    }

    /// Swaps the child at `index` for `replacement`, returning the detached original.
    pub fn replace_subtree(&mut self, parent: NodeId, index: usize, replacement: NodeId) -> Result<NodeId> {
        let old = self.remove_subtree(parent, index)?;
        if let Err(e) = self.insert_subtree(parent, index, replacement) {
            self.insert_subtree(parent, index, old)?;
            return Err(e);
        }
        Ok(old)
    }

    /// Frees a detached subtree.
    pub fn discard(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if node.parent.is_some() || id == self.root {
            return Err(TreegraftError::InvalidTree(format!(
                "Cannot discard attached node {}",
                id
            )));
        }
        for slot in self.postfix(id) {
            self.nodes[slot.0] = None;
            self.free.push(slot.0);
        }
        Ok(())
    }

    /// Deep-copies `source`'s subtree at `id` into this arena as a detached subtree.
    pub fn copy_subtree_from(&mut self, source: &Tree, id: NodeId) -> Result<NodeId> {
        let original = source.node(id)?;
        let copy = self.alloc(Node {
            symbol: original.symbol.clone(),
            children: Vec::with_capacity(original.children.len()),
            parent: None,
            local_parameter: original.local_parameter,
        });
        for &child in &original.children {
            let child_copy = self.copy_subtree_from(source, child)?;
            if let Some(node) = self.get_mut(child_copy) {
                node.parent = Some(copy);
            }
            if let Some(node) = self.get_mut(copy) {
                node.children.push(child_copy);
            }
        }
        Ok(copy)
    }

    /// Copies the subtree at `id` into a fresh tree rooted at that node.
    pub fn extract(&self, id: NodeId) -> Result<Tree> {
        let symbol = self.symbol(id)?.clone();
        let mut tree = Tree::new(symbol);
        let root = tree.root;
        if let Some(node) = tree.get_mut(root) {
            node.local_parameter = self.node(id)?.local_parameter;
        }
        for &child in self.children(id) {
            let copy = tree.copy_subtree_from(self, child)?;
            let index = tree.children(root).len();
            tree.insert_subtree(root, index, copy)?;
        }
        Ok(tree)
    }

    pub fn subtree_length(&self, id: NodeId) -> usize {
        if self.get(id).is_none() {
            return 0;
        }
        1 + self
            .children(id)
            .iter()
            .map(|&c| self.subtree_length(c))
            .sum::<usize>()
    }

    pub fn subtree_depth(&self, id: NodeId) -> usize {
        self.children(id)
            .iter()
            .map(|&c| self.subtree_depth(c) + 1)
            .max()
            .unwrap_or(0)
    }

    /// Edge count between `id` and the root of the subtree it belongs to.
    pub fn branch_level(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            level += 1;
            current = self.parent(parent);
        }
        level
    }

    pub fn prefix(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.get(current).is_none() {
                continue;
            }
            order.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        order
    }

    pub fn postfix(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        self.collect_postfix(id, &mut order);
        order
    }

    fn collect_postfix(&self, id: NodeId, order: &mut Vec<NodeId>) {
        if self.get(id).is_none() {
            return;
        }
        for &child in self.children(id) {
            self.collect_postfix(child, order);
        }
        order.push(id);
    }

    /// Compares the shape and symbols of two subtrees, possibly across arenas.
    pub fn same_subtree(&self, id: NodeId, other: &Tree, other_id: NodeId) -> bool {
        match (self.get(id), other.get(other_id)) {
            (Some(a), Some(b)) => {
                a.symbol.name == b.symbol.name
                    && a.local_parameter == b.local_parameter
                    && a.children.len() == b.children.len()
                    && a.children
                        .iter()
                        .zip(&b.children)
                        .all(|(&x, &y)| self.same_subtree(x, other, y))
            }
            _ => false,
        }
    }

    pub fn same_structure(&self, other: &Tree) -> bool {
        self.same_subtree(self.root, other, other.root)
    }

    /// S-expression rendering of a subtree, e.g. `(Add X (Neg Y))`.
    pub fn sexpr(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_sexpr(id, &mut out);
        out
    }

    fn write_sexpr(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        if node.children.is_empty() {
            out.push_str(&node.symbol.name);
            return;
        }
        out.push('(');
        out.push_str(&node.symbol.name);
        for &child in &node.children {
            out.push(' ');
            self.write_sexpr(child, out);
        }
        out.push(')');
    }

    pub fn refresh_metrics(&mut self) {
        self.length = self.subtree_length(self.root);
        self.depth = self.subtree_depth(self.root);
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale node id {}", id),
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sexpr(self.root))
    }
}
