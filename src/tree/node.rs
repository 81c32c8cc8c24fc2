use crate::grammar::Symbol;
use std::fmt;
use std::sync::Arc;

/// Handle of a node inside a [`super::Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tree node. `parent` is a back-reference only; ownership flows through `children`.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) symbol: Arc<Symbol>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub local_parameter: Option<f64>,
}

impl Node {
    pub(crate) fn new(symbol: Arc<Symbol>) -> Self {
        Self {
            symbol,
            children: Vec::new(),
            parent: None,
            local_parameter: None,
        }
    }

    pub fn symbol(&self) -> &Arc<Symbol> {
        &self.symbol
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
