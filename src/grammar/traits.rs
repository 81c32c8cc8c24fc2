use super::symbol::Symbol;
use std::sync::Arc;

/// Read-only queries over the typing rules of a tree grammar.
///
/// Depths are counted in edges: a terminal has minimum depth 0.
pub trait Grammar: Send + Sync {
    fn symbol(&self, name: &str) -> Option<Arc<Symbol>>;

    fn symbols(&self) -> Vec<Arc<Symbol>>;

    /// Symbols legally placeable at `arg_index` below `parent`, in declaration order.
    fn allowed_child_symbols(&self, parent: &Symbol, arg_index: usize) -> Vec<Arc<Symbol>>;

    fn min_expr_length(&self, symbol: &Symbol) -> usize;

    fn min_expr_depth(&self, symbol: &Symbol) -> usize;

    /// Largest node count a `symbol`-rooted subtree can reach within `max_depth`.
    fn max_expr_length(&self, symbol: &Symbol, max_depth: usize) -> usize;

    /// Members of a named symbol group (e.g. the statement category).
    fn symbols_in_group(&self, group: &str) -> Vec<Arc<Symbol>>;

    fn is_allowed_child(&self, parent: &Symbol, child: &Symbol, arg_index: usize) -> bool {
        self.allowed_child_symbols(parent, arg_index)
            .iter()
            .any(|s| s.name == child.name)
    }

    fn contains_symbol(&self, symbol: &Symbol) -> bool {
        self.symbol(&symbol.name).is_some()
    }

    fn min_child_count(&self, symbol: &Symbol) -> usize {
        symbol.min_arity
    }

    fn max_child_count(&self, symbol: &Symbol) -> usize {
        symbol.max_arity
    }
}
