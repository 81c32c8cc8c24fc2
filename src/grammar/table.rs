use super::{symbol::Symbol, traits::Grammar};
use crate::error::{Result, TreegraftError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Allowed children for one parent symbol. `index: None` applies the rule to every argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRule {
    pub parent: String,
    #[serde(default)]
    pub index: Option<usize>,
    pub children: Vec<String>,
}

/// Serializable grammar description, the input format of [`TableGrammar`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrammarDefinition {
    pub root: String,
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub rules: Vec<ChildRule>,
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

impl GrammarDefinition {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Self::default()
        }
    }

    pub fn symbol(mut self, symbol: Symbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    pub fn allow(mut self, parent: &str, index: Option<usize>, children: &[&str]) -> Self {
        self.rules.push(ChildRule {
            parent: parent.to_string(),
            index,
            children: children.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn group(mut self, name: &str, members: &[&str]) -> Self {
        self.groups
            .insert(name.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }
}

/// Table-driven grammar with precomputed minimum sizes.
pub struct TableGrammar {
    root: Arc<Symbol>,
    order: Vec<Arc<Symbol>>,
    by_name: HashMap<String, Arc<Symbol>>,
    allowed: HashMap<(String, usize), Vec<Arc<Symbol>>>,
    groups: HashMap<String, Vec<Arc<Symbol>>>,
    min_length: HashMap<String, usize>,
    min_depth: HashMap<String, usize>,
    max_length_memo: Mutex<HashMap<(String, usize), usize>>,
}

impl TableGrammar {
    pub fn new(definition: GrammarDefinition) -> Result<Self> {
        let mut order = Vec::with_capacity(definition.symbols.len());
        let mut by_name = HashMap::new();
        for symbol in definition.symbols {
            if symbol.min_arity > symbol.max_arity {
                return Err(TreegraftError::Grammar(format!(
                    "Symbol '{}' has min arity {} above max arity {}",
                    symbol.name, symbol.min_arity, symbol.max_arity
                )));
            }
            if !symbol.parts.is_empty() && symbol.parts.len() != symbol.max_arity + 1 {
                return Err(TreegraftError::Grammar(format!(
                    "Symbol '{}' has {} text parts for arity {}",
                    symbol.name,
                    symbol.parts.len(),
                    symbol.max_arity
                )));
            }
            if symbol.initial_frequency < 0.0 {
                return Err(TreegraftError::Grammar(format!(
                    "Symbol '{}' has a negative initial frequency",
                    symbol.name
                )));
            }
            let symbol = Arc::new(symbol);
            if by_name.insert(symbol.name.clone(), symbol.clone()).is_some() {
                return Err(TreegraftError::Grammar(format!(
                    "Symbol '{}' is declared twice",
                    symbol.name
                )));
            }
            order.push(symbol);
        }

        let lookup = |name: &str| -> Result<Arc<Symbol>> {
            by_name
                .get(name)
                .cloned()
                .ok_or_else(|| TreegraftError::Grammar(format!("Unknown symbol '{}'", name)))
        };

        let root = lookup(&definition.root)?;

        let mut allowed: HashMap<(String, usize), Vec<Arc<Symbol>>> = HashMap::new();
        for rule in &definition.rules {
            let parent = lookup(&rule.parent)?;
            let indices: Vec<usize> = match rule.index {
                Some(i) if i >= parent.max_arity => {
                    return Err(TreegraftError::Grammar(format!(
                        "Rule for '{}' targets argument {} beyond its arity {}",
                        parent.name, i, parent.max_arity
                    )));
                }
                Some(i) => vec![i],
                None => (0..parent.max_arity).collect(),
            };
            for child_name in &rule.children {
                let child = lookup(child_name)?;
                for &i in &indices {
                    let slot = allowed.entry((parent.name.clone(), i)).or_default();
                    if !slot.iter().any(|s| s.name == child.name) {
                        slot.push(child.clone());
                    }
                }
            }
        }

        let mut groups = HashMap::new();
        for (name, members) in &definition.groups {
            let resolved = members
                .iter()
                .map(|m| lookup(m))
                .collect::<Result<Vec<_>>>()?;
            groups.insert(name.clone(), resolved);
        }

        let mut grammar = Self {
            root,
            order,
            by_name,
            allowed,
            groups,
            min_length: HashMap::new(),
            min_depth: HashMap::new(),
            max_length_memo: Mutex::new(HashMap::new()),
        };
        grammar.compute_minimum_sizes();
        Ok(grammar)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let definition: GrammarDefinition = serde_json::from_str(json)?;
        Self::new(definition)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn root_symbol(&self) -> Arc<Symbol> {
        self.root.clone()
    }

    /// Fixed-point iteration over the minimum length and depth of every symbol.
    fn compute_minimum_sizes(&mut self) {
        for symbol in &self.order {
            self.min_length.insert(symbol.name.clone(), usize::MAX);
            self.min_depth.insert(symbol.name.clone(), usize::MAX);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for symbol in &self.order {
                let (length, depth) = self.minimum_from_children(symbol);
                let entry = self.min_length.entry(symbol.name.clone()).or_insert(usize::MAX);
                if length < *entry {
                    *entry = length;
                    changed = true;
                }
                let entry = self.min_depth.entry(symbol.name.clone()).or_insert(usize::MAX);
                if depth < *entry {
                    *entry = depth;
                    changed = true;
                }
            }
        }

        for symbol in &self.order {
            if self.min_length.get(&symbol.name) == Some(&usize::MAX) {
                log::warn!("Symbol '{}' cannot derive a finite tree", symbol.name);
            }
        }
    }

    fn minimum_from_children(&self, symbol: &Symbol) -> (usize, usize) {
        let mut length = 1usize;
        let mut depth = 0usize;
        for i in 0..symbol.min_arity {
            let candidates = self
                .allowed
                .get(&(symbol.name.clone(), i))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let child_length = candidates
                .iter()
                .map(|c| self.min_length[&c.name])
                .min()
                .unwrap_or(usize::MAX);
            let child_depth = candidates
                .iter()
                .map(|c| self.min_depth[&c.name])
                .min()
                .unwrap_or(usize::MAX);
            if child_length == usize::MAX || child_depth == usize::MAX {
                return (usize::MAX, usize::MAX);
            }
            length = length.saturating_add(child_length);
            depth = depth.max(child_depth + 1);
        }
        (length, depth)
    }
}

impl Grammar for TableGrammar {
    fn symbol(&self, name: &str) -> Option<Arc<Symbol>> {
        self.by_name.get(name).cloned()
    }

    fn symbols(&self) -> Vec<Arc<Symbol>> {
        self.order.clone()
    }

    fn allowed_child_symbols(&self, parent: &Symbol, arg_index: usize) -> Vec<Arc<Symbol>> {
        self.allowed
            .get(&(parent.name.clone(), arg_index))
            .cloned()
            .unwrap_or_default()
    }

    fn min_expr_length(&self, symbol: &Symbol) -> usize {
        self.min_length.get(&symbol.name).copied().unwrap_or(usize::MAX)
    }

    fn min_expr_depth(&self, symbol: &Symbol) -> usize {
        self.min_depth.get(&symbol.name).copied().unwrap_or(usize::MAX)
    }

    fn max_expr_length(&self, symbol: &Symbol, max_depth: usize) -> usize {
        let key = (symbol.name.clone(), max_depth);
        if let Ok(memo) = self.max_length_memo.lock() {
            if let Some(&cached) = memo.get(&key) {
                return cached;
            }
        }

        let length = if symbol.max_arity == 0 {
            1
        } else if max_depth == 0 {
            if symbol.min_arity == 0 {
                1
            } else {
                0
            }
        } else {
            let mut total = 1usize;
            for i in 0..symbol.max_arity {
                let best = self
                    .allowed_child_symbols(symbol, i)
                    .iter()
                    .map(|c| self.max_expr_length(c, max_depth - 1))
                    .max()
                    .unwrap_or(0);
                if best == 0 {
                    // argument cannot be filled; only the mandatory ones matter
                    if i < symbol.min_arity {
                        total = 0;
                    }
                    break;
                }
                total = total.saturating_add(best);
            }
            total
        };

        if let Ok(mut memo) = self.max_length_memo.lock() {
            memo.insert(key, length);
        }
        length
    }

    fn symbols_in_group(&self, group: &str) -> Vec<Arc<Symbol>> {
        self.groups.get(group).cloned().unwrap_or_default()
    }
}
