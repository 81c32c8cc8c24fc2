use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

fn default_frequency() -> f64 {
    1.0
}

/// A grammar symbol: a production with a fixed arity window.
///
/// `parts` holds the terminal text fragments of the production. A symbol
/// with `n` parts takes `n - 1` children, rendered between the parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(default)]
    pub min_arity: usize,
    #[serde(default)]
    pub max_arity: usize,
    #[serde(default = "default_frequency")]
    pub initial_frequency: f64,
    #[serde(default)]
    pub has_local_parameters: bool,
    #[serde(default)]
    pub parts: Vec<String>,
}

impl Symbol {
    pub fn new(name: &str, min_arity: usize, max_arity: usize) -> Self {
        Self {
            name: name.to_string(),
            min_arity,
            max_arity,
            initial_frequency: default_frequency(),
            has_local_parameters: false,
            parts: Vec::new(),
        }
    }

    pub fn terminal(name: &str) -> Self {
        Self::new(name, 0, 0)
    }

    /// Production symbol whose arity follows from its text parts.
    pub fn production(name: &str, parts: &[&str]) -> Self {
        let arity = parts.len().saturating_sub(1);
        Self {
            parts: parts.iter().map(|p| p.to_string()).collect(),
            ..Self::new(name, arity, arity)
        }
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.initial_frequency = frequency;
        self
    }

    pub fn with_local_parameters(mut self) -> Self {
        self.has_local_parameters = true;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.max_arity == 0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
