use super::traits::{check_probability, ConfigSection};
use crate::error::TreegraftError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Budgets and knobs shared by the crossover and mutation engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub max_tree_length: usize,
    pub max_tree_depth: usize,
    pub internal_cut_point_probability: f64,
    pub crossover_probability: f64,
    pub max_compares: usize,
    pub max_tries: usize,
    pub semantic_guidance: bool,
    pub cut_point_strategy: CutPointStrategy,
}

/// How cut points (and donor branches) are drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CutPointStrategy {
    /// Uniform over every candidate.
    PlainRandom,
    /// Internal bucket with `internal_cut_point_probability`, else leaf bucket.
    ProbabilityWeighted,
    /// Cut points proportional to a per-symbol weight; unlisted symbols weigh
    /// 1.0. Donor branches are drawn uniformly among the non-empty ones.
    SymbolWeighted { weights: HashMap<String, f64> },
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            max_tree_length: 100,
            max_tree_depth: 10,
            internal_cut_point_probability: 0.9,
            crossover_probability: 1.0,
            max_compares: 10,
            max_tries: 100,
            semantic_guidance: false,
            cut_point_strategy: CutPointStrategy::ProbabilityWeighted,
        }
    }
}

impl ConfigSection for OperatorConfig {
    fn section_name() -> &'static str {
        "operators"
    }

    fn validate(&self) -> Result<(), TreegraftError> {
        if self.max_tree_length < 1 {
            return Err(TreegraftError::Configuration(
                "Maximum tree length must be at least 1".to_string()
            ));
        }
        check_probability("Internal cut point probability", self.internal_cut_point_probability)?;
        check_probability("Crossover probability", self.crossover_probability)?;
        if self.max_compares < 1 {
            return Err(TreegraftError::Configuration(
                "Maximum compares must be at least 1".to_string()
            ));
        }
        if self.max_tries < 1 {
            return Err(TreegraftError::Configuration(
                "Maximum tries must be at least 1".to_string()
            ));
        }
        if let CutPointStrategy::SymbolWeighted { weights } = &self.cut_point_strategy {
            if let Some((name, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
                return Err(TreegraftError::Configuration(format!(
                    "Weight for symbol '{}' must be a non-negative number, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}
