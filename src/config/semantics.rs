use super::traits::ConfigSection;
use crate::engines::semantics::VariableType;
use crate::error::TreegraftError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
}

impl VariableSpec {
    pub fn new(name: &str, variable_type: VariableType) -> Self {
        Self {
            name: name.to_string(),
            variable_type,
        }
    }
}

/// What the semantic selector traces and how fragments are evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticsConfig {
    /// Grammar groups whose members count as statements.
    pub statement_groups: Vec<String>,
    pub variables: Vec<VariableSpec>,
    /// Source binding every variable to its list of per-case inputs, e.g. `a = [1, 2]`.
    pub variable_settings: String,
    pub helper_code: String,
    pub loop_break_const: usize,
    pub timeout_seconds: f64,
}

impl Default for SemanticsConfig {
    fn default() -> Self {
        Self {
            statement_groups: [
                "<predefined>",
                "<code>",
                "<statement>",
                "<simple_stmt>",
                "<compound_stmt>",
                "<for>",
                "<call>",
                "<assign>",
            ]
            .iter()
            .map(|g| g.to_string())
            .collect(),
            variables: Vec::new(),
            variable_settings: String::new(),
            helper_code: String::new(),
            loop_break_const: 1500,
            timeout_seconds: 1.0,
        }
    }
}

impl SemanticsConfig {
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }
}

impl ConfigSection for SemanticsConfig {
    fn section_name() -> &'static str {
        "semantics"
    }

    fn validate(&self) -> Result<(), TreegraftError> {
        if self.timeout_seconds <= 0.0 || !self.timeout_seconds.is_finite() {
            return Err(TreegraftError::Configuration(
                "Evaluation timeout must be positive".to_string()
            ));
        }
        let mut seen = HashSet::new();
        for variable in &self.variables {
            if variable.name.trim().is_empty() {
                return Err(TreegraftError::Configuration(
                    "Variable names must not be empty".to_string()
                ));
            }
            if !seen.insert(variable.name.as_str()) {
                return Err(TreegraftError::Configuration(format!(
                    "Variable '{}' is declared twice",
                    variable.name
                )));
            }
        }
        Ok(())
    }
}
