use super::traits::ConfigSection;
use crate::error::TreegraftError;
use serde::{Deserialize, Serialize};

/// External evaluation service launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub pool_size: usize,
    /// Extra wait on top of the request timeout before the process is presumed hung.
    pub response_grace_seconds: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["python_script_evaluation.py".to_string()],
            pool_size: 4,
            response_grace_seconds: 5.0,
        }
    }
}

impl ConfigSection for EvaluatorConfig {
    fn section_name() -> &'static str {
        "evaluator"
    }

    fn validate(&self) -> Result<(), TreegraftError> {
        if self.command.trim().is_empty() {
            return Err(TreegraftError::Configuration(
                "Evaluator command must not be empty".to_string()
            ));
        }
        if self.pool_size < 1 {
            return Err(TreegraftError::Configuration(
                "Evaluator pool size must be at least 1".to_string()
            ));
        }
        if self.response_grace_seconds < 0.0 || !self.response_grace_seconds.is_finite() {
            return Err(TreegraftError::Configuration(
                "Response grace period must be non-negative".to_string()
            ));
        }
        Ok(())
    }
}
