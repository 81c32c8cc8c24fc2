pub mod client;
pub mod distance;
pub mod script;
pub mod selector;
pub mod snapshot;

pub use client::{EvaluationRequest, EvaluationResponse, Evaluator, EvaluatorPool, EvaluatorSession, ProcessEvaluator};
pub use selector::{SemanticChoice, SemanticSelector, StatementAnchor};
pub use snapshot::{SemanticSnapshot, VariableType, VariableValues};
