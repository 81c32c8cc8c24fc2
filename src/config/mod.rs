pub mod evaluator;
pub mod manager;
pub mod operators;
pub mod semantics;
pub mod traits;

pub use evaluator::EvaluatorConfig;
pub use manager::{AppConfig, ConfigManager};
pub use operators::{CutPointStrategy, OperatorConfig};
pub use semantics::{SemanticsConfig, VariableSpec};
pub use traits::ConfigSection;
