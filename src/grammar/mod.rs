pub mod symbol;
pub mod table;
pub mod traits;

pub use symbol::Symbol;
pub use table::{ChildRule, GrammarDefinition, TableGrammar};
pub use traits::Grammar;
