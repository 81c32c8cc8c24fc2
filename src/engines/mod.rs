pub mod semantics;
pub mod variation;
