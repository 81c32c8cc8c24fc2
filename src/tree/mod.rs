pub mod arena;
pub mod format;
pub mod node;

pub use arena::Tree;
pub use format::{brackets_to_indent, format_program, to_source};
pub use node::{Node, NodeId};
