pub mod config;
pub mod engines;
pub mod error;
pub mod grammar;
pub mod tree;

pub use error::{Result, TreegraftError};
