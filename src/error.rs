use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreegraftError {
    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Grammar error: {0}")]
    Grammar(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Evaluator error: {0}")]
    Evaluator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TreegraftError>;
