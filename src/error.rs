//! Error taxonomy for the context engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Error, Debug)]
pub enum ContextError {
    /// No user-authored message to analyze
    #[error("intent error: {0}")]
    Intent(String),

    /// A single file could not be turned into nodes
    #[error("extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("index build failed: {0}")]
    IndexBuild(String),

    #[error("optimization failed: {0}")]
    Optimization(String),
}

impl ContextError {
    pub fn extraction(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
