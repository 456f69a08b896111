//! NEXUS context engine
//!
//! Indexes a codebase into semantic nodes, ranks them against a chat
//! request and compresses the result into a model's token budget.

pub mod ai;
pub mod config;
pub mod core;
pub mod error;
pub mod index;

pub use ai::{ContextManager, Message, OptimizedContext, Role, Strategy};
pub use config::Config;
pub use crate::core::corpus::{FileCorpus, FileEntry};
pub use error::{ContextError, Result};
pub use index::{CodeIndex, Indexer};
