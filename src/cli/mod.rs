//! CLI command implementations

pub mod index;
pub mod optimize;
pub mod search;
pub mod theme;
