//! Chat history types consumed by the context manager

use serde::{Deserialize, Serialize};

use crate::core::tokens::estimate_tokens;

/// Message role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single message in conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Estimated tokens for an optional system prompt plus every message
pub fn history_tokens(messages: &[Message], system_prompt: Option<&str>) -> usize {
    system_prompt.map_or(0, estimate_tokens)
        + messages.iter().map(|m| estimate_tokens(&m.content)).sum::<usize>()
}
