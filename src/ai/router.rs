//! Model context-window lookup
//!
//! Resolves an opaque model id to the number of tokens its context window
//! holds, so the context manager can size its budget.

use std::collections::BTreeMap;

/// Window assumed for unknown models
pub const DEFAULT_CONTEXT_WINDOW: usize = 8192;

const KNOWN_WINDOWS: &[(&str, usize)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-32k", 32_768),
    ("gpt-4", 8192),
    ("gpt-4.1", 1_047_576),
    ("gpt-3.5-turbo", 16_385),
    ("o1", 200_000),
    ("o3", 200_000),
    ("claude-3-opus", 200_000),
    ("claude-3-sonnet", 200_000),
    ("claude-3-haiku", 200_000),
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-5-haiku", 200_000),
    ("claude-3-7-sonnet", 200_000),
    ("claude-sonnet-4", 200_000),
    ("claude-opus-4", 200_000),
    ("claude-2", 100_000),
    ("gemini-1.5-pro", 2_097_152),
    ("gemini-1.5-flash", 1_048_576),
    ("gemini-2.0-flash", 1_048_576),
    ("gemini-pro", 32_768),
    ("llama3", 8192),
    ("llama3.1", 128_000),
    ("codellama", 16_384),
    ("mistral", 32_768),
    ("deepseek-coder", 16_384),
    ("qwen2.5-coder", 32_768),
];

/// Context-window table with user overrides merged over the built-ins
#[derive(Debug, Clone)]
pub struct ModelRouter {
    windows: BTreeMap<String, usize>,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl ModelRouter {
    pub fn new(overrides: &BTreeMap<String, usize>) -> Self {
        let mut windows: BTreeMap<String, usize> = KNOWN_WINDOWS
            .iter()
            .map(|(id, size)| (id.to_string(), *size))
            .collect();
        windows.extend(overrides.iter().map(|(id, size)| (id.to_lowercase(), *size)));
        Self { windows }
    }

    /// Exact match, then the longest known prefix, then the default
    pub fn context_window(&self, model: &str) -> usize {
        let model = model.trim().to_lowercase();
        if let Some(size) = self.windows.get(&model) {
            return *size;
        }
        self.windows
            .iter()
            .filter(|(id, _)| model.starts_with(id.as_str()))
            .max_by_key(|(id, _)| id.len())
            .map_or(DEFAULT_CONTEXT_WINDOW, |(_, size)| *size)
    }
}
