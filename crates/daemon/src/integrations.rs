// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Third-party tool integrations and the tool patterns they unlock.
//!
//! ```toml
//! [[integration]]
//! id = "plaid"
//! label = "Plaid"
//! enabled = true
//! tool_patterns = ["plaid_*"]
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::runtime_config::RuntimeConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Integration {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tool_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Integrations {
    #[serde(default, rename = "integration")]
    pub entries: Vec<Integration>,
}

impl Integrations {
    /// Built-in catalog, all disabled.
    pub fn builtin() -> Self {
        let entry = |id: &str, label: &str| Integration {
            id: id.to_string(),
            label: label.to_string(),
            enabled: false,
            tool_patterns: vec![format!("{id}_*")],
        };
        Self {
            entries: vec![
                entry("plaid", "Plaid"),
                entry("ibkr", "Interactive Brokers"),
                entry("robinhood", "Robinhood"),
            ],
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path`, falling back to the built-in catalog when absent.
    pub fn load(path: &Path) -> Result<Self, RuntimeConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::builtin()),
            Err(source) => {
                return Err(RuntimeConfigError::Read { path: path.to_path_buf(), source })
            }
        };
        Self::parse(&content)
            .map_err(|source| RuntimeConfigError::Integrations { path: path.to_path_buf(), source })
    }

    /// Tool patterns of enabled integrations, first occurrence order, deduplicated.
    pub fn enabled_tool_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.enabled) {
            for pattern in &entry.tool_patterns {
                if !patterns.contains(pattern) {
                    patterns.push(pattern.clone());
                }
            }
        }
        patterns
    }
}

#[cfg(test)]
#[path = "integrations_tests.rs"]
mod tests;
