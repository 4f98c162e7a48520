// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime config: the file the supervised runtime reads.
//!
//! Derived from the operator's base config plus one `agents.list` entry per
//! registered agent and the enabled integrations' tool patterns. The runtime
//! watches the file and is expected to pick up a rewrite within 1s; callers
//! that need a guaranteed reload restart the runtime.

use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use warden_core::{AgentId, StateLayout};

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("invalid integrations file {}: {source}", path.display())]
    Integrations { path: PathBuf, source: toml::de::Error },

    #[error("base config: {0}")]
    Shape(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operator-supplied base configuration and the directory its relative paths
/// are anchored to.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseConfig {
    value: Map<String, Value>,
    dir: PathBuf,
}

impl BaseConfig {
    pub fn new(value: Value, dir: impl Into<PathBuf>) -> Result<Self, RuntimeConfigError> {
        match value {
            Value::Object(value) => Ok(Self { value, dir: dir.into() }),
            _ => Err(RuntimeConfigError::Shape("top level must be an object")),
        }
    }

    /// An empty base config anchored at `dir`.
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self { value: Map::new(), dir: dir.into() }
    }

    /// Load from `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, RuntimeConfigError> {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::empty(dir)),
            Err(source) => {
                return Err(RuntimeConfigError::Read { path: path.to_path_buf(), source })
            }
        };
        let value = serde_json::from_str(&content)
            .map_err(|source| RuntimeConfigError::Parse { path: path.to_path_buf(), source })?;
        Self::new(value, dir)
    }
}

/// Build the runtime config.
///
/// Pure and deterministic: the same inputs always give the same document.
pub fn build<'a>(
    base: &BaseConfig,
    layout: &StateLayout,
    agents: impl IntoIterator<Item = &'a AgentId>,
    tool_patterns: &[String],
) -> Result<Value, RuntimeConfigError> {
    let mut config = base.value.clone();
    for value in config.values_mut() {
        resolve_paths(value, &base.dir);
    }

    let agents_obj = config
        .entry("agents")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or(RuntimeConfigError::Shape("`agents` must be an object"))?;
    let list = agents_obj
        .entry("list")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or(RuntimeConfigError::Shape("`agents.list` must be an array"))?;

    let mut ids: Vec<&AgentId> = agents.into_iter().collect();
    ids.sort();
    ids.dedup();
    for id in ids {
        let present =
            list.iter().any(|entry| entry.get("id").and_then(Value::as_str) == Some(id.as_str()));
        if present {
            continue;
        }
        list.push(json!({
            "id": id.as_str(),
            "agentDir": layout.agent_dir(id).display().to_string(),
            "workspace": layout.workspace_dir(id).display().to_string(),
        }));
    }

    if tool_patterns.is_empty() {
        if let Some(Value::Object(tools)) = config.get_mut("tools") {
            tools.remove("allow");
            if tools.is_empty() {
                config.remove("tools");
            }
        }
    } else {
        let tools = config
            .entry("tools")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or(RuntimeConfigError::Shape("`tools` must be an object"))?;
        tools.insert("allow".to_string(), json!(tool_patterns));
    }

    Ok(Value::Object(config))
}

/// Atomically replace the file at `path` with `config`.
pub fn write(path: &Path, config: &Value) -> Result<(), RuntimeConfigError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut staged, config)?;
    std::io::Write::write_all(&mut staged, b"\n")?;
    staged.persist(path).map_err(|e| e.error)?;
    tracing::debug!(path = %path.display(), "runtime config written");
    Ok(())
}

fn resolve_paths(value: &mut Value, base_dir: &Path) {
    match value {
        Value::String(s) if s.starts_with("./") || s.starts_with("../") => {
            *s = normalize(&base_dir.join(s.as_str())).display().to_string();
        }
        Value::Array(items) => items.iter_mut().for_each(|v| resolve_paths(v, base_dir)),
        Value::Object(map) => map.values_mut().for_each(|v| resolve_paths(v, base_dir)),
        _ => {}
    }
}

/// Lexically fold `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
#[path = "runtime_config_tests.rs"]
mod tests;
