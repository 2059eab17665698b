// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.
//!
//! The configuration is an explicit value handed to every [`Graph`] at
//! construction; nested graphs inherit their parent's copy when the owning
//! subgraph node is added. It is usually loaded from a RON file:
//!
//! ```ron
//! (
//!     id_mode: Uuid,
//!     allow_scripts: true,
//!     event_guard: PerLink,
//! )
//! ```
//!
//! [`Graph`]: crate::Graph

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// How fresh node and link identifiers are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdMode {
    /// Per-graph incrementing counters; unique only inside one graph
    #[default]
    Sequential,
    /// Random v4 UUIDs; unique across every graph in the process
    Uuid,
}

/// Re-entry guard applied while an event fans out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventGuard {
    /// A link is traversed at most once per trigger call
    #[default]
    PerLink,
    /// A node receives at most one action per trigger call
    PerNode,
}

/// Which identifiers a remap checks fresh IDs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemapScope {
    /// Only the mapping table built by the current remap call
    #[default]
    Call,
    /// The mapping table plus every ID live in the host graph tree
    Tree,
}

/// Engine-wide settings shared by a graph tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifier generation strategy
    pub id_mode: IdMode,
    /// Whether script nodes may compile code
    pub allow_scripts: bool,
    /// Maximum accepted script length in characters
    pub script_max_len: usize,
    /// Event fan-out re-entry guard
    pub event_guard: EventGuard,
    /// Collision check scope used when cloning
    pub remap_scope: RemapScope,
    /// Seconds added to the graph clock per pass
    pub fixed_time_step: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_mode: IdMode::Sequential,
            allow_scripts: false,
            script_max_len: 256,
            event_guard: EventGuard::PerLink,
            remap_scope: RemapScope::Call,
            fixed_time_step: 0.01,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from RON text
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Load a configuration from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron(&source)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that was read
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// RON parse error
    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON encoding error
    #[error("Failed to encode config: {0}")]
    Encode(#[from] ron::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.id_mode, IdMode::Sequential);
        assert!(!config.allow_scripts);
        assert_eq!(config.script_max_len, 256);
        assert_eq!(config.event_guard, EventGuard::PerLink);
        assert_eq!(config.remap_scope, RemapScope::Call);
    }

    #[test]
    fn test_partial_ron() {
        let config = EngineConfig::from_ron("(id_mode: Uuid, allow_scripts: true)").unwrap();
        assert_eq!(config.id_mode, IdMode::Uuid);
        assert!(config.allow_scripts);
        assert_eq!(config.script_max_len, 256);
    }

    #[test]
    fn test_serialization() {
        let config = EngineConfig {
            event_guard: EventGuard::PerNode,
            remap_scope: RemapScope::Tree,
            ..EngineConfig::default()
        };
        let ron_str = config.to_ron().unwrap();
        let loaded = EngineConfig::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }
}
