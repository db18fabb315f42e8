//! Analysis configuration.
//!
//! Loaded from a TOML file (usually `declgraph.toml`). A missing file yields
//! the defaults so embedders can call [`ModelConfig::load`] unconditionally.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// When the resolver loads the declarations it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Resolution never loads; nodes load when a consumer asks for them.
    #[default]
    Lazy,
    /// Every generic-use target is loaded as soon as it is resolved.
    OnResolve,
}

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Namespaces appended to the using directives of every source declaration.
    pub implicit_usings: Vec<String>,
    /// When resolved declarations get loaded.
    pub load_policy: LoadPolicy,
    /// Depth budget for `deep_load`. `None` means unbounded.
    pub max_load_depth: Option<usize>,
    /// Drop `System.Runtime.CompilerServices` attributes found in metadata.
    pub skip_compiler_attributes: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            implicit_usings: vec!["System".to_string()],
            load_policy: LoadPolicy::Lazy,
            max_load_depth: None,
            skip_compiler_attributes: true,
        }
    }
}

impl ModelConfig {
    /// Load the configuration at `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    #[must_use]
    pub fn with_load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load_policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_load_depth(mut self, depth: usize) -> Self {
        self.max_load_depth = Some(depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.implicit_usings, vec!["System".to_string()]);
        assert_eq!(config.load_policy, LoadPolicy::Lazy);
        assert!(config.max_load_depth.is_none());
        assert!(config.skip_compiler_attributes);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ModelConfig::from_toml("load_policy = \"on_resolve\"\nmax_load_depth = 4\n").unwrap();
        assert_eq!(config.load_policy, LoadPolicy::OnResolve);
        assert_eq!(config.max_load_depth, Some(4));
        assert_eq!(config.implicit_usings, vec!["System".to_string()]);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ModelConfig::from_toml("load_policy = 12").unwrap_err();
        assert!(matches!(err, crate::error::ModelError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig::load(&dir.path().join("declgraph.toml")).unwrap();
        assert_eq!(config, ModelConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("declgraph.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "implicit_usings = [\"System\", \"System.Collections.Generic\"]").unwrap();
        writeln!(file, "skip_compiler_attributes = false").unwrap();

        let config = ModelConfig::load(&path).unwrap();
        assert_eq!(config.implicit_usings.len(), 2);
        assert!(!config.skip_compiler_attributes);
    }
}
