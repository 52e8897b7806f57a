//! Tracer configuration
//!
//! Every limit the tracer applies while recording is collected in
//! [`TracerConfig`]. Defaults reproduce the reference behaviour; a TOML file
//! passed with `--config` may override any subset of the keys.

use crate::interpreter::constants::DEFAULT_MAX_CALL_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to load a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Objects the graph extractor visits per step
    pub node_budget: usize,
    /// Children inspected per container during traversal
    pub fanout: usize,
    /// Elements shown inline in a container preview
    pub preview_items: usize,
    pub repr_length: usize,
    /// Length of each element inside a container preview
    pub nested_repr_length: usize,
    pub key_repr_length: usize,
    pub argument_repr_length: usize,
    /// Length of each `*args` / `**kwargs` item in a frame's argument list
    pub variadic_repr_length: usize,
    /// Frames walked when building the call-stack view
    pub stack_depth: usize,
    pub max_steps: usize,
    pub max_call_depth: usize,
    pub array_preview_lines: usize,
    pub array_preview_chars: usize,
    /// Chat-completions endpoint used for translation and the assistant
    pub llm_endpoint: String,
    pub translation_timeout_secs: u64,
    pub assistant_timeout_secs: u64,
    /// External program used instead of the endpoint for translations
    pub translator_command: Option<String>,
    /// External program used instead of the endpoint for the assistant
    pub assistant_command: Option<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            node_budget: 500,
            fanout: 30,
            preview_items: 3,
            repr_length: 150,
            nested_repr_length: 25,
            key_repr_length: 15,
            argument_repr_length: 80,
            variadic_repr_length: 30,
            stack_depth: 7,
            max_steps: 10_000,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            array_preview_lines: 10,
            array_preview_chars: 300,
            llm_endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
            translation_timeout_secs: 90,
            assistant_timeout_secs: 120,
            translator_command: None,
            assistant_command: None,
        }
    }
}

impl TracerConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read a TOML file; keys it omits keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TracerConfig::from_toml("node_budget = 20\nfanout = 4\n").unwrap();
        assert_eq!(config.node_budget, 20);
        assert_eq!(config.fanout, 4);
        assert_eq!(config.stack_depth, 7);
        assert_eq!(config.max_steps, 10_000);
        assert!(config.translator_command.is_none());
        assert_eq!(config.translation_timeout_secs, 90);
    }

    #[test]
    fn test_endpoint_override() {
        let config = TracerConfig::from_toml("llm_endpoint = \"http://10.0.0.2:8080/v1/chat/completions\"\nassistant_timeout_secs = 5\n").unwrap();
        assert_eq!(config.llm_endpoint, "http://10.0.0.2:8080/v1/chat/completions");
        assert_eq!(config.assistant_timeout_secs, 5);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(TracerConfig::from_toml("node_budget = \"many\"").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = TracerConfig::load(Path::new("/nonexistent/pytrace.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
