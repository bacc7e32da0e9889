//! Interpreter configuration
//!
//! Loaded from an optional TOML file; every field has a default so a partial
//! file (or none at all) is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum nesting of user function calls
    pub max_recursion_depth: usize,
    /// Largest length an array may reach through auto-extension
    pub max_array_len: usize,
    /// Run the constant folding pass on every loaded module
    pub optimize: bool,
    /// REPL history file; relative paths are resolved against `$HOME`
    pub history_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_recursion_depth: 10_000,
            max_array_len: 1 << 24,
            optimize: true,
            history_file: Some(PathBuf::from(".hermelin_history")),
        }
    }
}

impl Config {
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml(Path::new("x.toml"), "").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file() {
        let config =
            Config::from_toml(Path::new("x.toml"), "max_array_len = 16\noptimize = false\n")
                .unwrap();
        assert_eq!(config.max_array_len, 16);
        assert!(!config.optimize);
        assert_eq!(config.max_recursion_depth, 10_000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml(Path::new("x.toml"), "colour = \"red\"").unwrap_err();
        assert!(err.to_string().starts_with("invalid config x.toml"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/hermelin.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
