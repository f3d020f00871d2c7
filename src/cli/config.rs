//! TOML configuration file support for power users.
//!
//! Instead of passing many CLI flags, export defaults can live in a config
//! file:
//!
//! ```toml
//! # todg3.toml
//! [export]
//! prefix = "so"
//! target_file_size = 100000000
//! use_chunks = true
//! flavors = ["corr"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure for todg3.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Export-specific settings.
    #[serde(default)]
    pub export: ExportSection,
}

/// Configuration for the export commands.
#[derive(Debug, Default, Deserialize)]
pub struct ExportSection {
    /// File name prefix for each frame file.
    pub prefix: Option<String>,

    /// Approximate target size of each frame file, in bytes.
    pub target_file_size: Option<usize>,

    /// Distribute frames by the TOD chunking.
    pub use_chunks: Option<bool>,

    /// Distribute frames by the observation intervals.
    pub use_intervals: Option<bool>,

    /// Extra cache flavors to export.
    pub flavors: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [export]
            prefix = "lat"
            target_file_size = 100000000
            use_chunks = true
            flavors = ["corr", "events"]
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.export.prefix.as_deref(), Some("lat"));
        assert_eq!(config.export.target_file_size, Some(100_000_000));
        assert_eq!(config.export.use_chunks, Some(true));
        assert_eq!(
            config.export.flavors,
            Some(vec!["corr".to_string(), "events".to_string()])
        );
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [export]
            prefix = "act"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.export.prefix.as_deref(), Some("act"));
        assert_eq!(config.export.target_file_size, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.export.prefix, None);
    }
}
