//! Shared plumbing for the `nbflow` binary: notebook loading and configuration.

use anyhow::{anyhow, Context as AnyhowContext, Result};
use nbflow_graph::ConverterConfig;
use std::fs;
use std::path::Path;

mod notebook;

pub use notebook::{load_notebook, parse_notebook};

/// Load converter configuration from a TOML file, or defaults when `None`
pub fn load_config(path: Option<&Path>) -> Result<ConverterConfig> {
    let config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<ConverterConfig>(&raw)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => ConverterConfig::default(),
    };

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {e}"))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        assert_eq!(load_config(None).unwrap(), ConverterConfig::default());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[export]\ninput_placeholder = \"data\"\n\n[analyzer]\nenable_stub_evaluation = false").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.export.input_placeholder, "data");
        assert!(!config.analyzer.enable_stub_evaluation);
        assert_eq!(config.layout.spacing_x, 800.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[layout]\nspacing_x = 0.0").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("spacing_x"));
    }
}
