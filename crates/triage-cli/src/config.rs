//! CLI configuration loading

use anyhow::{bail, Context};
use triage_classifiers::{load_config, TriageConfig};

use crate::cli::Cli;

const REDACTED: &str = "***";

/// Load configuration from the file and environment, then apply CLI overrides
pub fn load(cli: &Cli) -> anyhow::Result<TriageConfig> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            bail!("configuration file not found: {}", path.display());
        }
    }

    let mut config = load_config(cli.config.as_deref()).context("invalid configuration")?;

    if let Some(key) = cli.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        config.service.api_key = Some(key.to_string());
    }

    Ok(config)
}

/// Copy of the configuration that is safe to print
pub fn redacted(config: &TriageConfig) -> TriageConfig {
    let mut config = config.clone();
    if config.service.api_key.is_some() {
        config.service.api_key = Some(REDACTED.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_redacted_hides_key() {
        let mut config = TriageConfig::default();
        config.service.api_key = Some("sk-live-123".to_string());

        let yaml = serde_yaml::to_string(&redacted(&config)).unwrap();
        assert!(!yaml.contains("sk-live-123"));
        assert!(yaml.contains(REDACTED));
        assert_eq!(config.service.api_key.as_deref(), Some("sk-live-123"));
    }

    #[test]
    fn test_redacted_without_key() {
        let config = redacted(&TriageConfig::default());
        assert!(config.service.api_key.is_none());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let cli = Cli::try_parse_from(["triage", "--config", "/nonexistent/triage.yaml", "config"])
            .unwrap();
        assert!(load(&cli).is_err());
    }

    #[test]
    fn test_cli_key_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "service:\n  api_key: from-file\ncache:\n  ttl_ms: 5000").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "triage", "--config", &path, "--api-key", "from-cli", "config",
        ])
        .unwrap();
        let config = load(&cli).unwrap();
        assert_eq!(config.service.credential(), Some("from-cli"));
        assert_eq!(config.cache.ttl_ms, 5000);
    }
}
