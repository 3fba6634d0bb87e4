pub mod yaml_config;

use crate::analysis::ObfuscationAnalyzer;
use crate::catalog::Catalog;
use crate::confusables::ConfusableTable;
use crate::engine::RiskEngine;
use crate::risk::RiskLevel;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use yaml_config::{load_config, load_config_or_default};

/// Runtime settings for the command-line tools. Every data file is optional;
/// the built-in copy is used when a path is absent.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub confusables_path: Option<PathBuf>,
    #[serde(default)]
    pub legitimate_words_path: Option<PathBuf>,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: RiskLevel,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_alert_threshold() -> RiskLevel {
    RiskLevel::High
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            confusables_path: None,
            legitimate_words_path: None,
            alert_threshold: default_alert_threshold(),
            logging: None,
        }
    }
}

impl EngineConfig {
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::load_from_file(path)
                .with_context(|| format!("Failed to load term catalog: {}", path.display())),
            None => Catalog::builtin().context("Built-in term catalog is invalid"),
        }
    }

    pub fn load_confusables(&self) -> Result<ConfusableTable> {
        match &self.confusables_path {
            Some(path) => ConfusableTable::load_from_file(path)
                .with_context(|| format!("Failed to load confusable table: {}", path.display())),
            None => ConfusableTable::builtin().context("Built-in confusable table is invalid"),
        }
    }

    pub fn load_analyzer(&self) -> Result<ObfuscationAnalyzer> {
        match &self.legitimate_words_path {
            Some(path) => ObfuscationAnalyzer::load_from_file(path)
                .with_context(|| format!("Failed to load legitimate words: {}", path.display())),
            None => ObfuscationAnalyzer::builtin().context("Built-in legitimate words are invalid"),
        }
    }

    pub fn build_engine(&self) -> Result<RiskEngine> {
        let catalog = self.load_catalog()?;
        RiskEngine::new(&catalog, self.load_confusables()?, self.load_analyzer()?)
            .context("Failed to compile term catalog")
    }

    /// Log level named in the file, if it is a valid one.
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.logging
            .as_ref()
            .and_then(|logging| logging.level.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.alert_threshold, RiskLevel::High);
        assert_eq!(config.log_level(), None);
    }

    #[test]
    fn test_full_config_parses() {
        let config: EngineConfig = serde_yaml::from_str(
            r#"
catalog_path: /etc/edit-risk/catalog.yaml
alert_threshold: Medium
logging:
  level: debug
"#,
        )
        .unwrap();
        assert_eq!(
            config.catalog_path,
            Some(PathBuf::from("/etc/edit-risk/catalog.yaml"))
        );
        assert_eq!(config.alert_threshold, RiskLevel::Medium);
        assert_eq!(config.log_level(), Some(log::LevelFilter::Debug));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: std::result::Result<EngineConfig, _> = serde_yaml::from_str("threshold: 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_engine_builds() {
        let engine = EngineConfig::default().build_engine().unwrap();
        assert!(engine.rule_count() > 30);
    }

    #[test]
    fn test_missing_catalog_reports_path() {
        let config = EngineConfig {
            catalog_path: Some(PathBuf::from("/nonexistent/catalog.yaml")),
            ..EngineConfig::default()
        };
        let err = config.build_engine().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/catalog.yaml"));
    }
}
