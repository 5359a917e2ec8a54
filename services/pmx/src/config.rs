use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data_dir: String,
    pub source: SourceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub mock: MockConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Jsonl,
    Search,
    Mock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default = "default_source_path")]
    pub path: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_true")]
    pub trim_outliers: bool,
    #[serde(default = "default_lookback_years")]
    pub lookback_years: u32,
    #[serde(default = "default_property_limit")]
    pub property_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trim_outliers: default_true(),
            lookback_years: default_lookback_years(),
            property_limit: default_property_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_mock_records")]
    pub records: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_invalid_fraction")]
    pub invalid_fraction: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            records: default_mock_records(),
            seed: default_seed(),
            invalid_fraction: default_invalid_fraction(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;
        let config: Config = toml::from_str(&content)
            .context("Failed to parse config TOML")?;
        Ok(config)
    }
}

fn default_source_path() -> String {
    "data/raw".to_string()
}

fn default_index() -> String {
    "_search".to_string()
}

fn default_max_size() -> usize {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_lookback_years() -> u32 {
    3
}

fn default_property_limit() -> usize {
    100
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_mock_records() -> usize {
    2000
}

fn default_seed() -> u64 {
    42
}

fn default_invalid_fraction() -> f64 {
    0.05
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load("../../config/pmx.toml").unwrap();
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.source.kind, SourceKind::Jsonl);
        assert!(config.pipeline.lookback_years > 0);
    }

    #[test]
    fn test_config_defaults() {
        let toml_str = r#"
data_dir = "test_data"
[source]
kind = "mock"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.source.max_size, 5000);
        assert_eq!(config.source.index, "_search");
        assert!(config.pipeline.trim_outliers);
        assert_eq!(config.pipeline.lookback_years, 3);
        assert_eq!(config.pipeline.property_limit, 100);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.mock.seed, 42);
    }

    #[test]
    fn test_config_rejects_unknown_source_kind() {
        let toml_str = r#"
data_dir = "x"
[source]
kind = "mysql"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }
}
