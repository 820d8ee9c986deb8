use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::registry::{crates_io, maven, npm, pypi};

/// Root configuration structure, deserialized from `.license-ledger/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub enrichment: EnrichmentConfig,
}

/// How upstream registries are reached.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Per-request timeout; a stalled registry fails the step, not the batch.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub npm_url: String,
    pub maven_url: String,
    pub pypi_url: String,
    pub crates_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("license-ledger/", env!("CARGO_PKG_VERSION")).to_string(),
            npm_url: npm::DEFAULT_URL.to_string(),
            maven_url: maven::DEFAULT_URL.to_string(),
            pypi_url: pypi::DEFAULT_URL.to_string(),
            crates_url: crates_io::DEFAULT_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Libraries enriched concurrently per chunk.
    pub batch_size: usize,
    /// Append failed lookups to the library's error log.
    pub record_errors: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: 75,
            record_errors: false,
        }
    }
}

fn read(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    debug!("Loaded config {}", path.display());
    Ok(config)
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<dir>/.license-ledger/config.toml`
/// 3. `~/.config/license-ledger/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(dir: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read(path);
    }

    let project_config = dir.join(".license-ledger").join("config.toml");
    if project_config.exists() {
        return read(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-ledger")
            .join("config.toml");
        if home_config.exists() {
            return read(&home_config);
        }
    }

    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[registry]\ntimeout_secs = 3\nnpm_url = \"http://localhost:4873/\"\n\n[enrichment]\nrecord_errors = true"
        )
        .unwrap();

        let config = load_config(Path::new("."), Some(file.path())).unwrap();
        assert_eq!(config.registry.timeout_secs, 3);
        assert_eq!(config.registry.npm_url, "http://localhost:4873/");
        assert_eq!(config.registry.maven_url, maven::DEFAULT_URL);
        assert!(config.enrichment.record_errors);
        assert_eq!(config.enrichment.batch_size, 75);
    }

    #[test]
    fn test_project_config_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".license-ledger");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "[enrichment]\nbatch_size = 5\n").unwrap();

        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.enrichment.batch_size, 5);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[registry]\ntimeout_secs = \"soon\"").unwrap();
        assert!(load_config(Path::new("."), Some(file.path())).is_err());
    }
}
