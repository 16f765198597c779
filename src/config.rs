//! Runtime configuration, loaded from TOML. Every section has defaults so an
//! empty file is a valid configuration.
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MarketConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Discard the database when the last handle drops.
    pub temporary: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("agro-market.db"),
            temporary: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Prefix of stored image urls, relative to the served root.
    pub dir: String,
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

impl MarketConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("invalid marketplace config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to serialise config")
    }

    /// Config for tests and demos: a throwaway database, defaults elsewhere.
    pub fn ephemeral() -> Self {
        Self {
            store: StoreConfig {
                temporary: true,
                ..StoreConfig::default()
            },
            ..Self::default()
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let p = &self.pagination;
        if p.default_page_size == 0 || p.max_page_size == 0 {
            anyhow::bail!("page sizes must be positive");
        }
        if p.default_page_size > p.max_page_size {
            anyhow::bail!(
                "default_page_size {} exceeds max_page_size {}",
                p.default_page_size,
                p.max_page_size
            );
        }
        if self.uploads.max_bytes == 0 {
            anyhow::bail!("uploads.max_bytes must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = MarketConfig::from_toml("").unwrap();
        assert_eq!(config, MarketConfig::default());
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.uploads.max_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = MarketConfig::from_toml(
            r#"
            [store]
            path = "/var/lib/agro/market.db"

            [pagination]
            max_page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.store.path, PathBuf::from("/var/lib/agro/market.db"));
        assert!(!config.store.temporary);
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.pagination.max_page_size, 50);
    }

    #[test]
    fn inconsistent_page_sizes_are_rejected() {
        let err = MarketConfig::from_toml(
            r#"
            [pagination]
            default_page_size = 200
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = MarketConfig::ephemeral();
        let text = config.to_toml().unwrap();
        assert_eq!(MarketConfig::from_toml(&text).unwrap(), config);
    }
}
