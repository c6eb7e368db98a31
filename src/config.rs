//! Run configuration: built-in defaults, optionally overridden by a CONL file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "wad-catalog.conl";

const LISTING_FILE: &str = "cacowards_raw.json";
const LISTING_CACHE_FILE: &str = ".cacowards_cache.json";
const METADATA_FILE: &str = "wads_metadata.json";
const METADATA_CACHE_FILE: &str = ".metadata_cache.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub start_year: i32,
    pub end_year: i32,
    pub request_delay_ms: u64,
    pub checkpoint_every: usize,
    pub wiki_base: String,
    pub archive_api: String,
    pub user_agent: String,
    pub data_dir: PathBuf,
    pub entries_dir: PathBuf,
    pub mirrors: Vec<String>,
    pub description_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_year: 2004,
            end_year: 2024,
            request_delay_ms: 1000,
            checkpoint_every: 10,
            wiki_base: "https://doomwiki.org".to_string(),
            archive_api: "https://www.doomworld.com/idgames/api/api.php".to_string(),
            user_agent: "CacowardsCollector/1.0".to_string(),
            data_dir: PathBuf::from("data"),
            entries_dir: PathBuf::from("content/wads"),
            mirrors: vec![
                "https://youfailit.net/pub/idgames/".to_string(),
                "https://www.quaddicted.com/files/idgames/".to_string(),
                "https://www.gamers.org/pub/idgames/".to_string(),
            ],
            description_limit: 500,
        }
    }
}

impl Config {
    /// Load from an explicit path, else from `wad-catalog.conl` if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_conl(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_conl(content: &str) -> Result<Self> {
        let config: Config = serde_conl::from_str(content)?;
        if config.start_year > config.end_year {
            anyhow::bail!(
                "start_year {} is after end_year {}",
                config.start_year,
                config.end_year
            );
        }
        Ok(config)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn index_url(&self, year: i32) -> String {
        format!("{}/wiki/Cacowards_{}", self.wiki_base, year)
    }

    pub fn listing_path(&self) -> PathBuf {
        self.data_dir.join(LISTING_FILE)
    }

    pub fn listing_cache_path(&self) -> PathBuf {
        self.data_dir.join(LISTING_CACHE_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    pub fn metadata_cache_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_CACHE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.start_year, 2004);
        assert_eq!(config.end_year, 2024);
        assert_eq!(config.mirrors.len(), 3);
        assert_eq!(
            config.index_url(2016),
            "https://doomwiki.org/wiki/Cacowards_2016"
        );
        assert_eq!(config.listing_path(), PathBuf::from("data/cacowards_raw.json"));
    }

    #[test]
    fn test_partial_conl_keeps_defaults() {
        let config = Config::from_conl("start_year = 2010\nrequest_delay_ms = 0\n").unwrap();
        assert_eq!(config.start_year, 2010);
        assert_eq!(config.end_year, 2024);
        assert_eq!(config.request_delay(), Duration::ZERO);
        assert_eq!(config.checkpoint_every, 10);
    }

    #[test]
    fn test_conl_mirror_list() {
        let content = "mirrors\n  = https://a.example/idgames/\n  = https://b.example/idgames/\n";
        let config = Config::from_conl(content).unwrap();
        assert_eq!(
            config.mirrors,
            vec![
                "https://a.example/idgames/".to_string(),
                "https://b.example/idgames/".to_string()
            ]
        );
    }

    #[test]
    fn test_inverted_year_range_rejected() {
        assert!(Config::from_conl("start_year = 2020\nend_year = 2010\n").is_err());
    }
}
