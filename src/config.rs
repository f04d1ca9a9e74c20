//! Configuration types for dataset-dl
//!
//! The library takes no command-line arguments; the embedding application
//! parses whatever surface it wants and hands over a [`Config`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for [`DatasetFetcher`](crate::DatasetFetcher)
///
/// All fields have serde defaults, so a partial JSON document (or
/// `Config::default()` plus struct-update syntax) is enough to get going.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Path to the tab-separated `(caption, url)` dataset, no header row
    /// (default: "dataset.tsv")
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Root directory for downloaded media; each shard writes into a
    /// subdirectory named by its shard id (default: "images")
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Directory for per-shard provenance files (default: "correspondance")
    #[serde(default = "default_correspondance_dir")]
    pub correspondance_dir: PathBuf,

    /// Number of shards to partition the dataset into (default: 40)
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// Maximum number of shard workers active at once (default: 5)
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Expected total row count, used only for shard-size arithmetic; a
    /// mismatch with the actual dataset is caught by the planner's
    /// consistency check (default: 3318333)
    #[serde(default = "default_expected_rows")]
    pub expected_rows: usize,

    /// Per-request timeout in seconds, covering connect and transfer, so a
    /// single unreachable host cannot stall a shard indefinitely
    /// (default: 1)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// User-Agent header for outgoing requests (None = reqwest's default)
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            image_dir: default_image_dir(),
            correspondance_dir: default_correspondance_dir(),
            shard_count: default_shard_count(),
            max_parallel: default_max_parallel(),
            expected_rows: default_expected_rows(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: None,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Validate settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(Error::Config {
                message: "shard_count must be nonzero".to_string(),
                key: Some("shard_count".to_string()),
            });
        }
        if self.max_parallel == 0 {
            return Err(Error::Config {
                message: "max_parallel must be nonzero".to_string(),
                key: Some("max_parallel".to_string()),
            });
        }
        Ok(())
    }

    /// Per-request timeout as a [`Duration`]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Dataset file stem, used to name per-shard provenance files
    pub fn dataset_stem(&self) -> String {
        self.dataset_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string()
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("dataset.tsv")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_correspondance_dir() -> PathBuf {
    PathBuf::from("correspondance")
}

fn default_shard_count() -> usize {
    40
}

fn default_max_parallel() -> usize {
    5
}

fn default_expected_rows() -> usize {
    3_318_333
}

fn default_fetch_timeout_secs() -> u64 {
    1
}
