//! Configuration system.
//!
//! Hierarchical loading:
//! - `reiz.toml` in the working directory
//! - environment variables with the `REIZ_` prefix
//!   (`REIZ_DATABASE__DSN=http://db:10702`)
//!
//! Every field has a default, so an empty environment still produces a
//! usable configuration.

use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "reiz.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base URL of the backend's HTTP endpoint
    pub dsn: String,
    pub database: String,
    /// Idle connections the pool keeps alive
    pub pool_size: usize,
    /// Per-request timeout in seconds
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the checked-out project sources
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// 0 means `cpus / 2 + 1`
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub fast_mode: bool,
    /// Byte threshold above which fast mode skips a file
    #[serde(default = "default_fast_threshold")]
    pub fast_mode_threshold: usize,
    /// Stop after this many inserted files, across all projects
    #[serde(default)]
    pub hard_limit: Option<usize>,
    #[serde(default)]
    pub max_files_per_project: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_query_limit")]
    pub default_limit: u64,
}

fn default_fast_threshold() -> usize {
    6400
}

fn default_query_limit() -> u64 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> DatabaseConfig {
        DatabaseConfig {
            dsn: "http://localhost:10702".to_owned(),
            database: "reiz".to_owned(),
            pool_size: 8,
            timeout: 60,
        }
    }
}

impl Default for DataConfig {
    fn default() -> DataConfig {
        DataConfig {
            path: PathBuf::from("./rawdata"),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> IngestConfig {
        IngestConfig {
            workers: 0,
            fast_mode: false,
            fast_mode_threshold: default_fast_threshold(),
            hard_limit: None,
            max_files_per_project: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> QueryConfig {
        QueryConfig {
            default_limit: default_query_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            database: DatabaseConfig::default(),
            data: DataConfig::default(),
            ingest: IngestConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Config {
    /// Load `reiz.toml` merged with `REIZ_*` environment overrides.
    pub fn load() -> Result<Config, figment::Error> {
        Config::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Config, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("REIZ_").split("__"))
            .extract()
    }

    /// Resolved ingest worker count.
    pub fn worker_count(&self) -> usize {
        if self.ingest.workers > 0 {
            self.ingest.workers
        } else {
            num_cpus::get() / 2 + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert_eq!(config.database.database, "reiz");
        assert_eq!(config.ingest.fast_mode_threshold, 6400);
        assert_eq!(config.query.default_limit, 10);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reiz.toml");
        std::fs::write(
            &path,
            "[database]\ndsn = \"http://db:9000\"\n\n[ingest]\nworkers = 3\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.database.dsn, "http://db:9000");
        assert_eq!(config.worker_count(), 3);
        // untouched sections keep their defaults
        assert_eq!(config.database.database, "reiz");
    }
}
