//! Command-line interface parsing for Slim Cache
//!
//! This module handles parsing of CLI arguments using clap: the storage
//! backend and its location, plus the `fetch`, `keys`, `clear` and `sweep`
//! commands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Url;
use thiserror::Error;

use crate::storage::{BackendId, StorageConfig};

/// Error types for CLI configuration
#[derive(Debug, Error)]
pub enum CliError {
    /// No home directory and no explicit cache directory
    #[error("Could not determine a cache directory; pass --cache-dir")]
    NoCacheDir,

    /// Namespace would escape the cache directory
    #[error("Invalid namespace: '{0}'. Use a plain name without path separators")]
    InvalidNamespace(String),
}

/// Slim Cache - fetch URLs through a TTL response cache
#[derive(Parser, Debug)]
#[command(name = "slim")]
#[command(about = "HTTP response cache with TTL expiry over pluggable storage")]
#[command(version)]
pub struct Cli {
    /// Storage backend holding the cache
    #[arg(long, value_enum, default_value_t = BackendId::Persistent, global = true)]
    pub backend: BackendId,

    /// Directory for the persistent and durable backends
    ///
    /// Defaults to the platform cache directory (e.g. ~/.cache/slim on Linux).
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Cache partition inside the directory
    #[arg(long, value_name = "NAME", default_value = StorageConfig::DEFAULT_NAMESPACE, global = true)]
    pub namespace: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Commands understood by the CLI
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// GET a URL through the cache and print the response
    Fetch {
        /// Full URL including query parameters
        url: Url,

        /// Skip the cache entirely for this request
        #[arg(long)]
        no_cache: bool,

        /// Minutes the response stays fresh
        #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
        ttl: Option<i64>,

        /// Issue the same request this many times in a row
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        repeat: u32,
    },
    /// List every key in the cache namespace
    Keys,
    /// Remove every entry in the cache namespace
    Clear,
    /// Remove expired entries and report how many were removed
    Sweep,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub backend: BackendId,
    pub storage: StorageConfig,
}

impl CacheConfig {
    /// Creates a CacheConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(CacheConfig)` with the backend and its location
    /// * `Err(CliError)` if a disk backend has no cache directory or the namespace is unusable
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Self::resolve(cli, StorageConfig::from_project_dirs())
    }

    /// Builds the config with `platform` as the fallback location
    ///
    /// Memory and session backends never touch the root, so they fall back
    /// to the system temp directory when no cache directory is known.
    fn resolve(cli: &Cli, platform: Option<StorageConfig>) -> Result<Self, CliError> {
        let storage = match (&cli.cache_dir, platform) {
            (Some(dir), _) => StorageConfig::with_root(dir.clone()),
            (None, Some(config)) => config,
            (None, None) if !cli.backend.is_on_disk() => StorageConfig::with_root(std::env::temp_dir()),
            (None, None) => return Err(CliError::NoCacheDir),
        };

        let namespace = cli.namespace.trim();
        if namespace.is_empty() || namespace.contains(['/', '\\']) || namespace == "." || namespace == ".." {
            return Err(CliError::InvalidNamespace(cli.namespace.clone()));
        }

        Ok(CacheConfig {
            backend: cli.backend,
            storage: storage.with_namespace(namespace),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_fetch_defaults() {
        let cli = Cli::parse_from(["slim", "fetch", "https://example.com/todos/1"]);
        assert_eq!(cli.backend, BackendId::Persistent);
        assert_eq!(cli.namespace, "cache");
        assert!(cli.cache_dir.is_none());

        match cli.command {
            Command::Fetch { url, no_cache, ttl, repeat } => {
                assert_eq!(url.as_str(), "https://example.com/todos/1");
                assert!(!no_cache);
                assert!(ttl.is_none());
                assert_eq!(repeat, 1);
            }
            other => panic!("Expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_fetch_options() {
        let cli = Cli::parse_from([
            "slim", "fetch", "https://example.com/?q=1", "--no-cache", "--ttl", "60", "--repeat", "3",
        ]);

        assert_eq!(
            cli.command,
            Command::Fetch {
                url: Url::parse("https://example.com/?q=1").unwrap(),
                no_cache: true,
                ttl: Some(60),
                repeat: 3,
            }
        );
    }

    #[test]
    fn test_cli_parse_negative_ttl() {
        let cli = Cli::parse_from(["slim", "fetch", "https://example.com/", "--ttl", "-1"]);
        assert!(matches!(cli.command, Command::Fetch { ttl: Some(-1), .. }));
    }

    #[test]
    fn test_cli_parse_global_options_after_subcommand() {
        let cli = Cli::parse_from(["slim", "keys", "--backend", "durable", "--namespace", "api"]);
        assert_eq!(cli.backend, BackendId::Durable);
        assert_eq!(cli.namespace, "api");
        assert_eq!(cli.command, Command::Keys);
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["slim", "--backend", "websql", "keys"]).is_err());
    }

    #[test]
    fn test_cli_rejects_zero_repeat() {
        assert!(Cli::try_parse_from(["slim", "fetch", "https://example.com/", "--repeat", "0"]).is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_url() {
        assert!(Cli::try_parse_from(["slim", "fetch", "not a url"]).is_err());
    }

    #[test]
    fn test_cache_config_from_cli_with_cache_dir() {
        let cli = Cli::parse_from(["slim", "--cache-dir", "/tmp/slim-test", "--namespace", "api", "clear"]);
        let config = CacheConfig::from_cli(&cli).unwrap();

        assert_eq!(config.backend, BackendId::Persistent);
        assert_eq!(config.storage.root, PathBuf::from("/tmp/slim-test"));
        assert_eq!(config.storage.namespace, "api");
    }

    #[test]
    fn test_cache_config_rejects_path_namespace() {
        let cli = Cli::parse_from(["slim", "--cache-dir", "/tmp/slim-test", "--namespace", "../etc", "clear"]);
        let err = CacheConfig::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("Invalid namespace"));
    }

    #[test]
    fn test_volatile_backends_need_no_cache_dir() {
        for backend in ["memory", "session"] {
            let cli = Cli::parse_from(["slim", "--backend", backend, "keys"]);
            let config = CacheConfig::resolve(&cli, None).expect("No directory needed");
            assert_eq!(config.storage.namespace, "cache");
        }
    }

    #[test]
    fn test_disk_backends_without_cache_dir_fail() {
        for backend in ["persistent", "durable"] {
            let cli = Cli::parse_from(["slim", "--backend", backend, "keys"]);
            let err = CacheConfig::resolve(&cli, None).unwrap_err();
            assert!(matches!(err, CliError::NoCacheDir), "{backend}");
        }
    }

    #[test]
    fn test_explicit_cache_dir_wins_over_platform_dir() {
        let cli = Cli::parse_from(["slim", "--cache-dir", "/tmp/explicit", "keys"]);
        let platform = StorageConfig::with_root(PathBuf::from("/tmp/platform"));

        let config = CacheConfig::resolve(&cli, Some(platform)).unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/tmp/explicit"));
    }
}
