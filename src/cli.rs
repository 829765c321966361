//! Command-line interface parsing for tellycache
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into the cache configuration used at startup.

use std::path::PathBuf;

use chrono::Duration;
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::CacheConfig;

/// Longest accepted TTL: ten years
pub const MAX_TTL_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The memory tier needs room for at least one record
    #[error("Invalid count limit: {0}. The memory cache must hold at least 1 record")]
    InvalidCountLimit(usize),

    /// TTL outside 1 minute to ten years
    #[error("Invalid TTL: {0} minutes. The TTL must be between 1 and {} minutes", MAX_TTL_MINUTES)]
    InvalidTtl(i64),

    /// A fetching command was given without credentials
    #[error("No TMDB API key. Pass --api-key or set TMDB_API_KEY")]
    MissingApiKey,
}

/// tellycache - Cached movie, show, season and person details from TMDB
#[derive(Parser, Debug)]
#[command(name = "tellycache")]
#[command(about = "Cached movie, show, season and person details from TMDB")]
#[command(version)]
pub struct Cli {
    /// Directory holding the disk cache (defaults to the XDG cache directory)
    #[arg(long, value_name = "DIR", global = true, conflicts_with = "memory_only")]
    pub cache_dir: Option<PathBuf>,

    /// Skip the disk cache and keep records in memory only
    #[arg(long, global = true)]
    pub memory_only: bool,

    /// Minutes a cached record stays valid
    #[arg(long, value_name = "MINUTES", global = true)]
    pub ttl_minutes: Option<i64>,

    /// Records each in-memory cache holds before evicting
    #[arg(long, value_name = "COUNT", global = true)]
    pub count_limit: Option<usize>,

    /// TMDB API key used for fetches
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do once the caches are open
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print movie details
    Movie {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Print show details
    Show {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Print one season of a show
    Season { tv_id: u64, season_number: u32 },
    /// Print person details with combined credits
    Person {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Remove one key (e.g. movie:550:detail) from the cache
    Invalidate { key: String },
    /// Remove everything from the cache
    Clear,
    /// Remove expired records from the cache
    Purge,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Settings for the four detail caches
    pub cache: CacheConfig,
    /// TMDB API key, if one was given
    pub api_key: Option<String>,
    /// Number of -v flags
    pub verbosity: u8,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with CLI overrides applied to the default cache config
    /// * `Err(CliError)` if an override is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut cache = CacheConfig::default();

        if let Some(limit) = cli.count_limit {
            if limit == 0 {
                return Err(CliError::InvalidCountLimit(limit));
            }
            cache.count_limit = limit;
        }

        if let Some(minutes) = cli.ttl_minutes {
            if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
                return Err(CliError::InvalidTtl(minutes));
            }
            cache.ttl = Duration::try_minutes(minutes).ok_or(CliError::InvalidTtl(minutes))?;
        }

        cache.cache_dir = cli.cache_dir.clone();
        cache.disk_enabled = !cli.memory_only;

        Ok(StartupConfig {
            cache,
            api_key: cli.api_key.clone().filter(|key| !key.trim().is_empty()),
            verbosity: cli.verbose,
        })
    }

    /// Returns the API key or the error to show when it is missing
    pub fn require_api_key(&self) -> Result<&str, CliError> {
        self.api_key.as_deref().ok_or(CliError::MissingApiKey)
    }

    /// Default tracing filter for the configured verbosity
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "tellycache=debug,info",
            _ => "tellycache=trace,debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_movie_ids() {
        let cli = Cli::parse_from(["tellycache", "movie", "550", "680"]);
        assert_eq!(cli.command, Command::Movie { ids: vec![550, 680] });
    }

    #[test]
    fn test_cli_parse_season() {
        let cli = Cli::parse_from(["tellycache", "season", "1399", "2"]);
        assert_eq!(
            cli.command,
            Command::Season {
                tv_id: 1399,
                season_number: 2
            }
        );
    }

    #[test]
    fn test_cli_movie_requires_an_id() {
        assert!(Cli::try_parse_from(["tellycache", "movie"]).is_err());
    }

    #[test]
    fn test_cli_rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["tellycache", "person", "brad"]).is_err());
    }

    #[test]
    fn test_cli_cache_dir_conflicts_with_memory_only() {
        let result = Cli::try_parse_from(["tellycache", "--memory-only", "--cache-dir", "/tmp/x", "clear"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tellycache", "purge", "--memory-only", "-vv"]);
        assert!(cli.memory_only);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_startup_config_defaults() {
        let cli = Cli::parse_from(["tellycache", "clear"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.log_filter(), "warn");
    }

    #[test]
    fn test_startup_config_applies_overrides() {
        let cli = Cli::parse_from([
            "tellycache",
            "--cache-dir",
            "/tmp/telly",
            "--ttl-minutes",
            "30",
            "--count-limit",
            "10",
            "--api-key",
            "secret",
            "movie",
            "550",
        ]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(config.cache.cache_dir, Some(PathBuf::from("/tmp/telly")));
        assert_eq!(config.cache.ttl, Duration::minutes(30));
        assert_eq!(config.cache.count_limit, 10);
        assert_eq!(config.require_api_key().unwrap(), "secret");
    }

    #[test]
    fn test_startup_config_memory_only() {
        let cli = Cli::parse_from(["tellycache", "--memory-only", "clear"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert!(!config.cache.disk_enabled);
    }

    #[test]
    fn test_startup_config_rejects_zero_count_limit() {
        let cli = Cli::parse_from(["tellycache", "--count-limit", "0", "clear"]);
        let err = StartupConfig::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("Invalid count limit"));
    }

    #[test]
    fn test_startup_config_rejects_non_positive_ttl() {
        let cli = Cli::parse_from(["tellycache", "--ttl-minutes", "0", "clear"]);
        assert!(matches!(StartupConfig::from_cli(&cli), Err(CliError::InvalidTtl(0))));
    }

    #[test]
    fn test_startup_config_rejects_oversized_ttl() {
        let too_long = (MAX_TTL_MINUTES + 1).to_string();
        let cli = Cli::parse_from(["tellycache", "--ttl-minutes", too_long.as_str(), "clear"]);
        assert!(matches!(StartupConfig::from_cli(&cli), Err(CliError::InvalidTtl(_))));

        let cli = Cli::parse_from(["tellycache", "--ttl-minutes", "9223372036854775807", "clear"]);
        assert!(matches!(StartupConfig::from_cli(&cli), Err(CliError::InvalidTtl(i64::MAX))));
    }

    #[test]
    fn test_startup_config_accepts_max_ttl() {
        let max = MAX_TTL_MINUTES.to_string();
        let cli = Cli::parse_from(["tellycache", "--ttl-minutes", max.as_str(), "clear"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(config.cache.ttl, Duration::minutes(MAX_TTL_MINUTES));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let cli = Cli::parse_from(["tellycache", "--api-key", "  ", "movie", "550"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert!(matches!(config.require_api_key(), Err(CliError::MissingApiKey)));
    }
}
