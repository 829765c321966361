//! Integration tests for CLI argument handling
//!
//! Only exercises commands that never touch the network.

use std::process::Command;

use tempfile::TempDir;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tellycache"))
        .args(args)
        .env_remove("TMDB_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute tellycache")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tellycache"), "Help should mention tellycache");
    assert!(stdout.contains("movie"), "Help should list the movie command");
    assert!(stdout.contains("invalidate"), "Help should list the invalidate command");
}

#[test]
fn test_missing_subcommand_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_zero_count_limit_prints_error_and_exits() {
    let output = run_cli(&["--memory-only", "--count-limit", "0", "clear"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid count limit"), "stderr was: {}", stderr);
}

#[test]
fn test_oversized_ttl_prints_error_and_exits() {
    for minutes in ["1000000000000", "9223372036854775807"] {
        let output = run_cli(&["--memory-only", "--ttl-minutes", minutes, "clear"]);
        assert_eq!(output.status.code(), Some(2), "ttl {} should be rejected", minutes);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Invalid TTL"), "stderr was: {}", stderr);
    }
}

#[test]
fn test_fetch_without_api_key_fails() {
    let output = run_cli(&["--memory-only", "movie", "550"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TMDB_API_KEY"), "stderr was: {}", stderr);
}

#[test]
fn test_invalidate_rejects_malformed_key() {
    let output = run_cli(&["--memory-only", "invalidate", "movie:abc:detail"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid id"), "stderr was: {}", stderr);
}

#[test]
fn test_invalidate_removes_disk_record() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let namespace = temp_dir.path().join("MovieDetail");
    std::fs::create_dir_all(&namespace).expect("Should create namespace");
    let record = namespace.join("movie-550-detail.cache");
    std::fs::write(&record, b"{}\n{}").expect("Should write record");

    let cache_dir = temp_dir.path().to_string_lossy().into_owned();
    let output = run_cli(&["--cache-dir", &cache_dir, "invalidate", "movie:550:detail"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(!record.exists());
}

#[test]
fn test_clear_creates_namespaces_and_empties_them() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cache_dir = temp_dir.path().to_string_lossy().into_owned();

    let output = run_cli(&["--cache-dir", &cache_dir, "clear"]);

    assert!(output.status.success());
    for namespace in ["ShowDetail", "SeasonDetail", "MovieDetail", "PersonDetail"] {
        let dir = temp_dir.path().join(namespace);
        assert!(dir.is_dir(), "{} should exist", namespace);
        assert_eq!(std::fs::read_dir(&dir).expect("Should list").count(), 0);
    }
}

#[test]
fn test_purge_reports_removed_count() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let namespace = temp_dir.path().join("PersonDetail");
    std::fs::create_dir_all(&namespace).expect("Should create namespace");
    std::fs::write(
        namespace.join("person-1-detail.cache"),
        b"{\"cached_at\":\"2000-01-01T00:00:00Z\",\"expires_at\":\"2000-01-01T03:00:00Z\"}\n{}",
    )
    .expect("Should write record");

    let cache_dir = temp_dir.path().to_string_lossy().into_owned();
    let output = run_cli(&["--cache-dir", &cache_dir, "purge"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Removed 1 expired entries"), "stdout was: {}", stdout);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use tellycache::cli::{Cli, Command, StartupConfig};

    #[test]
    fn test_cli_invalidate_takes_raw_key() {
        let cli = Cli::parse_from(["tellycache", "invalidate", "season:1399:2:detail"]);
        assert_eq!(
            cli.command,
            Command::Invalidate {
                key: "season:1399:2:detail".to_string()
            }
        );
    }

    #[test]
    fn test_startup_config_from_cli_defaults_to_disk() {
        let cli = Cli::parse_from(["tellycache", "purge"]);
        let config = StartupConfig::from_cli(&cli).expect("valid config");
        assert!(config.cache.disk_enabled);
        assert_eq!(config.cache.count_limit, 50);
    }
}
