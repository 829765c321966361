//! Cache configuration shared by every detail kind

use std::path::PathBuf;

use chrono::Duration;
use directories::ProjectDirs;

/// Default time-to-live of a cached record, in hours
pub const DEFAULT_TTL_HOURS: i64 = 3;

/// Default number of records each memory tier holds
pub const DEFAULT_COUNT_LIMIT: usize = 50;

/// Settings applied to each of the four detail caches
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// How long a record stays valid after it is stored
    pub ttl: Duration,
    /// Maximum records resident in each memory tier
    pub count_limit: usize,
    /// Byte budget for each disk namespace; 0 means unconstrained
    ///
    /// Only the TTL bounds disk usage today. Long-running installs should
    /// run the purge sweep to reclaim expired records.
    pub disk_cost_limit: u64,
    /// Root of the disk namespaces; `None` uses the XDG cache directory
    pub cache_dir: Option<PathBuf>,
    /// Whether to use a disk tier at all
    pub disk_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            count_limit: DEFAULT_COUNT_LIMIT,
            disk_cost_limit: 0,
            cache_dir: None,
            disk_enabled: true,
        }
    }
}

impl CacheConfig {
    /// Returns the directory disk namespaces live under
    ///
    /// Uses `cache_dir` when set, otherwise `~/.cache/tellycache/` on Linux
    /// (or the platform equivalent). Returns `None` if neither is available,
    /// e.g. when there is no home directory.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Some(dir.clone());
        }
        let project_dirs = ProjectDirs::from("", "", "tellycache")?;
        Some(project_dirs.cache_dir().to_path_buf())
    }
}
