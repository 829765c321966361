//! Persistent tier storing encoded records on disk
//!
//! Each detail kind gets its own namespace directory. A record file holds a
//! one-line JSON header with the cache timestamps, followed by the encoded
//! record bytes:
//!
//! ```text
//! {"cached_at":"2024-05-01T12:00:00Z","expires_at":"2024-05-01T15:00:00Z"}
//! {"runtime":139,"vote_average":8.4,...}
//! ```

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration as StdDuration, SystemTime};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::{expiry_after, SharedClock};
use super::error::CacheError;
use super::key::EntityKind;

/// Extension of committed record files
const RECORD_EXTENSION: &str = "cache";

/// Extension of in-progress writes
const TEMP_EXTENSION: &str = "tmp";

/// Temp files older than this are assumed orphaned by a crashed writer
const ORPHAN_TEMP_AGE: StdDuration = StdDuration::from_secs(3600);

/// Header line written in front of every record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordHeader {
    /// When the record was written
    cached_at: DateTime<Utc>,
    /// When the record stops being valid
    expires_at: DateTime<Utc>,
}

/// Disk-backed key to bytes store for a single detail kind
///
/// Records are written to a temp file and renamed into place, so a crash
/// mid-write never leaves a partially written record under its final name.
#[derive(Debug)]
pub struct DiskTier {
    /// Namespace directory, e.g. `~/.cache/tellycache/MovieDetail`
    dir: PathBuf,
    ttl: Duration,
    clock: SharedClock,
    /// Distinguishes temp files of concurrent writers
    write_seq: AtomicU64,
}

impl DiskTier {
    /// Opens (creating if needed) the namespace directory for `kind` under `root`
    ///
    /// # Returns
    /// * `Ok(DiskTier)` if the directory exists or could be created
    /// * `Err(CacheError::DiskIo)` otherwise; callers fall back to memory-only caching
    pub fn open(
        root: &Path,
        kind: EntityKind,
        ttl: Duration,
        clock: SharedClock,
    ) -> Result<Self, CacheError> {
        let dir = root.join(kind.namespace());
        fs::create_dir_all(&dir).map_err(|e| CacheError::disk_io(&dir, e))?;

        Ok(Self {
            dir,
            ttl,
            clock,
            write_seq: AtomicU64::new(0),
        })
    }

    /// Returns the namespace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, file_stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_stem, RECORD_EXTENSION))
    }

    fn temp_path(&self, file_stem: &str) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}.{}.{}",
            file_stem,
            std::process::id(),
            seq,
            TEMP_EXTENSION
        ))
    }

    /// Reads the payload stored under `file_stem`
    ///
    /// Missing, unreadable, corrupt and expired records all read as `None`.
    /// Corrupt and expired records are deleted on the way out.
    pub fn get(&self, file_stem: &str) -> Option<Vec<u8>> {
        let path = self.record_path(file_stem);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read disk cache record");
                return None;
            }
        };

        let Some((header, payload)) = split_record(&content) else {
            warn!(path = %path.display(), "corrupt disk cache record, removing");
            self.discard_if_stale(&path);
            return None;
        };

        if self.clock.now() >= header.expires_at {
            debug!(path = %path.display(), expired_at = %header.expires_at, "disk cache record expired");
            self.discard_if_stale(&path);
            return None;
        }

        Some(payload.to_vec())
    }

    /// Writes `bytes` under `file_stem` with an expiry of now + TTL
    ///
    /// # Returns
    /// * `Ok(())` once the record is durably in place
    /// * `Err(CacheError::DiskIo)` if any step of the write failed
    pub fn put(&self, file_stem: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let now = self.clock.now();
        let header = RecordHeader {
            cached_at: now,
            expires_at: expiry_after(now, self.ttl),
        };
        let header_line = serde_json::to_vec(&header)
            .map_err(|e| CacheError::disk_io(&self.dir, std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let final_path = self.record_path(file_stem);
        let temp_path = self.temp_path(file_stem);

        let written = write_file_synced(&temp_path, &header_line, bytes)
            .and_then(|_| fs::rename(&temp_path, &final_path));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::disk_io(final_path, e));
        }

        Ok(())
    }

    /// Deletes the record stored under `file_stem`; a missing record is not an error
    pub fn remove(&self, file_stem: &str) -> Result<(), CacheError> {
        let path = self.record_path(file_stem);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::disk_io(path, e)),
        }
    }

    /// Deletes every record in this namespace
    pub fn clear(&self) -> Result<(), CacheError> {
        for path in self.list_files()? {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::disk_io(path, e)),
            }
        }
        Ok(())
    }

    /// Removes expired or corrupt records and orphaned temp files
    ///
    /// # Returns
    /// The number of files removed
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut removed = 0;

        for path in self.list_files()? {
            let stale = match path.extension().and_then(|ext| ext.to_str()) {
                Some(RECORD_EXTENSION) => match read_header(&path) {
                    Some(header) => now >= header.expires_at,
                    None => true,
                },
                Some(TEMP_EXTENSION) => is_orphaned_temp(&path),
                _ => false,
            };

            if stale && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Counts committed records, expired ones included
    pub fn entry_count(&self) -> Result<usize, CacheError> {
        Ok(self
            .list_files()?
            .iter()
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION))
            .count())
    }

    fn list_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CacheError::disk_io(&self.dir, e))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect())
    }

    /// Removes the record at `path` unless it has become fresh since it was read
    ///
    /// A concurrent `put` may rename a new record into place after `get`
    /// judged the old one stale, so the header is read again first.
    fn discard_if_stale(&self, path: &Path) {
        if let Some(header) = read_header(path) {
            if self.clock.now() < header.expires_at {
                debug!(path = %path.display(), "record replaced while reading, keeping it");
                return;
            }
        }

        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove stale disk cache record");
            }
        }
    }
}

/// Splits a record into its header and payload
fn split_record(content: &[u8]) -> Option<(RecordHeader, &[u8])> {
    let newline = content.iter().position(|&b| b == b'\n')?;
    let header: RecordHeader = serde_json::from_slice(&content[..newline]).ok()?;
    Some((header, &content[newline + 1..]))
}

fn read_header(path: &Path) -> Option<RecordHeader> {
    let content = fs::read(path).ok()?;
    split_record(&content).map(|(header, _)| header)
}

fn is_orphaned_temp(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age >= ORPHAN_TEMP_AGE)
        .unwrap_or(false)
}

fn write_file_synced(path: &Path, header_line: &[u8], payload: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(header_line)?;
    file.write_all(b"\n")?;
    file.write_all(payload)?;
    file.sync_all()
}
