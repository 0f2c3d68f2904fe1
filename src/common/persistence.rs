//! Timestamp markers for the cooldown and lock gates.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// File name prefix for per-window cooldown state
pub const COOLDOWN_PREFIX: &str = "claudeman-winid-";

/// File name prefix for command dedup locks
pub const LOCK_PREFIX: &str = "claudeman-lock-";

/// Last-allowed instant per key
pub trait KeyedTimestampStore {
    fn get(&self, key: &str) -> io::Result<Option<DateTime<Utc>>>;
    fn set(&self, key: &str, at: DateTime<Utc>) -> io::Result<()>;
}

/// On-disk record, one per key
#[derive(Debug, Serialize, Deserialize)]
struct StampRecord {
    #[serde(alias = "lastNotification")]
    last_notification: i64,
}

/// How a marker file stores its instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampFormat {
    /// `{"last_notification": <epoch-ms>}`
    Json,
    /// Bare epoch milliseconds
    Millis,
}

/// One small file per key under a shared directory
#[derive(Debug, Clone)]
pub struct FileTimestampStore {
    dir: PathBuf,
    prefix: String,
    extension: String,
    format: StampFormat,
}

impl FileTimestampStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, extension: &str, format: StampFormat) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            format,
        }
    }

    /// Cooldown state: `<dir>/claudeman-winid-<key>.json`
    pub fn cooldown(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, COOLDOWN_PREFIX, "json", StampFormat::Json)
    }

    /// Dedup locks: `<dir>/claudeman-lock-<key>.lock`
    pub fn locks(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, LOCK_PREFIX, "lock", StampFormat::Millis)
    }

    /// Path of the marker for `key`. Characters outside `[A-Za-z0-9._-]`
    /// become `_` so a key can never escape the directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = if safe.is_empty() || safe.chars().all(|c| c == '.') {
            "default".to_string()
        } else {
            safe
        };
        self.dir
            .join(format!("{}{}.{}", self.prefix, safe, self.extension))
    }
}

impl KeyedTimestampStore for FileTimestampStore {
    fn get(&self, key: &str) -> io::Result<Option<DateTime<Utc>>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if let Some(at) = parse_stamp(&content) {
            return Ok(Some(at));
        }
        // Unrecognized content: age the marker by its mtime
        let modified = fs::metadata(&path)?.modified()?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }

    fn set(&self, key: &str, at: DateTime<Utc>) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let millis = at.timestamp_millis();
        let content = match self.format {
            StampFormat::Json => serde_json::to_string(&StampRecord {
                last_notification: millis,
            })?,
            StampFormat::Millis => millis.to_string(),
        };
        fs::write(self.path_for(key), content)
    }
}

/// Accepts the JSON record or a bare epoch-millis value
fn parse_stamp(content: &str) -> Option<DateTime<Utc>> {
    let content = content.trim();
    let millis = match serde_json::from_str::<StampRecord>(content) {
        Ok(record) => record.last_notification,
        Err(_) => content.parse::<i64>().ok()?,
    };
    Utc.timestamp_millis_opt(millis).single()
}

/// In-process store for tests and single-process use
#[derive(Debug, Default)]
pub struct MemoryTimestampStore {
    stamps: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryTimestampStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyedTimestampStore for MemoryTimestampStore {
    fn get(&self, key: &str) -> io::Result<Option<DateTime<Utc>>> {
        let stamps = self
            .stamps
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "stamp store lock poisoned"))?;
        Ok(stamps.get(key).copied())
    }

    fn set(&self, key: &str, at: DateTime<Utc>) -> io::Result<()> {
        let mut stamps = self
            .stamps
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "stamp store lock poisoned"))?;
        stamps.insert(key.to_string(), at);
        Ok(())
    }
}

impl<T: KeyedTimestampStore + ?Sized> KeyedTimestampStore for &T {
    fn get(&self, key: &str) -> io::Result<Option<DateTime<Utc>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, at: DateTime<Utc>) -> io::Result<()> {
        (**self).set(key, at)
    }
}

/// Default directory for markers shared between processes
pub fn default_state_dir() -> PathBuf {
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_path_for_sanitizes_key() {
        let store = FileTimestampStore::locks("/tmp/x");
        assert_eq!(
            store.path_for("question-123"),
            PathBuf::from("/tmp/x/claudeman-lock-question-123.lock")
        );
        let escaped = store.path_for("../../etc/passwd");
        assert_eq!(escaped.parent(), Some(std::path::Path::new("/tmp/x")));
        assert_eq!(
            store.path_for(""),
            PathBuf::from("/tmp/x/claudeman-lock-default.lock")
        );
    }

    #[test]
    fn test_cooldown_path() {
        let store = FileTimestampStore::cooldown("/tmp/y");
        assert_eq!(
            store.path_for("42"),
            PathBuf::from("/tmp/y/claudeman-winid-42.json")
        );
    }

    #[test]
    fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimestampStore::cooldown(dir.path());
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn test_file_store_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimestampStore::cooldown(dir.path());
        store.set("7", at(1_700_000_000_123)).unwrap();
        assert_eq!(store.get("7").unwrap(), Some(at(1_700_000_000_123)));

        let raw = fs::read_to_string(store.path_for("7")).unwrap();
        assert_eq!(raw, r#"{"last_notification":1700000000123}"#);
    }

    #[test]
    fn test_file_store_reads_bare_millis() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimestampStore::locks(dir.path());
        fs::write(store.path_for("k"), "1700000000000\n").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(at(1_700_000_000_000)));
    }

    #[test]
    fn test_lock_store_writes_bare_millis() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimestampStore::locks(dir.path());
        store.set("q-1", at(1_700_000_000_123)).unwrap();

        let raw = fs::read_to_string(store.path_for("q-1")).unwrap();
        assert_eq!(raw, "1700000000123");
        assert_eq!(store.get("q-1").unwrap(), Some(at(1_700_000_000_123)));
    }

    #[test]
    fn test_file_store_reads_camel_case_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimestampStore::cooldown(dir.path());
        fs::write(
            store.path_for("9"),
            r#"{"lastNotification":1700000000000,"lastToolTime":0}"#,
        )
        .unwrap();
        assert_eq!(store.get("9").unwrap(), Some(at(1_700_000_000_000)));
    }

    #[test]
    fn test_file_store_garbage_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimestampStore::locks(dir.path());
        fs::write(store.path_for("k"), "not a stamp").unwrap();
        let stamp = store.get("k").unwrap().unwrap();
        let age = Utc::now() - stamp;
        assert!(age.num_seconds().abs() < 60);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTimestampStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", at(5)).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(at(5)));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
