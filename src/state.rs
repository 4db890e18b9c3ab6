//! Persistence of the last accepted item.
//!
//! History depth is one: every save replaces the previous record. A store
//! that cannot be read is treated as empty so a damaged file never stops a
//! run; at worst the previous item is published again.

use crate::error::StateStoreError;
use crate::models::PublicationRecord;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

pub trait StateStore {
    /// The last accepted record, or `None` when there is none readable.
    async fn load(&self) -> Option<PublicationRecord>;

    /// Replace the stored record.
    async fn save(&self, record: &PublicationRecord) -> Result<(), StateStoreError>;
}

/// Pretty-printed JSON file holding a single record.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn load(&self) -> Option<PublicationRecord> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file yet");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Cannot read state file; treating as empty");
                return None;
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            info!("State file is empty");
            return None;
        }
        match serde_json::from_slice::<PublicationRecord>(&raw) {
            Ok(record) => {
                debug!(guid = %record.guid, "Loaded last published record");
                Some(record)
            }
            Err(e) => {
                warn!(error = %e, "Malformed state file; treating as empty");
                None
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), guid = %record.guid))]
    async fn save(&self, record: &PublicationRecord) -> Result<(), StateStoreError> {
        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        info!("Saved last published record");
        Ok(())
    }
}

/// Store kept in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<PublicationRecord>>,
}

impl MemoryStore {
    pub fn with_record(record: PublicationRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    pub fn current(&self) -> Option<PublicationRecord> {
        self.slot().clone()
    }

    /// A panic while holding the lock cannot leave a half-written record.
    fn slot(&self) -> MutexGuard<'_, Option<PublicationRecord>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStore {
    async fn load(&self) -> Option<PublicationRecord> {
        self.current()
    }

    async fn save(&self, record: &PublicationRecord) -> Result<(), StateStoreError> {
        *self.slot() = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{item, record, utc};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_recovers_poisoned_lock() {
        let store = MemoryStore::with_record(record("old"));
        std::thread::scope(|s| {
            let crashed = s
                .spawn(|| {
                    let _guard = store.record.lock().unwrap();
                    panic!("writer crashed while holding the record");
                })
                .join();
            assert!(crashed.is_err());
        });
        assert!(store.record.is_poisoned());

        store.save(&record("new")).await.unwrap();
        assert_eq!(store.load().await.unwrap().guid, "new");
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("last_news.json"));
        let record = PublicationRecord::from(&item("abc", utc(2025, 5, 6, 14)));

        store.save(&record).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.guid, "abc");
        assert_eq!(loaded.title, "Title abc");
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("last_news.json"));
        store
            .save(&PublicationRecord::from(&item("first", utc(2025, 5, 6, 14))))
            .await
            .unwrap();
        store
            .save(&PublicationRecord::from(&item("second", utc(2025, 5, 7, 9))))
            .await
            .unwrap();

        assert_eq!(store.load().await.unwrap().guid, "second");
        assert!(!store.temp_path().exists());
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("first"));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_length_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_news.json");
        std::fs::write(&path, "").unwrap();
        assert!(JsonFileStore::new(path).load().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_news.json");
        std::fs::write(&path, "{\"Guid\": \"abc\"").unwrap();
        assert!(JsonFileStore::new(&path).load().await.is_none());

        std::fs::write(&path, "{\"Title\": \"no guid\"}").unwrap();
        assert!(JsonFileStore::new(path).load().await.is_none());
    }

    #[tokio::test]
    async fn test_reads_historical_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_news.json");
        std::fs::write(
            &path,
            r#"{
  "Title": "Музей открылся",
  "Description": "Текст",
  "Publication Date": "Tue, 06 May 2025 14:30 +0300",
  "ImageFileName": "image_temp.webp",
  "Guid": "https://travel.example.com/news/museum"
}"#,
        )
        .unwrap();
        let record = JsonFileStore::new(path).load().await.unwrap();
        assert_eq!(record.guid, "https://travel.example.com/news/museum");
        assert_eq!(record.image_file_name.as_deref(), Some("image_temp.webp"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::default();
        assert!(store.load().await.is_none());
        let record = PublicationRecord::from(&item("abc", utc(2025, 5, 6, 14)));
        store.save(&record).await.unwrap();
        assert_eq!(store.load().await, Some(record));
    }
}
