//! Filesystem-based checkpoint store.
//!
//! Stores one small TOML document per partition. Suitable for single-host
//! deployments, local development and integration tests.
//!
//! # Directory Structure
//!
//! Records are stored at: `{base_path}/{store_name}/{entry_prefix}{partition}.toml`
//!
//! Several listeners can share one base directory by using different store
//! names, or one store name with different entry prefixes.
//!
//! # Durability
//!
//! Saves write a temp file, optionally fsync it, then rename it over the
//! previous record, so a crash leaves either the old or the new checkpoint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tributary_core::{now_us, Offset, PartitionId};

use crate::error::{CheckpointError, CheckpointResult};
use crate::record::CheckpointRecord;
use crate::storage::CheckpointStore;

/// Store name used when none is configured.
pub const DEFAULT_STORE_NAME: &str = "partition-checkpoints";

/// File extension of record files.
const RECORD_EXTENSION: &str = "toml";

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for the filesystem checkpoint store.
#[derive(Debug, Clone)]
pub struct FilesystemConfig {
    /// Base directory.
    pub base_path: PathBuf,

    /// Sub-directory holding this store's records.
    ///
    /// Default: [`DEFAULT_STORE_NAME`].
    pub store_name: String,

    /// Prefix prepended to every record file name.
    ///
    /// Default: empty.
    pub entry_prefix: String,

    /// Whether to call fsync after writes for durability.
    ///
    /// Default: `true` for safety. Set to `false` for faster tests.
    pub sync_on_write: bool,

    /// Create the store directory if it doesn't exist.
    ///
    /// Default: `true`.
    pub create_if_missing: bool,
}

impl FilesystemConfig {
    /// Creates a new configuration with the given base path.
    ///
    /// Uses safe defaults: `sync_on_write = true`, `create_if_missing = true`.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            entry_prefix: String::new(),
            sync_on_write: true,
            create_if_missing: true,
        }
    }

    /// Creates a configuration optimized for testing (no fsync).
    #[must_use]
    pub fn for_testing(base_path: impl Into<PathBuf>) -> Self {
        Self {
            sync_on_write: false,
            ..Self::new(base_path)
        }
    }

    /// Builder: set the store name. An empty name selects the default.
    #[must_use]
    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.store_name = if name.is_empty() {
            DEFAULT_STORE_NAME.to_string()
        } else {
            name
        };
        self
    }

    /// Builder: set the entry prefix.
    #[must_use]
    pub fn with_entry_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.entry_prefix = prefix.into();
        self
    }

    /// Returns the directory records are written to.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.base_path.join(&self.store_name)
    }
}

// -----------------------------------------------------------------------------
// On-disk Format
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct StoredCheckpoint {
    partition_id: String,
    offset: String,
    updated_at_us: u64,
}

// -----------------------------------------------------------------------------
// FilesystemCheckpointStore
// -----------------------------------------------------------------------------

/// Filesystem-based checkpoint store.
#[derive(Debug, Clone)]
pub struct FilesystemCheckpointStore {
    config: FilesystemConfig,
}

impl FilesystemCheckpointStore {
    /// Opens a store with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or, when
    /// `create_if_missing` is set, the directory cannot be created.
    pub async fn open(config: FilesystemConfig) -> CheckpointResult<Self> {
        if config.base_path.as_os_str().is_empty() {
            return Err(CheckpointError::InvalidConfig {
                message: "base_path must not be empty".to_string(),
            });
        }
        if config.store_name.contains(['/', '\\']) || config.store_name == ".." {
            return Err(CheckpointError::InvalidConfig {
                message: format!("store name '{}' is not a plain name", config.store_name),
            });
        }

        let dir = config.store_dir();
        if config.create_if_missing {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| CheckpointError::Io {
                    operation: "create_store_dir",
                    message: format!("failed to create directory '{}': {e}", dir.display()),
                })?;
        }

        debug!(dir = %dir.display(), "Opened filesystem checkpoint store");
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &FilesystemConfig {
        &self.config
    }

    /// Returns the path of a partition's record file.
    #[must_use]
    pub fn record_path(&self, partition_id: &PartitionId) -> PathBuf {
        let file_name = format!(
            "{}{}.{RECORD_EXTENSION}",
            escape_file_component(&self.config.entry_prefix),
            escape_file_component(partition_id.as_str())
        );
        self.config.store_dir().join(file_name)
    }

    /// Lists every record in the store, sorted by partition.
    ///
    /// Only files carrying this store's entry prefix are read.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a record cannot be read.
    pub async fn list_records(&self) -> CheckpointResult<Vec<CheckpointRecord>> {
        let dir = self.config.store_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CheckpointError::Io {
                    operation: "list",
                    message: format!("failed to read directory '{}': {e}", dir.display()),
                })
            }
        };

        let prefix = escape_file_component(&self.config.entry_prefix);
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| CheckpointError::Io {
            operation: "list",
            message: format!("failed to read directory entry: {e}"),
        })? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != RECORD_EXTENSION) {
                continue;
            }
            let starts_with_prefix = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix));
            if !starts_with_prefix {
                continue;
            }
            if let Some(record) = read_record(&path).await? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.partition_id.cmp(&b.partition_id));
        Ok(records)
    }
}

// -----------------------------------------------------------------------------
// CheckpointStore Implementation
// -----------------------------------------------------------------------------

#[async_trait]
impl CheckpointStore for FilesystemCheckpointStore {
    async fn get_or_create(&self, partition_id: &PartitionId) -> CheckpointResult<CheckpointRecord> {
        assert!(!partition_id.is_empty(), "partition_id must not be empty");

        let path = self.record_path(partition_id);
        let Some(record) = read_record(&path).await? else {
            return Ok(CheckpointRecord::empty(partition_id.clone()));
        };

        if &record.partition_id != partition_id {
            return Err(CheckpointError::PartitionMismatch {
                requested: partition_id.clone(),
                returned: record.partition_id,
            });
        }
        Ok(record)
    }

    async fn save(&self, record: &CheckpointRecord) -> CheckpointResult<()> {
        assert!(
            !record.partition_id.is_empty(),
            "partition_id must not be empty"
        );

        let path = self.record_path(&record.partition_id);
        ensure_parent_dirs(&path).await?;

        let stored = StoredCheckpoint {
            partition_id: record.partition_id.as_str().to_string(),
            offset: record.offset.as_str().to_string(),
            updated_at_us: now_us(),
        };
        let contents = toml::to_string(&stored).map_err(|e| CheckpointError::Corrupt {
            partition_id: record.partition_id.clone(),
            message: format!("failed to encode: {e}"),
        })?;

        // Write to temp file first, then rename for atomicity.
        let temp_path = path.with_extension("tmp");

        let write_result = async {
            let mut file =
                tokio::fs::File::create(&temp_path)
                    .await
                    .map_err(|e| CheckpointError::Io {
                        operation: "save",
                        message: format!("failed to create temp file: {e}"),
                    })?;

            tokio::io::AsyncWriteExt::write_all(&mut file, contents.as_bytes())
                .await
                .map_err(|e| CheckpointError::Io {
                    operation: "save",
                    message: format!("failed to write data: {e}"),
                })?;

            if self.config.sync_on_write {
                file.sync_all().await.map_err(|e| CheckpointError::Io {
                    operation: "save",
                    message: format!("failed to sync file: {e}"),
                })?;
            }

            Ok::<(), CheckpointError>(())
        }
        .await;

        // Clean up temp file on error.
        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        // Atomic rename.
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| CheckpointError::Io {
                operation: "save",
                message: format!("failed to rename temp file: {e}"),
            })?;

        debug!(
            partition = %record.partition_id,
            offset = %record.offset,
            "Saved checkpoint"
        );
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Reads and decodes a record file. Returns `None` if the file is missing.
async fn read_record(path: &Path) -> CheckpointResult<Option<CheckpointRecord>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CheckpointError::Io {
                operation: "read",
                message: format!("failed to read '{}': {e}", path.display()),
            })
        }
    };

    let stored: StoredCheckpoint =
        toml::from_str(&contents).map_err(|e| CheckpointError::Corrupt {
            partition_id: PartitionId::new(
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            message: e.to_string(),
        })?;

    Ok(Some(CheckpointRecord::new(
        PartitionId::new(stored.partition_id),
        Offset::new(stored.offset),
    )))
}

/// Ensures parent directories exist for a path.
async fn ensure_parent_dirs(path: &Path) -> CheckpointResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CheckpointError::Io {
                    operation: "create_parent_dirs",
                    message: format!(
                        "failed to create parent directories for '{}': {e}",
                        path.display()
                    ),
                })?;
        }
    }
    Ok(())
}

/// Escapes a string for use inside a single file name.
///
/// ASCII alphanumerics, `-`, `_` and `.` pass through; everything else
/// becomes `%XX` per byte. A leading `.` is escaped too so no record file is
/// hidden or named `..`.
fn escape_file_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if keep {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> FilesystemCheckpointStore {
        FilesystemCheckpointStore::open(FilesystemConfig::for_testing(dir.path()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_record_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let record = store.get_or_create(&PartitionId::new("0")).await.unwrap();
        assert_eq!(record, CheckpointRecord::empty(PartitionId::new("0")));
    }

    #[tokio::test]
    async fn test_save_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir).await;
            store
                .save(&CheckpointRecord::new(
                    PartitionId::new("3"),
                    Offset::new("8192"),
                ))
                .await
                .unwrap();
        }

        let store = open_store(&dir).await;
        let record = store.get_or_create(&PartitionId::new("3")).await.unwrap();
        assert_eq!(record.offset, Offset::new("8192"));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let partition = PartitionId::new("0");

        for offset in ["1", "2", "3"] {
            store
                .save(&CheckpointRecord::new(partition.clone(), Offset::new(offset)))
                .await
                .unwrap();
        }

        let record = store.get_or_create(&partition).await.unwrap();
        assert_eq!(record.offset, Offset::new("3"));
        assert!(!store.record_path(&partition).with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_prefixes_isolate_stores() {
        let dir = TempDir::new().unwrap();
        let a = FilesystemCheckpointStore::open(
            FilesystemConfig::for_testing(dir.path()).with_entry_prefix("hub-a."),
        )
        .await
        .unwrap();
        let b = FilesystemCheckpointStore::open(
            FilesystemConfig::for_testing(dir.path()).with_entry_prefix("hub-b."),
        )
        .await
        .unwrap();

        a.save(&CheckpointRecord::new(PartitionId::new("0"), Offset::new("10")))
            .await
            .unwrap();

        assert!(!b.get_or_create(&PartitionId::new("0")).await.unwrap().has_offset());
        assert_eq!(a.list_records().await.unwrap().len(), 1);
        assert!(b.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_awkward_partition_names() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        for name in ["a/b", "..", "x y", "ü"] {
            let partition = PartitionId::new(name);
            store
                .save(&CheckpointRecord::new(partition.clone(), Offset::new("1")))
                .await
                .unwrap();
            let path = store.record_path(&partition);
            assert_eq!(path.parent().unwrap(), store.config().store_dir());
            assert_eq!(
                store.get_or_create(&partition).await.unwrap().offset,
                Offset::new("1")
            );
        }
        assert_eq!(store.list_records().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let partition = PartitionId::new("0");

        tokio::fs::write(store.record_path(&partition), "not = [valid")
            .await
            .unwrap();

        assert!(matches!(
            store.get_or_create(&partition).await,
            Err(CheckpointError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_escape_file_component() {
        assert_eq!(escape_file_component("p-0_1.x"), "p-0_1.x");
        assert_eq!(escape_file_component("a/b"), "a%2Fb");
        assert_eq!(escape_file_component(".."), "%2E.");
    }

    #[test]
    fn test_empty_store_name_uses_default() {
        let config = FilesystemConfig::new("/tmp/x").with_store_name("");
        assert_eq!(config.store_name, DEFAULT_STORE_NAME);
    }
}
