//! Quarantine Module
//!
//! Recoverable storage for files removed as duplicates. Files are moved
//! into a quarantine directory instead of being deleted, with a JSON
//! sidecar recording where they came from, so they can be restored or
//! cleaned up after the retention period.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of the sidecar metadata file written next to each item
const METADATA_EXTENSION: &str = "quarantine.json";

/// A quarantined file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantinedItem {
    /// Current path in quarantine
    pub path: PathBuf,

    /// Original file name
    pub name: String,

    /// Original path before quarantine
    pub original_path: PathBuf,

    /// File this one duplicated, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<PathBuf>,

    /// When the item was quarantined
    pub quarantine_date: DateTime<Utc>,

    /// Size in bytes
    pub size: u64,
}

/// Statistics from a cleanup operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStats {
    /// Number of items removed
    pub items_removed: usize,

    /// Total bytes freed
    pub bytes_freed: u64,

    /// Number of items that failed to delete
    pub errors: usize,
}

/// Manages the quarantine directory for safe removal
#[derive(Debug, Clone)]
pub struct QuarantineManager {
    /// Base path for quarantine storage
    base_path: PathBuf,

    /// Number of days to retain quarantined items
    retention_days: u32,
}

impl QuarantineManager {
    /// Create a QuarantineManager with custom settings
    pub fn with_config(base_path: PathBuf, retention_days: u32) -> Self {
        Self {
            base_path,
            retention_days,
        }
    }

    /// Get the base quarantine path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the retention period in days
    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Ensure the quarantine directory exists
    fn ensure_quarantine_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.base_path)
            .map_err(|e| format!("Failed to create quarantine directory: {}", e))
    }

    /// Generate a unique quarantine path for an item
    fn generate_quarantine_path(&self, original_path: &Path) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let name = original_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut candidate = self.base_path.join(format!("{}_{}", timestamp, name));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self
                .base_path
                .join(format!("{}_{}_{}", timestamp, counter, name));
            counter += 1;
        }
        candidate
    }

    fn metadata_path(quarantine_path: &Path) -> PathBuf {
        let mut name = quarantine_path.as_os_str().to_owned();
        name.push(".");
        name.push(METADATA_EXTENSION);
        PathBuf::from(name)
    }

    fn is_metadata_file(path: &Path) -> bool {
        path.to_string_lossy().ends_with(METADATA_EXTENSION)
    }

    /// Move a file to quarantine
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - The path where the item was quarantined
    /// * `Err(String)` - Error message if quarantine failed
    pub fn quarantine(&self, path: &Path, duplicate_of: Option<&Path>) -> Result<PathBuf, String> {
        self.ensure_quarantine_dir()?;

        let metadata = fs::symlink_metadata(path)
            .map_err(|e| format!("Path does not exist: {}: {}", path.display(), e))?;
        if !metadata.is_file() {
            return Err(format!("Not a regular file: {}", path.display()));
        }

        let quarantine_path = self.generate_quarantine_path(path);

        if let Err(rename_err) = fs::rename(path, &quarantine_path) {
            // Different filesystem: copy then remove the original
            tracing::debug!(
                "[Quarantine] rename failed ({}), falling back to copy",
                rename_err
            );
            fs::copy(path, &quarantine_path)
                .map_err(|e| format!("Failed to move to quarantine: {}", e))?;
            if let Err(e) = fs::remove_file(path) {
                let _ = fs::remove_file(&quarantine_path);
                return Err(format!("Failed to remove original after copy: {}", e));
            }
        }

        let item = QuarantinedItem {
            path: quarantine_path.clone(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            original_path: path.to_path_buf(),
            duplicate_of: duplicate_of.map(Path::to_path_buf),
            quarantine_date: Utc::now(),
            size: metadata.len(),
        };

        if let Err(e) = self.save_item_metadata(&quarantine_path, &item) {
            // The file itself is safe; only the restore hint is missing
            tracing::warn!("[Quarantine] {}", e);
        }

        tracing::info!(
            "[Quarantine] Moved {} to {}",
            path.display(),
            quarantine_path.display()
        );

        Ok(quarantine_path)
    }

    /// Save metadata for a quarantined item
    fn save_item_metadata(&self, quarantine_path: &Path, item: &QuarantinedItem) -> Result<(), String> {
        let json = serde_json::to_string_pretty(item)
            .map_err(|e| format!("Failed to serialize metadata: {}", e))?;
        fs::write(Self::metadata_path(quarantine_path), json)
            .map_err(|e| format!("Failed to write metadata: {}", e))
    }

    /// Load metadata for a quarantined item
    fn load_item_metadata(&self, quarantine_path: &Path) -> Option<QuarantinedItem> {
        fs::read_to_string(Self::metadata_path(quarantine_path))
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
    }

    /// Restore a quarantined item
    ///
    /// Uses the stored original path unless `original_path` is given. Never
    /// overwrites an existing file.
    pub fn restore(&self, quarantine_path: &Path, original_path: Option<PathBuf>) -> Result<PathBuf, String> {
        if !quarantine_path.exists() {
            return Err(format!(
                "Quarantine path does not exist: {}",
                quarantine_path.display()
            ));
        }

        let restore_path = match original_path {
            Some(path) => path,
            None => self
                .load_item_metadata(quarantine_path)
                .map(|item| item.original_path)
                .ok_or_else(|| "No original path found and none provided".to_string())?,
        };

        if restore_path.exists() {
            return Err(format!(
                "Cannot restore: path already exists: {}",
                restore_path.display()
            ));
        }

        if let Some(parent) = restore_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create parent directory: {}", e))?;
        }

        if fs::rename(quarantine_path, &restore_path).is_err() {
            fs::copy(quarantine_path, &restore_path)
                .map_err(|e| format!("Failed to restore from quarantine: {}", e))?;
            if let Err(e) = fs::remove_file(quarantine_path) {
                tracing::warn!(
                    "[Quarantine] Restored copy but could not remove {}: {}",
                    quarantine_path.display(),
                    e
                );
            }
        }

        let _ = fs::remove_file(Self::metadata_path(quarantine_path));

        tracing::info!(
            "[Quarantine] Restored {} to {}",
            quarantine_path.display(),
            restore_path.display()
        );

        Ok(restore_path)
    }

    /// List all quarantined items, newest first
    pub fn list(&self) -> Result<Vec<QuarantinedItem>, String> {
        let mut items = Vec::new();

        if !self.base_path.exists() {
            return Ok(items);
        }

        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| format!("Failed to read quarantine directory: {}", e))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if Self::is_metadata_file(&path) {
                continue;
            }

            if let Some(item) = self.load_item_metadata(&path) {
                items.push(item);
            } else if let Ok(metadata) = fs::metadata(&path) {
                let quarantine_date = metadata
                    .modified()
                    .ok()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(Utc::now);

                items.push(QuarantinedItem {
                    path: path.clone(),
                    name: entry.file_name().to_string_lossy().to_string(),
                    original_path: PathBuf::new(), // Unknown
                    duplicate_of: None,
                    quarantine_date,
                    size: metadata.len(),
                });
            }
        }

        items.sort_by(|a, b| b.quarantine_date.cmp(&a.quarantine_date));

        Ok(items)
    }

    /// Permanently delete items older than the retention period
    pub fn cleanup(&self) -> Result<CleanupStats, String> {
        let mut stats = CleanupStats::default();
        let cutoff_date = Utc::now() - Duration::days(self.retention_days as i64);

        for item in self.list()? {
            if item.quarantine_date >= cutoff_date {
                continue;
            }

            match fs::remove_file(&item.path) {
                Ok(()) => {
                    stats.items_removed += 1;
                    stats.bytes_freed += item.size;
                    let _ = fs::remove_file(Self::metadata_path(&item.path));
                    tracing::debug!("[Quarantine] Cleaned up: {}", item.path.display());
                }
                Err(e) => {
                    tracing::warn!("[Quarantine] Failed to clean up {}: {}", item.path.display(), e);
                    stats.errors += 1;
                }
            }
        }

        tracing::info!(
            "[Quarantine] Cleanup complete: {} items removed, {} bytes freed",
            stats.items_removed,
            stats.bytes_freed
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_manager(retention_days: u32) -> (QuarantineManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let quarantine_path = temp_dir.path().join("quarantine");
        let manager = QuarantineManager::with_config(quarantine_path, retention_days);
        (manager, temp_dir)
    }

    #[test]
    fn test_quarantine_file() {
        let (manager, temp_dir) = create_test_manager(30);

        let test_file = temp_dir.path().join("test.txt");
        let mut file = File::create(&test_file).unwrap();
        file.write_all(b"Hello, World!").unwrap();

        let quarantine_path = manager.quarantine(&test_file, None).unwrap();

        assert!(!test_file.exists());
        assert!(quarantine_path.exists());
        assert_eq!(fs::read(&quarantine_path).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_restore_file() {
        let (manager, temp_dir) = create_test_manager(30);

        let test_file = temp_dir.path().join("restore_test.txt");
        fs::write(&test_file, b"Restore me!").unwrap();
        let original = temp_dir.path().join("kept.txt");

        let quarantine_path = manager.quarantine(&test_file, Some(&original)).unwrap();
        let restored = manager.restore(&quarantine_path, None).unwrap();

        assert_eq!(restored, test_file);
        assert!(test_file.exists());
        assert!(!quarantine_path.exists());
    }

    #[test]
    fn test_restore_never_overwrites() {
        let (manager, temp_dir) = create_test_manager(30);

        let test_file = temp_dir.path().join("busy.txt");
        fs::write(&test_file, b"first").unwrap();
        let quarantine_path = manager.quarantine(&test_file, None).unwrap();
        fs::write(&test_file, b"second").unwrap();

        assert!(manager.restore(&quarantine_path, None).is_err());
        assert_eq!(fs::read(&test_file).unwrap(), b"second");
        assert!(quarantine_path.exists());
    }

    #[test]
    fn test_list_quarantine() {
        let (manager, temp_dir) = create_test_manager(30);

        for i in 0..3 {
            let test_file = temp_dir.path().join(format!("list_test_{}.txt", i));
            File::create(&test_file).unwrap();
            manager.quarantine(&test_file, None).unwrap();
        }

        let items = manager.list().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.original_path.starts_with(temp_dir.path())));
    }

    #[test]
    fn test_same_name_twice_gets_distinct_paths() {
        let (manager, temp_dir) = create_test_manager(30);
        let test_file = temp_dir.path().join("twice.txt");

        fs::write(&test_file, b"one").unwrap();
        let first = manager.quarantine(&test_file, None).unwrap();
        fs::write(&test_file, b"two").unwrap();
        let second = manager.quarantine(&test_file, None).unwrap();

        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_cleanup_respects_retention() {
        let (manager, temp_dir) = create_test_manager(30);
        let test_file = temp_dir.path().join("recent.txt");
        fs::write(&test_file, b"recent").unwrap();
        let quarantine_path = manager.quarantine(&test_file, None).unwrap();

        let stats = manager.cleanup().unwrap();
        assert_eq!(stats.items_removed, 0);
        assert!(quarantine_path.exists());
    }

    #[test]
    fn test_cleanup_of_missing_directory() {
        let (manager, _temp_dir) = create_test_manager(0);
        let stats = manager.cleanup().unwrap();
        assert_eq!(stats.items_removed, 0);
        assert_eq!(stats.errors, 0);
    }
}
