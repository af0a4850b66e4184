//! Undo of a logged rename run with conflict detection.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::history::log::{LogAction, LogRecord, RenameLog};
use crate::quarantine::QuarantineManager;

/// Why a logged mutation could not be reversed
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// The renamed or quarantined file is gone
    Deleted,
    /// Something already occupies the original path
    Blocking,
    /// Duplicate went to the OS trash; restore it by hand
    InSystemTrash,
    /// The reverse move itself failed
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub path: PathBuf,
    pub conflict_type: ConflictType,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResult {
    pub run_id: String,
    pub operations_undone: usize,
    pub operations_skipped: usize,
    /// (current path, restored path) per reversed mutation
    pub restored: Vec<(PathBuf, PathBuf)>,
    pub conflicts: Vec<ConflictInfo>,
}

impl UndoResult {
    pub fn success(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Most recent run that mutated anything
pub fn latest_run_id(records: &[LogRecord]) -> Option<&str> {
    records
        .iter()
        .rev()
        .find(|r| matches!(r.action, LogAction::Renamed | LogAction::Duplicate))
        .map(|r| r.run_id.as_str())
}

/// Check one record without touching the filesystem
fn check_conflict(record: &LogRecord) -> Option<ConflictInfo> {
    if record.is_in_system_trash() {
        return Some(ConflictInfo {
            path: record.from.clone(),
            conflict_type: ConflictType::InSystemTrash,
            message: format!("{} was moved to the system trash", record.from.display()),
        });
    }

    if !record.to.exists() {
        return Some(ConflictInfo {
            path: record.to.clone(),
            conflict_type: ConflictType::Deleted,
            message: format!("{} no longer exists", record.to.display()),
        });
    }

    if record.from.exists() {
        return Some(ConflictInfo {
            path: record.from.clone(),
            conflict_type: ConflictType::Blocking,
            message: format!("{} is already taken", record.from.display()),
        });
    }

    None
}

/// Reverse every mutation of `run_id`, newest first.
///
/// Conflicts are reported and skipped; nothing is ever overwritten. Each
/// reversal is appended to `log` as a `RESTORED` line when given.
pub fn undo_run(
    records: &[LogRecord],
    run_id: &str,
    quarantine: &QuarantineManager,
    log: Option<&RenameLog>,
) -> UndoResult {
    let mut result = UndoResult {
        run_id: run_id.to_string(),
        ..Default::default()
    };

    let operations = records.iter().rev().filter(|r| {
        r.run_id == run_id && matches!(r.action, LogAction::Renamed | LogAction::Duplicate)
    });

    for record in operations {
        if let Some(conflict) = check_conflict(record) {
            tracing::warn!("[Undo] Skipping: {}", conflict.message);
            result.operations_skipped += 1;
            result.conflicts.push(conflict);
            continue;
        }

        let reversed = match record.action {
            LogAction::Duplicate => quarantine.restore(&record.to, Some(record.from.clone())).map(|_| ()),
            _ => rename_back(&record.to, &record.from),
        };

        match reversed {
            Ok(()) => {
                tracing::info!(
                    "[Undo] {} -> {}",
                    record.to.display(),
                    record.from.display()
                );
                if let Some(log) = log {
                    if let Err(e) = log.append(LogAction::Restored, &record.to, &record.from) {
                        tracing::warn!("[Undo] {}", e);
                    }
                }
                result.operations_undone += 1;
                result.restored.push((record.to.clone(), record.from.clone()));
            }
            Err(message) => {
                result.operations_skipped += 1;
                result.conflicts.push(ConflictInfo {
                    path: record.to.clone(),
                    conflict_type: ConflictType::Failed,
                    message,
                });
            }
        }
    }

    result
}

fn rename_back(current: &Path, original: &Path) -> Result<(), String> {
    fs::rename(current, original).map_err(|e| {
        format!(
            "Failed to rename {} back to {}: {}",
            current.display(),
            original.display(),
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(run_id: &str, action: LogAction, from: &Path, to: &Path) -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            action,
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }
    }

    #[test]
    fn test_latest_run_ignores_restores() {
        let records = vec![
            record("a", LogAction::Renamed, Path::new("x"), Path::new("y")),
            record("b", LogAction::Renamed, Path::new("x"), Path::new("y")),
            record("undo", LogAction::Restored, Path::new("y"), Path::new("x")),
        ];
        assert_eq!(latest_run_id(&records), Some("b"));
        assert_eq!(latest_run_id(&[]), None);
    }

    #[test]
    fn test_undo_reverses_renames_in_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let mid = dir.path().join("Mid.txt");
        let end = dir.path().join("End.txt");
        fs::write(&end, "content").unwrap();

        // a -> Mid, then Mid -> End within one run
        let records = vec![
            record("r1", LogAction::Renamed, &a, &mid),
            record("r1", LogAction::Renamed, &mid, &end),
        ];
        let quarantine = QuarantineManager::with_config(dir.path().join(".q"), 30);

        let result = undo_run(&records, "r1", &quarantine, None);

        assert!(result.success());
        assert_eq!(result.operations_undone, 2);
        assert!(a.exists());
        assert!(!end.exists());
    }

    #[test]
    fn test_undo_restores_quarantined_duplicate() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("b.txt");
        fs::write(&original, "dup").unwrap();

        let quarantine = QuarantineManager::with_config(dir.path().join(".q"), 30);
        let moved = quarantine.quarantine(&original, None).unwrap();
        let records = vec![record("r1", LogAction::Duplicate, &original, &moved)];

        let log = RenameLog::open(dir.path().join("history.log"), "undo-run").unwrap();
        let result = undo_run(&records, "r1", &quarantine, Some(&log));

        assert_eq!(result.operations_undone, 1);
        assert_eq!(fs::read_to_string(&original).unwrap(), "dup");

        let written = RenameLog::read_all(log.path()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].action, LogAction::Restored);
    }

    #[test]
    fn test_blocked_original_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let renamed = dir.path().join("Alpha.txt");
        fs::write(&a, "newcomer").unwrap();
        fs::write(&renamed, "renamed").unwrap();

        let records = vec![record("r1", LogAction::Renamed, &a, &renamed)];
        let quarantine = QuarantineManager::with_config(dir.path().join(".q"), 30);
        let result = undo_run(&records, "r1", &quarantine, None);

        assert_eq!(result.operations_skipped, 1);
        assert_eq!(result.conflicts[0].conflict_type, ConflictType::Blocking);
        assert_eq!(fs::read_to_string(&a).unwrap(), "newcomer");
        assert!(renamed.exists());
    }

    #[test]
    fn test_other_runs_and_trash_entries() {
        let dir = TempDir::new().unwrap();
        let records = vec![
            record("other", LogAction::Renamed, &dir.path().join("x"), &dir.path().join("y")),
            record(
                "r1",
                LogAction::Duplicate,
                &dir.path().join("b.txt"),
                Path::new(crate::history::log::SYSTEM_TRASH_MARKER),
            ),
        ];
        let quarantine = QuarantineManager::with_config(dir.path().join(".q"), 30);
        let result = undo_run(&records, "r1", &quarantine, None);

        assert_eq!(result.operations_undone, 0);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].conflict_type, ConflictType::InSystemTrash);
    }
}
