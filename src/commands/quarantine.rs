//! `quarantine list|purge`

use crate::config::RenameConfig;
use crate::error::RenameError;
use crate::quarantine::QuarantineManager;

use super::QuarantineAction;

pub fn run_quarantine(action: QuarantineAction) -> Result<u8, RenameError> {
    let config = RenameConfig::from_env()?;

    match action {
        QuarantineAction::List { json } => {
            let manager = QuarantineManager::with_config(
                config.quarantine_dir,
                config.quarantine_retention_days,
            );
            let items = manager.list().map_err(RenameError::Fatal)?;

            if json {
                let out = serde_json::to_string_pretty(&items)
                    .map_err(|e| RenameError::fatal(format!("Failed to serialize items: {}", e)))?;
                println!("{}", out);
                return Ok(0);
            }

            if items.is_empty() {
                println!("Quarantine at {} is empty", manager.base_path().display());
                return Ok(0);
            }

            for item in &items {
                let origin = if item.original_path.as_os_str().is_empty() {
                    "unknown origin".to_string()
                } else {
                    item.original_path.display().to_string()
                };
                println!(
                    "{}  {:>10} B  {}  (from {})",
                    item.quarantine_date.format("%Y-%m-%d %H:%M"),
                    item.size,
                    item.path.display(),
                    origin
                );
            }
            Ok(0)
        }
        QuarantineAction::Purge { older_than_days } => {
            let manager = QuarantineManager::with_config(
                config.quarantine_dir,
                older_than_days.unwrap_or(config.quarantine_retention_days),
            );
            let stats = manager.cleanup().map_err(RenameError::Fatal)?;

            println!(
                "Removed {} items older than {} days ({} bytes freed)",
                stats.items_removed,
                manager.retention_days(),
                stats.bytes_freed
            );
            Ok(if stats.errors > 0 { 2 } else { 0 })
        }
    }
}
