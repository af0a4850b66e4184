//! `undo`: reverse one logged run.

use uuid::Uuid;

use crate::config::{default_log_file, RenameConfig};
use crate::error::RenameError;
use crate::history::{latest_run_id, undo_run, RenameLog};
use crate::quarantine::QuarantineManager;

use super::UndoArgs;

pub fn run_undo(args: UndoArgs) -> Result<u8, RenameError> {
    let config = RenameConfig::from_env()?;
    let log_path = args
        .log
        .or(config.log_file)
        .unwrap_or_else(default_log_file);

    let records = RenameLog::read_all(&log_path).map_err(RenameError::Fatal)?;
    let run_id = match args.run_id {
        Some(id) => id,
        None => latest_run_id(&records)
            .map(str::to_string)
            .ok_or_else(|| {
                RenameError::fatal(format!("No renames recorded in {}", log_path.display()))
            })?,
    };

    if !records.iter().any(|r| r.run_id == run_id) {
        return Err(RenameError::fatal(format!(
            "Run {} not found in {}",
            run_id,
            log_path.display()
        )));
    }

    let quarantine = QuarantineManager::with_config(
        config.quarantine_dir,
        config.quarantine_retention_days,
    );
    let undo_log = RenameLog::open(log_path.clone(), Uuid::new_v4().to_string())
        .map_err(RenameError::Fatal)?;

    let result = undo_run(&records, &run_id, &quarantine, Some(&undo_log));

    for (current, restored) in &result.restored {
        println!("  {} -> {}", current.display(), restored.display());
    }
    for conflict in &result.conflicts {
        println!("  skipped: {}", conflict.message);
    }
    println!(
        "Undo of run {}: {} restored, {} skipped",
        run_id, result.operations_undone, result.operations_skipped
    );

    Ok(if result.success() { 0 } else { 2 })
}
