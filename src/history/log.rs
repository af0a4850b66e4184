//! Append-only rename log.
//!
//! One tab-separated line per filesystem mutation:
//! `<rfc3339>\t<run id>\t<ACTION>\t<from>\t<to>`. The file stays human
//! readable and is never rewritten; undo appends its own `RESTORED` lines.
//! Writers hold an exclusive fs2 lock while appending so concurrent runs
//! never interleave partial lines.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Written in place of a path when a duplicate went to the OS trash
pub const SYSTEM_TRASH_MARKER: &str = "<system trash>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    Renamed,
    Duplicate,
    Restored,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Renamed => "RENAMED",
            Self::Duplicate => "DUPLICATE",
            Self::Restored => "RESTORED",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "RENAMED" => Some(Self::Renamed),
            "DUPLICATE" => Some(Self::Duplicate),
            "RESTORED" => Some(Self::Restored),
            _ => None,
        }
    }
}

/// One parsed log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub action: LogAction,
    pub from: PathBuf,
    pub to: PathBuf,
}

impl LogRecord {
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.timestamp.to_rfc3339(),
            self.run_id,
            self.action.as_str(),
            escape(&self.from.to_string_lossy()),
            escape(&self.to.to_string_lossy())
        )
    }

    /// `None` for blank, foreign or truncated lines
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');

        let timestamp = DateTime::parse_from_rfc3339(fields.next()?).ok()?;
        let run_id = fields.next()?.to_string();
        let action = LogAction::parse(fields.next()?)?;
        let from = PathBuf::from(unescape(fields.next()?));
        let to = PathBuf::from(unescape(fields.next()?));

        if fields.next().is_some() || run_id.is_empty() {
            return None;
        }

        Some(Self {
            timestamp: timestamp.with_timezone(&Utc),
            run_id,
            action,
            from,
            to,
        })
    }

    /// Duplicate that went to the OS trash and has no restorable path
    pub fn is_in_system_trash(&self) -> bool {
        self.action == LogAction::Duplicate && self.to.as_os_str() == SYSTEM_TRASH_MARKER
    }
}

/// Handle for appending one run's records
#[derive(Debug, Clone)]
pub struct RenameLog {
    path: PathBuf,
    run_id: String,
}

impl RenameLog {
    pub fn open(path: PathBuf, run_id: impl Into<String>) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create log directory: {}", e))?;
            }
        }

        Ok(Self {
            path,
            run_id: run_id.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn append(&self, action: LogAction, from: &Path, to: &Path) -> Result<(), String> {
        let record = LogRecord {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            action,
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("Failed to open rename log: {}", e))?;

        // Block until we get exclusive access
        file.lock_exclusive()
            .map_err(|e| format!("Failed to lock rename log: {}", e))?;

        let written = writeln!(file, "{}", record.to_line()).and_then(|_| file.flush());
        let _ = FileExt::unlock(&file);

        written.map_err(|e| format!("Failed to write rename log: {}", e))
    }

    /// Every well-formed record in file order; a missing log is empty
    pub fn read_all(path: &Path) -> Result<Vec<LogRecord>, String> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("Failed to read rename log: {}", e)),
        };

        let mut records = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match LogRecord::parse(line) {
                Some(record) => records.push(record),
                None => tracing::warn!("[History] Ignoring malformed log line {}", number + 1),
            }
        }
        Ok(records)
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("nested").join("history.log");
        let log = RenameLog::open(log_path.clone(), "run-1").unwrap();

        log.append(LogAction::Renamed, Path::new("/d/a.txt"), Path::new("/d/Alpha.txt"))
            .unwrap();
        log.append(LogAction::Duplicate, Path::new("/d/b.txt"), Path::new("/q/b.txt"))
            .unwrap();

        let records = RenameLog::read_all(&log_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, LogAction::Renamed);
        assert_eq!(records[0].from, PathBuf::from("/d/a.txt"));
        assert_eq!(records[1].to, PathBuf::from("/q/b.txt"));
        assert!(records.iter().all(|r| r.run_id == "run-1"));
    }

    #[test]
    fn test_log_is_append_only_across_runs() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("history.log");

        RenameLog::open(log_path.clone(), "first")
            .unwrap()
            .append(LogAction::Renamed, Path::new("a"), Path::new("b"))
            .unwrap();
        RenameLog::open(log_path.clone(), "second")
            .unwrap()
            .append(LogAction::Renamed, Path::new("c"), Path::new("d"))
            .unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().contains("\tfirst\tRENAMED\ta\tb"));
    }

    #[test]
    fn test_paths_with_tabs_survive() {
        let record = LogRecord {
            timestamp: Utc::now(),
            run_id: "r".into(),
            action: LogAction::Renamed,
            from: PathBuf::from("odd\tname\\x.txt"),
            to: PathBuf::from("Clean.txt"),
        };

        let line = record.to_line();
        assert_eq!(line.split('\t').count(), 5);

        let parsed = LogRecord::parse(&line).unwrap();
        assert_eq!(parsed.from, record.from);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("history.log");
        fs::write(
            &log_path,
            "garbage\n\n2024-03-15T10:00:00+00:00\tr\tRENAMED\ta\tb\n2024-03-15T10:00:00+00:00\tr\tMOVED\ta\tb\n",
        )
        .unwrap();

        let records = RenameLog::read_all(&log_path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(RenameLog::read_all(&dir.path().join("none.log")).unwrap().is_empty());
    }
}
