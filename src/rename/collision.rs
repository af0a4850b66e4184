//! Collision handling for validated names.
//!
//! For each candidate target the resolver either renames into a free slot,
//! moves the source aside when the occupant is byte-identical, or tries the
//! next `_N` suffix. A distinct existing file is never overwritten and the
//! existing target is never the one removed.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::quarantine::QuarantineManager;

const COMPARE_BUFFER_SIZE: usize = 64 * 1024;

/// Where duplicates go. Both are recoverable.
#[derive(Debug, Clone)]
pub enum DuplicateSink {
    Quarantine(QuarantineManager),
    SystemTrash,
}

impl DuplicateSink {
    /// Move `path` out of the way; returns its new location when known
    pub fn move_aside(&self, path: &Path, duplicate_of: &Path) -> Result<Option<PathBuf>, String> {
        match self {
            Self::Quarantine(manager) => manager.quarantine(path, Some(duplicate_of)).map(Some),
            Self::SystemTrash => trash::delete(path)
                .map(|_| None)
                .map_err(|e| format!("Failed to move to trash: {}", e)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Quarantine(manager) => format!("quarantine at {}", manager.base_path().display()),
            Self::SystemTrash => "system trash".to_string(),
        }
    }
}

/// Filesystem effect of resolving one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Renamed {
        final_name: String,
        new_path: PathBuf,
    },
    DuplicateRemoved {
        matched_existing: String,
        matched_path: PathBuf,
        /// `None` for the system trash
        moved_to: Option<PathBuf>,
    },
    Unchanged,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no free name for {name} after {attempts} suffix attempts")]
    AttemptsExhausted { name: String, attempts: u32 },

    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to move duplicate aside: {0}")]
    MoveAside(String),
}

#[derive(Debug, Clone)]
pub struct CollisionResolver {
    sink: DuplicateSink,
    max_attempts: u32,
}

impl CollisionResolver {
    pub fn new(sink: DuplicateSink, max_attempts: u32) -> Self {
        Self { sink, max_attempts }
    }

    pub fn sink(&self) -> &DuplicateSink {
        &self.sink
    }

    /// Append the source extension unless the candidate already ends in it
    pub fn target_name(candidate: &str, source_extension: Option<&str>) -> String {
        let Some(ext) = source_extension else {
            return candidate.to_string();
        };

        let has_extension = Path::new(candidate)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false);

        if has_extension {
            candidate.to_string()
        } else {
            format!("{}.{}", candidate, ext)
        }
    }

    /// Resolve `source` against `name` in the same directory.
    ///
    /// Performs at most one filesystem mutation.
    pub fn resolve(&self, source: &Path, name: &str) -> Result<Resolution, ResolveError> {
        let dir = source.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "source has no parent directory")
        })?;

        for attempt in 0..=self.max_attempts {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                suffixed_name(name, attempt)
            };
            let target = dir.join(&candidate);

            if target == source {
                return Ok(Resolution::Unchanged);
            }

            match fs::symlink_metadata(&target) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    fs::rename(source, &target)?;
                    tracing::debug!("[Resolver] {} -> {}", source.display(), candidate);
                    return Ok(Resolution::Renamed {
                        final_name: candidate,
                        new_path: target,
                    });
                }
                Err(e) => return Err(e.into()),
                Ok(meta) => {
                    if is_case_only_change(source, &target, &meta)? {
                        fs::rename(source, &target)?;
                        return Ok(Resolution::Renamed {
                            final_name: candidate,
                            new_path: target,
                        });
                    }

                    if meta.is_file() && files_identical(source, &target)? {
                        let moved_to = self
                            .sink
                            .move_aside(source, &target)
                            .map_err(ResolveError::MoveAside)?;
                        tracing::info!(
                            "[Resolver] {} duplicates {}, moved to {}",
                            source.display(),
                            candidate,
                            self.sink.describe()
                        );
                        return Ok(Resolution::DuplicateRemoved {
                            matched_existing: candidate,
                            matched_path: target,
                            moved_to,
                        });
                    }

                    tracing::debug!("[Resolver] {} is taken, trying next suffix", candidate);
                }
            }
        }

        Err(ResolveError::AttemptsExhausted {
            name: name.to_string(),
            attempts: self.max_attempts,
        })
    }
}

/// `Report.txt` + 2 -> `Report_2.txt`; dotfiles and bare names get a plain suffix
pub fn suffixed_name(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 => format!("{}_{}{}", &name[..pos], n, &name[pos..]),
        _ => format!("{}_{}", name, n),
    }
}

/// Byte-for-byte comparison, size first
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::with_capacity(COMPARE_BUFFER_SIZE, File::open(a)?);
    let mut reader_b = BufReader::with_capacity(COMPARE_BUFFER_SIZE, File::open(b)?);
    let mut buf_a = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut buf_b = vec![0u8; COMPARE_BUFFER_SIZE];

    loop {
        let read_a = read_full(&mut reader_a, &mut buf_a)?;
        let read_b = read_full(&mut reader_b, &mut buf_b)?;

        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` unless EOF comes first
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// True when `target` only resolved because the filesystem folds case.
///
/// The names must differ in case alone, the target must not be a symlink,
/// both must be the same file, and no entry spelled exactly like `target`
/// may exist. A hard link under another name is a real occupant.
fn is_case_only_change(source: &Path, target: &Path, target_meta: &fs::Metadata) -> io::Result<bool> {
    let (Some(source_name), Some(target_name)) = (source.file_name(), target.file_name()) else {
        return Ok(false);
    };
    let (Some(source_name), Some(target_name)) = (source_name.to_str(), target_name.to_str()) else {
        return Ok(false);
    };

    if source_name == target_name
        || !source_name.eq_ignore_ascii_case(target_name)
        || target_meta.file_type().is_symlink()
        || !is_same_file(source, target)
    {
        return Ok(false);
    }

    let Some(dir) = target.parent() else {
        return Ok(false);
    };
    for entry in fs::read_dir(dir)? {
        if entry?.file_name().to_str() == Some(target_name) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(unix)]
fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
