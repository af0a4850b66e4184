//! Files discovered by a scan.

use once_cell::unsync::OnceCell;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bytes read for type sniffing and short text excerpts
pub const HEAD_BYTES: usize = 8192;

/// A file queued for renaming.
///
/// The path is only valid until the file is renamed or moved aside.
#[derive(Debug)]
pub struct FileEntry {
    path: PathBuf,
    name: String,
    extension: Option<String>,
    head: OnceCell<Vec<u8>>,
}

impl FileEntry {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_string());

        Self {
            path,
            name,
            extension,
            head: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name including extension
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extension as written on disk, without the dot
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Lowercased extension for type checks
    pub fn extension_lower(&self) -> Option<String> {
        self.extension.as_ref().map(|e| e.to_lowercase())
    }

    /// First [`HEAD_BYTES`] of the file, read on first access
    pub fn head(&self) -> io::Result<&[u8]> {
        self.head
            .get_or_try_init(|| read_prefix(&self.path, HEAD_BYTES))
            .map(Vec::as_slice)
    }
}

/// Read at most `limit` bytes from the start of a file
pub(crate) fn read_prefix(path: &Path, limit: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Enumerate the regular files directly inside `dir`, sorted by name.
///
/// Hidden files, directories and symlinks are skipped.
pub fn scan_directory(dir: &Path) -> io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed"))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        entries.push(FileEntry::new(entry.into_path()));
    }

    tracing::debug!("[Scan] {} files in {}", entries.len(), dir.display());
    Ok(entries)
}
