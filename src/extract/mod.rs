//! Content extraction.
//!
//! Turns a [`FileEntry`] into a bounded text excerpt for the prompt:
//! - paginated / office documents: leading pages only, empty text when the
//!   parser fails (no content, not an error)
//! - text-like files (by MIME, extension or UTF-8 sniffing): first N chars
//! - anything else: [`ExtractionError::Unsupported`]

pub mod document_parser;

use std::io;
use thiserror::Error;

use crate::rename::entry::{read_prefix, FileEntry, HEAD_BYTES};
use document_parser::{clean_text, DocumentParser};

/// How a file's content is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    WordDocument,
    Spreadsheet,
    Text,
    Unsupported,
}

/// Bounded text taken from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentExcerpt {
    pub text: String,
    /// False when a document parser failed and `text` is empty
    pub extracted: bool,
    pub kind: FileKind,
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("failed to read file: {0}")]
    Read(#[from] io::Error),
}

/// Extensions read as text without sniffing
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "xml", "yaml", "yml", "log", "ini", "cfg",
    "conf", "toml", "env", "sh", "bash", "zsh", "rs", "ts", "js", "py", "html", "htm", "rtf",
    "tex", "sql", "srt", "vtt",
];

/// MIME subtypes under `application/` that are plain text
const TEXT_APPLICATION_SUBTYPES: &[&str] = &[
    "json",
    "xml",
    "javascript",
    "x-sh",
    "toml",
    "x-yaml",
    "yaml",
    "sql",
    "rtf",
    "x-tex",
];

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    max_chars: usize,
    parser: DocumentParser,
}

impl ContentExtractor {
    pub fn new(max_chars: usize, max_pages: usize) -> Self {
        Self {
            max_chars,
            parser: DocumentParser::new(max_pages, max_chars),
        }
    }

    /// Classify by extension, then MIME, then content sniffing
    pub fn classify(&self, entry: &FileEntry) -> FileKind {
        let ext = entry.extension_lower();

        match ext.as_deref() {
            Some("pdf") => return FileKind::Pdf,
            Some("docx") => return FileKind::WordDocument,
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => return FileKind::Spreadsheet,
            Some(e) if TEXT_EXTENSIONS.contains(&e) => return FileKind::Text,
            _ => {}
        }

        if let Some(mime) = mime_guess::from_path(entry.path()).first() {
            let (top, sub) = (mime.type_().as_str(), mime.subtype().as_str());
            if top == "text" || (top == "application" && TEXT_APPLICATION_SUBTYPES.contains(&sub)) {
                return FileKind::Text;
            }
            if sub != "octet-stream" {
                return FileKind::Unsupported;
            }
        }

        // No extension, unknown extension or octet-stream: look at the bytes
        match entry.head() {
            Ok(head) if looks_like_text(head) => FileKind::Text,
            _ => FileKind::Unsupported,
        }
    }

    pub fn extract(&self, entry: &FileEntry) -> Result<ContentExcerpt, ExtractionError> {
        let kind = self.classify(entry);

        let parsed = match kind {
            FileKind::Unsupported => {
                return Err(ExtractionError::Unsupported(
                    entry
                        .extension_lower()
                        .unwrap_or_else(|| "binary without extension".to_string()),
                ))
            }
            FileKind::Text => {
                return Ok(ContentExcerpt {
                    text: self.read_text(entry)?,
                    extracted: true,
                    kind,
                })
            }
            FileKind::Pdf => self.parser.extract_pdf(entry.path()),
            FileKind::WordDocument => self.parser.extract_docx(entry.path()),
            FileKind::Spreadsheet => self.parser.extract_spreadsheet(entry.path()),
        };

        match parsed {
            Ok(text) => Ok(ContentExcerpt {
                text: truncate_chars(&text, self.max_chars),
                extracted: true,
                kind,
            }),
            Err(e) => {
                tracing::warn!(
                    "[Extractor] {} yielded no content: {}",
                    entry.path().display(),
                    e
                );
                Ok(ContentExcerpt {
                    text: String::new(),
                    extracted: false,
                    kind,
                })
            }
        }
    }

    /// First `max_chars` characters of a text file, decoded lossily
    fn read_text(&self, entry: &FileEntry) -> Result<String, ExtractionError> {
        let needed = self.max_chars.saturating_mul(4);
        let head = entry.head()?;

        let text = if head.len() < HEAD_BYTES || needed <= head.len() {
            String::from_utf8_lossy(head).to_string()
        } else {
            String::from_utf8_lossy(&read_prefix(entry.path(), needed)?).to_string()
        };

        Ok(truncate_chars(clean_text(&text).as_str(), self.max_chars))
    }
}

/// UTF-8 without NUL bytes; a multi-byte char cut off at the end is fine
pub fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.contains(&0) {
        return false;
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && bytes.len() >= HEAD_BYTES,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
