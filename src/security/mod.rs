//! Filename validation for generated names.
//!
//! Candidates are rejected, never repaired: a name that fails any check is
//! skipped and the file keeps its current name.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest accepted name in bytes (common filesystem limit)
pub const MAX_FILENAME_BYTES: usize = 255;

/// Command separators, pipes, substitution and redirection
const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '$', '<', '>'];

/// Windows device names, with or without an extension
static RESERVED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(con|prn|aux|nul|com[1-9]|lpt[1-9])(\..*)?$")
        .expect("reserved name pattern is valid")
});

/// Category of a rejected candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationKind {
    Empty,
    PathSeparator,
    ParentReference,
    ShellMetacharacter,
    ControlCharacter,
    HiddenName,
    ReservedName,
    TooLong,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty name",
            Self::PathSeparator => "path separator",
            Self::ParentReference => "parent directory reference",
            Self::ShellMetacharacter => "shell metacharacter",
            Self::ControlCharacter => "control character",
            Self::HiddenName => "hidden or dot-only name",
            Self::ReservedName => "reserved device name",
            Self::TooLong => "name too long",
        }
    }
}

/// Error type for rejected candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameValidationError {
    pub message: String,
    pub violations: Vec<ViolationKind>,
}

impl std::fmt::Display for FilenameValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FilenameValidationError {}

/// Security validator for generated filenames
pub struct FilenameValidator;

impl FilenameValidator {
    /// Every violation found in `candidate`, in a stable order
    pub fn violations(candidate: &str) -> Vec<ViolationKind> {
        let mut found = Vec::new();

        if candidate.trim().is_empty() {
            found.push(ViolationKind::Empty);
            return found;
        }

        if candidate.contains('/') || candidate.contains('\\') {
            found.push(ViolationKind::PathSeparator);
        }
        if candidate.contains("..") && Self::has_parent_reference(candidate) {
            found.push(ViolationKind::ParentReference);
        }
        if candidate.contains(SHELL_METACHARACTERS) {
            found.push(ViolationKind::ShellMetacharacter);
        }
        if candidate.chars().any(char::is_control) {
            found.push(ViolationKind::ControlCharacter);
        }
        if candidate.starts_with('.') {
            found.push(ViolationKind::HiddenName);
        }
        if RESERVED_NAME.is_match(candidate.trim()) {
            found.push(ViolationKind::ReservedName);
        }
        if candidate.len() > MAX_FILENAME_BYTES {
            found.push(ViolationKind::TooLong);
        }

        found.sort();
        found.dedup();
        found
    }

    /// Accept `candidate` unchanged or reject it with every violation listed
    pub fn validate(candidate: &str) -> Result<(), FilenameValidationError> {
        let violations = Self::violations(candidate);
        if violations.is_empty() {
            return Ok(());
        }

        let categories = violations
            .iter()
            .map(ViolationKind::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        tracing::debug!("[Validator] Rejected {:?}: {}", candidate, categories);

        Err(FilenameValidationError {
            message: format!("unsafe filename {:?}: {}", candidate, categories),
            violations,
        })
    }

    /// `..` as a whole path component, or a name made only of dots
    fn has_parent_reference(candidate: &str) -> bool {
        candidate
            .split(['/', '\\'])
            .any(|part| part == ".." || (!part.is_empty() && part.chars().all(|c| c == '.')))
            || candidate.starts_with("..")
    }
}
