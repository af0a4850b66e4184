//! The name generation seam.
//!
//! The batch pipeline only ever talks to a [`NameGenerator`]; the live
//! implementation is [`OpenAiClient`](super::client::OpenAiClient), tests
//! use a scripted fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts::GenerationRequest;

/// Token usage reported by the generation endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A candidate name plus whatever usage the endpoint reported
#[derive(Debug, Clone)]
pub struct GeneratedName {
    /// Untrusted until it passes the filename validator
    pub candidate: String,
    /// `None` when the endpoint did not report usage
    pub usage: Option<TokenUsage>,
}

/// Error type for generation calls
#[derive(Debug, Clone)]
pub struct GenerationError {
    pub message: String,
    pub kind: GenerationErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    Timeout,
    Quota,
    Auth,
    Http,
    Malformed,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Malformed, message)
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.kind {
            GenerationErrorKind::Timeout => "timeout",
            GenerationErrorKind::Quota => "quota",
            GenerationErrorKind::Auth => "auth",
            GenerationErrorKind::Http => "http",
            GenerationErrorKind::Malformed => "malformed response",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

impl std::error::Error for GenerationError {}

impl From<GenerationError> for String {
    fn from(err: GenerationError) -> Self {
        err.to_string()
    }
}

/// Opaque request -> candidate filename call.
///
/// Calls are awaited one at a time; implementations must not retry on
/// their own.
#[async_trait]
pub trait NameGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedName, GenerationError>;
}
