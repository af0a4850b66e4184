//! OpenAI chat-completions client implementing [`NameGenerator`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::generator::{GeneratedName, GenerationError, GenerationErrorKind, NameGenerator, TokenUsage};
use super::http_client::generation_client;
use super::prompts::GenerationRequest;

/// Short response expected: a single filename
const MAX_COMPLETION_TOKENS: u32 = 30;

const TEMPERATURE: f32 = 0.2;

/// Message in conversation
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// API request body
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// API error response
#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// OpenAI-compatible chat-completions client
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, String> {
        Ok(Self {
            client: generation_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn classify_status(status: StatusCode, body: &str) -> GenerationError {
        let detail = serde_json::from_str::<ApiError>(body).ok().map(|e| e.error);
        let message = detail
            .as_ref()
            .map(|d| d.message.clone())
            .unwrap_or_else(|| body.chars().take(200).collect());

        let quota_exhausted = detail
            .as_ref()
            .and_then(|d| d.error_type.as_deref())
            .map(|t| t == "insufficient_quota")
            .unwrap_or(false);

        let kind = match status {
            StatusCode::TOO_MANY_REQUESTS => GenerationErrorKind::Quota,
            StatusCode::PAYMENT_REQUIRED => GenerationErrorKind::Quota,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationErrorKind::Auth,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GenerationErrorKind::Timeout,
            _ if quota_exhausted => GenerationErrorKind::Quota,
            _ => GenerationErrorKind::Http,
        };

        GenerationError::new(kind, format!("API error ({}): {}", status, message))
    }
}

/// Trim surrounding whitespace and one pair of wrapping quotes from a reply
pub(crate) fn parse_candidate(reply: &str) -> Result<String, GenerationError> {
    let trimmed = reply.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed)
        .trim();

    if unquoted.is_empty() {
        return Err(GenerationError::malformed("empty reply"));
    }
    Ok(unquoted.to_string())
}

#[async_trait]
impl NameGenerator for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedName, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt(),
            }],
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::timeout(format!("Request timed out: {}", e))
                } else {
                    GenerationError::new(GenerationErrorKind::Http, format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::timeout(format!("Response timed out: {}", e))
            } else {
                GenerationError::malformed(format!("Failed to parse response: {}", e))
            }
        })?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| GenerationError::malformed("no choices in response"))?;

        let candidate = parse_candidate(content)?;
        let usage = parsed.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        tracing::debug!(
            "[OpenAI] {} -> {:?} ({:?})",
            request.original_name,
            candidate,
            usage
        );

        Ok(GeneratedName { candidate, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidate_trims_quotes() {
        assert_eq!(parse_candidate("  \"Report.txt\"\n").unwrap(), "Report.txt");
        assert_eq!(parse_candidate("'Report.txt'").unwrap(), "Report.txt");
        assert_eq!(parse_candidate("Report.txt").unwrap(), "Report.txt");
    }

    #[test]
    fn test_parse_candidate_keeps_backticks() {
        // Backticks are left for the validator to reject
        assert_eq!(parse_candidate("`Report.txt`").unwrap(), "`Report.txt`");
    }

    #[test]
    fn test_parse_candidate_rejects_empty() {
        let err = parse_candidate("  \"\" ").unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Malformed);
    }

    #[test]
    fn test_classify_status() {
        let quota = OpenAiClient::classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"slow down","type":"requests"}}"#,
        );
        assert_eq!(quota.kind, GenerationErrorKind::Quota);
        assert!(quota.message.contains("slow down"));

        let billing = OpenAiClient::classify_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"out of credit","type":"insufficient_quota"}}"#,
        );
        assert_eq!(billing.kind, GenerationErrorKind::Quota);

        let auth = OpenAiClient::classify_status(StatusCode::UNAUTHORIZED, "nope");
        assert_eq!(auth.kind, GenerationErrorKind::Auth);

        let other = OpenAiClient::classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(other.kind, GenerationErrorKind::Http);
    }
}
