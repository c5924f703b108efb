use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message, Role};
use crate::sse::decode_claude_stream;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_SECS: u64 = 1;

/// Anthropic messages API backend.
///
/// The messages endpoint takes the system prompt as a dedicated request
/// field, so system entries are split out of the message list before
/// sending. Embeddings are not offered by this API.
pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Clone for ClaudeProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl ClaudeProvider {
    #[must_use]
    pub fn new(api_key: String, model: String, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }

    fn build_request(&self, messages: &[Message], stream: bool) -> reqwest::RequestBuilder {
        let (system, chat_messages) = split_system(messages);

        let body = RequestBody {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: chat_messages,
            stream,
        };

        self.client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
    }

    async fn send_request(&self, messages: &[Message]) -> Result<String, LlmError> {
        for attempt in 0..=MAX_RETRIES {
            let response = self.build_request(messages, false).send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt == MAX_RETRIES {
                    return Err(LlmError::RateLimited);
                }
                let delay = retry_delay(&response, attempt);
                tracing::warn!(
                    "rate limited, retrying in {}s (attempt {}/{})",
                    delay.as_secs(),
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let text = response.text().await.map_err(LlmError::Http)?;

            if !status.is_success() {
                tracing::error!("messages API error {status}: {text}");
                return Err(LlmError::Other(format!(
                    "messages API request failed (status {status})"
                )));
            }

            let resp: ApiResponse = serde_json::from_str(&text)?;
            return resp
                .content
                .first()
                .map(|c| c.text.clone())
                .ok_or(LlmError::EmptyResponse { provider: "claude" });
        }

        Err(LlmError::RateLimited)
    }

    async fn send_stream_request(
        &self,
        messages: &[Message],
    ) -> Result<reqwest::Response, LlmError> {
        for attempt in 0..=MAX_RETRIES {
            let response = self.build_request(messages, true).send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt == MAX_RETRIES {
                    return Err(LlmError::RateLimited);
                }
                let delay = retry_delay(&response, attempt);
                tracing::warn!(
                    "rate limited, retrying in {}s (attempt {}/{})",
                    delay.as_secs(),
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.map_err(LlmError::Http)?;
                tracing::error!("messages API streaming error {status}: {text}");
                return Err(LlmError::Other(format!(
                    "messages API streaming request failed (status {status})"
                )));
            }

            return Ok(response);
        }

        Err(LlmError::RateLimited)
    }
}

impl LlmProvider for ClaudeProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "claude"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.send_request(messages).await
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = self.send_stream_request(messages).await?;
        Ok(decode_claude_stream(response))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::EmbedUnsupported { provider: "claude" })
    }

    fn supports_embeddings(&self) -> bool {
        false
    }
}

/// Concatenate system entries into the dedicated request field and keep the
/// rest in order.
fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let mut system_parts = Vec::new();
    let mut chat_messages = Vec::new();

    for message in messages {
        if message.role == Role::System {
            system_parts.push(message.content.as_str());
        } else {
            chat_messages.push(message);
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    (system, chat_messages)
}

fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map_or_else(
            || Duration::from_secs(BASE_BACKOFF_SECS << attempt),
            Duration::from_secs,
        )
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a Message>,
    stream: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> ClaudeProvider {
        ClaudeProvider::new("key".into(), "claude-sonnet-4-5".into(), 1024, 0.7)
    }

    #[test]
    fn split_system_extracts_and_joins() {
        let messages = vec![
            Message::system("instructions"),
            Message::system("context"),
            Message::user("hello"),
            Message::assistant("hi"),
        ];
        let (system, chat) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("instructions\n\ncontext"));
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0].role, Role::User);
    }

    #[test]
    fn split_system_none_without_system_entries() {
        let messages = vec![Message::user("hello")];
        let (system, chat) = split_system(&messages);
        assert!(system.is_none());
        assert_eq!(chat.len(), 1);
    }

    #[test]
    fn request_body_omits_missing_system() {
        let messages = vec![Message::user("hi")];
        let (system, chat_messages) = split_system(&messages);
        let body = RequestBody {
            model: "m",
            max_tokens: 10,
            temperature: 0.0,
            system,
            messages: chat_messages,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn embeddings_unsupported() {
        assert!(!test_provider().supports_embeddings());
    }

    #[tokio::test]
    async fn embed_returns_unsupported() {
        let result = test_provider().embed("text").await;
        assert!(matches!(result, Err(LlmError::EmbedUnsupported { .. })));
    }

    #[test]
    fn debug_redacts_api_key() {
        let dbg = format!("{:?}", test_provider());
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn api_response_parses_first_block() {
        let raw = r#"{"content":[{"type":"text","text":"hello"}]}"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.content[0].text, "hello");
    }
}
