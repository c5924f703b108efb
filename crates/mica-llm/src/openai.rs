use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};
use crate::sse::decode_openai_stream;

/// Chat + embeddings backend speaking the OpenAI HTTP API.
///
/// The `base_url` is configurable, so the same backend talks to the hosted
/// API or to any compatible endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    embedding_model: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl Clone for OpenAiProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            embedding_model: self.embedding_model.clone(),
        }
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            max_tokens,
            temperature,
            embedding_model,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn post_chat(&self, body: &ChatRequest<'_>) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
    }

    async fn send_request(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };
        let response = self.post_chat(&body).send().await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("chat completions error {status}: {text}");
            return Err(LlmError::Other(format!(
                "chat completions request failed (status {status})"
            )));
        }

        let resp: ChatResponse = serde_json::from_str(&text)?;

        resp.choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or(LlmError::EmptyResponse { provider: "openai" })
    }

    async fn send_stream_request(
        &self,
        messages: &[Message],
    ) -> Result<reqwest::Response, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        };
        let response = self.post_chat(&body).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let text = response.text().await.map_err(LlmError::Http)?;
            tracing::error!("streaming chat completions error {status}: {text}");
            return Err(LlmError::Other(format!(
                "streaming chat completions request failed (status {status})"
            )));
        }

        Ok(response)
    }

    async fn send_embed_request(&self, input: EmbeddingInput<'_>) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "openai" })?;

        let body = EmbeddingRequest { model, input };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("embeddings error {status}: {text}");
            return Err(LlmError::Other(format!(
                "embeddings request failed (status {status})"
            )));
        }

        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;
        // The API may return entries out of order; `index` is authoritative.
        resp.data.sort_by_key(|d| d.index);
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl LlmProvider for OpenAiProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        match self.send_request(messages).await {
            Err(LlmError::RateLimited) => {
                tracing::warn!("rate limited, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.send_request(messages).await
            }
            other => other,
        }
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = match self.send_stream_request(messages).await {
            Err(LlmError::RateLimited) => {
                tracing::warn!("rate limited, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.send_stream_request(messages).await?
            }
            other => other?,
        };
        Ok(decode_openai_stream(response))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let vectors = self.send_embed_request(EmbeddingInput::Single(text)).await?;
        vectors
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: "openai" })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.send_embed_request(EmbeddingInput::Batch(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(LlmError::Other(format!(
                "embeddings response count mismatch: sent {}, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    fn test_provider() -> OpenAiProvider {
        OpenAiProvider::new(
            "key".into(),
            "https://api.openai.com/v1/".into(),
            "gpt-4o-mini".into(),
            1024,
            0.7,
            Some("text-embedding-3-small".into()),
        )
    }

    #[test]
    fn base_url_trailing_slashes_trimmed() {
        let p = OpenAiProvider::new(
            "k".into(),
            "http://localhost:4000///".into(),
            "m".into(),
            100,
            0.0,
            None,
        );
        assert_eq!(p.base_url, "http://localhost:4000");
    }

    #[test]
    fn supports_embeddings_follows_model() {
        assert!(test_provider().supports_embeddings());
        let p = OpenAiProvider::new("k".into(), "http://x".into(), "m".into(), 100, 0.0, None);
        assert!(!p.supports_embeddings());
    }

    #[test]
    fn debug_redacts_api_key() {
        let dbg = format!("{:?}", test_provider());
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("key\": \"key"));
    }

    #[test]
    fn chat_request_wire_shape() {
        let messages = vec![Message::new(Role::User, "hi")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 64,
            temperature: 0.2,
            stream: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn embedding_input_serializes_flat() {
        let single = serde_json::to_value(EmbeddingInput::Single("hello")).unwrap();
        assert_eq!(single, serde_json::json!("hello"));

        let texts = vec!["a".to_owned(), "b".to_owned()];
        let batch = serde_json::to_value(EmbeddingInput::Batch(&texts)).unwrap();
        assert_eq!(batch, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn embedding_response_reorders_by_index() {
        let raw = r#"{"data":[
            {"index":1,"embedding":[2.0]},
            {"index":0,"embedding":[1.0]}
        ]}"#;
        let mut resp: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        resp.data.sort_by_key(|d| d.index);
        assert_eq!(resp.data[0].embedding, vec![1.0]);
        assert_eq!(resp.data[1].embedding, vec![2.0]);
    }

    #[tokio::test]
    async fn chat_unreachable_errors() {
        let p = OpenAiProvider::new(
            "k".into(),
            "http://127.0.0.1:1".into(),
            "m".into(),
            100,
            0.0,
            None,
        );
        let msgs = vec![Message::user("hello")];
        assert!(p.chat(&msgs).await.is_err());
    }

    #[tokio::test]
    async fn embed_without_model_unsupported() {
        let p = OpenAiProvider::new("k".into(), "http://x".into(), "m".into(), 100, 0.0, None);
        let result = p.embed("text").await;
        assert!(matches!(result, Err(LlmError::EmbedUnsupported { .. })));
    }

    #[tokio::test]
    async fn embed_batch_empty_short_circuits() {
        let p = test_provider();
        let vectors = p.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
