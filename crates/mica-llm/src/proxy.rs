//! OpenAI-compatible proxy backend.
//!
//! LiteLLM, OpenRouter, Azure deployments, and in-house gateways all expose
//! the OpenAI wire shape behind their own base URL. This wrapper reuses
//! [`OpenAiProvider`] and reports the proxy's name instead.

use std::fmt;

use crate::error::LlmError;
use crate::openai::OpenAiProvider;
use crate::provider::{ChatStream, LlmProvider, Message};

pub struct ProxyProvider {
    inner: OpenAiProvider,
    provider_name: String,
}

impl ProxyProvider {
    #[must_use]
    pub fn new(
        provider_name: String,
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
        embedding_model: Option<String>,
    ) -> Self {
        let inner = OpenAiProvider::new(
            api_key,
            base_url,
            model,
            max_tokens,
            temperature,
            embedding_model,
        );
        Self {
            inner,
            provider_name,
        }
    }
}

impl fmt::Debug for ProxyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyProvider")
            .field("provider_name", &self.provider_name)
            .field("inner", &self.inner)
            .finish()
    }
}

impl Clone for ProxyProvider {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            provider_name: self.provider_name.clone(),
        }
    }
}

impl LlmProvider for ProxyProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.inner.chat(messages).await
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        self.inner.chat_stream(messages).await
    }

    fn supports_streaming(&self) -> bool {
        self.inner.supports_streaming()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.inner.embed_batch(texts).await
    }

    fn supports_embeddings(&self) -> bool {
        self.inner.supports_embeddings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> ProxyProvider {
        ProxyProvider::new(
            "litellm".into(),
            "key".into(),
            "http://localhost:4000".into(),
            "gpt-4o-mini".into(),
            1024,
            0.7,
            None,
        )
    }

    #[test]
    fn name_is_proxy_name() {
        assert_eq!(test_provider().name(), "litellm");
    }

    #[test]
    fn streaming_delegates() {
        assert!(test_provider().supports_streaming());
    }

    #[test]
    fn embeddings_without_model_unsupported() {
        assert!(!test_provider().supports_embeddings());
    }

    #[test]
    fn embeddings_with_model_supported() {
        let p = ProxyProvider::new(
            "openrouter".into(),
            "key".into(),
            "https://openrouter.ai/api/v1".into(),
            "m".into(),
            256,
            0.0,
            Some("text-embedding-3-small".into()),
        );
        assert!(p.supports_embeddings());
    }

    #[test]
    fn clone_preserves_name() {
        assert_eq!(test_provider().clone().name(), "litellm");
    }

    #[test]
    fn debug_contains_proxy_name() {
        let dbg = format!("{:?}", test_provider());
        assert!(dbg.contains("ProxyProvider"));
        assert!(dbg.contains("litellm"));
    }

    #[tokio::test]
    async fn chat_unreachable_errors() {
        let p = ProxyProvider::new(
            "gateway".into(),
            "key".into(),
            "http://127.0.0.1:1".into(),
            "m".into(),
            100,
            0.0,
            None,
        );
        let msgs = vec![Message::user("hello")];
        assert!(p.chat(&msgs).await.is_err());
    }
}
