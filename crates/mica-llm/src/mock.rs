//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};

/// Deterministic provider for tests: canned responses, hash-derived
/// embeddings, optional failure mode.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub embedding_dimension: usize,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding_dimension: 8,
            supports_embeddings: true,
            fail_chat: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    #[must_use]
    pub fn without_embeddings(mut self) -> Self {
        self.supports_embeddings = false;
        self
    }

    /// Deterministic pseudo-embedding: same text always maps to the same
    /// vector, different texts rarely collide.
    fn pseudo_embed(&self, text: &str) -> Vec<f32> {
        let mut seed = 0x9E37_79B9_u32;
        for byte in text.bytes() {
            seed = seed.rotate_left(5) ^ u32::from(byte);
            seed = seed.wrapping_mul(0x85EB_CA6B);
        }
        (0..self.embedding_dimension)
            .map(|i| {
                let mixed = seed.wrapping_add(u32::try_from(i).unwrap_or(0).wrapping_mul(0x27D4_EB2F));
                #[allow(clippy::cast_precision_loss)]
                let unit = f64::from(mixed) / f64::from(u32::MAX);
                #[allow(clippy::cast_possible_truncation)]
                let centered = (unit * 2.0 - 1.0) as f32;
                centered
            })
            .collect()
    }
}

impl LlmProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = self.chat(messages).await?;
        let fragments: Vec<_> = response
            .split_inclusive(' ')
            .map(|s| Ok(s.to_owned()))
            .collect();
        Ok(Box::pin(tokio_stream::iter(fragments)))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.supports_embeddings {
            Ok(self.pseudo_embed(text))
        } else {
            Err(LlmError::EmbedUnsupported { provider: "mock" })
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;

    #[tokio::test]
    async fn canned_responses_in_order() {
        let provider = MockProvider::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(provider.chat(&[]).await.unwrap(), "first");
        assert_eq!(provider.chat(&[]).await.unwrap(), "second");
        assert_eq!(provider.chat(&[]).await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn failing_chat_errors() {
        let provider = MockProvider::failing();
        assert!(provider.chat(&[]).await.is_err());
    }

    #[tokio::test]
    async fn stream_concatenates_to_full_response() {
        let provider = MockProvider::with_responses(vec!["hello streaming world".into()]);
        let mut stream = provider.chat_stream(&[]).await.unwrap();
        let mut collected = String::new();
        while let Some(fragment) = stream.next().await {
            collected.push_str(&fragment.unwrap());
        }
        assert_eq!(collected, "hello streaming world");
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let provider = MockProvider::default();
        let a = provider.embed("hello").await.unwrap();
        let b = provider.embed("hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn different_texts_embed_differently() {
        let provider = MockProvider::default();
        let a = provider.embed("alpha").await.unwrap();
        let b = provider.embed("beta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn dimension_is_configurable() {
        let provider = MockProvider::default().with_dimension(16);
        assert_eq!(provider.embed("x").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn without_embeddings_errors() {
        let provider = MockProvider::default().without_embeddings();
        assert!(!provider.supports_embeddings());
        assert!(matches!(
            provider.embed("x").await,
            Err(LlmError::EmbedUnsupported { .. })
        ));
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let provider = MockProvider::default();
        let texts = vec!["one".to_owned(), "two".to_owned()];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], provider.embed("one").await.unwrap());
        assert_eq!(vectors[1], provider.embed("two").await.unwrap());
    }
}
