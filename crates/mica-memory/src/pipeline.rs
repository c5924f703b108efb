//! The ingest-and-answer flow: segment → embed → index on one side,
//! retrieve → prompt → generate on the other.

use std::collections::BTreeMap;

use mica_llm::provider::{ChatStream, LlmProvider, Message};

use crate::document::Segmenter;
use crate::error::MemoryError;
use crate::index::{ScoredMatch, VectorIndex};
use crate::session::{ConversationSession, SessionLimits};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Ground your answers in the \
     provided document excerpts when they are relevant, and say plainly when the answer is not \
     in the documents.";

const CONTEXT_HEADER: &str = "Relevant document excerpts:";
const CONTEXT_DIVIDER: &str = "\n\n---\n\n";

/// A completed, non-streaming turn.
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub retrieved: Vec<ScoredMatch>,
}

/// A streaming turn: retrieved context is available immediately, the text
/// arrives as the stream is consumed.
///
/// The user entry is already in the session; the assistant entry is recorded
/// only when the caller drains the stream and calls
/// [`ConversationSession::commit_reply`]. Dropping the stream early leaves
/// the session without a half-written turn.
pub struct StreamingAnswer {
    pub retrieved: Vec<ScoredMatch>,
    pub stream: ChatStream,
}

impl std::fmt::Debug for StreamingAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingAnswer")
            .field("retrieved", &self.retrieved)
            .field("stream", &"<ChatStream>")
            .finish()
    }
}

/// Composes the segmenter, a vector index, and an LLM provider into a RAG
/// session flow.
pub struct RetrievalPipeline<P: LlmProvider> {
    segmenter: Segmenter,
    index: Box<dyn VectorIndex>,
    provider: P,
    top_k: usize,
    min_score: f32,
    system_prompt: String,
    limits: SessionLimits,
}

impl<P: LlmProvider> RetrievalPipeline<P> {
    #[must_use]
    pub fn new(segmenter: Segmenter, index: Box<dyn VectorIndex>, provider: P) -> Self {
        Self {
            segmenter,
            index,
            provider,
            top_k: 3,
            min_score: 0.0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            limits: SessionLimits::default(),
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Index a document under `source_id`: segment → batch-embed → replace
    /// in the index. Returns the stored chunk count.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures and index errors; a failed call leaves
    /// the previously indexed records for `source_id` in place only if the
    /// failure happened before the replace.
    pub async fn index_document(&self, source_id: &str, text: &str) -> Result<usize, MemoryError> {
        let segments = self.segmenter.segment(text);
        if segments.is_empty() {
            self.index.insert(source_id, Vec::new()).await?;
            tracing::info!(source_id, chunk_count = 0, "indexed empty document");
            return Ok(0);
        }

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;

        let records: Vec<_> = segments.into_iter().zip(vectors).collect();
        let count = records.len();
        self.index.insert(source_id, records).await?;

        tracing::info!(source_id, chunk_count = count, "indexed document");
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns an error if the index operation fails.
    pub async fn delete_source(&self, source_id: &str) -> Result<bool, MemoryError> {
        let removed = self.index.delete(source_id).await?;
        tracing::debug!(source_id, removed, "delete source");
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns an error if the index operation fails.
    pub async fn sources(&self) -> Result<BTreeMap<String, usize>, MemoryError> {
        Ok(self.index.list_sources().await?)
    }

    /// Embed the query and return the best-matching segments.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures and index errors.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredMatch>, MemoryError> {
        let vector = self.provider.embed(query).await?;
        let matches = self.index.query(vector, self.top_k, self.min_score).await?;
        tracing::debug!(query_len = query.len(), hits = matches.len(), "retrieval");
        Ok(matches)
    }

    /// Run one full turn: retrieve, prompt, generate, record both entries.
    ///
    /// # Errors
    ///
    /// Propagates retrieval and generation failures; on failure the user
    /// entry remains in the session (matching the turn the user actually
    /// sent) and no assistant entry is recorded.
    pub async fn answer(
        &self,
        session: &mut ConversationSession,
        input: &str,
    ) -> Result<Answer, MemoryError> {
        let (retrieved, prompt) = self.prepare_turn(session, input).await?;
        let text = self.provider.chat(&prompt).await?;
        session.commit_reply(text.clone());
        Ok(Answer { text, retrieved })
    }

    /// Like [`answer`](Self::answer), but returns the fragment stream with
    /// the retrieved context available up front. The caller drains the
    /// stream and then records the reply via
    /// [`ConversationSession::commit_reply`].
    ///
    /// # Errors
    ///
    /// Propagates retrieval failures and stream initiation failures.
    pub async fn answer_stream(
        &self,
        session: &mut ConversationSession,
        input: &str,
    ) -> Result<StreamingAnswer, MemoryError> {
        let (retrieved, prompt) = self.prepare_turn(session, input).await?;
        let stream = self.provider.chat_stream(&prompt).await?;
        Ok(StreamingAnswer { retrieved, stream })
    }

    async fn prepare_turn(
        &self,
        session: &mut ConversationSession,
        input: &str,
    ) -> Result<(Vec<ScoredMatch>, Vec<Message>), MemoryError> {
        // Nothing indexed means nothing to embed the query against.
        let retrieved = if self.index.list_sources().await?.is_empty() {
            Vec::new()
        } else {
            self.retrieve(input).await?
        };
        let context = build_context(&retrieved);

        session.append(Message::user(input));
        session.trim(self.limits.max_turns, self.limits.max_chars);

        let prompt = session.assemble_prompt(&self.system_prompt, &context);
        Ok((retrieved, prompt))
    }
}

/// Join retrieved segments into one context block, or an empty string when
/// nothing matched.
fn build_context(matches: &[ScoredMatch]) -> String {
    if matches.is_empty() {
        return String::new();
    }
    let excerpts: Vec<&str> = matches.iter().map(|m| m.text.as_str()).collect();
    format!("{CONTEXT_HEADER}\n\n{}", excerpts.join(CONTEXT_DIVIDER))
}
