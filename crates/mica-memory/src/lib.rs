//! Document segmentation, embedding retrieval, and conversation memory for
//! RAG chat assistants.

pub mod document;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod session;

pub use document::{Document, Segment, Segmenter, SegmenterConfig, SegmentStrategy, TextLoader};
pub use error::MemoryError;
pub use index::{InMemoryIndex, IndexError, JsonFileIndex, ScoredMatch, VectorIndex};
pub use pipeline::{Answer, RetrievalPipeline, StreamingAnswer};
pub use session::{ConversationSession, SessionLimits, UsageTotals, estimate_tokens};
