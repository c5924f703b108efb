pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use loader::TextLoader;
pub use splitter::{DEFAULT_SEPARATORS, Segmenter, SegmenterConfig, SegmentStrategy};
pub use types::{Document, Segment};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
