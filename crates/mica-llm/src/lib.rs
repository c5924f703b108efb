//! LLM provider abstraction and backend implementations.

pub mod any;
pub mod claude;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod proxy;
mod sse;

pub use error::LlmError;
pub use provider::{ChatStream, LlmProvider, Message, Role};
