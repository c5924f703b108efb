//! Decoding of server-sent-event response bodies into [`ChatStream`]s.

use eventsource_stream::Eventsource;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::ChatStream;

/// Decode an OpenAI-style `chat/completions` streaming body.
pub(crate) fn decode_openai_stream(response: reqwest::Response) -> ChatStream {
    let events = response.bytes_stream().eventsource();
    let fragments = events.filter_map(|event| match event {
        Ok(event) => openai_delta(&event.data),
        Err(e) => Some(Err(LlmError::SseParse(e.to_string()))),
    });
    Box::pin(fragments)
}

/// Decode an Anthropic-style `messages` streaming body.
pub(crate) fn decode_claude_stream(response: reqwest::Response) -> ChatStream {
    let events = response.bytes_stream().eventsource();
    let fragments = events.filter_map(|event| match event {
        Ok(event) => claude_delta(&event.event, &event.data),
        Err(e) => Some(Err(LlmError::SseParse(e.to_string()))),
    });
    Box::pin(fragments)
}

fn openai_delta(data: &str) -> Option<Result<String, LlmError>> {
    if data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(chunk) => {
            let text = chunk
                .choices
                .first()
                .and_then(|c| c.delta.content.as_deref())
                .unwrap_or_default();
            if text.is_empty() {
                None
            } else {
                Some(Ok(text.to_owned()))
            }
        }
        Err(e) => Some(Err(LlmError::SseParse(format!(
            "malformed completion chunk: {e}"
        )))),
    }
}

fn claude_delta(event_type: &str, data: &str) -> Option<Result<String, LlmError>> {
    match event_type {
        "content_block_delta" => match serde_json::from_str::<BlockDeltaEvent>(data) {
            Ok(event) => {
                let delta = event.delta?;
                if delta.kind == "text_delta" && !delta.text.is_empty() {
                    Some(Ok(delta.text))
                } else {
                    None
                }
            }
            Err(e) => Some(Err(LlmError::SseParse(format!(
                "malformed content_block_delta: {e}"
            )))),
        },
        "error" => {
            let detail = serde_json::from_str::<StreamErrorEvent>(data)
                .ok()
                .and_then(|e| e.error)
                .map_or_else(
                    || data.to_owned(),
                    |err| format!("{}: {}", err.kind, err.message),
                );
            Some(Err(LlmError::SseParse(format!("stream error ({detail})"))))
        }
        _ => None,
    }
}

#[derive(Deserialize)]
struct CompletionChunk {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    delta: CompletionDelta,
}

#[derive(Deserialize)]
struct CompletionDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct BlockDeltaEvent {
    #[serde(default)]
    delta: Option<BlockDelta>,
}

#[derive(Deserialize)]
struct BlockDelta {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct StreamErrorEvent {
    #[serde(default)]
    error: Option<StreamErrorDetail>,
}

#[derive(Deserialize)]
struct StreamErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}
