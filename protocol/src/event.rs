use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::input_request::InputRequest;

/// Discriminant of [`StreamEvent`], kept as a standalone enum so callers can
/// match on the shape of an event before touching its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamEventKind {
    TextDelta,
    ToolUseStart,
    ToolResult,
    Usage,
    Error,
    InputRequest,
}

/// One step of an agent's incremental response. A closed, tagged sum —
/// callers are expected to pattern-match exhaustively rather than branch on
/// a `kind` field independently of the payload.
#[derive(Debug)]
pub enum StreamEvent {
    TextDelta(TextDeltaEvent),
    ToolUseStart(ToolUseStartEvent),
    ToolResult(ToolResultEvent),
    Usage(UsageEvent),
    Error(ErrorEvent),
    InputRequest(InputRequest),
}

impl StreamEvent {
    pub fn kind(&self) -> StreamEventKind {
        match self {
            StreamEvent::TextDelta(_) => StreamEventKind::TextDelta,
            StreamEvent::ToolUseStart(_) => StreamEventKind::ToolUseStart,
            StreamEvent::ToolResult(_) => StreamEventKind::ToolResult,
            StreamEvent::Usage(_) => StreamEventKind::Usage,
            StreamEvent::Error(_) => StreamEventKind::Error,
            StreamEvent::InputRequest(_) => StreamEventKind::InputRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDeltaEvent {
    pub text: String,
}

/// `input` is a genuinely free-form record (tool call arguments vary by
/// tool), so it stays a `serde_json::Value` rather than a fixed struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseStartEvent {
    pub name: String,
    pub id: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultEvent {
    pub name: String,
    pub id: String,
    pub result: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    pub fatal: bool,
}
