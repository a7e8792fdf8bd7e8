use serde::Deserialize;
use serde::Serialize;
use tokio::sync::oneshot;

/// Which collector the Stream Processor must dispatch an [`InputRequest`]
/// to. See the per-variant acceptance rules on [`InputResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    Approval,
    Choice,
    Text,
}

/// An agent-initiated pause. `response_handle` is a one-shot sink the
/// Stream Processor resolves exactly once before continuing the stream;
/// ownership of the sink belongs to the agent that created it.
#[derive(Debug)]
pub struct InputRequest {
    pub prompt: String,
    pub input_type: InputType,
    pub choices: Vec<String>,
    pub response_handle: Option<oneshot::Sender<InputResponse>>,
}

impl InputRequest {
    pub fn new(
        prompt: impl Into<String>,
        input_type: InputType,
        choices: Vec<String>,
        response_handle: oneshot::Sender<InputResponse>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            input_type,
            choices,
            response_handle: Some(response_handle),
        }
    }
}

/// The outcome delivered back to an [`InputRequest`]'s response handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputResponse {
    Approve,
    Reject,
    Choice { index: usize, value: String },
    Text(String),
}
