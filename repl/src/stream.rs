//! Stream Processor (spec §4.7), the hardest subsystem: drains one agent's
//! event sequence, drives shell rendering and input collection
//! incrementally, and always produces exactly one [`ConversationTurn`].

use std::rc::Rc;
use std::cell::RefCell;
use std::collections::HashMap;

use agentrepl_protocol::ConversationTurn;
use agentrepl_protocol::InputResponse;
use agentrepl_protocol::InputType;
use agentrepl_protocol::Role;
use agentrepl_protocol::StreamEvent;
use agentrepl_protocol::ToolUse;
use agentrepl_protocol::TokenUsage;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::notifier::Notifier;
use crate::shell::PanelKind;
use crate::shell::ReadLineOutcome;
use crate::shell::Shell;

const THINKING_MESSAGE: &str = "Thinking…";
const NOTIFICATION_SNIPPET_CHARS: usize = 80;
const COLLAPSE_HINT_LINES: usize = 3;
const FIELD_VALUE_TRUNCATE_CHARS: usize = 60;

pub struct StreamProcessor {
    shell: Rc<dyn Shell>,
    notifier: Option<Rc<RefCell<Notifier>>>,
}

impl StreamProcessor {
    pub fn new(shell: Rc<dyn Shell>, notifier: Option<Rc<RefCell<Notifier>>>) -> Self {
        Self { shell, notifier }
    }

    /// Drain `events` to completion (or until `cancellation` fires),
    /// returning the single turn the run produced. Never panics: an empty
    /// stream yields an empty-content assistant turn (P-Finalization).
    pub async fn run(
        &self,
        mut events: UnboundedReceiver<StreamEvent>,
        cancellation: CancellationToken,
    ) -> ConversationTurn {
        if let Some(notifier) = &self.notifier {
            notifier.borrow_mut().mark_turn_start();
        }
        self.shell.spinner_start(THINKING_MESSAGE);

        let mut accum_text = String::new();
        let mut tool_uses: Vec<ToolUse> = Vec::new();
        let mut pending_tool_inputs: HashMap<String, Value> = HashMap::new();
        let mut usage_total = TokenUsage::default();
        let mut spinner_active = true;
        let mut live_active = false;
        let mut first_content_seen = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                received = events.recv() => match received {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                StreamEvent::TextDelta(e) => {
                    if !first_content_seen {
                        if spinner_active {
                            self.shell.spinner_stop();
                            spinner_active = false;
                        }
                        self.shell.live_start();
                        live_active = true;
                        first_content_seen = true;
                    }
                    self.shell.live_push(&e.text);
                    accum_text.push_str(&e.text);
                }

                StreamEvent::ToolUseStart(e) => {
                    if !first_content_seen {
                        if spinner_active {
                            self.shell.spinner_stop();
                            spinner_active = false;
                        }
                        first_content_seen = true;
                    }
                    if live_active {
                        self.shell.live_finalize(&accum_text);
                        live_active = false;
                    }
                    match summarize_tool_input(&e.input) {
                        Some(summary) => self.shell.render_dim(&format!("{}  {summary}", e.name)),
                        None => self.shell.render_dim(&e.name),
                    }
                    pending_tool_inputs.insert(e.id.clone(), e.input.clone());
                }

                StreamEvent::ToolResult(e) => {
                    let kind = if e.is_error { PanelKind::Error } else { PanelKind::Success };
                    self.shell.render_panel(kind, &e.name, "");
                    let body = format_tool_result_body(&e.result, e.is_error);
                    self.shell.render_dim(&body);
                    if !e.is_error && body != e.result {
                        self.shell.push_collapsed_result(e.result.clone());
                    }
                    let input = pending_tool_inputs.remove(&e.id).unwrap_or(Value::Null);
                    tool_uses.push(ToolUse {
                        name: e.name.clone(),
                        input,
                        result: e.result.clone(),
                        is_error: e.is_error,
                    });
                    if let Some(notifier) = &self.notifier {
                        notifier.borrow_mut().queue(&format!("Tool completed: {}", e.name));
                    }
                }

                StreamEvent::Usage(e) => {
                    usage_total += TokenUsage::new(e.input_tokens, e.output_tokens);
                }

                StreamEvent::Error(e) => {
                    if spinner_active {
                        self.shell.spinner_stop();
                        spinner_active = false;
                    }
                    self.shell.render_panel(PanelKind::Error, "Error", &e.message);
                    if let Some(notifier) = &self.notifier {
                        let snippet: String = e.message.chars().take(NOTIFICATION_SNIPPET_CHARS).collect();
                        notifier.borrow_mut().queue(&snippet);
                    }
                    if e.fatal {
                        break;
                    }
                }

                StreamEvent::InputRequest(mut request) => {
                    let Some(handle) = request.response_handle.take() else {
                        tracing::warn!("input-request event carried no response handle");
                        continue;
                    };
                    if spinner_active {
                        self.shell.spinner_stop();
                        spinner_active = false;
                    }
                    if live_active {
                        self.shell.live_finalize(&accum_text);
                        live_active = false;
                    }

                    let response = tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => InputResponse::Reject,
                        response = self.collect_input(&request.prompt, request.input_type, &request.choices) => response,
                    };
                    let rejected = response == InputResponse::Reject;
                    let _ = handle.send(response);

                    if rejected {
                        self.shell.render_panel(
                            PanelKind::Success,
                            "Rejected",
                            "Agent response cancelled.",
                        );
                        break;
                    }
                    self.shell.spinner_start(THINKING_MESSAGE);
                    spinner_active = true;
                }
            }
        }

        if spinner_active {
            self.shell.spinner_stop();
        }
        if live_active {
            self.shell.live_finalize(&accum_text);
        }

        let turn = ConversationTurn::new(Role::Assistant, accum_text.clone())
            .with_tool_uses(tool_uses)
            .with_usage(if usage_total.is_zero() { None } else { Some(usage_total) });

        if let Some(notifier) = &self.notifier {
            let snippet = if accum_text.is_empty() {
                "Response complete".to_string()
            } else {
                accum_text.chars().take(NOTIFICATION_SNIPPET_CHARS).collect()
            };
            let mut notifier = notifier.borrow_mut();
            notifier.queue(&snippet);
            notifier.flush();
        }

        turn
    }

    async fn collect_input(&self, prompt: &str, input_type: InputType, choices: &[String]) -> InputResponse {
        loop {
            let outcome = self.shell.read_line(prompt).await;
            let line = match outcome {
                Ok(ReadLineOutcome::Submitted(line)) => line,
                Ok(ReadLineOutcome::CopyLastAssistant) => continue,
                Ok(ReadLineOutcome::Eof) | Err(_) => return InputResponse::Reject,
            };
            let trimmed = line.trim();

            match input_type {
                InputType::Approval => match trimmed.to_ascii_lowercase().as_str() {
                    "a" | "1" => return InputResponse::Approve,
                    "r" | "2" => return InputResponse::Reject,
                    _ => self.shell.render_dim("Enter 'a' to approve or 'r' to reject."),
                },
                InputType::Choice => {
                    if trimmed.eq_ignore_ascii_case("r") {
                        return InputResponse::Reject;
                    }
                    match trimmed.parse::<usize>() {
                        Ok(n) if n >= 1 && n <= choices.len() => {
                            return InputResponse::Choice {
                                index: n - 1,
                                value: choices[n - 1].clone(),
                            };
                        }
                        _ => self
                            .shell
                            .render_dim(&format!("Enter a number from 1 to {}, or 'r' to reject.", choices.len())),
                    }
                }
                InputType::Text => {
                    if trimmed.eq_ignore_ascii_case("r") || trimmed == "/reject" {
                        return InputResponse::Reject;
                    }
                    if trimmed.is_empty() {
                        self.shell.render_dim("Enter a non-empty response.");
                    } else {
                        return InputResponse::Text(trimmed.to_string());
                    }
                }
            }
        }
    }
}

/// Compact, dim-styled single-line summary of a tool-use's input: key/value
/// pairs separated by two spaces, each value truncated to 60 characters
/// with an ellipsis, nested values serialized compactly first, `null`
/// rendered as `""`. `None` when `input` is empty.
fn summarize_tool_input(input: &Value) -> Option<String> {
    let object = input.as_object()?;
    if object.is_empty() {
        return None;
    }
    let pairs: Vec<String> = object
        .iter()
        .map(|(key, value)| format!("{key}={}", truncate_field_value(value)))
        .collect();
    Some(pairs.join("  "))
}

fn truncate_field_value(value: &Value) -> String {
    let rendered = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut chars = rendered.chars();
    let truncated: String = chars.by_ref().take(FIELD_VALUE_TRUNCATE_CHARS).collect();
    if chars.next().is_some() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

/// Full body when `is_error` or the body has <=3 lines; otherwise the
/// first three lines plus a collapse hint.
fn format_tool_result_body(result: &str, is_error: bool) -> String {
    let lines: Vec<&str> = result.lines().collect();
    if is_error || lines.len() <= COLLAPSE_HINT_LINES {
        return result.to_string();
    }
    let shown = lines[..COLLAPSE_HINT_LINES].join("\n");
    let remaining = lines.len() - COLLAPSE_HINT_LINES;
    let plural = if remaining == 1 { "" } else { "s" };
    format!("{shown}\n▸ {remaining} more line{plural} (Ctrl+O to expand)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrepl_protocol::ErrorEvent;
    use agentrepl_protocol::InputRequest;
    use agentrepl_protocol::TextDeltaEvent;
    use agentrepl_protocol::ToolResultEvent;
    use agentrepl_protocol::ToolUseStartEvent;
    use agentrepl_protocol::UsageEvent;
    use crate::shell::NullShell;

    fn processor() -> StreamProcessor {
        StreamProcessor::new(Rc::new(NullShell), None)
    }

    fn send_all(events: Vec<StreamEvent>) -> UnboundedReceiver<StreamEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        for event in events {
            tx.send(event).unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_turn() {
        let turn = processor().run(send_all(vec![]), CancellationToken::new()).await;
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "");
        assert!(turn.tool_uses.is_empty());
        assert!(turn.usage.is_none());
    }

    #[tokio::test]
    async fn text_then_tool_then_text_builds_expected_turn() {
        let events = vec![
            StreamEvent::TextDelta(TextDeltaEvent { text: "Hi ".to_string() }),
            StreamEvent::ToolUseStart(ToolUseStartEvent {
                name: "grep".to_string(),
                id: "1".to_string(),
                input: serde_json::json!({"q": "x"}),
            }),
            StreamEvent::ToolResult(ToolResultEvent {
                name: "grep".to_string(),
                id: "1".to_string(),
                result: "a\nb\nc\nd".to_string(),
                is_error: false,
            }),
            StreamEvent::TextDelta(TextDeltaEvent { text: "done".to_string() }),
            StreamEvent::Usage(UsageEvent { input_tokens: 3, output_tokens: 5 }),
        ];
        let turn = processor().run(send_all(events), CancellationToken::new()).await;
        assert_eq!(turn.content, "Hi done");
        assert_eq!(turn.tool_uses.len(), 1);
        assert_eq!(turn.tool_uses[0].input, serde_json::json!({"q": "x"}));
        assert_eq!(turn.usage, Some(TokenUsage::new(3, 5)));
    }

    #[tokio::test]
    async fn tool_result_input_is_correlated_by_id_not_order() {
        let events = vec![
            StreamEvent::ToolUseStart(ToolUseStartEvent {
                name: "grep".to_string(),
                id: "a".to_string(),
                input: serde_json::json!({"q": "first"}),
            }),
            StreamEvent::ToolUseStart(ToolUseStartEvent {
                name: "ls".to_string(),
                id: "b".to_string(),
                input: serde_json::json!({"q": "second"}),
            }),
            StreamEvent::ToolResult(ToolResultEvent {
                name: "ls".to_string(),
                id: "b".to_string(),
                result: "ok".to_string(),
                is_error: false,
            }),
            StreamEvent::ToolResult(ToolResultEvent {
                name: "grep".to_string(),
                id: "a".to_string(),
                result: "ok".to_string(),
                is_error: false,
            }),
        ];
        let turn = processor().run(send_all(events), CancellationToken::new()).await;
        assert_eq!(turn.tool_uses[0].name, "ls");
        assert_eq!(turn.tool_uses[0].input, serde_json::json!({"q": "second"}));
        assert_eq!(turn.tool_uses[1].name, "grep");
        assert_eq!(turn.tool_uses[1].input, serde_json::json!({"q": "first"}));
    }

    #[tokio::test]
    async fn fatal_error_truncates_stream_and_turn() {
        let events = vec![
            StreamEvent::TextDelta(TextDeltaEvent { text: "hello ".to_string() }),
            StreamEvent::Error(ErrorEvent { message: "boom".to_string(), fatal: true }),
            StreamEvent::TextDelta(TextDeltaEvent { text: "unreachable".to_string() }),
        ];
        let turn = processor().run(send_all(events), CancellationToken::new()).await;
        assert_eq!(turn.content, "hello ");
    }

    #[tokio::test]
    async fn input_request_rejection_ends_stream_and_resolves_handle() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let events = vec![
            StreamEvent::TextDelta(TextDeltaEvent {
                text: "Delete 3 files?".to_string(),
            }),
            StreamEvent::InputRequest(InputRequest::new(
                "Delete 3 files?",
                InputType::Approval,
                vec!["Approve".to_string(), "Reject".to_string()],
                tx,
            )),
        ];
        // `NullShell::read_line` always reports EOF, which `collect_input`
        // treats the same as an interrupt signal: reject.
        let turn = processor().run(send_all(events), CancellationToken::new()).await;
        assert_eq!(turn.content, "Delete 3 files?");
        assert_eq!(rx.await.unwrap(), InputResponse::Reject);
    }

    #[test]
    fn tool_input_summary_truncates_and_handles_null() {
        let input = serde_json::json!({"path": "x".repeat(65), "flag": Value::Null});
        let summary = summarize_tool_input(&input).unwrap();
        assert!(summary.contains("flag="));
        assert!(summary.contains('…'));
    }

    #[test]
    fn empty_tool_input_has_no_summary() {
        assert!(summarize_tool_input(&serde_json::json!({})).is_none());
    }
}
