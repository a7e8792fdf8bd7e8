//! REPL Dispatcher (spec §4.8): the single-threaded cooperative main loop.
//! Reads one line, parses it, and dispatches to a command handler or the
//! free-text agent pipeline; `Ctrl+C`/EOF during an in-flight agent task
//! cancels it cooperatively rather than exiting.

use std::path::PathBuf;
use std::rc::Rc;

use agentrepl_protocol::ConversationTurn;
use agentrepl_protocol::Role;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditEntryKind;
use crate::context::CommandContext;
use crate::error::ReplError;
use crate::file_context::FileContextResolver;
use crate::input::ParsedInput;
use crate::plugin::MessageContext;
use crate::shell::PanelKind;
use crate::shell::ReadLineOutcome;
use crate::stream::StreamProcessor;

const PROMPT: &str = "> ";

pub struct Dispatcher {
    ctx: CommandContext,
    resolver: FileContextResolver,
    stream_processor: StreamProcessor,
    base_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(ctx: CommandContext, resolver: FileContextResolver, base_dir: PathBuf) -> Self {
        let stream_processor = StreamProcessor::new(Rc::clone(&ctx.shell), Some(Rc::clone(&ctx.notifier)));
        Self {
            ctx,
            resolver,
            stream_processor,
            base_dir,
        }
    }

    /// Runs until `/quit` (or any handler) requests termination, or EOF/
    /// interrupt arrives while idle. Completion is driven per-keystroke by
    /// the embedder's richer Shell, not by this line-at-a-time loop — see
    /// [`crate::completer::Completer`].
    pub async fn run(&mut self) {
        loop {
            if self.ctx.quit_requested() {
                break;
            }

            let line = match self.ctx.pop_queued_prompt() {
                Some(queued) => queued,
                None => match self.read_line().await {
                    Some(line) => line,
                    None => break,
                },
            };

            match crate::input::parse(&line) {
                ParsedInput::Empty => {}
                ParsedInput::Command { name, args } => {
                    self.dispatch_command(&name, args).await;
                }
                ParsedInput::FreeText { text, mentions } => {
                    self.dispatch_free_text(text, mentions).await;
                }
            }

            if self.ctx.quit_requested() {
                break;
            }
        }
    }

    /// Reads one line, racing the notifier's debounce deadline so a queued
    /// notification is delivered even if the user never submits another
    /// line to trigger a flush (spec §4.9 timer-expiry delivery).
    async fn read_line(&self) -> Option<String> {
        loop {
            let read_fut = self.ctx.shell.read_line(PROMPT);
            tokio::pin!(read_fut);

            let deadline = self.ctx.notifier.borrow().pending_deadline();
            let outcome = match deadline {
                Some(deadline) => {
                    tokio::select! {
                        outcome = &mut read_fut => outcome,
                        _ = tokio::time::sleep_until(deadline) => {
                            self.ctx.notifier.borrow_mut().on_timer_expired();
                            continue;
                        }
                    }
                }
                None => read_fut.await,
            };

            return match outcome {
                Ok(ReadLineOutcome::Submitted(line)) => Some(line),
                Ok(ReadLineOutcome::CopyLastAssistant) => {
                    self.copy_last_assistant().await;
                    continue;
                }
                Ok(ReadLineOutcome::Eof) | Err(_) => None,
            };
        }
    }

    /// `Ctrl+Y`: mirrors the `copy` built-in command's body.
    async fn copy_last_assistant(&self) {
        let Some(text) = self.ctx.session.borrow().last_assistant_response().map(str::to_string) else {
            self.ctx
                .shell
                .render_panel(PanelKind::Error, "Copy", "no assistant response to copy yet");
            return;
        };
        match self.ctx.clipboard.copy(text).await {
            Ok(()) => self.ctx.shell.render_dim("Copied to clipboard."),
            Err(err) => self.ctx.shell.render_panel(PanelKind::Error, "Copy", &err.to_string()),
        }
    }

    async fn dispatch_command(&mut self, name: &str, args: String) {
        let command = self.ctx.registry.borrow().get(name).cloned();
        let Some(command) = command else {
            let err = ReplError::UnknownCommand(name.to_string());
            self.ctx.shell.render_panel(PanelKind::Error, "Error", &err.to_string());
            return;
        };

        self.ctx
            .audit
            .borrow_mut()
            .log(AuditEntryKind::Command, &format!("/{name} {args}"));

        if let Err(err) = (command.handler)(self.ctx.clone(), args).await {
            self.ctx
                .audit
                .borrow_mut()
                .log(AuditEntryKind::Error, &err.to_string());
            self.ctx.shell.render_panel(PanelKind::Error, "Error", &err.to_string());
        }
    }

    async fn dispatch_free_text(&mut self, text: String, mentions: Vec<String>) {
        self.ctx.audit.borrow_mut().log(AuditEntryKind::Input, &text);

        let has_agent = self.ctx.plugins.borrow().active_agent().is_some();
        if !has_agent {
            let err = ReplError::NoAgent;
            self.ctx.shell.render_panel(PanelKind::Error, "Error", &err.to_string());
            return;
        }

        let file_contexts = self.resolver.resolve_all(&self.base_dir, &mentions);
        let history = self.ctx.session.borrow().get_history();

        self.ctx.session.borrow_mut().add_turn(
            ConversationTurn::new(Role::User, text.clone()).with_file_contexts(&file_contexts),
        );

        let message_ctx = MessageContext {
            message: text,
            file_contexts,
            history,
        };

        let events = {
            let plugins = self.ctx.plugins.borrow();
            let agent = plugins.active_agent().expect("checked has_agent above");
            agent.send_message(message_ctx)
        };

        let turn = self.run_stream_with_interrupt(events).await;
        self.ctx
            .audit
            .borrow_mut()
            .log(AuditEntryKind::Agent, &turn.content);
        self.ctx.session.borrow_mut().add_turn(turn);
    }

    /// Drives the Stream Processor while racing an OS interrupt signal;
    /// an interrupt cancels the in-flight task cooperatively rather than
    /// tearing down the dispatcher loop (spec §4.8 rule 4).
    async fn run_stream_with_interrupt(
        &self,
        events: tokio::sync::mpsc::UnboundedReceiver<agentrepl_protocol::StreamEvent>,
    ) -> ConversationTurn {
        let cancellation = CancellationToken::new();
        let run_fut = self.stream_processor.run(events, cancellation.clone());
        tokio::pin!(run_fut);

        let mut cancelled_once = false;
        loop {
            if cancelled_once {
                return (&mut run_fut).await;
            }
            tokio::select! {
                turn = &mut run_fut => return turn,
                _ = tokio::signal::ctrl_c() => {
                    cancellation.cancel();
                    cancelled_once = true;
                    self.ctx.shell.render_dim("Cancelling…");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::commands::CommandRegistry;
    use crate::commands::SlashCommand;
    use crate::notifier::Notifier;
    use crate::notifier::NotifierConfig;
    use crate::plugin::PluginRegistry;
    use crate::session::Session;
    use crate::shell::Shell;
    use agentrepl_protocol::SlashCommandSpec;
    use std::cell::Cell;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct RecordingShell {
        panels: RefCell<Vec<(PanelKind, String, String)>>,
    }

    impl Shell for RecordingShell {
        fn render_markdown(&self, _text: &str) {}
        fn render_dim(&self, _text: &str) {}
        fn render_panel(&self, kind: PanelKind, title: &str, text: &str) {
            self.panels
                .borrow_mut()
                .push((kind, title.to_string(), text.to_string()));
        }
        fn spinner_start(&self, _message: &str) {}
        fn spinner_stop(&self) {}
        fn live_start(&self) {}
        fn live_push(&self, _text: &str) {}
        fn live_finalize(&self, _accumulated: &str) {}
        fn push_collapsed_result(&self, _full_body: String) {}
        fn clear_collapsed_results(&self) {}
        fn expand_most_recent_collapsed(&self) -> Option<String> {
            None
        }
        fn read_line<'a>(&'a self, _prompt: &'a str) -> crate::shell::ReadLineFuture<'a> {
            Box::pin(async { Ok(ReadLineOutcome::Eof) })
        }
    }

    fn dispatcher_with(shell: Rc<RecordingShell>) -> (Dispatcher, CommandContext) {
        let ctx = CommandContext::new(
            Rc::new(RefCell::new(Session::new())),
            Rc::new(RefCell::new(CommandRegistry::new())),
            Rc::new(RefCell::new(PluginRegistry::new())),
            shell,
            Rc::new(RefCell::new(Notifier::new(NotifierConfig::default(), None))),
            Rc::new(RefCell::new(AuditLogger::disabled())),
            Rc::new(crate::clipboard::UnsupportedClipboard),
            Rc::new(Cell::new(false)),
            Rc::new(RefCell::new(VecDeque::new())),
        );
        let resolver = FileContextResolver::new(Default::default());
        let dispatcher = Dispatcher::new(ctx.clone(), resolver, PathBuf::from("."));
        (dispatcher, ctx)
    }

    #[tokio::test]
    async fn unknown_command_is_reported_then_loop_exits_on_eof() {
        let shell = Rc::new(RecordingShell::default());
        let (mut dispatcher, ctx) = dispatcher_with(shell.clone());
        ctx.queue_prompt("/does-not-exist");

        dispatcher.run().await;

        let panels = shell.panels.borrow();
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].0, PanelKind::Error);
        assert!(panels[0].2.contains("does-not-exist"));
    }

    #[tokio::test]
    async fn registered_command_handler_runs_and_can_request_quit() {
        let shell = Rc::new(RecordingShell::default());
        let (mut dispatcher, ctx) = dispatcher_with(shell.clone());
        ctx.registry.borrow_mut().register(SlashCommand::new(
            SlashCommandSpec::new("quit", "Exit the REPL").pinned(true),
            |ctx, _args| async move {
                ctx.request_quit();
                Ok(())
            },
        ));
        ctx.queue_prompt("/quit");

        dispatcher.run().await;

        assert!(ctx.quit_requested());
        assert!(shell.panels.borrow().is_empty());
    }

    #[tokio::test]
    async fn free_text_without_an_active_agent_is_reported() {
        let shell = Rc::new(RecordingShell::default());
        let (mut dispatcher, ctx) = dispatcher_with(shell.clone());
        ctx.queue_prompt("hello there");

        dispatcher.run().await;

        let panels = shell.panels.borrow();
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].0, PanelKind::Error);
    }
}
