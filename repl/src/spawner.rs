//! Session Spawner (spec §4.11): runs an isolated agent session —
//! `pre_hook` / `post_hook` around a private Stream Processor instance —
//! without touching the primary [`crate::session::Session`] or the
//! primary [`crate::notifier::Notifier`] (SPEC_FULL.md §9, Open Question a).

use std::rc::Rc;

use agentrepl_protocol::ConversationTurn;
use tokio_util::sync::CancellationToken;

use crate::plugin::AgentPlugin;
use crate::plugin::MessageContext;
use crate::shell::Shell;
use crate::stream::StreamProcessor;

pub type SpawnHook = Rc<dyn Fn() -> anyhow::Result<()>>;

pub struct SpawnConfig {
    pub prompt: String,
    pub pre_hook: Option<SpawnHook>,
    pub post_hook: Option<SpawnHook>,
}

impl SpawnConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            pre_hook: None,
            post_hook: None,
        }
    }

    pub fn with_pre_hook(mut self, hook: SpawnHook) -> Self {
        self.pre_hook = Some(hook);
        self
    }

    pub fn with_post_hook(mut self, hook: SpawnHook) -> Self {
        self.post_hook = Some(hook);
        self
    }
}

#[derive(Debug)]
pub enum SpawnOutcome {
    Completed(ConversationTurn),
    PreHookFailed(String),
    AgentFailed { turn: ConversationTurn, reason: String },
}

/// Stateless: every `spawn` call builds its own private Stream Processor,
/// so multiple spawns may run (sequentially, within the one cooperative
/// task) while the primary session stays usable throughout.
pub struct SessionSpawner {
    shell: Rc<dyn Shell>,
}

impl SessionSpawner {
    pub fn new(shell: Rc<dyn Shell>) -> Self {
        Self { shell }
    }

    pub async fn spawn(&self, agent: &dyn AgentPlugin, config: SpawnConfig) -> SpawnOutcome {
        if let Some(pre_hook) = &config.pre_hook {
            if let Err(err) = pre_hook() {
                return SpawnOutcome::PreHookFailed(err.to_string());
            }
        }

        let message_ctx = MessageContext {
            message: config.prompt,
            file_contexts: Vec::new(),
            history: Vec::new(),
        };
        let events = agent.send_message(message_ctx);

        let processor = StreamProcessor::new(Rc::clone(&self.shell), None);
        let turn = processor.run(events, CancellationToken::new()).await;

        // Spawned sessions don't observe agent-level failure directly
        // through the StreamProcessor's turn; a fatal stream simply
        // truncates the turn's content, which is not itself an error we
        // can distinguish here. Hooks still run regardless.
        let outcome = SpawnOutcome::Completed(turn);

        if let Some(post_hook) = &config.post_hook {
            if let Err(err) = post_hook() {
                return match outcome {
                    SpawnOutcome::Completed(turn) => SpawnOutcome::AgentFailed {
                        turn,
                        reason: format!("post_hook failed: {err}"),
                    },
                    other => other,
                };
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::NullShell;
    use agentrepl_protocol::ConversationTurn as Turn;
    use agentrepl_protocol::Role;
    use agentrepl_protocol::StreamEvent;
    use agentrepl_protocol::TextDeltaEvent;
    use std::cell::RefCell;

    struct FakeAgent;

    impl crate::plugin::Plugin for FakeAgent {
        fn name(&self) -> &str {
            "fake"
        }
        fn description(&self) -> &str {
            "fake"
        }
    }

    impl AgentPlugin for FakeAgent {
        fn send_message(&self, _ctx: MessageContext) -> tokio::sync::mpsc::UnboundedReceiver<StreamEvent> {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            tx.send(StreamEvent::TextDelta(TextDeltaEvent {
                text: "spawned reply".to_string(),
            }))
            .unwrap();
            rx
        }
        fn compact_history(&self, _history: &[Turn]) -> String {
            String::new()
        }
        fn default_model(&self) -> &str {
            "fake-model"
        }
    }

    #[tokio::test]
    async fn pre_hook_failure_aborts_before_running_the_agent() {
        let spawner = SessionSpawner::new(Rc::new(NullShell));
        let config = SpawnConfig::new("hi").with_pre_hook(Rc::new(|| anyhow::bail!("setup failed")));
        let outcome = spawner.spawn(&FakeAgent, config).await;
        assert!(matches!(outcome, SpawnOutcome::PreHookFailed(reason) if reason.contains("setup failed")));
    }

    #[tokio::test]
    async fn post_hook_runs_after_successful_agent_turn() {
        let spawner = SessionSpawner::new(Rc::new(NullShell));
        let post_hook_ran = Rc::new(RefCell::new(false));
        let flag = post_hook_ran.clone();
        let config = SpawnConfig::new("hi").with_post_hook(Rc::new(move || {
            *flag.borrow_mut() = true;
            Ok(())
        }));
        let outcome = spawner.spawn(&FakeAgent, config).await;
        assert!(*post_hook_ran.borrow());
        match outcome {
            SpawnOutcome::Completed(turn) => {
                assert_eq!(turn.role, Role::Assistant);
                assert_eq!(turn.content, "spawned reply");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
