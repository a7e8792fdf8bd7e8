//! Plugin Registry & Loader (spec §4.6). Rust has no dynamic `import` the
//! way a duck-typed host language does, so "locate a module by dotted
//! name" is realized as a lookup into a statically-populated factory
//! registry (the moral equivalent of a plugin entry-point table) rather
//! than `dlopen`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::commands::SlashCommand;
use crate::context::CommandContext;
use crate::error::ReplError;
use agentrepl_protocol::ConversationTurn;
use agentrepl_protocol::FileContext;
use agentrepl_protocol::StreamEvent;
use tokio::sync::mpsc::UnboundedReceiver;

/// Minimum capability set every plugin exposes.
pub trait Plugin {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn commands(&self) -> Vec<SlashCommand> {
        Vec::new()
    }
    fn on_load(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }
    fn on_unload(&mut self) {}
    fn status_hints(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Context handed to an agent's `send_message`: the user message, its
/// resolved file contexts, and a read-only history snapshot.
pub struct MessageContext {
    pub message: String,
    pub file_contexts: Vec<FileContext>,
    pub history: Vec<ConversationTurn>,
}

/// The additional capability set that makes a [`Plugin`] adoptable as the
/// active agent (I3: at most one at a time).
pub trait AgentPlugin: Plugin {
    fn send_message(&self, ctx: MessageContext) -> UnboundedReceiver<StreamEvent>;
    fn compact_history(&self, history: &[ConversationTurn]) -> String;
    fn default_model(&self) -> &str;
}

pub enum LoadedPlugin {
    Plain(Box<dyn Plugin>),
    Agent(Box<dyn AgentPlugin>),
}

impl LoadedPlugin {
    fn as_plugin(&self) -> &dyn Plugin {
        match self {
            LoadedPlugin::Plain(p) => p.as_ref(),
            LoadedPlugin::Agent(p) => p.as_ref(),
        }
    }

    fn as_plugin_mut(&mut self) -> &mut dyn Plugin {
        match self {
            LoadedPlugin::Plain(p) => p.as_mut(),
            LoadedPlugin::Agent(p) => p.as_mut(),
        }
    }
}

pub type PluginFactory = Rc<dyn Fn() -> anyhow::Result<LoadedPlugin>>;

#[derive(Default)]
pub struct PluginLoader {
    factories: HashMap<String, PluginFactory>,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, module_id: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(module_id.into(), factory);
    }

    /// Locate `module_id` and invoke its factory. Logs and returns `None`
    /// on any failure (missing module, missing factory, factory error) —
    /// never propagates.
    pub fn load(&self, module_id: &str) -> Option<LoadedPlugin> {
        let factory = match self.factories.get(module_id) {
            Some(factory) => factory,
            None => {
                tracing::warn!(module_id, "plugin module not found");
                return None;
            }
        };
        match factory() {
            Ok(plugin) => Some(plugin),
            Err(err) => {
                tracing::warn!(module_id, error = %err, "plugin factory failed");
                None
            }
        }
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<LoadedPlugin>,
    active_agent_index: Option<usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `on_load`, then registers the plugin's commands and (if it is
    /// an [`AgentPlugin`] and no agent is active yet) adopts it. A second
    /// agent registration is a recoverable configuration error.
    pub fn load_and_register(
        &mut self,
        mut plugin: LoadedPlugin,
        ctx: &CommandContext,
    ) -> anyhow::Result<()> {
        if let Err(err) = plugin.as_plugin_mut().on_load(ctx) {
            tracing::warn!(
                plugin = plugin.as_plugin().name(),
                error = %err,
                "plugin on_load failed; skipping registration"
            );
            return Ok(());
        }

        if matches!(plugin, LoadedPlugin::Agent(_)) && self.active_agent_index.is_some() {
            let existing = self.active_agent_name().unwrap_or_default().to_string();
            return Err(ReplError::MultiAgent {
                existing,
                attempted: plugin.as_plugin().name().to_string(),
            }
            .into());
        }

        for command in plugin.as_plugin().commands() {
            ctx.registry.borrow_mut().register(command);
        }

        let becomes_agent = matches!(plugin, LoadedPlugin::Agent(_));
        self.plugins.push(plugin);
        if becomes_agent {
            self.active_agent_index = Some(self.plugins.len() - 1);
        }

        Ok(())
    }

    pub fn active_agent(&self) -> Option<&dyn AgentPlugin> {
        let index = self.active_agent_index?;
        match &self.plugins[index] {
            LoadedPlugin::Agent(agent) => Some(agent.as_ref()),
            LoadedPlugin::Plain(_) => None,
        }
    }

    fn active_agent_name(&self) -> Option<&str> {
        self.active_agent().map(|agent| agent.name())
    }

    /// Concatenation of per-plugin hints, in registration order.
    pub fn status_hints(&self) -> Vec<String> {
        self.plugins
            .iter()
            .flat_map(|p| p.as_plugin().status_hints())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::commands::CommandRegistry;
    use crate::notifier::Notifier;
    use crate::notifier::NotifierConfig;
    use crate::shell::NullShell;
    use std::cell::Cell;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct FakeAgent {
        name: String,
    }

    impl Plugin for FakeAgent {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "fake agent"
        }
    }

    impl AgentPlugin for FakeAgent {
        fn send_message(&self, _ctx: MessageContext) -> UnboundedReceiver<StreamEvent> {
            let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
            rx
        }
        fn compact_history(&self, _history: &[ConversationTurn]) -> String {
            String::new()
        }
        fn default_model(&self) -> &str {
            "fake-model"
        }
    }

    fn test_ctx() -> CommandContext {
        CommandContext::new(
            Rc::new(RefCell::new(crate::session::Session::new())),
            Rc::new(RefCell::new(CommandRegistry::new())),
            Rc::new(RefCell::new(PluginRegistry::new())),
            Rc::new(NullShell),
            Rc::new(RefCell::new(Notifier::new(NotifierConfig::default(), None))),
            Rc::new(RefCell::new(AuditLogger::disabled())),
            Rc::new(crate::clipboard::UnsupportedClipboard),
            Rc::new(Cell::new(false)),
            Rc::new(RefCell::new(VecDeque::new())),
        )
    }

    #[test]
    fn second_agent_registration_is_rejected_and_first_stays_active() {
        let mut registry = PluginRegistry::new();
        let ctx = test_ctx();

        registry
            .load_and_register(
                LoadedPlugin::Agent(Box::new(FakeAgent {
                    name: "first".to_string(),
                })),
                &ctx,
            )
            .expect("first registration succeeds");

        let err = registry
            .load_and_register(
                LoadedPlugin::Agent(Box::new(FakeAgent {
                    name: "second".to_string(),
                })),
                &ctx,
            )
            .expect_err("second registration must raise");

        assert!(err.to_string().contains("second"));
        assert_eq!(registry.active_agent().map(|agent| agent.name()), Some("first"));
    }

    #[test]
    fn loader_returns_none_for_missing_module() {
        let loader = PluginLoader::new();
        assert!(loader.load("does.not.exist").is_none());
    }
}
