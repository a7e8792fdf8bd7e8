//! Orchestrator (spec §4.12): the idempotent boot sequence that wires every
//! collaborator into a runnable [`Dispatcher`] and drives it to completion.
//! `Notifier::queue`'s delivery path uses `tokio::task::spawn_local`, so the
//! whole REPL runs inside a `tokio::task::LocalSet` (spec §5).

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use agentrepl_protocol::SlashCommandSpec;

use crate::audit::AuditLogger;
use crate::clipboard::Clipboard;
use crate::clipboard::SubprocessClipboard;
use crate::commands::CommandRegistry;
use crate::commands::SlashCommand;
use crate::completer::Completer;
use crate::config::ConfigStore;
use crate::context::CommandContext;
use crate::dispatcher::Dispatcher;
use crate::error::ReplError;
use crate::file_context::FileContextResolver;
use crate::file_context::FileContextResolverConfig;
use crate::notifier::DesktopNotificationBackend;
use crate::notifier::NotificationBackend;
use crate::notifier::Notifier;
use crate::plugin::AgentPlugin;
use crate::plugin::LoadedPlugin;
use crate::plugin::PluginLoader;
use crate::plugin::PluginRegistry;
use crate::session::Session;
use crate::shell::PanelKind;
use crate::shell::Shell;
use crate::shell_crossterm::CrosstermShell;

const MAX_PINNED_DISPLAY: usize = 6;
const DEFAULT_PINNED: &[&str] = &["help", "quit"];

/// Names of the built-in commands registered with `cli_exposed(true)`.
/// A CLI front-end matches these against raw `std::env::args()` before its
/// own clap parsing proper, since the full `cli_exposed` set in a fuller
/// embedder (plugin-contributed commands included) is only known after
/// plugin registration — see SPEC_FULL.md §10.4.
pub const CLI_EXPOSED_BUILTINS: &[&str] = &["version", "notify"];

pub const APP_NAME: &str = "agentrepl";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Produces the default agent, used only when no `agent_factory` is
/// supplied and no programmatic agent plugin was registered. Returns `None`
/// if the default agent's prerequisites (e.g. an API key) aren't present.
pub type DefaultAgentFactory = Box<dyn FnOnce() -> Option<Box<dyn AgentPlugin>>>;

/// Everything the boot sequence needs beyond hardcoded defaults. Every
/// field is optional so an embedder with no plugins and no config file on
/// disk still gets a runnable (agent-less) REPL.
#[derive(Default)]
pub struct OrchestratorConfig {
    pub base_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
    pub programmatic_plugins: Vec<LoadedPlugin>,
    pub plugin_loader: PluginLoader,
    pub agent_factory: Option<DefaultAgentFactory>,
    pub extra_pinned: Vec<String>,
}

/// The result of running the boot sequence: a fully wired [`CommandContext`]
/// (for headless single-command dispatch) and the [`Dispatcher`] ready to
/// drive the interactive loop.
pub struct BootedOrchestrator {
    pub ctx: CommandContext,
    pub dispatcher: Dispatcher,
}

/// Ties every collaborator together and runs the REPL to completion.
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    /// Step 1-6 of the boot sequence, then the dispatcher loop, all inside
    /// a `LocalSet` (required by the Notifier's `spawn_local` dispatch).
    /// Embedders that don't need to intercept CLI-exposed commands before
    /// entering the REPL can use this directly.
    pub async fn run(self) -> anyhow::Result<()> {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let booted = self.boot().await?;
                let mut dispatcher = booted.dispatcher;
                dispatcher.run().await;
                Ok(())
            })
            .await
    }

    /// Runs steps 1-6 of the boot sequence and returns the wired-up
    /// context and dispatcher without entering the REPL loop. Must be
    /// called from within a `tokio::task::LocalSet` (the Notifier's
    /// `spawn_local` dispatch requires it). Exposed so an embedder (the
    /// `cli` binary) can inspect the resolved Command Registry — e.g. to
    /// run a single `cli_exposed` command non-interactively — before
    /// deciding whether to enter the interactive loop at all.
    pub async fn boot(self) -> anyhow::Result<BootedOrchestrator> {
        let OrchestratorConfig {
            base_dir,
            config_path,
            audit_dir,
            programmatic_plugins,
            plugin_loader,
            agent_factory,
            extra_pinned,
        } = self.config;

        let base_dir = base_dir.unwrap_or(PathBuf::from("."));

        // 1. Empty Session, shell, command registry, plugin registry,
        // notifier, audit logger.
        let session = Rc::new(RefCell::new(Session::new()));
        let shell: Rc<dyn Shell> = Rc::new(CrosstermShell::new());
        let registry = Rc::new(RefCell::new(CommandRegistry::new()));
        let plugins = Rc::new(RefCell::new(PluginRegistry::new()));
        let clipboard: Rc<dyn Clipboard> = Rc::new(SubprocessClipboard);

        let config_path = match config_path {
            Some(path) => path,
            None => ConfigStore::default_path()?,
        };
        let repl_config = ConfigStore::new(config_path).load();

        let backend: Option<Rc<dyn NotificationBackend>> = Some(Rc::new(DesktopNotificationBackend));
        let notifier = Rc::new(RefCell::new(Notifier::new(repl_config.notifier, backend)));

        let audit = Rc::new(RefCell::new(match audit_dir {
            Some(dir) => AuditLogger::open(&dir),
            None => AuditLogger::disabled(),
        }));

        let quit_requested = Rc::new(Cell::new(false));
        let queued_prompts = Rc::new(RefCell::new(VecDeque::new()));

        let ctx = CommandContext::new(
            Rc::clone(&session),
            Rc::clone(&registry),
            Rc::clone(&plugins),
            Rc::clone(&shell),
            Rc::clone(&notifier),
            Rc::clone(&audit),
            clipboard,
            quit_requested,
            queued_prompts,
        );

        // 2. Built-in commands. `help`/`quit` are pinned.
        register_builtin_commands(&ctx);

        // 3. Plugins: programmatic first, then config-declared.
        for plugin in programmatic_plugins {
            if let Err(err) = plugins.borrow_mut().load_and_register(plugin, &ctx) {
                ctx.shell.render_panel(PanelKind::Error, "Plugin Error", &err.to_string());
            }
        }
        for module_id in &repl_config.plugin_paths {
            match plugin_loader.load(module_id) {
                Some(plugin) => {
                    if let Err(err) = plugins.borrow_mut().load_and_register(plugin, &ctx) {
                        ctx.shell.render_panel(PanelKind::Error, "Plugin Error", &err.to_string());
                    }
                }
                None => {
                    let err = ReplError::PluginLoad {
                        module: module_id.clone(),
                        reason: "module not found or factory failed".to_string(),
                    };
                    ctx.shell.render_panel(PanelKind::Error, "Plugin Error", &err.to_string());
                }
            }
        }

        // 4. Active agent: `agent_factory` if supplied, else the default
        // agent if its prerequisites are present, else no agent (warning).
        if plugins.borrow().active_agent().is_none() {
            if let Some(factory) = agent_factory {
                if let Some(agent) = factory() {
                    if let Err(err) = plugins
                        .borrow_mut()
                        .load_and_register(LoadedPlugin::Agent(agent), &ctx)
                    {
                        ctx.shell.render_panel(PanelKind::Error, "Agent Error", &err.to_string());
                    }
                } else {
                    ctx.shell.render_panel(
                        PanelKind::Error,
                        "No Agent",
                        "default agent's prerequisites are not present; continuing without an agent",
                    );
                }
            } else {
                ctx.shell.render_panel(
                    PanelKind::Error,
                    "No Agent",
                    "no agent configured; continuing without an agent",
                );
            }
        }

        // 5. Completer with the resolved pinned list, wired into the shell
        // so its ESC binding can dismiss it.
        let mut pinned: Vec<String> = DEFAULT_PINNED.iter().map(|s| s.to_string()).collect();
        pinned.extend(extra_pinned);
        let pinned = registry.borrow().get_pinned(&pinned, MAX_PINNED_DISPLAY);
        let completer = Completer::new(pinned, MAX_PINNED_DISPLAY);
        ctx.shell.bind_completer(Rc::new(RefCell::new(completer)));

        // 6. Banner, then the REPL itself.
        emit_banner(&ctx);

        let resolver = FileContextResolver::new(FileContextResolverConfig::default());
        let dispatcher = Dispatcher::new(ctx.clone(), resolver, base_dir);

        Ok(BootedOrchestrator { ctx, dispatcher })
    }
}

fn register_builtin_commands(ctx: &CommandContext) {
    let mut registry = ctx.registry.borrow_mut();

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("help", "List available commands").pinned(true),
        |ctx, _args| async move {
            let specs = ctx.registry.borrow().list_all();
            let lines: Vec<String> = specs
                .iter()
                .map(|spec| format!("/{} - {}", spec.name, spec.description))
                .collect();
            ctx.shell.render_markdown(&lines.join("\n"));
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("quit", "Exit the REPL").pinned(true),
        |ctx, _args| async move {
            ctx.request_quit();
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("version", "Show the application version").cli_exposed(true),
        |ctx, _args| async move {
            ctx.shell.render_dim(&format!("{APP_NAME} {APP_VERSION}"));
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("copy", "Copy the last assistant response to the clipboard"),
        |ctx, _args| async move {
            let Some(text) = ctx.session.borrow().last_assistant_response().map(str::to_string) else {
                ctx.shell.render_panel(PanelKind::Error, "Copy", "no assistant response to copy yet");
                return Ok(());
            };
            match ctx.clipboard.copy(text).await {
                Ok(()) => ctx.shell.render_dim("Copied to clipboard."),
                Err(err) => ctx.shell.render_panel(PanelKind::Error, "Copy", &err.to_string()),
            }
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("agent", "Show the active agent"),
        |ctx, _args| async move {
            match ctx.plugins.borrow().active_agent() {
                Some(agent) => ctx
                    .shell
                    .render_dim(&format!("{} ({})", agent.name(), agent.default_model())),
                None => ctx.shell.render_panel(PanelKind::Error, "Agent", "no agent configured"),
            }
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("stats", "Show session token usage"),
        |ctx, _args| async move {
            let stats = ctx.session.borrow().stats();
            ctx.shell.render_dim(&format!(
                "input: {} output: {}",
                stats.total_input, stats.total_output
            ));
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("notify", "Toggle desktop notifications (on|off)").cli_exposed(true),
        |ctx, args| async move {
            match args.trim() {
                "on" => ctx.notifier.borrow_mut().set_enabled(true),
                "off" => ctx.notifier.borrow_mut().set_enabled(false),
                _ => {
                    let state = if ctx.notifier.borrow().enabled() { "on" } else { "off" };
                    ctx.shell.render_dim(&format!("notifications are {state}"));
                    return Ok(());
                }
            }
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("clear", "Clear the conversation history"),
        |ctx, _args| async move {
            ctx.session.borrow_mut().clear();
            ctx.shell.clear_collapsed_results();
            ctx.shell.render_dim("History cleared.");
            Ok(())
        },
    ));

    registry.register(SlashCommand::new(
        SlashCommandSpec::new("audit", "Show whether session auditing is active"),
        |ctx, _args| async move {
            let state = if ctx.audit.borrow().is_active() { "active" } else { "inactive" };
            ctx.shell.render_dim(&format!("auditing is {state}"));
            Ok(())
        },
    ));
}

fn emit_banner(ctx: &CommandContext) {
    let agent_line = match ctx.plugins.borrow().active_agent() {
        Some(agent) => format!("{} ({})", agent.name(), agent.default_model()),
        None => "none".to_string(),
    };
    ctx.shell.render_dim(&format!(
        "{APP_NAME} {APP_VERSION} — agent: {agent_line} — /help for commands"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pinned_is_help_and_quit() {
        assert_eq!(DEFAULT_PINNED, ["help", "quit"]);
    }
}
