//! Core engine behind an interactive, agent-backed REPL: input parsing,
//! session state, slash commands, completion, plugin loading, stream
//! processing, notification, auditing, and the dispatcher loop that ties
//! them together. The concrete terminal rendering library, agent backend,
//! and clipboard subprocess are collaborator contracts an embedder
//! supplies (see [`shell`], [`plugin`], [`clipboard`]); `shell_crossterm`
//! is the minimal in-tree default.

pub mod audit;
pub mod clipboard;
pub mod commands;
pub mod completer;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod file_context;
pub mod input;
pub mod notifier;
pub mod orchestrator;
pub mod plugin;
pub mod session;
pub mod shell;
pub mod shell_crossterm;
pub mod spawner;
pub mod stream;

pub use audit::AuditEntryKind;
pub use audit::AuditLogger;
pub use clipboard::Clipboard;
pub use commands::CommandRegistry;
pub use commands::SlashCommand;
pub use completer::Completer;
pub use context::CommandContext;
pub use dispatcher::Dispatcher;
pub use error::ReplError;
pub use file_context::FileContextResolver;
pub use file_context::FileContextResolverConfig;
pub use input::ParsedInput;
pub use notifier::Notifier;
pub use notifier::NotifierConfig;
pub use orchestrator::BootedOrchestrator;
pub use orchestrator::CLI_EXPOSED_BUILTINS;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorConfig;
pub use plugin::AgentPlugin;
pub use plugin::LoadedPlugin;
pub use plugin::Plugin;
pub use plugin::PluginLoader;
pub use plugin::PluginRegistry;
pub use session::Session;
pub use shell::Shell;
pub use spawner::SessionSpawner;
pub use stream::StreamProcessor;
