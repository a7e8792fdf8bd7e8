use std::path::PathBuf;

use agentrepl_core::CLI_EXPOSED_BUILTINS;
use agentrepl_core::Orchestrator;
use agentrepl_core::OrchestratorConfig;
use anyhow::Context;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run an interactive, agent-backed REPL")]
struct Cli {
    /// Path to the TOML configuration file (default: ~/.agentrepl/config.toml).
    #[arg(long, env = "AGENTREPL_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to resolve `@`-mentions and the working directory from.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Directory to write the append-only session audit log into. Auditing
    /// is disabled when omitted.
    #[arg(long, env = "AGENTREPL_AUDIT_DIR")]
    audit_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    install_tracing();

    // §10.4: `cli_exposed` commands are matched against raw process args
    // before clap parsing proper, since a fuller embedder's full exposed
    // set is only known once plugins have registered. This crate's only
    // plugins are its built-ins, so the set is fixed.
    if let Some((name, args)) = resolve_cli_exposed_invocation(std::env::args().skip(1)) {
        return run_single_command(name, args);
    }

    let cli = Cli::parse();
    run_repl(cli)
}

fn install_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

/// `--<name>[=value]` for any name in [`CLI_EXPOSED_BUILTINS`], scanned in
/// argument order. The first match wins; everything else is ignored (the
/// invocation is non-interactive and exits immediately after).
fn resolve_cli_exposed_invocation(args: impl Iterator<Item = String>) -> Option<(String, String)> {
    for arg in args {
        let Some(rest) = arg.strip_prefix("--") else {
            continue;
        };
        let (name, value) = match rest.split_once('=') {
            Some((name, value)) => (name, value.to_string()),
            None => (rest, String::new()),
        };
        if CLI_EXPOSED_BUILTINS.contains(&name) {
            return Some((name.to_string(), value));
        }
    }
    None
}

/// Boots the full set of collaborators, runs exactly one command's handler
/// non-interactively, and exits without entering the REPL loop.
fn run_single_command(name: String, args: String) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async move {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default());
        let booted = orchestrator.boot().await.context("boot orchestrator")?;

        let command = booted
            .ctx
            .registry
            .borrow()
            .get(&name)
            .cloned()
            .with_context(|| format!("cli_exposed command '{name}' vanished after boot"))?;

        (command.handler)(booted.ctx, args).await
    })
}

fn run_repl(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let config = OrchestratorConfig {
        base_dir: Some(cli.base_dir),
        config_path: cli.config,
        audit_dir: cli.audit_dir,
        ..Default::default()
    };

    runtime.block_on(Orchestrator::new(config).run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_flag_resolves_to_the_version_command() {
        let args = ["agentrepl".to_string(), "--version".to_string()];
        let resolved = resolve_cli_exposed_invocation(args.into_iter().skip(1));
        assert_eq!(resolved, Some(("version".to_string(), String::new())));
    }

    #[test]
    fn notify_flag_carries_its_value() {
        let args = ["agentrepl".to_string(), "--notify=off".to_string()];
        let resolved = resolve_cli_exposed_invocation(args.into_iter().skip(1));
        assert_eq!(resolved, Some(("notify".to_string(), "off".to_string())));
    }

    #[test]
    fn unrelated_flags_do_not_match() {
        let args = ["agentrepl".to_string(), "--base-dir".to_string(), "/tmp".to_string()];
        let resolved = resolve_cli_exposed_invocation(args.into_iter().skip(1));
        assert_eq!(resolved, None);
    }

    #[test]
    fn base_dir_defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["agentrepl"]).expect("parse args");
        assert_eq!(cli.base_dir, PathBuf::from("."));
    }
}
