//! Command Registry (spec §4.4): name -> command map with sorted listing,
//! prefix completion, and pinned-subset resolution.
//!
//! Handlers run inside the single cooperative task (see §5), so the
//! registry and its handler closures are `Rc`-based rather than
//! `Arc`/`Mutex`-based: there is never more than one live borrow.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use agentrepl_protocol::SlashCommandSpec;

use crate::CommandContext;

pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>>>>;
pub type CommandHandler = Rc<dyn Fn(CommandContext, String) -> HandlerFuture>;

#[derive(Clone)]
pub struct SlashCommand {
    pub spec: SlashCommandSpec,
    pub handler: CommandHandler,
}

impl SlashCommand {
    pub fn new<F, Fut>(spec: SlashCommandSpec, handler: F) -> Self
    where
        F: Fn(CommandContext, String) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self {
            spec,
            handler: Rc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    // A BTreeMap keeps `list_all`/`complete` sorted for free: iteration
    // order is key order.
    commands: BTreeMap<String, SlashCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name collision overwrites the prior command (last-writer-wins, I2).
    pub fn register(&mut self, command: SlashCommand) {
        self.commands.insert(command.spec.name.clone(), command);
    }

    pub fn get(&self, name: &str) -> Option<&SlashCommand> {
        self.commands.get(name)
    }

    pub fn list_all(&self) -> Vec<&SlashCommandSpec> {
        self.commands.values().map(|c| &c.spec).collect()
    }

    pub fn complete(&self, prefix: &str) -> Vec<&SlashCommandSpec> {
        self.commands
            .values()
            .map(|c| &c.spec)
            .filter(|spec| spec.name.starts_with(prefix))
            .collect()
    }

    /// `names` taken in order, restricted to registered commands, then
    /// registered pinned commands not already present, deduplicated and
    /// truncated to `max` (U7).
    pub fn get_pinned(&self, names: &[String], max: usize) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for name in names {
            if out.len() >= max {
                break;
            }
            if self.commands.contains_key(name) && seen.insert(name.clone()) {
                out.push(name.clone());
            }
        }

        if out.len() < max {
            for command in self.commands.values() {
                if out.len() >= max {
                    break;
                }
                if command.spec.pinned && seen.insert(command.spec.name.clone()) {
                    out.push(command.spec.name.clone());
                }
            }
        }

        out
    }
}
