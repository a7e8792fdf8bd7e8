//! Shared, non-owning handles passed to command handlers. `App -> Session`,
//! `App -> Registry`, ... are the only references here — no cyclic
//! ownership (spec §9).

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::audit::AuditLogger;
use crate::clipboard::Clipboard;
use crate::commands::CommandRegistry;
use crate::notifier::Notifier;
use crate::plugin::PluginRegistry;
use crate::session::Session;
use crate::shell::Shell;

/// Passed by value into a command handler. Cloning is cheap (every field is
/// `Rc`); it does not copy the underlying state.
#[derive(Clone)]
pub struct CommandContext {
    pub session: Rc<RefCell<Session>>,
    pub registry: Rc<RefCell<CommandRegistry>>,
    pub plugins: Rc<RefCell<PluginRegistry>>,
    pub shell: Rc<dyn Shell>,
    pub notifier: Rc<RefCell<Notifier>>,
    pub audit: Rc<RefCell<AuditLogger>>,
    pub clipboard: Rc<dyn Clipboard>,
    quit_requested: Rc<Cell<bool>>,
    queued_prompts: Rc<RefCell<VecDeque<String>>>,
}

impl CommandContext {
    pub fn new(
        session: Rc<RefCell<Session>>,
        registry: Rc<RefCell<CommandRegistry>>,
        plugins: Rc<RefCell<PluginRegistry>>,
        shell: Rc<dyn Shell>,
        notifier: Rc<RefCell<Notifier>>,
        audit: Rc<RefCell<AuditLogger>>,
        clipboard: Rc<dyn Clipboard>,
        quit_requested: Rc<Cell<bool>>,
        queued_prompts: Rc<RefCell<VecDeque<String>>>,
    ) -> Self {
        Self {
            session,
            registry,
            plugins,
            shell,
            notifier,
            audit,
            clipboard,
            quit_requested,
            queued_prompts,
        }
    }

    /// `/quit` (and any other command that should end the loop) calls this
    /// instead of the dispatcher special-casing a keyword.
    pub fn request_quit(&self) {
        self.quit_requested.set(true);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested.get()
    }

    /// Queue a follow-up prompt to be sent as the next free-text message,
    /// without re-entering the prompt. See SPEC_FULL.md §10.6.
    pub fn queue_prompt(&self, text: impl Into<String>) {
        self.queued_prompts.borrow_mut().push_back(text.into());
    }

    pub fn pop_queued_prompt(&self) -> Option<String> {
        self.queued_prompts.borrow_mut().pop_front()
    }
}
