//! The `Shell` contract named in spec §6. The concrete terminal rendering
//! library is explicitly out of scope for this crate's core; this trait is
//! the seam an embedder implements (or swaps) behind. `shell_crossterm`
//! supplies a minimal default so the crate is runnable end-to-end without
//! an embedder.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::completer::Completer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Success,
    Error,
}

pub type ReadLineFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<ReadLineOutcome>> + 'a>>;

/// What happened while the Shell was collecting one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLineOutcome {
    Submitted(String),
    /// EOF or an interrupt signal received while idle (no task in flight).
    Eof,
    /// `Ctrl+Y` was pressed: the dispatcher should copy the last assistant
    /// response to the clipboard and prompt again. Handled at this level
    /// (rather than inside the Shell) because it needs the Session and the
    /// Clipboard, neither of which the Shell owns.
    CopyLastAssistant,
}

pub trait Shell {
    fn render_markdown(&self, text: &str);
    fn render_dim(&self, text: &str);
    fn render_panel(&self, kind: PanelKind, title: &str, text: &str);

    fn spinner_start(&self, message: &str);
    fn spinner_stop(&self);

    fn live_start(&self);
    fn live_push(&self, text: &str);
    /// Render accumulated live text as markdown and deactivate the live
    /// view.
    fn live_finalize(&self, accumulated: &str);

    /// Record a tool result body that was truncated in-place (FIFO,
    /// most-recent last).
    fn push_collapsed_result(&self, full_body: String);
    /// Cleared alongside `Session::clear()` (spec §9 Design Notes / §9
    /// Open Questions, resolved in SPEC_FULL.md).
    fn clear_collapsed_results(&self);
    /// `Ctrl+O`: expand the most-recently collapsed result, if any.
    fn expand_most_recent_collapsed(&self) -> Option<String>;

    /// Read one line of input. Returns `Eof` on EOF or an interrupt signal
    /// received while idle.
    fn read_line<'a>(&'a self, prompt: &'a str) -> ReadLineFuture<'a>;

    /// Wire a Completer into this shell so its key bindings (`ESC` to
    /// dismiss) can reach it (spec §4.12 boot step 5, §6's Completer-binding
    /// API). Default no-op: shells with no interactive completion surface
    /// (e.g. `NullShell`, test doubles) don't need to override this.
    fn bind_completer(&self, _completer: Rc<RefCell<Completer>>) {}
}

/// A no-op `Shell` used in unit tests that exercise components without a
/// real terminal.
pub struct NullShell;

impl Shell for NullShell {
    fn render_markdown(&self, _text: &str) {}
    fn render_dim(&self, _text: &str) {}
    fn render_panel(&self, _kind: PanelKind, _title: &str, _text: &str) {}
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
    fn read_line<'a>(&'a self, _prompt: &'a str) -> ReadLineFuture<'a> {
        Box::pin(async { Ok(ReadLineOutcome::Eof) })
    }
}
