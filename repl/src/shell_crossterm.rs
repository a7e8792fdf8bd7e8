//! Minimal `crossterm`-backed default [`Shell`]. Deliberately not a
//! retained-mode widget tree (ratatui et al. are the out-of-scope
//! "concrete terminal rendering library" named in spec §6) — a
//! line-oriented scrolling transcript is enough to make the crate runnable
//! end-to-end.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write as _;
use std::rc::Rc;

use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyModifiers;
use crossterm::style::Color;
use crossterm::style::Stylize;
use crossterm::terminal;

use crate::completer::Completer;
use crate::shell::PanelKind;
use crate::shell::ReadLineFuture;
use crate::shell::ReadLineOutcome;
use crate::shell::Shell;

const MAX_COLLAPSED_RESULTS: usize = 64;

struct ShellState {
    spinner_active: bool,
    live_active: bool,
    collapsed_results: VecDeque<String>,
}

/// What one raw-mode key-reading pass produced. A superset of
/// [`ReadLineOutcome`]: `Dismiss`/`ExpandCollapsed` are handled by this
/// shell itself (they need no Session or Clipboard) and never escape to
/// the dispatcher, unlike `CopyLastAssistant`.
enum LineEvent {
    Submitted(String),
    Eof,
    CopyLastAssistant,
    Dismiss(String),
    ExpandCollapsed,
}

pub struct CrosstermShell {
    state: RefCell<ShellState>,
    completer: RefCell<Option<Rc<RefCell<Completer>>>>,
}

impl Default for CrosstermShell {
    fn default() -> Self {
        Self {
            state: RefCell::new(ShellState {
                spinner_active: false,
                live_active: false,
                collapsed_results: VecDeque::new(),
            }),
            completer: RefCell::new(None),
        }
    }
}

impl CrosstermShell {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_line_blocking(prompt: String) -> anyhow::Result<LineEvent> {
        print!("{prompt}");
        std::io::stdout().flush().ok();

        terminal::enable_raw_mode()?;
        let result = Self::read_line_raw();
        terminal::disable_raw_mode()?;
        println!();
        result
    }

    fn read_line_raw() -> anyhow::Result<LineEvent> {
        let mut buffer = String::new();
        loop {
            let Event::Key(key) = crossterm::event::read()? else {
                continue;
            };
            if key.kind != crossterm::event::KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(LineEvent::Submitted(buffer)),
                KeyCode::Esc => return Ok(LineEvent::Dismiss(buffer)),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(LineEvent::Eof);
                }
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(LineEvent::Eof);
                }
                KeyCode::Char('y') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(LineEvent::CopyLastAssistant);
                }
                KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(LineEvent::ExpandCollapsed);
                }
                KeyCode::Backspace => {
                    buffer.pop();
                    print!("\u{8} \u{8}");
                    std::io::stdout().flush().ok();
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    print!("{c}");
                    std::io::stdout().flush().ok();
                }
                _ => {}
            }
        }
    }
}

impl Shell for CrosstermShell {
    fn render_markdown(&self, text: &str) {
        for line in textwrap::wrap(text, textwrap::Options::new(terminal_width())) {
            println!("{line}");
        }
    }

    fn render_dim(&self, text: &str) {
        println!("{}", text.dark_grey());
    }

    fn render_panel(&self, kind: PanelKind, title: &str, text: &str) {
        let (glyph, color) = match kind {
            PanelKind::Success => ("✓", Color::Green),
            PanelKind::Error => ("✗", Color::Red),
        };
        println!("{} {}", glyph.with(color), title.with(color));
        self.render_dim(text);
    }

    fn spinner_start(&self, message: &str) {
        self.state.borrow_mut().spinner_active = true;
        println!("{}", message.dark_grey());
    }

    fn spinner_stop(&self) {
        self.state.borrow_mut().spinner_active = false;
    }

    fn live_start(&self) {
        self.state.borrow_mut().live_active = true;
    }

    fn live_push(&self, text: &str) {
        print!("{text}");
        std::io::stdout().flush().ok();
    }

    fn live_finalize(&self, accumulated: &str) {
        self.state.borrow_mut().live_active = false;
        println!();
        self.render_markdown(accumulated);
    }

    fn push_collapsed_result(&self, full_body: String) {
        let mut state = self.state.borrow_mut();
        state.collapsed_results.push_back(full_body);
        while state.collapsed_results.len() > MAX_COLLAPSED_RESULTS {
            state.collapsed_results.pop_front();
        }
    }

    fn clear_collapsed_results(&self) {
        self.state.borrow_mut().collapsed_results.clear();
    }

    fn expand_most_recent_collapsed(&self) -> Option<String> {
        self.state.borrow().collapsed_results.back().cloned()
    }

    fn read_line<'a>(&'a self, prompt: &'a str) -> ReadLineFuture<'a> {
        let prompt = prompt.to_string();
        Box::pin(async move {
            loop {
                let prompt = prompt.clone();
                let event = tokio::task::spawn_blocking(move || Self::read_line_blocking(prompt)).await??;
                match event {
                    LineEvent::Submitted(line) => return Ok(ReadLineOutcome::Submitted(line)),
                    LineEvent::Eof => return Ok(ReadLineOutcome::Eof),
                    LineEvent::CopyLastAssistant => return Ok(ReadLineOutcome::CopyLastAssistant),
                    LineEvent::Dismiss(text) => {
                        if let Some(completer) = self.completer.borrow().as_ref() {
                            completer.borrow_mut().dismiss(&text);
                        }
                    }
                    LineEvent::ExpandCollapsed => {
                        if let Some(text) = self.expand_most_recent_collapsed() {
                            self.render_dim(&text);
                        }
                    }
                }
            }
        })
    }

    fn bind_completer(&self, completer: Rc<RefCell<Completer>>) {
        *self.completer.borrow_mut() = Some(completer);
    }
}

fn terminal_width() -> usize {
    terminal::size().map(|(cols, _)| cols as usize).unwrap_or(80)
}
