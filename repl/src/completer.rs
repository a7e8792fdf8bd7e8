//! Completer (spec §4.5): a UI-neutral completion engine with exactly two
//! latent states (Normal, Suppressed) and one observable output per
//! keystroke. Output is a pure function of state + live input.

use std::path::Path;

use agentrepl_protocol::SlashCommandSpec;

use crate::commands::CommandRegistry;

/// Upper bound on fuzzy path matches offered for a single `@`-mention.
const MAX_MENTION_MATCHES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CompleterState {
    Normal,
    Suppressed { text_at_suppression: String },
}

pub struct Completer {
    state: CompleterState,
    pinned: Vec<String>,
    max_pinned_display: usize,
}

impl Completer {
    pub fn new(pinned: Vec<String>, max_pinned_display: usize) -> Self {
        Self {
            state: CompleterState::Normal,
            pinned,
            max_pinned_display,
        }
    }

    /// Compute completions for the live input text `T`, given the current
    /// registry contents, transitioning state as needed.
    pub fn on_input_changed(&mut self, text: &str, registry: &CommandRegistry) -> Vec<String> {
        if let CompleterState::Suppressed {
            text_at_suppression,
        } = &self.state
        {
            if text_at_suppression == text {
                return Vec::new();
            }
            self.state = CompleterState::Normal;
        }

        if !text.starts_with('/') {
            return Vec::new();
        }
        if text == "/" {
            return registry.get_pinned(&self.pinned, self.max_pinned_display);
        }
        registry
            .complete(&text[1..])
            .into_iter()
            .map(|spec: &SlashCommandSpec| spec.name.clone())
            .collect()
    }

    /// Explicit dismiss (UI-provided ESC): suppress completions for the
    /// exact current input text until it changes.
    pub fn dismiss(&mut self, current_text: &str) {
        self.state = CompleterState::Suppressed {
            text_at_suppression: current_text.to_string(),
        };
    }

    /// Fuzzy path matches for the fragment typed after an `@`-mention,
    /// resolved against `base_dir`. Separate from [`Self::on_input_changed`]:
    /// it does not participate in the Normal/Suppressed state machine, since
    /// mention completion is keyed off cursor position within free text
    /// rather than the whole-line classification slash commands use.
    pub fn complete_mention(&self, fragment: &str, base_dir: &Path) -> Vec<String> {
        agentrepl_file_search::search_paths(base_dir, fragment, MAX_MENTION_MATCHES)
            .into_iter()
            .map(|m| m.path)
            .collect()
    }
}
