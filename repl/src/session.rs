//! Session (spec §4.3): append-only ordered turns with token accumulation
//! and summary replacement.

use agentrepl_protocol::ConversationTurn;
use agentrepl_protocol::Role;
use agentrepl_protocol::TokenStatistics;

#[derive(Debug, Default)]
pub struct Session {
    history: Vec<ConversationTurn>,
    stats: TokenStatistics,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_turn(&mut self, turn: ConversationTurn) {
        if let Some(usage) = turn.usage {
            self.stats.accumulate(usage);
        }
        self.history.push(turn);
    }

    /// A snapshot copy; mutating the returned vector never affects session
    /// state.
    pub fn get_history(&self) -> Vec<ConversationTurn> {
        self.history.clone()
    }

    pub fn stats(&self) -> TokenStatistics {
        self.stats
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.stats = TokenStatistics::default();
    }

    pub fn last_assistant_response(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.content.as_str())
    }

    /// Stats are left untouched: accumulated totals survive summarization.
    pub fn replace_with_summary(&mut self, summary: impl Into<String>) {
        self.history = vec![ConversationTurn::new(Role::System, summary)];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn::new(role, content)
    }

    #[test]
    fn history_order_preserved() {
        let mut session = Session::new();
        session.add_turn(turn(Role::User, "one"));
        session.add_turn(turn(Role::Assistant, "two"));
        let history = session.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "one");
        assert_eq!(history[1].content, "two");
    }

    #[test]
    fn token_sum_matches_usages() {
        use agentrepl_protocol::TokenUsage;
        let mut session = Session::new();
        session.add_turn(turn(Role::User, "a"));
        session.add_turn(turn(Role::Assistant, "b").with_usage(Some(TokenUsage::new(3, 5))));
        session.add_turn(turn(Role::Assistant, "c").with_usage(Some(TokenUsage::new(1, 1))));
        let stats = session.stats();
        assert_eq!(stats.total_input, 4);
        assert_eq!(stats.total_output, 6);
    }

    #[test]
    fn replace_with_summary_leaves_single_system_turn_and_keeps_stats() {
        use agentrepl_protocol::TokenUsage;
        let mut session = Session::new();
        session.add_turn(turn(Role::Assistant, "a").with_usage(Some(TokenUsage::new(2, 2))));
        session.replace_with_summary("summary text");
        let history = session.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[0].content, "summary text");
        assert_eq!(session.stats().total_input, 2);
    }

    #[test]
    fn clear_resets_history_and_stats() {
        use agentrepl_protocol::TokenUsage;
        let mut session = Session::new();
        session.add_turn(turn(Role::Assistant, "a").with_usage(Some(TokenUsage::new(2, 2))));
        session.clear();
        assert!(session.get_history().is_empty());
        assert_eq!(session.stats(), TokenStatistics::default());
    }

    #[test]
    fn last_assistant_response_skips_non_assistant_turns() {
        let mut session = Session::new();
        session.add_turn(turn(Role::User, "question"));
        session.add_turn(turn(Role::Assistant, "answer one"));
        session.add_turn(turn(Role::User, "follow up"));
        assert_eq!(session.last_assistant_response(), Some("answer one"));
    }
}
