use std::fmt;

use crate::config::{AuthConfig, ChatConfig, LlmConfig};

/// Per-connection session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingAuth,
    Streaming,
    Committing,
    Error,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Error) | (_, Closed) => true,
            (Idle, AwaitingAuth) => true,
            (AwaitingAuth, Streaming) => true,
            (Streaming, Committing) => true,
            (Committing, Streaming) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "IDLE",
            SessionState::AwaitingAuth => "AWAITING_AUTH",
            SessionState::Streaming => "STREAMING",
            SessionState::Committing => "COMMITTING",
            SessionState::Error => "ERROR",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Bounds applied to history before it is placed in the system message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    pub max_turns: Option<usize>,
    pub max_tokens: Option<usize>,
}

impl HistoryWindow {
    /// `0` disables a bound.
    pub fn new(max_turns: usize, max_tokens: usize) -> Self {
        Self {
            max_turns: (max_turns > 0).then_some(max_turns),
            max_tokens: (max_tokens > 0).then_some(max_tokens),
        }
    }

    #[cfg(test)]
    pub fn unbounded() -> Self {
        Self::default()
    }
}

impl From<&ChatConfig> for HistoryWindow {
    fn from(cfg: &ChatConfig) -> Self {
        Self::new(cfg.max_history_turns, cfg.max_history_tokens)
    }
}

/// Knobs a session reads on every turn.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub stream_response: bool,
    pub record_user_turns: bool,
    pub max_turn_chars: usize,
    pub max_auth_attempts: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            stream_response: true,
            record_user_turns: false,
            max_turn_chars: 4000,
            max_auth_attempts: 1,
        }
    }
}

impl SessionPolicy {
    pub fn from_config(chat: &ChatConfig, llm: &LlmConfig, auth: &AuthConfig) -> Self {
        Self {
            stream_response: llm.stream_response,
            record_user_turns: chat.record_user_turns,
            max_turn_chars: chat.max_turn_chars,
            max_auth_attempts: auth.max_auth_attempts.max(1),
        }
    }
}

/// Fragments accumulated for one turn. Dropped without a trace on abort.
#[derive(Debug, Default)]
pub struct GenerationResult {
    text: String,
    fragments: usize,
}

impl GenerationResult {
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [Idle, AwaitingAuth, Streaming, Committing, Streaming, Closed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_error_reachable_from_every_open_state() {
        for state in [Idle, AwaitingAuth, Streaming, Committing] {
            assert!(state.can_transition_to(Error));
        }
        assert!(Error.can_transition_to(Closed));
    }

    #[test]
    fn test_closed_is_terminal() {
        for next in [Idle, AwaitingAuth, Streaming, Committing, Error, Closed] {
            assert!(!Closed.can_transition_to(next));
        }
    }

    #[test]
    fn test_no_shortcuts() {
        assert!(!Idle.can_transition_to(Streaming));
        assert!(!AwaitingAuth.can_transition_to(Committing));
        assert!(!Committing.can_transition_to(AwaitingAuth));
        assert!(!Error.can_transition_to(Streaming));
    }

    #[test]
    fn test_zero_disables_bounds() {
        assert_eq!(HistoryWindow::new(0, 0), HistoryWindow::unbounded());
        assert_eq!(HistoryWindow::new(5, 0).max_turns, Some(5));
    }

    #[test]
    fn test_generation_result_flattens() {
        let mut result = GenerationResult::default();
        result.push("Hi");
        result.push(" there");
        assert_eq!(result.fragment_count(), 2);
        assert_eq!(result.into_text(), "Hi there");
    }
}
