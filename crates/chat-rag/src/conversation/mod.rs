//! Conversation memory and query enrichment
//!
//! History is owned by a [`ConversationSession`]; nothing here is global.
//! Enrichment only reads history, the caller appends turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Default number of retained turns per session
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Bounded rolling buffer of turns
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ConversationHistory {
    /// Create an empty history holding at most `capacity` turns
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    /// Append a turn, evicting the oldest user/assistant pair when full
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(ConversationTurn {
            role,
            content: content.into(),
        });

        while self.turns.len() > self.capacity {
            self.turns.pop_front();
            if matches!(self.turns.front(), Some(turn) if turn.role == Role::Assistant) {
                self.turns.pop_front();
            }
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content);
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content);
    }

    /// Remove and return the newest turn
    pub fn pop_last(&mut self) -> Option<ConversationTurn> {
        self.turns.pop_back()
    }

    /// The last `n` turns, oldest first
    pub fn last_turns(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(n))
    }

    /// All retained turns, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Prefix the question with the recent conversation
///
/// Returns `new_user_text` unchanged when there is no history.
pub fn enrich(history: &ConversationHistory, new_user_text: &str, max_turns: usize) -> String {
    if history.is_empty() {
        return new_user_text.to_string();
    }

    let lines: Vec<String> = history
        .last_turns(max_turns.max(1))
        .map(|turn| {
            let content = turn.content.replace(['\r', '\n'], " ");
            format!("{}: {}", turn.role.label(), content.trim())
        })
        .collect();

    format!(
        "Conversation History:\n{}\n\nUser question:\n{}",
        lines.join("\n"),
        new_user_text
    )
}

/// One chat session and its history
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: Uuid,
    pub history: ConversationHistory,
    pub created_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Start a session with the given history capacity
    pub fn new(history_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            history: ConversationHistory::new(history_capacity),
            created_at: Utc::now(),
        }
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_returns_raw_text() {
        let history = ConversationHistory::default();
        assert_eq!(enrich(&history, "Who made Python?", 6), "Who made Python?");
    }

    #[test]
    fn test_enrichment_format() {
        let mut history = ConversationHistory::default();
        history.push_user("Who made Python?");
        history.push_assistant("Guido van Rossum\nin 1991 [source:doc_1]  ");

        let enriched = enrich(&history, "When was that?", 6);
        assert_eq!(
            enriched,
            "Conversation History:\nUser: Who made Python?\n\
             Assistant: Guido van Rossum in 1991 [source:doc_1]\n\n\
             User question:\nWhen was that?"
        );
        assert!(enriched.ends_with("When was that?"));
    }

    #[test]
    fn test_enrichment_reads_last_turns_only() {
        let mut history = ConversationHistory::default();
        for i in 0..5 {
            history.push_user(format!("q{}", i));
            history.push_assistant(format!("a{}", i));
        }

        let enriched = enrich(&history, "next", 2);
        assert!(enriched.contains("User: q4\nAssistant: a4"));
        assert!(!enriched.contains("q3"));
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn test_capacity_evicts_oldest_pair() {
        let mut history = ConversationHistory::new(4);
        history.push_user("q1");
        history.push_assistant("a1");
        history.push_user("q2");
        history.push_assistant("a2");
        history.push_user("q3");

        let contents: Vec<&str> = history.turns().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "a2", "q3"]);
        assert_eq!(history.turns().next().unwrap().role, Role::User);
    }

    #[test]
    fn test_clear_and_sessions_are_independent() {
        let mut first = ConversationSession::default();
        let second = ConversationSession::default();
        first.history.push_user("hello");

        assert_ne!(first.id, second.id);
        assert!(second.history.is_empty());

        first.history.clear();
        assert!(first.history.is_empty());
    }
}
