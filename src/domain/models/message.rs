//! Messages exchanged during a reactive turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Participant,
    Counterpart,
}

/// One message in a reactive exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(sender: Sender, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp,
        }
    }
}

/// Append-only transcript whose timestamps never decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ConversationMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with `now`, or with the previous timestamp if
    /// the wall clock stepped backwards.
    pub fn push(&mut self, sender: Sender, text: impl Into<String>, now: DateTime<Utc>) {
        let timestamp = self
            .messages
            .last()
            .map_or(now, |last| last.timestamp.max(now));
        self.messages
            .push(ConversationMessage::new(sender, text, timestamp));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ConversationMessage> {
        self.messages
    }

    /// Participant messages joined by newlines.
    pub fn participant_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.sender == Sender::Participant)
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
