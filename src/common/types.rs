use std::fmt;

use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type MessageId = String;

/// A directory entry as seen by the chat core. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Display name if present, email otherwise.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.email,
        }
    }

    /// Avatar letter: first char of the display name, else the uppercased
    /// first char of the email.
    pub fn initial(&self) -> String {
        if let Some(first) = self
            .display_name
            .as_deref()
            .and_then(|name| name.chars().next())
        {
            return first.to_string();
        }
        self.email
            .chars()
            .next()
            .map(|first| first.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_string())
    }
}

/// What the identity provider reports about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Unordered pair of user ids. Stored sorted so `{a, b} == {b, a}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct Participants(UserId, UserId);

impl Participants {
    pub fn new(a: impl Into<UserId>, b: impl Into<UserId>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0 == user_id || self.1 == user_id
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }
}

impl From<Vec<UserId>> for Participants {
    fn from(mut ids: Vec<UserId>) -> Self {
        let second = ids.pop().unwrap_or_default();
        let first = ids.pop().unwrap_or_else(|| second.clone());
        Self::new(first, second)
    }
}

impl From<Participants> for Vec<UserId> {
    fn from(participants: Participants) -> Self {
        vec![participants.0, participants.1]
    }
}

impl fmt::Display for Participants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.0, self.1)
    }
}

/// A stored direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    /// Store-assigned, milliseconds since epoch, monotonic per write.
    pub timestamp: i64,
    pub participants: Participants,
}

impl Message {
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Placeholder asking the store to stamp its own authoritative time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerTimestamp;

/// The record handed to the write capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub participants: Participants,
    pub timestamp: ServerTimestamp,
}

impl OutgoingMessage {
    pub fn new(
        text: impl Into<String>,
        sender_id: impl Into<UserId>,
        receiver_id: impl Into<UserId>,
    ) -> Self {
        let sender_id = sender_id.into();
        let receiver_id = receiver_id.into();
        Self {
            text: text.into(),
            participants: Participants::new(sender_id.clone(), receiver_id.clone()),
            sender_id,
            receiver_id,
            timestamp: ServerTimestamp,
        }
    }

    /// Resolves the placeholder once the store has picked an id and a time.
    pub fn stamp(self, id: MessageId, timestamp: i64) -> Message {
        Message {
            id,
            text: self.text,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            timestamp,
            participants: self.participants,
        }
    }
}

/// Full result set of a live query. Never a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub messages: Vec<Message>,
}

impl Snapshot {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
