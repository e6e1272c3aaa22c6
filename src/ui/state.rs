use crate::common::{Identity, Message, User};
use crate::sync::{SkipReason, SyncState};
use chrono::{DateTime, Utc};

const MAX_DEBUG_EVENTS: usize = 100;

/// Debug event hiển thị trên panel bên phải
#[derive(Debug, Clone)]
pub struct DebugEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub message: String,
}

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub identity: Option<Identity>,
    pub users: Vec<User>,
    pub selected: Option<User>,
    /// Thread of the selected conversation, as last pushed by the client
    pub messages: Vec<Message>,
    pub input_text: String,
    pub sync_state: SyncState,
    pub debug_events: Vec<DebugEvent>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            identity: None,
            users: Vec::new(),
            selected: None,
            messages: Vec::new(),
            input_text: String::new(),
            sync_state: SyncState::Unsubscribed,
            debug_events: Vec::new(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.identity.as_ref().is_some_and(|identity| identity.verified)
    }

    pub fn is_own(&self, message: &Message) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| message.is_from(&identity.id))
    }

    pub fn set_identity(&mut self, identity: Option<Identity>) {
        let description = match &identity {
            Some(identity) if identity.verified => format!("Signed in as {}", identity.email),
            Some(identity) => format!("{} awaiting verification", identity.email),
            None => "Signed out".to_string(),
        };
        if identity.is_none() {
            self.users.clear();
            self.selected = None;
            self.messages.clear();
        }
        self.identity = identity;
        self.add_debug_event("IDENTITY", description);
    }

    /// Replaces the directory; a selection that is no longer listed is dropped.
    pub fn set_users(&mut self, users: Vec<User>) {
        if let Some(selected) = &self.selected {
            if !users.iter().any(|user| user.id == selected.id) {
                self.selected = None;
                self.messages.clear();
            }
        }
        self.add_debug_event("USERS_LOADED", format!("{} users", users.len()));
        self.users = users;
    }

    /// Returns false when the user was already selected.
    pub fn select_user(&mut self, user: User) -> bool {
        if self.selected.as_ref().is_some_and(|selected| selected.id == user.id) {
            return false;
        }
        self.messages.clear();
        self.selected = Some(user);
        true
    }

    /// Full replace of the thread. Updates for another peer are stale and dropped.
    pub fn replace_conversation(&mut self, peer_id: &str, messages: Vec<Message>) {
        if self.selected.as_ref().map(|user| user.id.as_str()) != Some(peer_id) {
            log::debug!("Dropping stale conversation update for {peer_id}");
            return;
        }
        self.messages = messages;
    }

    pub fn set_sync_state(&mut self, state: SyncState) {
        self.sync_state = state;
        self.add_debug_event("SYNC_STATE", format!("{state:?}"));
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        self.add_debug_event("SEND_SKIPPED", reason.to_string());
    }

    pub fn record_fault(&mut self, fault: String) {
        self.add_debug_event("FAULT", fault);
    }

    pub fn add_debug_event(&mut self, event_type: &str, message: String) {
        self.debug_events.push(DebugEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            message,
        });

        // Giữ tối đa 100 events để không chiếm quá nhiều bộ nhớ
        if self.debug_events.len() > MAX_DEBUG_EVENTS {
            self.debug_events.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::OutgoingMessage;

    fn bob() -> User {
        User::new("bob", "bob@example.com")
    }

    fn msg(id: &str, from: &str, to: &str) -> Message {
        OutgoingMessage::new(id, from, to).stamp(id.to_string(), 1)
    }

    #[test]
    fn stale_conversation_updates_are_ignored() {
        let mut state = AppState::new();
        state.select_user(bob());
        state.replace_conversation("carol", vec![msg("1", "carol", "alice")]);
        assert!(state.messages.is_empty());

        state.replace_conversation("bob", vec![msg("2", "bob", "alice")]);
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn reselecting_same_user_keeps_thread() {
        let mut state = AppState::new();
        assert!(state.select_user(bob()));
        state.replace_conversation("bob", vec![msg("1", "bob", "alice")]);
        assert!(!state.select_user(bob()));
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn sign_out_clears_everything_user_specific() {
        let mut state = AppState::new();
        state.set_identity(Some(Identity {
            id: "alice".to_string(),
            email: "alice@example.com".to_string(),
            verified: true,
            display_name: None,
        }));
        state.set_users(vec![bob()]);
        state.select_user(bob());
        assert!(state.is_verified());
        assert!(state.is_own(&msg("1", "alice", "bob")));

        state.set_identity(None);
        assert!(state.users.is_empty());
        assert!(state.selected.is_none());
        assert!(!state.is_verified());
    }

    #[test]
    fn debug_log_is_bounded() {
        let mut state = AppState::new();
        for n in 0..150 {
            state.add_debug_event("TEST", format!("event {n}"));
        }
        assert_eq!(state.debug_events.len(), MAX_DEBUG_EVENTS);
        assert_eq!(state.debug_events[0].message, "event 50");
    }
}
