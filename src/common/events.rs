use crate::sync::{SkipReason, SyncState};

use super::types::{Identity, Message, User, UserId};

/// Sự kiện từ chat client gửi lên UI.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    IdentityChanged(Option<Identity>),
    UsersLoaded(Vec<User>),
    /// Full filtered view of one conversation; replaces whatever the UI held.
    ConversationUpdated {
        peer_id: UserId,
        messages: Vec<Message>,
    },
    SyncStateChanged(SyncState),
    SendSkipped(SkipReason),
    Fault(String),
}
