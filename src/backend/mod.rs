//! Capability interfaces of the hosted backend, plus local adapters.
//!
//! The chat core only sees these traits. `LocalIdentity` and `LocalStore`
//! stand in for the managed identity provider and document store.

pub mod identity;
pub mod local_store;

pub use identity::{LocalIdentity, require_verified};
pub use local_store::LocalStore;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{mpsc, watch};

use crate::common::{Identity, MessageId, OutgoingMessage, Snapshot, User, UserId};
use crate::error::ChatError;
use crate::storage::UserProfile;

pub type SnapshotResult = Result<Snapshot, ChatError>;

/// Live query over the shared message collection. Results are always
/// ordered by timestamp ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub participant: UserId,
}

impl MessageQuery {
    /// Every message the user takes part in.
    pub fn participant(user_id: impl Into<UserId>) -> Self {
        Self {
            participant: user_id.into(),
        }
    }
}

/// One-shot directory query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub exclude_email: Option<String>,
}

impl UserQuery {
    pub fn excluding_email(email: impl Into<String>) -> Self {
        Self {
            exclude_email: Some(email.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// A live subscription: the handle to release it and the ordered stream of
/// full snapshots. Dropping it stops delivery locally; the feed still has to
/// be told through [`MessageFeed::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    receiver: mpsc::UnboundedReceiver<SnapshotResult>,
}

impl Subscription {
    pub fn new(
        handle: SubscriptionHandle,
        receiver: mpsc::UnboundedReceiver<SnapshotResult>,
    ) -> Self {
        Self { handle, receiver }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }
}

impl Stream for Subscription {
    type Item = SnapshotResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    /// Change notifications for sign-in, sign-out and verification.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_out(&self) -> Result<(), ChatError>;
}

#[async_trait]
pub trait MessageFeed: Send + Sync {
    async fn subscribe(&self, query: MessageQuery) -> Result<Subscription, ChatError>;

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), ChatError>;
}

#[async_trait]
pub trait MessageWriter: Send + Sync {
    /// Appends one record; the store resolves the timestamp placeholder.
    async fn append(&self, record: OutgoingMessage) -> Result<MessageId, ChatError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self, query: UserQuery) -> Result<Vec<User>, ChatError>;

    async fn register_profile(
        &self,
        id: &str,
        email: &str,
        display_name: Option<String>,
    ) -> Result<UserProfile, ChatError>;
}
