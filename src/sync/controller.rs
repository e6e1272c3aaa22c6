use std::sync::Arc;

use futures::StreamExt;

use super::filter::conversation_messages;
use crate::backend::{MessageFeed, MessageQuery, Subscription, SubscriptionHandle};
use crate::common::{Identity, Message, Snapshot, User, UserId};
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsubscribed,
    /// Subscription open, first snapshot not yet applied.
    Subscribing,
    Active,
}

/// Outcome of one [`LiveSyncController::next_update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncUpdate {
    /// A snapshot was applied; `messages()` holds the new view.
    Applied,
    /// The feed closed the stream; the controller is unsubscribed.
    Closed,
    /// Nothing to wait on.
    Idle,
}

/// Owns the live subscription for one conversation view.
///
/// The subscription is scoped to the signed-in user, not to the pair; every
/// snapshot is narrowed client-side and replaces the local view wholesale.
/// At most one subscription is held, and the previous one is released
/// before another opens.
///
/// Every local state change happens before the first `.await`, so a caller
/// that drops an in-flight call (a losing `select!` branch) never leaves the
/// view half torn down.
pub struct LiveSyncController {
    feed: Arc<dyn MessageFeed>,
    state: SyncState,
    self_id: Option<UserId>,
    peer: Option<User>,
    subscription: Option<Subscription>,
    messages: Vec<Message>,
    /// Detached locally, not yet confirmed by the feed.
    pending_releases: Vec<SubscriptionHandle>,
    /// Stream fault not yet handed to the caller.
    pending_fault: Option<ChatError>,
}

impl LiveSyncController {
    pub fn new(feed: Arc<dyn MessageFeed>) -> Self {
        Self {
            feed,
            state: SyncState::Unsubscribed,
            self_id: None,
            peer: None,
            subscription: None,
            messages: Vec::new(),
            pending_releases: Vec::new(),
            pending_fault: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn peer(&self) -> Option<&User> {
        self.peer.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// True while [`next_update`](Self::next_update) has something to hand
    /// back: a live stream or a fault not yet returned.
    pub fn has_pending_update(&self) -> bool {
        self.subscription.is_some() || self.pending_fault.is_some()
    }

    /// Switches the view to `peer` (or clears it).
    ///
    /// The old subscription is always released first. A new one is only
    /// opened for a verified identity with a selected peer.
    pub async fn select_peer(
        &mut self,
        identity: Option<&Identity>,
        peer: Option<User>,
    ) -> Result<(), ChatError> {
        self.teardown().await;
        self.peer = peer;

        let Some(peer) = self.peer.as_ref() else {
            return Ok(());
        };
        let Some(identity) = identity.filter(|identity| identity.verified) else {
            log::debug!("Not subscribing for {}: no verified identity", peer.id);
            return Ok(());
        };

        self.state = SyncState::Subscribing;
        match self
            .feed
            .subscribe(MessageQuery::participant(identity.id.clone()))
            .await
        {
            Ok(subscription) => {
                log::info!(
                    "Subscribed {} for conversation with {}",
                    identity.id,
                    peer.id
                );
                self.self_id = Some(identity.id.clone());
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(err) => {
                log::warn!("Subscribe for {} failed: {err}", identity.id);
                self.state = SyncState::Unsubscribed;
                Err(err)
            }
        }
    }

    /// Waits for the next snapshot of the current subscription and applies it.
    ///
    /// A stream error tears the subscription down and is returned as-is; no
    /// retry happens here.
    pub async fn next_update(&mut self) -> Result<SyncUpdate, ChatError> {
        if self.pending_fault.is_some() {
            return self.finish_fault().await;
        }
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(SyncUpdate::Idle);
        };

        match subscription.next().await {
            Some(Ok(snapshot)) => {
                self.apply_snapshot(snapshot);
                Ok(SyncUpdate::Applied)
            }
            Some(Err(err)) => {
                log::warn!("Subscription fault: {err}");
                self.detach();
                self.pending_fault = Some(err);
                self.finish_fault().await
            }
            None => {
                log::info!("Subscription stream closed by the feed");
                self.teardown().await;
                Ok(SyncUpdate::Closed)
            }
        }
    }

    /// Releases what the fault left behind, then returns the fault. If this
    /// is cancelled the fault stays pending for the next call.
    async fn finish_fault(&mut self) -> Result<SyncUpdate, ChatError> {
        self.release_pending().await;
        match self.pending_fault.take() {
            Some(err) => Err(err),
            None => Ok(SyncUpdate::Idle),
        }
    }

    /// Full-replace merge: the filtered snapshot becomes the whole view.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let Some(self_id) = self.self_id.as_deref() else {
            log::debug!("Ignoring snapshot while unsubscribed");
            return;
        };
        let peer_id = self.peer.as_ref().map(|peer| peer.id.as_str());
        self.messages = conversation_messages(&snapshot.messages, self_id, peer_id);
        self.state = SyncState::Active;
    }

    /// Forces a teardown when the identity is gone, unverified, or a
    /// different user. Returns whether a subscription was dropped.
    pub async fn on_identity_changed(&mut self, identity: Option<&Identity>) -> bool {
        if self.state == SyncState::Unsubscribed {
            return false;
        }

        let still_valid = match (identity, self.self_id.as_deref()) {
            (Some(identity), Some(self_id)) => identity.verified && identity.id == self_id,
            _ => false,
        };
        if still_valid {
            return false;
        }

        log::info!("Identity no longer verified; dropping subscription");
        self.teardown().await;
        true
    }

    /// Releases the current subscription, if any. The peer selection is kept.
    pub async fn teardown(&mut self) {
        self.detach();
        self.release_pending().await;
    }

    /// Tears down and forgets the selected peer.
    pub async fn clear_selection(&mut self) {
        self.teardown().await;
        self.peer = None;
    }

    /// Synchronous half of a teardown: local delivery stops and the view is
    /// reset before anything is awaited.
    fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.pending_releases.push(subscription.handle());
        }
        self.state = SyncState::Unsubscribed;
        self.self_id = None;
        self.messages.clear();
    }

    /// A handle leaves the queue only once the feed answered, so a cancelled
    /// release is retried on the next teardown.
    async fn release_pending(&mut self) {
        while let Some(&handle) = self.pending_releases.first() {
            if let Err(err) = self.feed.unsubscribe(handle).await {
                log::warn!("Failed to release subscription {handle:?}: {err}");
            }
            self.pending_releases.remove(0);
        }
    }
}
