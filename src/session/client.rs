use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::{
    IdentityProvider, LocalIdentity, LocalStore, MessageFeed, MessageWriter, UserDirectory,
    UserQuery, require_verified,
};
use crate::common::{ChatCommand, ChatEvent, Identity};
use crate::error::ChatError;
use crate::sync::{LiveSyncController, MessageSendGate, SendOutcome, SyncState, SyncUpdate};

/// The capabilities a [`ChatClient`] runs against.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub feed: Arc<dyn MessageFeed>,
    pub writer: Arc<dyn MessageWriter>,
    pub directory: Arc<dyn UserDirectory>,
}

impl Backend {
    /// Every capability served by the in-process adapters.
    pub fn local(store: Arc<LocalStore>, identity: Arc<LocalIdentity>) -> Self {
        Self {
            identity,
            feed: store.clone(),
            writer: store.clone(),
            directory: store,
        }
    }
}

/// Background task between the UI and the sync core.
pub struct ChatClient {
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    identity_provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn UserDirectory>,
    controller: LiveSyncController,
    gate: MessageSendGate,
    identity: Option<Identity>,
    last_state: SyncState,
}

impl ChatClient {
    pub fn new(
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
        backend: Backend,
    ) -> Self {
        Self {
            event_sender,
            command_receiver,
            identity_provider: backend.identity,
            directory: backend.directory,
            controller: LiveSyncController::new(backend.feed),
            gate: MessageSendGate::new(backend.writer),
            identity: None,
            last_state: SyncState::Unsubscribed,
        }
    }

    /// Runs until the UI drops its command sender.
    pub async fn run(mut self) -> Result<(), ChatError> {
        let mut identity_watch = self.identity_provider.watch();
        let initial = identity_watch.borrow_and_update().clone();
        self.handle_identity_change(initial).await;

        log::info!("Chat client loop started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                changed = identity_watch.changed() => {
                    if changed.is_err() {
                        log::warn!("Identity provider went away; stopping chat client");
                        break;
                    }
                    let identity = identity_watch.borrow_and_update().clone();
                    self.handle_identity_change(identity).await;
                }
                update = self.controller.next_update(), if self.controller.has_pending_update() => {
                    self.handle_sync_update(update).await;
                }
            }
        }

        self.controller.teardown().await;
        log::info!("Chat client loop stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::SelectPeer(peer) => {
                let peer_id = peer.id.clone();
                let result = self
                    .controller
                    .select_peer(self.identity.as_ref(), Some(peer))
                    .await;
                if let Err(err) = result {
                    self.emit_fault(err).await;
                }
                // The previous conversation is gone from the view right away.
                self.emit(ChatEvent::ConversationUpdated {
                    peer_id,
                    messages: Vec::new(),
                })
                .await;
                self.emit_state_if_changed().await;
            }
            ChatCommand::ClearSelection => {
                self.controller.clear_selection().await;
                self.emit_state_if_changed().await;
            }
            ChatCommand::SendMessage(text) => {
                let result = self
                    .gate
                    .send(&text, self.identity.as_ref(), self.controller.peer())
                    .await;
                match result {
                    Ok(SendOutcome::Sent { id }) => log::debug!("Message {id} accepted by store"),
                    Ok(SendOutcome::Skipped(reason)) => {
                        self.emit(ChatEvent::SendSkipped(reason)).await;
                    }
                    Err(err) => self.emit_fault(err).await,
                }
            }
            ChatCommand::RefreshUsers => self.load_users().await,
            ChatCommand::SignOut => {
                if let Err(err) = self.identity_provider.sign_out().await {
                    self.emit_fault(err).await;
                }
            }
        }
    }

    async fn handle_identity_change(&mut self, identity: Option<Identity>) {
        let same_user = match (self.identity.as_ref(), identity.as_ref()) {
            (Some(previous), Some(current)) => previous.id == current.id,
            _ => false,
        };
        self.identity = identity.clone();
        self.controller.on_identity_changed(identity.as_ref()).await;
        if !same_user {
            // The selection belongs to the previous user.
            self.controller.clear_selection().await;
        }
        self.emit(ChatEvent::IdentityChanged(identity)).await;
        self.emit_state_if_changed().await;

        if !self.identity.as_ref().is_some_and(|identity| identity.verified) {
            return;
        }

        self.load_users().await;

        // Re-open the kept selection after (re-)verification.
        if !self.controller.has_subscription() {
            if let Some(peer) = self.controller.peer().cloned() {
                if let Err(err) = self
                    .controller
                    .select_peer(self.identity.as_ref(), Some(peer))
                    .await
                {
                    self.emit_fault(err).await;
                }
                self.emit_state_if_changed().await;
            }
        }
    }

    async fn handle_sync_update(&mut self, update: Result<SyncUpdate, ChatError>) {
        match update {
            Ok(SyncUpdate::Applied) => {
                if let Some(peer) = self.controller.peer() {
                    let event = ChatEvent::ConversationUpdated {
                        peer_id: peer.id.clone(),
                        messages: self.controller.messages().to_vec(),
                    };
                    self.emit(event).await;
                }
            }
            Ok(SyncUpdate::Closed) | Ok(SyncUpdate::Idle) => {}
            Err(err) => self.emit_fault(err).await,
        }
        self.emit_state_if_changed().await;
    }

    /// One-shot directory query: everyone but the signed-in user.
    async fn load_users(&mut self) {
        let email = match require_verified(self.identity.as_ref()) {
            Ok(identity) => identity.email.clone(),
            Err(err) => {
                log::debug!("Skipping user listing: {err}");
                return;
            }
        };

        match self
            .directory
            .list_users(UserQuery::excluding_email(email))
            .await
        {
            Ok(users) => {
                log::info!("Loaded {} users", users.len());
                self.emit(ChatEvent::UsersLoaded(users)).await;
            }
            Err(err) => self.emit_fault(err).await,
        }
    }

    async fn emit_state_if_changed(&mut self) {
        let state = self.controller.state();
        if state != self.last_state {
            self.last_state = state;
            self.emit(ChatEvent::SyncStateChanged(state)).await;
        }
    }

    async fn emit_fault(&self, err: ChatError) {
        if err.is_recoverable() {
            log::warn!("Chat fault: {err}");
        } else {
            log::error!("Chat fault: {err}");
        }
        self.emit(ChatEvent::Fault(err.to_string())).await;
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MessageQuery, Subscription, SubscriptionHandle};
    use crate::common::{Snapshot, User};
    use crate::sync::SkipReason;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Harness {
        commands: mpsc::Sender<ChatCommand>,
        events: mpsc::Receiver<ChatEvent>,
        identity: Arc<LocalIdentity>,
        store: Arc<LocalStore>,
    }

    /// Delivers one empty snapshot, then a stream fault.
    struct FailingFeed;

    #[async_trait]
    impl MessageFeed for FailingFeed {
        async fn subscribe(&self, _query: MessageQuery) -> Result<Subscription, ChatError> {
            let (sender, receiver) = mpsc::unbounded_channel();
            let _ = sender.send(Ok(Snapshot::default()));
            let _ = sender.send(Err(ChatError::Subscription("stream reset".to_string())));
            Ok(Subscription::new(SubscriptionHandle(1), receiver))
        }

        async fn unsubscribe(&self, _handle: SubscriptionHandle) -> Result<(), ChatError> {
            Ok(())
        }
    }

    async fn start(identity: Option<Identity>) -> Harness {
        start_with_feed(identity, None).await
    }

    async fn start_with_feed(
        identity: Option<Identity>,
        feed: Option<Arc<dyn MessageFeed>>,
    ) -> Harness {
        let store = Arc::new(LocalStore::in_memory().unwrap());
        for (id, email) in [("alice", "alice@example.com"), ("bob", "bob@example.com")] {
            store.register_profile(id, email, None).await.unwrap();
        }
        let identity = Arc::new(LocalIdentity::new(identity));
        let (commands, command_receiver) = mpsc::channel(16);
        let (event_sender, events) = mpsc::channel(64);
        let mut backend = Backend::local(store.clone(), identity.clone());
        if let Some(feed) = feed {
            backend.feed = feed;
        }
        let client = ChatClient::new(event_sender, command_receiver, backend);
        tokio::spawn(client.run());
        Harness {
            commands,
            events,
            identity,
            store,
        }
    }

    fn alice(verified: bool) -> Identity {
        Identity {
            id: "alice".to_string(),
            email: "alice@example.com".to_string(),
            verified,
            display_name: None,
        }
    }

    /// Next event matching `pick`, skipping the rest.
    async fn wait_for<T>(
        events: &mut mpsc::Receiver<ChatEvent>,
        mut pick: impl FnMut(ChatEvent) -> Option<T>,
    ) -> T {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = events.recv().await.expect("client alive");
                if let Some(found) = pick(event) {
                    return found;
                }
            }
        })
        .await
        .expect("event in time")
    }

    #[tokio::test]
    async fn verified_user_gets_directory_and_live_thread() {
        let mut harness = start(Some(alice(true))).await;

        let users = wait_for(&mut harness.events, |event| match event {
            ChatEvent::UsersLoaded(users) => Some(users),
            _ => None,
        })
        .await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "bob");

        harness
            .commands
            .send(ChatCommand::SelectPeer(users[0].clone()))
            .await
            .unwrap();
        harness
            .commands
            .send(ChatCommand::SendMessage("hi".to_string()))
            .await
            .unwrap();

        let messages = wait_for(&mut harness.events, |event| match event {
            ChatEvent::ConversationUpdated { messages, .. } if !messages.is_empty() => {
                Some(messages)
            }
            _ => None,
        })
        .await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hi");
        assert_eq!(harness.store.message_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unverified_user_sees_skips_not_faults() {
        let mut harness = start(Some(alice(false))).await;
        let bob = User::new("bob", "bob@example.com");

        harness
            .commands
            .send(ChatCommand::SelectPeer(bob))
            .await
            .unwrap();
        harness
            .commands
            .send(ChatCommand::SendMessage("hi".to_string()))
            .await
            .unwrap();

        let reason = wait_for(&mut harness.events, |event| match event {
            ChatEvent::SendSkipped(reason) => Some(reason),
            ChatEvent::Fault(fault) => panic!("unexpected fault: {fault}"),
            _ => None,
        })
        .await;
        assert_eq!(reason, SkipReason::Unverified);
        assert_eq!(harness.store.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn verification_reopens_the_selected_conversation() {
        let mut harness = start(Some(alice(false))).await;
        harness
            .commands
            .send(ChatCommand::SelectPeer(User::new("bob", "bob@example.com")))
            .await
            .unwrap();
        // Flush the selection before flipping verification.
        wait_for(&mut harness.events, |event| match event {
            ChatEvent::ConversationUpdated { .. } => Some(()),
            _ => None,
        })
        .await;

        harness.identity.mark_verified();
        let state = wait_for(&mut harness.events, |event| match event {
            ChatEvent::SyncStateChanged(SyncState::Active) => Some(SyncState::Active),
            _ => None,
        })
        .await;
        assert_eq!(state, SyncState::Active);
        assert_eq!(harness.store.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn sign_out_tears_down_the_subscription() {
        let mut harness = start(Some(alice(true))).await;
        harness
            .commands
            .send(ChatCommand::SelectPeer(User::new("bob", "bob@example.com")))
            .await
            .unwrap();
        wait_for(&mut harness.events, |event| match event {
            ChatEvent::SyncStateChanged(SyncState::Active) => Some(()),
            _ => None,
        })
        .await;

        harness.commands.send(ChatCommand::SignOut).await.unwrap();
        wait_for(&mut harness.events, |event| match event {
            ChatEvent::IdentityChanged(None) => Some(()),
            _ => None,
        })
        .await;
        wait_for(&mut harness.events, |event| match event {
            ChatEvent::SyncStateChanged(SyncState::Unsubscribed) => Some(()),
            _ => None,
        })
        .await;
        assert_eq!(harness.store.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn stream_fault_is_reported_and_unsubscribes() {
        let mut harness = start_with_feed(Some(alice(true)), Some(Arc::new(FailingFeed))).await;
        harness
            .commands
            .send(ChatCommand::SelectPeer(User::new("bob", "bob@example.com")))
            .await
            .unwrap();

        let fault = wait_for(&mut harness.events, |event| match event {
            ChatEvent::Fault(fault) => Some(fault),
            _ => None,
        })
        .await;
        assert!(fault.contains("stream reset"));
        wait_for(&mut harness.events, |event| match event {
            ChatEvent::SyncStateChanged(SyncState::Unsubscribed) => Some(()),
            _ => None,
        })
        .await;
    }

    #[tokio::test]
    async fn switching_user_drops_the_previous_selection() {
        let mut harness = start(Some(alice(true))).await;
        harness
            .commands
            .send(ChatCommand::SelectPeer(User::new("bob", "bob@example.com")))
            .await
            .unwrap();
        wait_for(&mut harness.events, |event| match event {
            ChatEvent::SyncStateChanged(SyncState::Active) => Some(()),
            _ => None,
        })
        .await;

        harness.identity.sign_in(Identity {
            id: "bob".to_string(),
            email: "bob@example.com".to_string(),
            verified: true,
            display_name: None,
        });
        wait_for(&mut harness.events, |event| match event {
            ChatEvent::IdentityChanged(Some(identity)) if identity.id == "bob" => Some(()),
            _ => None,
        })
        .await;
        // Commands run after the identity change has been handled in full.
        harness.commands.send(ChatCommand::RefreshUsers).await.unwrap();
        for _ in 0..2 {
            wait_for(&mut harness.events, |event| match event {
                ChatEvent::UsersLoaded(_) => Some(()),
                _ => None,
            })
            .await;
        }
        assert_eq!(harness.store.subscriber_count().await, 0);
    }
}
