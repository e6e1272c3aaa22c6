use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    MessageFeed, MessageQuery, MessageWriter, SnapshotResult, Subscription, SubscriptionHandle,
    UserDirectory, UserQuery,
};
use crate::common::{MessageId, OutgoingMessage, Participants, Snapshot, User, UserId};
use crate::error::ChatError;
use crate::storage::{ClientDatabase, UserProfile};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Local stand-in for the hosted document store.
///
/// Messages and profiles live in SQLite. Each live subscription gets an
/// unbounded channel that is fed while the store lock is held, so snapshots
/// reach a subscriber in the order they were produced. Writes from other
/// processes sharing the database file are picked up by
/// [`LocalStore::spawn_change_poller`].
pub struct LocalStore {
    inner: Mutex<StoreInner>,
    next_handle: AtomicU64,
}

struct StoreInner {
    db: ClientDatabase,
    subscribers: HashMap<SubscriptionHandle, Subscriber>,
    last_seen_seq: i64,
}

struct Subscriber {
    participant: UserId,
    sender: mpsc::UnboundedSender<SnapshotResult>,
}

impl LocalStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChatError> {
        Self::from_db(ClientDatabase::with_path(path)?)
    }

    pub fn in_memory() -> Result<Self, ChatError> {
        Self::from_db(ClientDatabase::in_memory()?)
    }

    fn from_db(db: ClientDatabase) -> Result<Self, ChatError> {
        let last_seen_seq = db.latest_seq()?;
        Ok(Self {
            inner: Mutex::new(StoreInner {
                db,
                subscribers: HashMap::new(),
                last_seen_seq,
            }),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Number of live subscriptions; a released handle no longer counts.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    pub async fn message_count(&self) -> Result<usize, ChatError> {
        Ok(self.inner.lock().await.db.message_count()?)
    }

    /// Re-broadcasts snapshots when another process appended to the shared
    /// database file. Returns `None` when `interval` is zero.
    pub fn spawn_change_poller(self: Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let mut inner = self.inner.lock().await;
                match inner.db.latest_seq() {
                    Ok(seq) if seq != inner.last_seen_seq => {
                        log::debug!("External writes detected (seq {} -> {seq})", inner.last_seen_seq);
                        inner.last_seen_seq = seq;
                        inner.broadcast(|_| true);
                    }
                    Ok(_) => {}
                    Err(err) => log::warn!("Change poll failed: {err}"),
                }
            }
        }))
    }
}

impl StoreInner {
    /// Monotonic per write, also across processes sharing the file.
    fn next_timestamp(&self) -> Result<i64, ChatError> {
        let now = Utc::now().timestamp_millis();
        let latest = self.db.latest_timestamp()?.unwrap_or(i64::MIN);
        Ok(now.max(latest.saturating_add(1)))
    }

    fn snapshot_for(&self, participant: &str) -> SnapshotResult {
        self.db
            .messages_for_participant(participant)
            .map(Snapshot::new)
            .map_err(|err| ChatError::Subscription(err.to_string()))
    }

    /// Pushes a fresh snapshot to every subscriber whose participant matches,
    /// dropping subscribers whose receiver is gone.
    fn broadcast(&mut self, matches: impl Fn(&str) -> bool) {
        let participants: HashSet<UserId> = self
            .subscribers
            .values()
            .filter(|subscriber| matches(&subscriber.participant))
            .map(|subscriber| subscriber.participant.clone())
            .collect();

        let snapshots: HashMap<UserId, SnapshotResult> = participants
            .into_iter()
            .map(|participant| {
                let snapshot = self.snapshot_for(&participant);
                (participant, snapshot)
            })
            .collect();

        self.subscribers.retain(|handle, subscriber| {
            let Some(snapshot) = snapshots.get(&subscriber.participant) else {
                return true;
            };
            let payload = match snapshot {
                Ok(snapshot) => Ok(snapshot.clone()),
                Err(err) => Err(ChatError::Subscription(err.to_string())),
            };
            if subscriber.sender.send(payload).is_err() {
                log::debug!("Dropping subscription {handle:?}: receiver closed");
                return false;
            }
            true
        });
    }

    fn fan_out(&mut self, participants: &Participants) {
        self.broadcast(|participant| participants.contains(participant));
    }
}

#[async_trait]
impl MessageFeed for LocalStore {
    async fn subscribe(&self, query: MessageQuery) -> Result<Subscription, ChatError> {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut inner = self.inner.lock().await;
        let initial = inner.snapshot_for(&query.participant)?;
        // The receiver is alive until we return it.
        let _ = sender.send(Ok(initial));
        inner.subscribers.insert(
            handle,
            Subscriber {
                participant: query.participant.clone(),
                sender,
            },
        );

        log::debug!(
            "Opened subscription {handle:?} for participant {}",
            query.participant
        );
        Ok(Subscription::new(handle, receiver))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), ChatError> {
        let mut inner = self.inner.lock().await;
        if inner.subscribers.remove(&handle).is_some() {
            log::debug!("Released subscription {handle:?}");
        } else {
            log::debug!("Subscription {handle:?} already released");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageWriter for LocalStore {
    async fn append(&self, record: OutgoingMessage) -> Result<MessageId, ChatError> {
        let mut inner = self.inner.lock().await;
        let timestamp = inner
            .next_timestamp()
            .map_err(|err| ChatError::Write(err.to_string()))?;
        let message = record.stamp(Uuid::new_v4().to_string(), timestamp);

        let seq = inner
            .db
            .insert_message(&message)
            .map_err(|err| ChatError::Write(err.to_string()))?;
        inner.last_seen_seq = seq;

        log::debug!(
            "Appended message {} to {} at {}",
            message.id,
            message.participants,
            message.timestamp
        );
        inner.fan_out(&message.participants);
        Ok(message.id)
    }
}

#[async_trait]
impl UserDirectory for LocalStore {
    async fn list_users(&self, query: UserQuery) -> Result<Vec<User>, ChatError> {
        let inner = self.inner.lock().await;
        let profiles = inner
            .db
            .list_users(query.exclude_email.as_deref())
            .map_err(|err| ChatError::Query(err.to_string()))?;
        Ok(profiles.into_iter().map(UserProfile::into_user).collect())
    }

    async fn register_profile(
        &self,
        id: &str,
        email: &str,
        display_name: Option<String>,
    ) -> Result<UserProfile, ChatError> {
        let profile = new_profile(id, email, display_name)?;
        let inner = self.inner.lock().await;
        inner
            .db
            .upsert_user(&profile)
            .map_err(|err| ChatError::Write(err.to_string()))?;
        // Hand back the stored row so an existing created_at is kept.
        let stored = inner
            .db
            .get_user(id)
            .map_err(|err| ChatError::Query(err.to_string()))?
            .unwrap_or(profile);
        log::info!("Registered profile {} <{}>", stored.id, stored.email);
        Ok(stored)
    }
}

/// Builds a directory profile. Without an explicit display name the local
/// part of the email is used.
fn new_profile(
    id: &str,
    email: &str,
    display_name: Option<String>,
) -> Result<UserProfile, ChatError> {
    if id.trim().is_empty() {
        return Err(ChatError::InvalidProfile("user id is empty".to_string()));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ChatError::InvalidProfile(format!(
            "`{email}` is not an email address"
        )));
    }

    let display_name = display_name
        .filter(|name| !name.trim().is_empty())
        .or_else(|| email.split('@').next().map(str::to_string));

    Ok(UserProfile {
        id: id.to_string(),
        email: email.to_string(),
        display_name,
        created_at: Utc::now().timestamp(),
    })
}
