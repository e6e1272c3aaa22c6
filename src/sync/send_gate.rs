use std::fmt;
use std::sync::Arc;

use crate::backend::MessageWriter;
use crate::common::{Identity, MessageId, OutgoingMessage, User};
use crate::error::ChatError;

/// Why a send was skipped. Skips are deliberate no-ops, never faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SignedOut,
    Unverified,
    NoPeerSelected,
    EmptyText,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::SignedOut => "not signed in",
            SkipReason::Unverified => "email not verified",
            SkipReason::NoPeerSelected => "no conversation selected",
            SkipReason::EmptyText => "message is empty",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { id: MessageId },
    Skipped(SkipReason),
}

/// Guards outbound sends and builds the record for the write capability.
///
/// The gate never touches the conversation view; the live subscription sees
/// the write and delivers it like any other message.
pub struct MessageSendGate {
    writer: Arc<dyn MessageWriter>,
}

impl MessageSendGate {
    pub fn new(writer: Arc<dyn MessageWriter>) -> Self {
        Self { writer }
    }

    /// Precondition check on its own, so callers can tell a skip apart from
    /// a send without issuing one. Text is taken as-is: only an exactly empty
    /// string is refused.
    pub fn check<'a>(
        text: &str,
        identity: Option<&'a Identity>,
        peer: Option<&'a User>,
    ) -> Result<(&'a Identity, &'a User), SkipReason> {
        let identity = identity.ok_or(SkipReason::SignedOut)?;
        if !identity.verified {
            return Err(SkipReason::Unverified);
        }
        let peer = peer.ok_or(SkipReason::NoPeerSelected)?;
        if text.is_empty() {
            return Err(SkipReason::EmptyText);
        }
        Ok((identity, peer))
    }

    pub async fn send(
        &self,
        text: &str,
        identity: Option<&Identity>,
        peer: Option<&User>,
    ) -> Result<SendOutcome, ChatError> {
        let (identity, peer) = match Self::check(text, identity, peer) {
            Ok(checked) => checked,
            Err(reason) => {
                log::debug!("Send skipped: {reason}");
                return Ok(SendOutcome::Skipped(reason));
            }
        };

        let record = OutgoingMessage::new(text, identity.id.clone(), peer.id.clone());
        let id = self.writer.append(record).await?;
        log::debug!("Sent message {id} from {} to {}", identity.id, peer.id);
        Ok(SendOutcome::Sent { id })
    }
}
