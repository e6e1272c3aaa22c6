//! Conversation sync: narrowing, live subscription lifecycle, send gating.

pub mod controller;
pub mod filter;
pub mod send_gate;

pub use controller::{LiveSyncController, SyncState, SyncUpdate};
pub use filter::{belongs_to, conversation_messages};
pub use send_gate::{MessageSendGate, SendOutcome, SkipReason};
