pub mod commands;
pub mod events;
pub mod types;

pub use commands::ChatCommand;
pub use events::ChatEvent;
pub use types::{
    Identity, Message, MessageId, OutgoingMessage, Participants, ServerTimestamp, Snapshot, User,
    UserId,
};
