use thiserror::Error;

/// Faults surfaced by the chat core and its capability adapters.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("authentication required: {0}")]
    Auth(String),

    #[error("subscription failed: {0}")]
    Subscription(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl ChatError {
    /// Capability faults the caller may retry on its own terms.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChatError::Subscription(_) | ChatError::Write(_) | ChatError::Query(_)
        )
    }
}
