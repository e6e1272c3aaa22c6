use super::types::User;

/// Lệnh UI gửi xuống chat client.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    /// Open the conversation with this user.
    SelectPeer(User),
    ClearSelection,
    SendMessage(String),
    /// Re-run the one-shot directory query.
    RefreshUsers,
    SignOut,
}
