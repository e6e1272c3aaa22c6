use crate::common::Message;

/// True when the message travels between `a` and `b`, in either direction.
pub fn belongs_to(message: &Message, a: &str, b: &str) -> bool {
    (message.sender_id == a && message.receiver_id == b)
        || (message.sender_id == b && message.receiver_id == a)
}

/// Narrows a user's message stream to one 1:1 conversation.
///
/// Input order is kept as-is (the stream already arrives timestamp
/// ascending). No state is carried between calls, so the view can be
/// re-derived from any snapshot. An unselected peer yields nothing.
pub fn conversation_messages(
    all_messages: &[Message],
    self_id: &str,
    peer_id: Option<&str>,
) -> Vec<Message> {
    let Some(peer_id) = peer_id else {
        return Vec::new();
    };

    all_messages
        .iter()
        .filter(|message| belongs_to(message, self_id, peer_id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::OutgoingMessage;

    fn msg(id: &str, from: &str, to: &str, timestamp: i64) -> Message {
        OutgoingMessage::new(id, from, to).stamp(id.to_string(), timestamp)
    }

    fn mixed_stream() -> Vec<Message> {
        vec![
            msg("1", "alice", "bob", 1),
            msg("2", "alice", "carol", 2),
            msg("3", "bob", "alice", 3),
            msg("4", "carol", "bob", 4),
            msg("5", "alice", "bob", 5),
            msg("6", "bob", "bob", 6),
        ]
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn keeps_only_the_pair_in_stream_order() {
        let stream = mixed_stream();
        let view = conversation_messages(&stream, "alice", Some("bob"));
        assert_eq!(ids(&view), vec!["1", "3", "5"]);
    }

    #[test]
    fn conversation_is_symmetric() {
        let stream = mixed_stream();
        assert_eq!(
            conversation_messages(&stream, "alice", Some("bob")),
            conversation_messages(&stream, "bob", Some("alice"))
        );
        assert_eq!(
            conversation_messages(&stream, "carol", Some("alice")),
            conversation_messages(&stream, "alice", Some("carol"))
        );
    }

    #[test]
    fn filtering_twice_changes_nothing() {
        let stream = mixed_stream();
        let once = conversation_messages(&stream, "alice", Some("bob"));
        let twice = conversation_messages(&once, "alice", Some("bob"));
        assert_eq!(once, twice);
    }

    #[test]
    fn no_peer_means_empty_view() {
        assert!(conversation_messages(&mixed_stream(), "alice", None).is_empty());
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let stream = vec![
            msg("b", "alice", "bob", 7),
            msg("a", "bob", "alice", 7),
        ];
        let view = conversation_messages(&stream, "alice", Some("bob"));
        assert_eq!(ids(&view), vec!["b", "a"]);
    }

    #[test]
    fn self_conversation_only_matches_notes_to_self() {
        let view = conversation_messages(&mixed_stream(), "bob", Some("bob"));
        assert_eq!(ids(&view), vec!["6"]);
    }
}
