//! Deep links to chat messages.

/// Convert a chat id to the form used in `t.me/c/{id}/{message}` links.
///
/// Supergroup and channel ids are negative and carry a `-100` prefix that
/// the link format omits.
pub fn link_chat_id(chat_id: i64) -> i64 {
    (chat_id.unsigned_abs() % 10_000_000_000) as i64
}

/// Deep link to a message in a group chat.
pub fn message_link(chat_id: i64, message_id: i64) -> String {
    format!("https://t.me/c/{}/{}", link_chat_id(chat_id), message_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supergroup_prefix_is_stripped() {
        assert_eq!(link_chat_id(-1001234567890), 1234567890);
    }

    #[test]
    fn test_positive_id_is_kept() {
        assert_eq!(link_chat_id(123456), 123456);
    }

    #[test]
    fn test_message_link_format() {
        assert_eq!(
            message_link(-1009876543210, 42),
            "https://t.me/c/9876543210/42"
        );
    }
}
