use crate::db::models::Message;

/// Keep the most recent `max_history` messages, oldest first.
pub fn window(messages: &[Message], max_history: usize) -> &[Message] {
    let start = messages.len().saturating_sub(max_history);
    &messages[start..]
}

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.chars().count() / 4).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::user(format!("m{}", i), 1)).collect()
    }

    #[test]
    fn test_window_short_history_unchanged() {
        let messages = history(4);
        let kept = window(&messages, 10);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].content, "m0");
    }

    #[test]
    fn test_window_keeps_latest_in_order() {
        let messages = history(15);
        let kept: Vec<&str> = window(&messages, 10)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(kept.len(), 10);
        assert_eq!(kept.first(), Some(&"m5"));
        assert_eq!(kept.last(), Some(&"m14"));
    }

    #[test]
    fn test_window_exact_and_zero() {
        let messages = history(3);
        assert_eq!(window(&messages, 3).len(), 3);
        assert!(window(&messages, 0).is_empty());
        assert!(window(&[], 5).is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("ééééé"), 1);
    }
}
