//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token.
//! This approximation is accurate within ~10% for BPE tokenizers on
//! English and French text. It is a comparison function, not ground
//! truth — every budget that consumes these numbers must tolerate
//! overshoot and undershoot against the model's real tokenizer.

use crate::message::Message;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() + 3) / 4
}

/// Estimate tokens for a single message including per-message overhead.
///
/// Each message costs ~4 tokens of overhead for role name, delimiters,
/// and formatting markers in the API wire format. A cached exact count
/// on the message wins over the heuristic.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let overhead = 4;
    let content = match message.tokens {
        Some(tokens) => tokens as usize,
        None => estimate_tokens(&message.content),
    };
    overhead + content
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = Message::user("test"); // 4 chars → 1 token + 4 overhead = 5
        assert_eq!(estimate_message_tokens(&msg), 5);
    }

    #[test]
    fn cached_token_count_wins() {
        let mut msg = Message::user("a long sentence whose estimate would differ");
        msg.tokens = Some(11);
        assert_eq!(estimate_message_tokens(&msg), 15);
    }

    #[test]
    fn multiple_messages() {
        let msgs = vec![
            Message::user("hello"),      // 5 chars → 2 tokens + 4 overhead = 6
            Message::assistant("world"), // 5 chars → 2 tokens + 4 overhead = 6
        ];
        assert_eq!(estimate_messages_tokens(&msgs), 12);
    }
}
