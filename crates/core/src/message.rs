//! Message domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the user sends a message → the engine profiles it, assembles context,
//! and asks the model for a decision → the answer is appended to the
//! conversation and committed to memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
///
/// Stored history only ever carries `User`, `Assistant`, and `Tool`;
/// `System` exists for prompt construction and never enters the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Assistant,
    /// System instructions (persona, answer rules)
    System,
    /// Output of an auxiliary step (e.g. a web search digest)
    Tool,
}

/// A single message in a conversation.
///
/// Content is never null — the empty string is the null-equivalent.
/// Timestamps arrive from the outside world in several shapes (epoch
/// millis, date strings, nothing at all); anything unparseable becomes
/// `None` rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the message was created, if known
    #[serde(default, with = "epoch_millis")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Cached token count, when a precise one is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
            tokens: None,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool output message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, content)
    }

    /// Replace the timestamp (useful when replaying persisted history).
    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Tolerant epoch-millis (de)serialization for message timestamps.
///
/// Accepts an integer epoch-millis value, a float, an RFC 3339 or RFC 2822
/// date string, or a stringified integer. Anything else deserializes to
/// `None` — a bad timestamp must never reject the whole message.
mod epoch_millis {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(dt) => serializer.serialize_i64(dt.timestamp_millis()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(parse_value))
    }

    fn parse_value(value: Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => {
                let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
                Utc.timestamp_millis_opt(millis).single()
            }
            Value::String(s) => parse_date_string(&s),
            _ => None,
        }
    }

    fn parse_date_string(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(millis) = s.trim().parse::<i64>() {
            return Utc.timestamp_millis_opt(millis).single();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Bonjour !");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Bonjour !");
        assert!(msg.timestamp.is_some());
        assert!(msg.tokens.is_none());
    }

    #[test]
    fn timestamp_from_epoch_millis() {
        let json = r#"{"id":"m1","role":"user","content":"hi","timestamp":1700000000000}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        let ts = msg.timestamp.unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn timestamp_from_date_string() {
        let json = r#"{"id":"m1","role":"user","content":"hi","timestamp":"2024-03-01T12:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.timestamp.is_some());
    }

    #[test]
    fn unparseable_timestamp_becomes_none() {
        let json = r#"{"id":"m1","role":"user","content":"hi","timestamp":"not a date"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn missing_timestamp_is_none() {
        let json = r#"{"id":"m1","role":"assistant","content":"hi"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn timestamp_roundtrips_as_millis() {
        let msg = Message::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.timestamp.unwrap().timestamp_millis(),
            msg.timestamp.unwrap().timestamp_millis()
        );
    }

}
