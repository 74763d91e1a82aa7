use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    Media,
    Document,
    Link,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "Text",
            MessageKind::Media => "Media",
            MessageKind::Document => "Document",
            MessageKind::Link => "Link",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "Media" => MessageKind::Media,
            "Document" => MessageKind::Document,
            "Link" => MessageKind::Link,
            _ => MessageKind::Text,
        }
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// One entry in a conversation's append-only log. Immutable once stored;
/// `seq` is monotonic within its conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub to: Uuid,
    pub from: Uuid,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub file: Option<String>,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub to: Uuid,
    pub from: Uuid,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_storage_form() {
        for kind in [
            MessageKind::Text,
            MessageKind::Media,
            MessageKind::Document,
            MessageKind::Link,
        ] {
            assert_eq!(MessageKind::from_str(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_falls_back_to_text() {
        assert_eq!(MessageKind::from_str("Sticker"), MessageKind::Text);
    }
}
