//! Wire events. All frames are JSON objects tagged with `type`; the
//! message payload's own kind therefore travels as `kind` to keep the
//! tag unambiguous.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DirectConversation, Message, MessageKind, PendingRequest, UserProfile, UserStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "friend_request")]
    FriendRequest { to: Uuid, from: Uuid },

    #[serde(rename = "accept_request")]
    AcceptRequest { request_id: Uuid },

    #[serde(rename = "reject_request")]
    RejectRequest { request_id: Uuid },

    #[serde(rename = "get_friend_requests")]
    GetFriendRequests { user_id: Uuid },

    #[serde(rename = "start_conversation")]
    StartConversation { to: Uuid, from: Uuid },

    #[serde(rename = "get_direct_conversations")]
    GetDirectConversations { user_id: Uuid },

    #[serde(rename = "get_messages")]
    GetMessages { conversation_id: Uuid },

    #[serde(rename = "text_message")]
    TextMessage {
        to: Uuid,
        from: Uuid,
        message: String,
        conversation_id: Uuid,
        #[serde(default)]
        kind: MessageKind,
    },

    #[serde(rename = "end")]
    End { user_id: Uuid },
}

impl ClientEvent {
    /// Stable name used for logging and the per-event counter.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::FriendRequest { .. } => "friend_request",
            ClientEvent::AcceptRequest { .. } => "accept_request",
            ClientEvent::RejectRequest { .. } => "reject_request",
            ClientEvent::GetFriendRequests { .. } => "get_friend_requests",
            ClientEvent::StartConversation { .. } => "start_conversation",
            ClientEvent::GetDirectConversations { .. } => "get_direct_conversations",
            ClientEvent::GetMessages { .. } => "get_messages",
            ClientEvent::TextMessage { .. } => "text_message",
            ClientEvent::End { .. } => "end",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "new_friend_request")]
    NewFriendRequest {
        request_id: Uuid,
        sender: UserProfile,
    },

    #[serde(rename = "request_sent")]
    RequestSent { request_id: Uuid, recipient: Uuid },

    #[serde(rename = "request_accepted")]
    RequestAccepted {
        request_id: Uuid,
        friend: UserProfile,
    },

    #[serde(rename = "request_rejected")]
    RequestRejected { request_id: Uuid, recipient: Uuid },

    #[serde(rename = "friend_requests")]
    FriendRequests { requests: Vec<PendingRequest> },

    #[serde(rename = "start_chat")]
    StartChat { conversation: DirectConversation },

    #[serde(rename = "direct_conversations")]
    DirectConversations {
        conversations: Vec<DirectConversation>,
    },

    #[serde(rename = "messages")]
    Messages {
        conversation_id: Uuid,
        messages: Vec<Message>,
    },

    #[serde(rename = "new_message")]
    NewMessage {
        conversation_id: Uuid,
        message: Message,
    },

    #[serde(rename = "friend_status")]
    FriendStatus { user_id: Uuid, status: UserStatus },

    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_parses_with_default_kind() {
        let raw = r#"{
            "type": "text_message",
            "to": "6a7f3f45-5f3f-4a8a-9d53-0d2a8f6b2f11",
            "from": "b72e7a2e-40fb-4df3-b1c8-8f4f0e2d5a1c",
            "message": "hello",
            "conversation_id": "0d2c7f45-5f3f-4a8a-9d53-0d2a8f6b2f11"
        }"#;
        let evt: ClientEvent = serde_json::from_str(raw).expect("parse");
        match evt {
            ClientEvent::TextMessage { kind, message, .. } => {
                assert_eq!(kind, MessageKind::Text);
                assert_eq!(message, "hello");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_events_carry_the_type_tag() {
        let evt = ServerEvent::RequestSent {
            request_id: Uuid::new_v4(),
            recipient: Uuid::new_v4(),
        };
        let value = serde_json::to_value(&evt).expect("serialize");
        assert_eq!(value["type"], "request_sent");
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let raw = r#"{"type": "group_call", "user_id": "6a7f3f45-5f3f-4a8a-9d53-0d2a8f6b2f11"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }
}
