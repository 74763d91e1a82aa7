use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;
use super::user::UserProfile;

/// Durable one-to-one thread. Participants are stored normalized
/// (low uuid first) so the pair is unique regardless of who started it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        match self.participants {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }
}

/// A conversation together with its ordered message log.
#[derive(Debug, Clone)]
pub struct ConversationThread {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Wire shape: participants resolved to profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectConversation {
    pub id: Uuid,
    pub participants: Vec<UserProfile>,
    pub messages: Vec<Message>,
}

/// Normalized (low, high) ordering used for the pair uniqueness key.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_is_direction_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    }

    #[test]
    fn peer_of_returns_the_other_participant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (low, high) = ordered_pair(a, b);
        let conv = Conversation {
            id: Uuid::new_v4(),
            participants: [low, high],
            created_at: chrono::Utc::now(),
        };
        assert_eq!(conv.peer_of(a), Some(b));
        assert_eq!(conv.peer_of(Uuid::new_v4()), None);
    }
}
