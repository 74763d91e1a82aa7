use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserProfile;

/// Pending sender -> recipient proposal. Existence means pending; the
/// record is deleted on accept or reject.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FriendRequest {
    pub id: Uuid,
    pub sender: Uuid,
    pub recipient: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Wire shape for listing a user's inbound requests, sender resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: Uuid,
    pub sender: UserProfile,
    pub created_at: DateTime<Utc>,
}
