//! Durable state behind injected interfaces: the user directory, the
//! friend-request ledger and the conversation store. Two backends exist,
//! Postgres for deployment and an in-memory store for development and
//! tests. Every suspension point in the protocol path is one of these
//! calls (or an outbound push).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Conversation, ConversationThread, FriendRequest, Message, NewMessage, NewUser, User,
    UserStatus,
};

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Called by the auth collaborator (and test setup); this core never
    /// deletes users.
    async fn create_user(&self, new: NewUser) -> AppResult<User>;

    async fn user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn set_status(&self, id: Uuid, status: UserStatus) -> AppResult<()>;

    /// Symmetric union: after this call each party is in the other's
    /// friend set. Re-adding an existing friendship is a no-op.
    async fn add_friendship(&self, a: Uuid, b: Uuid) -> AppResult<()>;

    async fn are_friends(&self, a: Uuid, b: Uuid) -> AppResult<bool>;

    async fn friend_ids(&self, id: Uuid) -> AppResult<Vec<Uuid>>;
}

#[async_trait]
pub trait FriendRequestLedger: Send + Sync {
    /// At most one pending record per ordered (sender, recipient) pair;
    /// a repeat request returns the existing record.
    async fn upsert_pending(&self, sender: Uuid, recipient: Uuid) -> AppResult<FriendRequest>;

    async fn get(&self, id: Uuid) -> AppResult<Option<FriendRequest>>;

    /// Delete-returning claim: exactly one of any set of concurrent
    /// callers observes the record, everyone else gets `None`.
    async fn take(&self, id: Uuid) -> AppResult<Option<FriendRequest>>;

    async fn pending_for(&self, recipient: Uuid) -> AppResult<Vec<FriendRequest>>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Find-or-create on the normalized pair. The store enforces pair
    /// uniqueness, so concurrent creators for the same pair converge on
    /// one record.
    async fn find_or_create_direct(&self, a: Uuid, b: Uuid) -> AppResult<ConversationThread>;

    async fn conversation(&self, id: Uuid) -> AppResult<Option<Conversation>>;

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<ConversationThread>>;

    /// `NotFound` when the conversation does not exist.
    async fn messages(&self, conversation_id: Uuid) -> AppResult<Vec<Message>>;

    /// Durable append with a server-stamped timestamp and a `seq` that
    /// is strictly increasing within the conversation. Callers may rely
    /// on the ordering but not on the numbers being dense; backends are
    /// free to leave gaps. `NotFound` when the conversation does not
    /// exist; nothing is written in that case.
    async fn append_message(&self, conversation_id: Uuid, new: NewMessage) -> AppResult<Message>;
}
