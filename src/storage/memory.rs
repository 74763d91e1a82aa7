//! Volatile backend. One `RwLock` guards all collections, so every
//! mutating operation is serialized; that is what makes check-then-insert
//! on the conversation pair and the length-based sequence numbers safe.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::ordered_pair;
use crate::models::{
    Conversation, ConversationThread, FriendRequest, Message, NewMessage, NewUser, User,
    UserStatus,
};

use super::{ConversationStore, FriendRequestLedger, IdentityDirectory};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    friends: HashMap<Uuid, HashSet<Uuid>>,
    requests: HashMap<Uuid, FriendRequest>,
    requests_by_pair: HashMap<(Uuid, Uuid), Uuid>,
    conversations: HashMap<Uuid, Conversation>,
    conversations_by_pair: HashMap<(Uuid, Uuid), Uuid>,
    messages: HashMap<Uuid, Vec<Message>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn create_user(&self, new: NewUser) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == new.email) {
            return Err(AppError::Conflict(format!(
                "email already registered: {}",
                new.email
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            avatar: new.avatar,
            status: UserStatus::Offline,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn set_status(&self, id: Uuid, status: UserStatus) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.status = status;
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn add_friendship(&self, a: Uuid, b: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.friends.entry(a).or_default().insert(b);
        inner.friends.entry(b).or_default().insert(a);
        Ok(())
    }

    async fn are_friends(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .friends
            .get(&a)
            .map(|set| set.contains(&b))
            .unwrap_or(false))
    }

    async fn friend_ids(&self, id: Uuid) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .friends
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl FriendRequestLedger for MemoryStore {
    async fn upsert_pending(&self, sender: Uuid, recipient: Uuid) -> AppResult<FriendRequest> {
        let mut inner = self.inner.write().await;
        if let Some(existing_id) = inner.requests_by_pair.get(&(sender, recipient)) {
            let existing = inner.requests[existing_id].clone();
            return Ok(existing);
        }
        let request = FriendRequest {
            id: Uuid::new_v4(),
            sender,
            recipient,
            created_at: Utc::now(),
        };
        inner.requests_by_pair.insert((sender, recipient), request.id);
        inner.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<FriendRequest>> {
        Ok(self.inner.read().await.requests.get(&id).cloned())
    }

    async fn take(&self, id: Uuid) -> AppResult<Option<FriendRequest>> {
        let mut inner = self.inner.write().await;
        let taken = inner.requests.remove(&id);
        if let Some(ref request) = taken {
            inner
                .requests_by_pair
                .remove(&(request.sender, request.recipient));
        }
        Ok(taken)
    }

    async fn pending_for(&self, recipient: Uuid) -> AppResult<Vec<FriendRequest>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<FriendRequest> = inner
            .requests
            .values()
            .filter(|r| r.recipient == recipient)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_or_create_direct(&self, a: Uuid, b: Uuid) -> AppResult<ConversationThread> {
        let (low, high) = ordered_pair(a, b);
        let mut inner = self.inner.write().await;
        if let Some(id) = inner.conversations_by_pair.get(&(low, high)).copied() {
            let conversation = inner.conversations[&id].clone();
            let messages = inner.messages.get(&id).cloned().unwrap_or_default();
            return Ok(ConversationThread {
                conversation,
                messages,
            });
        }
        let conversation = Conversation {
            id: Uuid::new_v4(),
            participants: [low, high],
            created_at: Utc::now(),
        };
        inner.conversations_by_pair.insert((low, high), conversation.id);
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        inner.messages.insert(conversation.id, Vec::new());
        Ok(ConversationThread {
            conversation,
            messages: Vec::new(),
        })
    }

    async fn conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<ConversationThread>> {
        let inner = self.inner.read().await;
        let mut threads: Vec<ConversationThread> = inner
            .conversations
            .values()
            .filter(|c| c.has_participant(user_id))
            .map(|c| ConversationThread {
                conversation: c.clone(),
                messages: inner.messages.get(&c.id).cloned().unwrap_or_default(),
            })
            .collect();
        threads.sort_by_key(|t| t.conversation.created_at);
        Ok(threads)
    }

    async fn messages(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let inner = self.inner.read().await;
        inner
            .messages
            .get(&conversation_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn append_message(&self, conversation_id: Uuid, new: NewMessage) -> AppResult<Message> {
        let mut inner = self.inner.write().await;
        if !inner.conversations.contains_key(&conversation_id) {
            return Err(AppError::NotFound);
        }
        let log = inner.messages.entry(conversation_id).or_default();
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            to: new.to,
            from: new.from,
            kind: new.kind,
            text: new.text,
            file: new.file,
            seq: log.len() as i64 + 1,
            created_at: Utc::now(),
        };
        log.push(message.clone());
        Ok(message)
    }
}
