//! The orchestrator: consumes inbound events, applies the protocol
//! rules, mutates durable state, and emits outbound events through the
//! presence registry. Durable writes are the unit of atomicity; every
//! push afterwards is fire-and-forget.

pub mod events;

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    ConversationThread, DirectConversation, MessageKind, NewMessage, PendingRequest, User,
    UserStatus,
};
use crate::presence::{ConnectionHandle, PresenceRegistry};
use crate::storage::{ConversationStore, FriendRequestLedger, IdentityDirectory};

use events::{ClientEvent, ServerEvent};

pub struct Router {
    directory: Arc<dyn IdentityDirectory>,
    ledger: Arc<dyn FriendRequestLedger>,
    conversations: Arc<dyn ConversationStore>,
    presence: Arc<dyn PresenceRegistry>,
}

impl Router {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        ledger: Arc<dyn FriendRequestLedger>,
        conversations: Arc<dyn ConversationStore>,
        presence: Arc<dyn PresenceRegistry>,
    ) -> Self {
        Self {
            directory,
            ledger,
            conversations,
            presence,
        }
    }

    /// Resolves a user id or fails with `InvalidTarget`.
    async fn require_user(&self, id: Uuid) -> AppResult<User> {
        self.directory
            .user(id)
            .await?
            .ok_or_else(|| AppError::InvalidTarget(format!("unknown user: {id}")))
    }

    /// Pre-upgrade check for the websocket handshake.
    pub async fn verify_user(&self, id: Uuid) -> AppResult<()> {
        self.require_user(id).await.map(|_| ())
    }

    /// Best-effort push to whatever connection is currently registered
    /// for the target. An unreachable peer is a skip, not an error.
    async fn push_to(&self, user_id: Uuid, event: &ServerEvent) {
        let delivered = match self.presence.lookup(user_id).await {
            Some(handle) => handle.push(event),
            None => false,
        };
        if !delivered {
            metrics::record_push_skipped();
            tracing::debug!(%user_id, "peer unreachable, push skipped");
        }
    }

    pub async fn push_error(&self, user_id: Uuid, error: &AppError) {
        self.push_to(
            user_id,
            &ServerEvent::Error {
                message: error.client_message(),
            },
        )
        .await;
    }

    async fn notify_friends_of_status(&self, user_id: Uuid, status: UserStatus) -> AppResult<()> {
        let event = ServerEvent::FriendStatus { user_id, status };
        for friend_id in self.directory.friend_ids(user_id).await? {
            self.push_to(friend_id, &event).await;
        }
        Ok(())
    }

    /// Connection established: register presence (superseding any stale
    /// handle), mark the user online, tell online friends.
    pub async fn handle_connect(&self, user_id: Uuid, handle: ConnectionHandle) -> AppResult<()> {
        self.verify_user(user_id).await?;
        self.presence.register(user_id, handle).await;
        self.directory.set_status(user_id, UserStatus::Online).await?;
        tracing::info!(%user_id, "user connected");
        self.notify_friends_of_status(user_id, UserStatus::Online)
            .await
    }

    /// Tears presence down only when `conn_id` is still the registered
    /// connection: a superseded socket closing after a reconnect, or a
    /// transport close racing an explicit `end`, is a no-op.
    pub async fn handle_disconnect(&self, user_id: Uuid, conn_id: Uuid) -> AppResult<()> {
        if !self.presence.unregister(user_id, conn_id).await {
            return Ok(());
        }
        self.directory
            .set_status(user_id, UserStatus::Offline)
            .await?;
        tracing::info!(%user_id, "user disconnected");
        self.notify_friends_of_status(user_id, UserStatus::Offline)
            .await
    }

    pub async fn dispatch(&self, caller: Uuid, event: ClientEvent) -> AppResult<()> {
        metrics::record_event(event.name());
        tracing::debug!(%caller, event = event.name(), "dispatching event");
        match event {
            ClientEvent::FriendRequest { to, from } => self.handle_friend_request(to, from).await,
            ClientEvent::AcceptRequest { request_id } => self.handle_accept(request_id).await,
            ClientEvent::RejectRequest { request_id } => self.handle_reject(request_id).await,
            ClientEvent::GetFriendRequests { user_id } => {
                self.handle_get_friend_requests(user_id).await
            }
            ClientEvent::StartConversation { to, from } => {
                self.handle_start_conversation(to, from).await
            }
            ClientEvent::GetDirectConversations { user_id } => {
                self.handle_get_direct_conversations(user_id).await
            }
            ClientEvent::GetMessages { conversation_id } => {
                self.handle_get_messages(caller, conversation_id).await
            }
            ClientEvent::TextMessage {
                to,
                from,
                message,
                conversation_id,
                kind,
            } => {
                self.handle_text_message(to, from, message, conversation_id, kind)
                    .await
            }
            // The socket layer intercepts `end` and drives the teardown
            // with its own connection id; a caller without a live socket
            // has nothing to tear down.
            ClientEvent::End { .. } => Ok(()),
        }
    }

    async fn handle_friend_request(&self, to: Uuid, from: Uuid) -> AppResult<()> {
        if to == from {
            return Err(AppError::InvalidTarget(
                "cannot send a friend request to yourself".into(),
            ));
        }
        let sender = self.require_user(from).await?;
        self.require_user(to).await?;
        if self.directory.are_friends(from, to).await? {
            return Err(AppError::InvalidTarget("already friends".into()));
        }

        let request = self.ledger.upsert_pending(from, to).await?;

        self.push_to(
            to,
            &ServerEvent::NewFriendRequest {
                request_id: request.id,
                sender: sender.profile(),
            },
        )
        .await;
        self.push_to(
            from,
            &ServerEvent::RequestSent {
                request_id: request.id,
                recipient: to,
            },
        )
        .await;
        Ok(())
    }

    /// A missing record means the request was already resolved; the
    /// duplicate accept succeeds as a no-op. The friendship write lands
    /// before the ledger claim, so a failure in between leaves a pending
    /// record and an (idempotent) friendship, never the reverse.
    async fn handle_accept(&self, request_id: Uuid) -> AppResult<()> {
        let Some(request) = self.ledger.get(request_id).await? else {
            tracing::debug!(%request_id, "accept for already-resolved request");
            return Ok(());
        };

        self.directory
            .add_friendship(request.sender, request.recipient)
            .await?;

        let Some(request) = self.ledger.take(request_id).await? else {
            // A concurrent accept claimed it; that caller announces.
            return Ok(());
        };

        let sender = self.require_user(request.sender).await?;
        let recipient = self.require_user(request.recipient).await?;
        self.push_to(
            request.sender,
            &ServerEvent::RequestAccepted {
                request_id,
                friend: recipient.profile(),
            },
        )
        .await;
        self.push_to(
            request.recipient,
            &ServerEvent::RequestAccepted {
                request_id,
                friend: sender.profile(),
            },
        )
        .await;
        Ok(())
    }

    async fn handle_reject(&self, request_id: Uuid) -> AppResult<()> {
        let Some(request) = self.ledger.take(request_id).await? else {
            tracing::debug!(%request_id, "reject for already-resolved request");
            return Ok(());
        };
        self.push_to(
            request.sender,
            &ServerEvent::RequestRejected {
                request_id,
                recipient: request.recipient,
            },
        )
        .await;
        Ok(())
    }

    async fn handle_get_friend_requests(&self, user_id: Uuid) -> AppResult<()> {
        let mut requests = Vec::new();
        for record in self.ledger.pending_for(user_id).await? {
            let sender = self.require_user(record.sender).await?;
            requests.push(PendingRequest {
                id: record.id,
                sender: sender.profile(),
                created_at: record.created_at,
            });
        }
        self.push_to(user_id, &ServerEvent::FriendRequests { requests })
            .await;
        Ok(())
    }

    async fn resolve_thread(&self, thread: ConversationThread) -> AppResult<DirectConversation> {
        let mut participants = Vec::with_capacity(2);
        for id in thread.conversation.participants {
            participants.push(self.require_user(id).await?.profile());
        }
        Ok(DirectConversation {
            id: thread.conversation.id,
            participants,
            messages: thread.messages,
        })
    }

    async fn handle_start_conversation(&self, to: Uuid, from: Uuid) -> AppResult<()> {
        if to == from {
            return Err(AppError::InvalidTarget(
                "cannot start a conversation with yourself".into(),
            ));
        }
        self.require_user(to).await?;
        self.require_user(from).await?;

        let thread = self.conversations.find_or_create_direct(to, from).await?;
        let conversation = self.resolve_thread(thread).await?;
        self.push_to(from, &ServerEvent::StartChat { conversation })
            .await;
        Ok(())
    }

    async fn handle_get_direct_conversations(&self, user_id: Uuid) -> AppResult<()> {
        let mut conversations = Vec::new();
        for thread in self.conversations.list_for_user(user_id).await? {
            conversations.push(self.resolve_thread(thread).await?);
        }
        self.push_to(user_id, &ServerEvent::DirectConversations { conversations })
            .await;
        Ok(())
    }

    async fn handle_get_messages(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<()> {
        let messages = self.conversations.messages(conversation_id).await?;
        self.push_to(
            caller,
            &ServerEvent::Messages {
                conversation_id,
                messages,
            },
        )
        .await;
        Ok(())
    }

    /// The durable append must succeed or the whole operation fails;
    /// the `new_message` pushes afterwards are best-effort and an
    /// offline peer catches up through `get_messages`.
    async fn handle_text_message(
        &self,
        to: Uuid,
        from: Uuid,
        message: String,
        conversation_id: Uuid,
        kind: MessageKind,
    ) -> AppResult<()> {
        let conversation = self
            .conversations
            .conversation(conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let peer = conversation.peer_of(from).ok_or_else(|| {
            AppError::InvalidTarget("sender is not a participant of this conversation".into())
        })?;
        if to != peer {
            return Err(AppError::InvalidTarget(
                "recipient is not the other participant of this conversation".into(),
            ));
        }

        let (text, file) = match kind {
            MessageKind::Text | MessageKind::Link => (Some(message), None),
            MessageKind::Media | MessageKind::Document => (None, Some(message)),
        };
        let stored = self
            .conversations
            .append_message(
                conversation_id,
                NewMessage {
                    to,
                    from,
                    kind,
                    text,
                    file,
                },
            )
            .await?;
        metrics::record_message_stored();

        let event = ServerEvent::NewMessage {
            conversation_id,
            message: stored,
        };
        self.push_to(to, &event).await;
        if from != to {
            self.push_to(from, &event).await;
        }
        Ok(())
    }
}
