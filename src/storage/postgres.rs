//! Postgres backend. Queries are runtime `sqlx::query`/`query_as` with
//! explicit binds; migrations are embedded at compile time and executed
//! on startup so the schema is always in sync with the binary.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::ordered_pair;
use crate::models::{
    Conversation, ConversationThread, FriendRequest, Message, MessageKind, NewMessage, NewUser,
    User, UserStatus,
};

use super::{ConversationStore, FriendRequestLedger, IdentityDirectory};

const MIG_0001: &str = include_str!("../../migrations/0001_create_users.sql");
const MIG_0002: &str = include_str!("../../migrations/0002_create_friendships.sql");
const MIG_0003: &str = include_str!("../../migrations/0003_create_friend_requests.sql");
const MIG_0004: &str = include_str!("../../migrations/0004_create_conversations.sql");
const MIG_0005: &str = include_str!("../../migrations/0005_create_messages.sql");

pub async fn init_pool(database_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Idempotent; each file may contain multiple statements.
pub async fn run_migrations(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (label, sql) in [
        ("0001_create_users", MIG_0001),
        ("0002_create_friendships", MIG_0002),
        ("0003_create_friend_requests", MIG_0003),
        ("0004_create_conversations", MIG_0004),
        ("0005_create_messages", MIG_0005),
    ] {
        sqlx::raw_sql(sql).execute(db).await?;
        tracing::info!(migration = label, "migration applied");
    }
    Ok(())
}

pub struct PgStore {
    db: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

fn user_from_row(row: &PgRow) -> User {
    let status: String = row.get("status");
    User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        avatar: row.get("avatar"),
        status: UserStatus::from_str(&status),
        created_at: row.get("created_at"),
    }
}

fn message_from_row(row: &PgRow) -> Message {
    let kind: String = row.get("kind");
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        to: row.get("recipient_id"),
        from: row.get("sender_id"),
        kind: MessageKind::from_str(&kind),
        text: row.get("text"),
        file: row.get("file"),
        seq: row.get("seq"),
        created_at: row.get("created_at"),
    }
}

fn conversation_from_row(row: &PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        participants: [row.get("participant_low"), row.get("participant_high")],
        created_at: row.get("created_at"),
    }
}

const MESSAGES_BY_CONVERSATION: &str = "SELECT id, conversation_id, sender_id, recipient_id, kind, text, file, seq, created_at \
     FROM messages WHERE conversation_id = $1 ORDER BY seq ASC";

#[async_trait]
impl IdentityDirectory for PgStore {
    async fn create_user(&self, new: NewUser) -> AppResult<User> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, avatar) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, first_name, last_name, email, avatar, status, created_at",
        )
        .bind(id)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.avatar)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("email already registered: {}", new.email))
            }
            _ => AppError::Database(e),
        })?;
        Ok(user_from_row(&row))
    }

    async fn user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, avatar, status, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_status(&self, id: Uuid, status: UserStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn add_friendship(&self, a: Uuid, b: Uuid) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO friendships (user_id, friend_id) VALUES ($1, $2), ($2, $1) \
             ON CONFLICT DO NOTHING",
        )
        .bind(a)
        .bind(b)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn are_friends(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT 1 AS present FROM friendships WHERE user_id = $1 AND friend_id = $2 LIMIT 1",
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.is_some())
    }

    async fn friend_ids(&self, id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT friend_id FROM friendships WHERE user_id = $1")
                .bind(id)
                .fetch_all(&self.db)
                .await?;
        Ok(ids)
    }
}

#[async_trait]
impl FriendRequestLedger for PgStore {
    async fn upsert_pending(&self, sender: Uuid, recipient: Uuid) -> AppResult<FriendRequest> {
        // The no-op DO UPDATE makes RETURNING yield the surviving row on
        // conflict, so a repeat request hands back the existing record.
        let request = sqlx::query_as::<_, FriendRequest>(
            "INSERT INTO friend_requests (id, sender_id, recipient_id) VALUES ($1, $2, $3) \
             ON CONFLICT (sender_id, recipient_id) \
             DO UPDATE SET created_at = friend_requests.created_at \
             RETURNING id, sender_id AS sender, recipient_id AS recipient, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(sender)
        .bind(recipient)
        .fetch_one(&self.db)
        .await?;
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<FriendRequest>> {
        let request = sqlx::query_as::<_, FriendRequest>(
            "SELECT id, sender_id AS sender, recipient_id AS recipient, created_at \
             FROM friend_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(request)
    }

    async fn take(&self, id: Uuid) -> AppResult<Option<FriendRequest>> {
        let request = sqlx::query_as::<_, FriendRequest>(
            "DELETE FROM friend_requests WHERE id = $1 \
             RETURNING id, sender_id AS sender, recipient_id AS recipient, created_at",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(request)
    }

    async fn pending_for(&self, recipient: Uuid) -> AppResult<Vec<FriendRequest>> {
        let requests = sqlx::query_as::<_, FriendRequest>(
            "SELECT id, sender_id AS sender, recipient_id AS recipient, created_at \
             FROM friend_requests WHERE recipient_id = $1 ORDER BY created_at ASC",
        )
        .bind(recipient)
        .fetch_all(&self.db)
        .await?;
        Ok(requests)
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn find_or_create_direct(&self, a: Uuid, b: Uuid) -> AppResult<ConversationThread> {
        let (low, high) = ordered_pair(a, b);
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO conversations (id, participant_low, participant_high) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (participant_low, participant_high) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(low)
        .bind(high)
        .execute(&mut *tx)
        .await?;
        // Racing creators lose the insert above and observe the winner here.
        let row = sqlx::query(
            "SELECT id, participant_low, participant_high, created_at \
             FROM conversations WHERE participant_low = $1 AND participant_high = $2",
        )
        .bind(low)
        .bind(high)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let conversation = conversation_from_row(&row);
        let messages = self.messages(conversation.id).await?;
        Ok(ConversationThread {
            conversation,
            messages,
        })
    }

    async fn conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, participant_low, participant_high, created_at \
             FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(conversation_from_row))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<ConversationThread>> {
        let rows = sqlx::query(
            "SELECT id, participant_low, participant_high, created_at \
             FROM conversations \
             WHERE participant_low = $1 OR participant_high = $1 \
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let mut threads = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation = conversation_from_row(row);
            let messages = self.messages(conversation.id).await?;
            threads.push(ConversationThread {
                conversation,
                messages,
            });
        }
        Ok(threads)
    }

    async fn messages(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let exists = sqlx::query("SELECT 1 AS present FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.db)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound);
        }
        let rows = sqlx::query(MESSAGES_BY_CONVERSATION)
            .bind(conversation_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(message_from_row).collect())
    }

    async fn append_message(&self, conversation_id: Uuid, new: NewMessage) -> AppResult<Message> {
        let row = sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, recipient_id, kind, text, file) \
             SELECT $1, c.id, $3, $4, $5, $6, $7 FROM conversations c WHERE c.id = $2 \
             RETURNING id, conversation_id, sender_id, recipient_id, kind, text, file, seq, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(new.from)
        .bind(new.to)
        .bind(new.kind.as_str())
        .bind(&new.text)
        .bind(&new.file)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(message_from_row(&row))
    }
}
