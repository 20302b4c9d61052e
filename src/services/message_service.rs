//! Message relay and history store.
//!
//! Durability precedes delivery: a send is persisted before the recipient's
//! channel is consulted, so a crash between the two loses nothing — the
//! recipient picks the message up on its next fetch. The relay treats
//! ciphertext and nonce as opaque strings and performs no crypto.

use crate::error::AppError;
use crate::models::{DocumentRef, Message, MessageDto};
use crate::services::directory::Directory;
use crate::services::e2ee;
use crate::websocket::message_types::ServerEvent;
use crate::websocket::ConnectionRegistry;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// One page of history, newest first.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub messages: Vec<MessageDto>,
    pub has_more: bool,
}

impl HistoryPage {
    /// Build a page from rows fetched with `limit + 1`: the extra row only
    /// signals that an older page exists and is trimmed off.
    pub fn from_rows(mut rows: Vec<Message>, limit: i64) -> Self {
        let has_more = rows.len() as i64 > limit;
        if has_more {
            rows.truncate(limit as usize);
        }
        Self {
            messages: rows.into_iter().map(MessageDto::from).collect(),
            has_more,
        }
    }

    /// Oldest `createdAt` on this page — the client's next `before` cursor.
    pub fn next_before(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.created_at)
    }
}

pub struct MessageService;

impl MessageService {
    /// Persist a message, then push it to the receiver's live channel if one
    /// is registered. Returns the stored record either way; an offline
    /// recipient is not an error.
    pub async fn send(
        db: &PgPool,
        directory: &dyn Directory,
        registry: &ConnectionRegistry,
        sender_id: Uuid,
        receiver_id: Uuid,
        ciphertext: &str,
        nonce: &str,
        documents: Vec<DocumentRef>,
    ) -> Result<MessageDto, AppError> {
        if sender_id == receiver_id {
            return Err(AppError::BadRequest("cannot message yourself".into()));
        }
        if !directory.pair_exists(sender_id, receiver_id).await? {
            return Err(AppError::Forbidden);
        }
        e2ee::validate_envelope(ciphertext, nonce, !documents.is_empty())?;

        let id = Uuid::new_v4();
        let row: Message = sqlx::query_as(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, ciphertext, nonce, documents)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sender_id, receiver_id, ciphertext, nonce, documents,
                      created_at, is_delivered, is_read
            "#,
        )
        .bind(id)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(ciphertext)
        .bind(nonce)
        .bind(Json(documents))
        .fetch_one(db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::BadRequest("nonce already used by this sender".into())
            }
            _ => AppError::from(e),
        })?;

        let dto = MessageDto::from(row);

        // Persisted; push is best-effort at-most-once from here on.
        let delivered = registry
            .send_to(
                receiver_id,
                ServerEvent::NewMessage {
                    message: dto.clone(),
                }
                .to_json(),
            )
            .await;
        if delivered {
            tracing::debug!(message_id = %dto.id, %receiver_id, "pushed message to live channel");
        } else {
            tracing::debug!(message_id = %dto.id, %receiver_id, "recipient offline, deferred to next fetch");
        }

        Ok(dto)
    }

    /// Fetch one page of pair history strictly older than `before` (or the
    /// newest page when omitted), newest first. Pages concatenated with the
    /// oldest returned timestamp as the next cursor are gap- and
    /// duplicate-free.
    pub async fn fetch(
        db: &PgPool,
        me: Uuid,
        peer: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<HistoryPage, AppError> {
        let rows: Vec<Message> = sqlx::query_as(
            r#"
            SELECT id, sender_id, receiver_id, ciphertext, nonce, documents,
                   created_at, is_delivered, is_read
            FROM messages
            WHERE ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(me)
        .bind(peer)
        .bind(before)
        .bind(limit + 1)
        .fetch_all(db)
        .await?;

        Ok(HistoryPage::from_rows(rows, limit))
    }

    /// Idempotent delivery flag flip, scoped to the receiver.
    pub async fn mark_delivered(
        db: &PgPool,
        message_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE messages SET is_delivered = TRUE WHERE id = $1 AND receiver_id = $2")
                .bind(message_id)
                .bind(receiver_id)
                .execute(db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Idempotent read flag flip, scoped to the receiver. Reading implies
    /// delivery.
    pub async fn mark_read(
        db: &PgPool,
        message_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE, is_delivered = TRUE WHERE id = $1 AND receiver_id = $2",
        )
        .bind(message_id)
        .bind(receiver_id)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
