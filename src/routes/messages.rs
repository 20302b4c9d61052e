//! REST surface of the message relay.
//!
//! Every response wraps its payload in `{"success": ..., ...}` and history
//! pages carry `hasMore` so clients can keep paging with the oldest
//! `createdAt` they received as the next `before` cursor.

use crate::error::AppError;
use crate::middleware::User;
use crate::models::DocumentRef;
use crate::services::MessageService;
use crate::state::AppState;
use actix_web::{get, patch, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

/// One page of conversation history with a peer, newest first.
#[get("/messages/{peer_id}")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    peer_id: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = match query.limit {
        Some(l) if l < 1 => {
            return Err(AppError::BadRequest("limit must be positive".into()));
        }
        Some(l) => l.min(state.config.history_page_max),
        None => state.config.history_page_size,
    };

    let page =
        MessageService::fetch(&state.db, user.id, *peer_id, query.before, limit).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": page.messages,
        "hasMore": page.has_more,
    })))
}

/// Accept a sealed message for a peer: persist it, then push it to the
/// peer's live channel if one exists.
#[post("/messages/send/{peer_id}")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    peer_id: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let dto = MessageService::send(
        &state.db,
        state.directory.as_ref(),
        &state.registry,
        user.id,
        *peer_id,
        &body.message,
        &body.nonce,
        body.documents,
    )
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": dto,
    })))
}

/// Receiver acknowledges delivery of a message addressed to it.
#[patch("/messages/{message_id}/delivered")]
pub async fn mark_delivered(
    state: web::Data<AppState>,
    user: User,
    message_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    MessageService::mark_delivered(&state.db, *message_id, user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Receiver marks a message as read; reading implies delivery.
#[patch("/messages/{message_id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user: User,
    message_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    MessageService::mark_read(&state.db, *message_id, user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
