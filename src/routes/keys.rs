use crate::error::AppError;
use crate::middleware::User;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

/// Public key lookup for sealing outbound messages to a peer. Private keys
/// never pass through or rest on this service.
#[get("/keys/{user_id}")]
pub async fn get_public_key(
    state: web::Data<AppState>,
    _user: User,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let record = state
        .directory
        .public_key(*user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "publicKey": record.public_key,
        "role": record.role,
    })))
}
