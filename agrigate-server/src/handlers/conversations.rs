//! Conversation storage endpoints.
//!
//! All operations run under the authenticated user's scope; a body
//! `user_id` that disagrees with the token is rejected rather than
//! trusted.

use agrigate_core::Message;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

fn check_scope(token_user: &str, body_user: &str) -> Result<(), ApiError> {
    if token_user != body_user {
        return Err(ApiError::forbidden(
            "user_id does not match the authenticated user",
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SaveBody {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub messages: Vec<Message>,
}

pub async fn save(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<SaveBody>,
) -> ApiResult<Json<Value>> {
    check_scope(&user.id, &body.user_id)?;

    // Appends are idempotent on message id, so replaying a save is safe.
    for message in body.messages {
        state
            .conversations
            .append(&user.id, &body.session_id, message)
            .await?;
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct ListBody {
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<ListBody>,
) -> ApiResult<Json<Value>> {
    check_scope(&user.id, &body.user_id)?;
    let conversations = state.conversations.list(&user.id, body.limit).await?;
    Ok(Json(json!({ "conversations": conversations })))
}

#[derive(Debug, Deserialize)]
pub struct SessionRef {
    pub session_id: String,
    pub user_id: String,
}

pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<SessionRef>,
) -> ApiResult<Json<Value>> {
    check_scope(&user.id, &body.user_id)?;
    let session = state
        .conversations
        .get(&user.id, &body.session_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("session {}", body.session_id)))?;
    Ok(Json(json!({ "conversation": session })))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<SessionRef>,
) -> ApiResult<Json<Value>> {
    check_scope(&user.id, &body.user_id)?;
    let deleted = state
        .conversations
        .delete(&user.id, &body.session_id)
        .await?;
    if !deleted {
        return Err(ApiError::not_found(format!("session {}", body.session_id)));
    }
    Ok(Json(json!({ "deleted": true })))
}
