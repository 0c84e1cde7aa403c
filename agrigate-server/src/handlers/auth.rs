//! Registration, login, and user administration.

use agrigate_core::AdminOp;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{AdminUser, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<Json<Value>> {
    let (user, token) = state
        .auth
        .register(&body.email, &body.password, &body.full_name)
        .await?;
    Ok(Json(json!({ "token": token, "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<Value>> {
    let (user, token) = state.auth.authenticate(&body.email, &body.password).await?;
    Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!(user))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
) -> ApiResult<Json<Value>> {
    let users = state.auth.list_users(&actor).await?;
    Ok(Json(json!(users)))
}

#[derive(Debug, Deserialize)]
pub struct ManageBody {
    pub op: AdminOp,
}

pub async fn manage(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(target_id): Path<String>,
    Json(body): Json<ManageBody>,
) -> ApiResult<Json<Value>> {
    let user = state.auth.administer(&actor, &target_id, body.op).await?;
    Ok(Json(json!(user)))
}
