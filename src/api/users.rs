//! Session lifecycle and user management endpoints.

use crate::{
    api::{
        AppState,
        auth::CurrentUser,
        response::{ApiResponse, ApiResult, Payload},
    },
    core::user::{self, LoginOutcome, NewUser, SessionUser, UserChanges, UserView},
    entities::user as user_entity,
};
use axum::{
    Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};

/// Credentials posted to `/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account name
    pub username: String,
    /// Plain-text password
    pub password: String,
}

// `{user}` is an id for updates and a username for deletes; one segment name keeps the
// router from rejecting the routes as conflicting.
pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(current_session))
        .route("/users", get(list).post(create))
        .route("/users/{user}", put(update).delete(remove))
        .route("/users/{user}/sessions/{session_id}", delete(revoke))
}

async fn login(
    State(state): State<AppState>,
    Payload(request): Payload<LoginRequest>,
) -> ApiResult<LoginOutcome> {
    let outcome = user::login(
        &state.db,
        &request.username,
        &request.password,
        &state.config.sessions,
    )
    .await?;
    Ok(ApiResponse::with_message("Logged in", outcome))
}

async fn logout(State(state): State<AppState>, CurrentUser(caller): CurrentUser) -> ApiResult<()> {
    user::logout(&state.db, &caller).await?;
    Ok(ApiResponse::with_message("Logged out", ()))
}

async fn current_session(CurrentUser(caller): CurrentUser) -> ApiResult<SessionUser> {
    Ok(ApiResponse::ok(caller))
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Vec<UserView>> {
    let users = user::list_users(&state.db, &caller, &state.config.sessions).await?;
    Ok(ApiResponse::ok(users))
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(input): Payload<NewUser>,
) -> ApiResult<user_entity::Model> {
    let created = user::create_user(&state.db, &caller, input, &state.config.limits).await?;
    Ok(ApiResponse::with_message("User created", created))
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<i64>,
    Payload(changes): Payload<UserChanges>,
) -> ApiResult<user_entity::Model> {
    let updated =
        user::update_user(&state.db, &caller, user_id, changes, &state.config.limits).await?;
    Ok(ApiResponse::with_message("User updated", updated))
}

async fn remove(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(username): Path<String>,
) -> ApiResult<()> {
    user::delete_user(&state.db, &caller, &username).await?;
    Ok(ApiResponse::with_message("User deleted", ()))
}

async fn revoke(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path((username, session_id)): Path<(String, String)>,
) -> ApiResult<()> {
    user::revoke_session(&state.db, &caller, &username, &session_id).await?;
    Ok(ApiResponse::with_message("Session revoked", ()))
}
