//! Authentication route handlers.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{Caller, clear_access_token, set_access_token};
use crate::services::SessionResolver;
use crate::state::AppState;

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sign in with email and password.
#[instrument(skip(state, session, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>> {
    let auth = state
        .backend()
        .sign_in(&request.email, &request.password)
        .await?;

    set_access_token(&session, &auth.access_token).await?;

    let data = state.data(Some(auth.access_token));
    let user = SessionResolver::new(data.as_ref(), state.cache())
        .require()
        .await?;

    set_sentry_user(&user.id, user.email.as_deref());
    info!(user_id = %user.id, "User signed in");

    Ok(Json(json!({
        "message": format!("Welcome back, {}!", user.display_name()),
        "user": user,
    })))
}

/// Sign out and end the session.
///
/// The local session is cleared even if the backend cannot revoke the token.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, caller: Caller) -> Result<Json<Value>> {
    let user_id = caller.user().map(|u| u.id);

    if let Err(e) = SessionResolver::new(caller.data(), state.cache())
        .sign_out(user_id)
        .await
    {
        warn!(error = %e, "Backend sign-out failed");
    }

    clear_access_token(caller.session()).await?;
    clear_sentry_user();

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// The current user, or `null` when signed out.
pub async fn me(caller: Caller) -> Json<Value> {
    Json(json!({ "user": caller.user() }))
}
