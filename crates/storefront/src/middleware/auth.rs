//! Authentication extractors.
//!
//! The HTTP session holds the backend access token. [`Caller`] turns it into
//! a session-scoped data service plus the resolved [`CurrentUser`]; services
//! decide for themselves whether an anonymous caller is acceptable.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use tracing::debug;

use crate::backend::{AccessToken, DynDataService};
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::SessionResolver;
use crate::state::AppState;

/// The caller of the current request.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(State(state): State<AppState>, caller: Caller) -> Result<Json<CartView>> {
///     let cart = CartManager::new(caller.data(), state.cache(), state.cart_locks());
///     Ok(Json(cart.list_cart(caller.user()).await?))
/// }
/// ```
pub struct Caller {
    session: Session,
    data: DynDataService,
    user: Option<CurrentUser>,
}

impl Caller {
    /// Backend data service scoped to this caller.
    #[must_use]
    pub fn data(&self) -> &dyn crate::backend::DataService {
        self.data.as_ref()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    /// The HTTP session of this request.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let token: Option<AccessToken> = session.get(session_keys::ACCESS_TOKEN).await?;
        let had_token = token.is_some();
        let data = state.data(token);

        let user = SessionResolver::new(data.as_ref(), state.cache())
            .resolve()
            .await?;

        match &user {
            Some(user) => set_sentry_user(&user.id, user.email.as_deref()),
            None if had_token => {
                debug!("Dropping rejected access token from session");
                session
                    .remove::<AccessToken>(session_keys::ACCESS_TOKEN)
                    .await?;
            }
            None => {}
        }

        Ok(Self {
            session,
            data,
            user,
        })
    }
}

/// Store the backend access token in the session (login).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_access_token(
    session: &Session,
    token: &AccessToken,
) -> Result<(), tower_sessions::session::Error> {
    // New identity, new session id
    session.cycle_id().await?;
    session.insert(session_keys::ACCESS_TOKEN, token).await
}

/// Clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_access_token(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
