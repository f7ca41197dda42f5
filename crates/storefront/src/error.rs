//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client with `{"error": "..."}`. All route
//! handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::services::{AdminError, CartError, CatalogError, CheckoutError, SessionError};

/// Application-level error type for the store.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call outside any service.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Backend(err) => backend_status(err),
            Self::Session(SessionError::NotAuthenticated)
            | Self::Catalog(CatalogError::NotAuthenticated)
            | Self::Cart(CartError::NotAuthenticated)
            | Self::Checkout(CheckoutError::NotAuthenticated)
            | Self::Admin(AdminError::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            Self::Session(SessionError::Backend(err)) | Self::Admin(AdminError::Backend(err)) => {
                backend_status(err)
            }
            Self::Catalog(CatalogError::ReadFailed(err)) => backend_status(err),
            Self::Cart(
                CartError::CartWriteFailed(_)
                | CartError::ProductLookupFailed(_)
                | CartError::RemoveFailed(_)
                | CartError::ReadFailed(_),
            )
            | Self::Checkout(CheckoutError::CheckoutFailed(_)) => StatusCode::BAD_GATEWAY,
            Self::Cart(CartError::ProductNotFound(_))
            | Self::Admin(AdminError::NotFound(_))
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Checkout(CheckoutError::EmptyCart) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Admin(AdminError::Forbidden) => StatusCode::FORBIDDEN,
            Self::Admin(AdminError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            // Don't expose internal error details to clients
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Backend(err)
            | Self::Session(SessionError::Backend(err))
            | Self::Admin(AdminError::Backend(err)) => backend_message(err),
            Self::Cart(CartError::CartWriteFailed(err)) => {
                format!("Failed to add to cart: {}", backend_message(err))
            }
            Self::Catalog(CatalogError::ReadFailed(err)) => {
                format!("Failed to load products: {}", backend_message(err))
            }
            Self::Cart(CartError::ProductLookupFailed(err)) => {
                format!("Failed to look up product: {}", backend_message(err))
            }
            Self::Cart(CartError::RemoveFailed(err)) => {
                format!("Failed to remove from cart: {}", backend_message(err))
            }
            Self::Cart(CartError::ReadFailed(err)) => {
                format!("Failed to load cart: {}", backend_message(err))
            }
            Self::Checkout(CheckoutError::CheckoutFailed(err)) => {
                format!("Checkout failed: {}", backend_message(err))
            }
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::BadRequest(why) => why.clone(),
            Self::Session(err) => err.to_string(),
            Self::Catalog(err) => err.to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Admin(err) => err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

fn backend_status(err: &BackendError) -> StatusCode {
    match err {
        BackendError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        BackendError::Api {
            status: 401 | 403, ..
        } => StatusCode::FORBIDDEN,
        BackendError::UnknownColumn { .. }
        | BackendError::Unfiltered(_)
        | BackendError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BackendError::Http(_) | BackendError::Api { .. } | BackendError::Json(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Backend messages are shown as-is; transport details are not.
fn backend_message(err: &BackendError) -> String {
    match err {
        BackendError::Api { message, .. } => message.clone(),
        BackendError::InvalidCredentials => err.to_string(),
        _ => "External service error".to_string(),
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
