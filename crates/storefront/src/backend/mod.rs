//! Backend data service contract and implementations.
//!
//! # Architecture
//!
//! - The hosted backend is the source of truth - NO local persistence
//! - Every operation is a single request scoped to the caller's access token
//! - Row-level access control is enforced by the backend, not by this crate
//!
//! # Implementations
//!
//! ## REST ([`RestBackend`])
//! - PostgREST-style table API under `/rest/v1/{table}`
//! - GoTrue-style auth API under `/auth/v1/`
//!
//! ## Memory ([`MemoryBackend`])
//! - Tables, users and access tokens held in process
//! - Failure injection for exercising partial-failure paths
//!
//! # Example
//!
//! ```rust,ignore
//! let data = state.backend().session(token);
//! let rows = data
//!     .select(&Query::table(Table::Cart).eq("user_id", user.id))
//!     .await?;
//! ```

mod memory;
mod rest;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use gundam_store_core::UserId;

use crate::config::BackendConfig;

pub use memory::{MemoryBackend, MemorySession, Operation};
pub use rest::{RestBackend, RestSession};

/// A row as exchanged with the backend: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Shared, session-scoped data service handle.
pub type DynDataService = Arc<dyn DataService>;

/// Errors that can occur when talking to the backend data service.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Column is not part of the table.
    #[error("unknown column `{column}` on table `{table}`")]
    UnknownColumn { table: Table, column: String },

    /// Update or delete without any filter.
    #[error("refusing to {0} every row of a table")]
    Unfiltered(&'static str),

    /// Sign-in was rejected.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Invalid backend configuration.
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// HTTP status reported by the backend, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// =============================================================================
// Tables
// =============================================================================

/// Tables exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Products,
    Cart,
    Profiles,
    UserRoles,
    CheckoutIntents,
}

impl Table {
    /// Table name on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Cart => "cart",
            Self::Profiles => "profiles",
            Self::UserRoles => "user_roles",
            Self::CheckoutIntents => "checkout_intents",
        }
    }

    /// Columns of the table.
    #[must_use]
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Products => &["id", "name", "price", "grade", "link", "created_at"],
            Self::Cart => &["id", "user_id", "product_id", "quantity"],
            Self::Profiles => &["id", "username"],
            Self::UserRoles => &["user_id", "role"],
            Self::CheckoutIntents => &["id", "user_id", "product_ids", "total", "created_at"],
        }
    }

    /// Check that `column` belongs to this table.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::UnknownColumn` otherwise.
    pub fn check_column(self, column: &str) -> Result<(), BackendError> {
        if self.columns().contains(&column) {
            Ok(())
        } else {
            Err(BackendError::UnknownColumn {
                table: self,
                column: column.to_string(),
            })
        }
    }

    /// Check every key of `row` against the table columns.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::UnknownColumn` for the first unknown key.
    pub fn check_row(self, row: &Row) -> Result<(), BackendError> {
        row.keys().try_for_each(|column| self.check_column(column))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq { column: &'static str, value: String },
    /// `column IN (values)`; an empty list matches nothing.
    In {
        column: &'static str,
        values: Vec<String>,
    },
}

impl Filter {
    /// Column the filter applies to.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Eq { column, .. } | Self::In { column, .. } => *column,
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

/// Target table plus filters and ordering.
///
/// Used for select, update and delete. Ordering is ignored by writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    /// Start a query against `table` with no filters.
    #[must_use]
    pub const fn table(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn eq(mut self, column: &'static str, value: impl fmt::Display) -> Self {
        self.filters.push(Filter::Eq {
            column,
            value: value.to_string(),
        });
        self
    }

    /// Add a membership filter.
    #[must_use]
    pub fn is_in<I, V>(mut self, column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: fmt::Display,
    {
        self.filters.push(Filter::In {
            column,
            values: values.into_iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Order ascending by `column`.
    #[must_use]
    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order = Some(Order {
            column,
            ascending: true,
        });
        self
    }

    /// Order descending by `column`.
    #[must_use]
    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order = Some(Order {
            column,
            ascending: false,
        });
        self
    }

    /// Check filter and order columns against the table.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::UnknownColumn` for the first unknown column.
    pub fn validate(&self) -> Result<(), BackendError> {
        for filter in &self.filters {
            self.table.check_column(filter.column())?;
        }
        if let Some(order) = &self.order {
            self.table.check_column(order.column)?;
        }
        Ok(())
    }

    /// Like [`Query::validate`], and additionally require at least one filter.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unfiltered` when there are no filters.
    pub fn validate_write(&self, operation: &'static str) -> Result<(), BackendError> {
        self.validate()?;
        if self.filters.is_empty() {
            return Err(BackendError::Unfiltered(operation));
        }
        Ok(())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// The authenticated identity as reported by the backend auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Backend access token (JWT for the REST backend).
///
/// Implements `Debug` manually to keep the token out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token, for request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: AccessToken,
    pub identity: Identity,
}

// =============================================================================
// Data service contract
// =============================================================================

/// Generic CRUD contract of the backend, scoped to one caller.
///
/// Each method is a single request/response cycle; nothing is retried.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Fetch rows matching the query.
    async fn select(&self, query: &Query) -> Result<Vec<Row>, BackendError>;

    /// Insert one row.
    async fn insert(&self, table: Table, row: Row) -> Result<(), BackendError>;

    /// Apply `patch` to every row matching the query.
    async fn update(&self, query: &Query, patch: Row) -> Result<(), BackendError>;

    /// Delete every row matching the query.
    async fn delete(&self, query: &Query) -> Result<(), BackendError>;

    /// The identity behind this session, if it is authenticated.
    async fn current_identity(&self) -> Result<Option<Identity>, BackendError>;

    /// Revoke this session.
    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Select rows and decode each into `T`.
///
/// # Errors
///
/// Returns the backend error, or `BackendError::Json` if a row does not decode.
pub async fn select_as<T: DeserializeOwned>(
    data: &dyn DataService,
    query: &Query,
) -> Result<Vec<T>, BackendError> {
    data.select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(BackendError::from))
        .collect()
}

/// Encode a serializable struct as a row.
///
/// # Errors
///
/// Returns `BackendError::Json` if `value` is not a JSON object.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row, BackendError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(BackendError::Config(format!(
            "expected an object row, got {other}"
        ))),
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Configured backend, shared by every request.
#[derive(Clone)]
pub enum Backend {
    Rest(RestBackend),
    Memory(MemoryBackend),
}

impl Backend {
    /// Build the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the REST client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        match config {
            BackendConfig::Rest(rest) => Ok(Self::Rest(RestBackend::new(rest)?)),
            BackendConfig::Memory => Ok(Self::Memory(MemoryBackend::new())),
        }
    }

    /// Open a data service handle for the holder of `token` (anonymous if `None`).
    #[must_use]
    pub fn session(&self, token: Option<AccessToken>) -> DynDataService {
        match self {
            Self::Rest(backend) => Arc::new(backend.session(token)),
            Self::Memory(backend) => Arc::new(backend.session(token)),
        }
    }

    /// Exchange email and password for an access token.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidCredentials` if the backend rejects them.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        match self {
            Self::Rest(backend) => backend.sign_in(email, password).await,
            Self::Memory(backend) => backend.sign_in(email, password).await,
        }
    }

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if it is not.
    pub async fn ping(&self) -> Result<(), BackendError> {
        match self {
            Self::Rest(backend) => backend.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }

    /// The in-memory backend, if that is what is configured.
    #[must_use]
    pub const fn as_memory(&self) -> Option<&MemoryBackend> {
        match self {
            Self::Memory(backend) => Some(backend),
            Self::Rest(_) => None,
        }
    }
}
