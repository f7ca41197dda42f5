//! In-memory backend for local development and tests.
//!
//! Emulates the table API and the auth API of the hosted service: rows are
//! JSON objects, filters compare the textual form of a cell, ordering
//! understands RFC 3339 timestamps and numbers. Row-level security is not
//! emulated. Every operation yields to the scheduler first so concurrent
//! callers interleave the way they would against a remote service.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use gundam_store_core::{AppRole, UserId};

use super::{
    AccessToken, AuthSession, BackendError, DataService, Filter, Identity, Query, Row, Table,
};

/// Kind of table operation, used for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

/// In-memory backend. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

#[derive(Default)]
struct MemoryBackendInner {
    state: RwLock<MemoryState>,
    faults: Mutex<Vec<Fault>>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<Table, Vec<Row>>,
    /// Users keyed by lower-cased email.
    users: HashMap<String, MemoryUser>,
    tokens: HashMap<String, UserId>,
}

struct MemoryUser {
    id: UserId,
    email: String,
    password: String,
}

struct Fault {
    table: Table,
    operation: Operation,
    message: String,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for the holder of `token`.
    #[must_use]
    pub fn session(&self, token: Option<AccessToken>) -> MemorySession {
        MemorySession {
            backend: self.clone(),
            token,
        }
    }

    /// Password sign-in.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidCredentials` for an unknown email or wrong password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let (id, email) = {
            let state = self.inner.state.read().await;
            let user = state
                .users
                .get(&email.to_lowercase())
                .filter(|user| user.password == password)
                .ok_or(BackendError::InvalidCredentials)?;
            (user.id, user.email.clone())
        };

        Ok(AuthSession {
            access_token: self.issue_token(id).await,
            identity: Identity {
                id,
                email: Some(email),
            },
        })
    }

    /// Register a user. Returns the existing id if the email is taken.
    pub async fn create_user(&self, email: &str, password: &str) -> UserId {
        let mut state = self.inner.state.write().await;
        state
            .users
            .entry(email.to_lowercase())
            .or_insert_with(|| MemoryUser {
                id: UserId::generate(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .id
    }

    /// Mint an access token for `user` without a password.
    pub async fn issue_token(&self, user: UserId) -> AccessToken {
        let token = format!("mem-{}", Uuid::new_v4());
        self.inner
            .state
            .write()
            .await
            .tokens
            .insert(token.clone(), user);
        AccessToken::new(token)
    }

    /// Grant `role` to `user` in the `user_roles` table.
    pub async fn grant_role(&self, user: UserId, role: AppRole) {
        let mut row = Row::new();
        row.insert("user_id".to_string(), Value::String(user.to_string()));
        row.insert("role".to_string(), Value::String(role.to_string()));
        self.write_table(Table::UserRoles, |rows| rows.push(row)).await;
    }

    /// Create or replace the profile of `user`.
    pub async fn set_username(&self, user: UserId, username: &str) {
        let id = user.to_string();
        let mut row = Row::new();
        row.insert("id".to_string(), Value::String(id.clone()));
        row.insert("username".to_string(), Value::String(username.to_string()));
        self.write_table(Table::Profiles, |rows| {
            rows.retain(|r| r.get("id").and_then(Value::as_str) != Some(id.as_str()));
            rows.push(row);
        })
        .await;
    }

    /// Snapshot of every row in `table`, in insertion order.
    pub async fn rows(&self, table: Table) -> Vec<Row> {
        self.inner
            .state
            .read()
            .await
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next `operation` on `table` fail with a 503 carrying `message`.
    pub fn fail_next(&self, table: Table, operation: Operation, message: impl Into<String>) {
        self.faults().push(Fault {
            table,
            operation,
            message: message.into(),
        });
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Vec<Fault>> {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take_fault(&self, table: Table, operation: Operation) -> Result<(), BackendError> {
        let mut faults = self.faults();
        let position = faults
            .iter()
            .position(|f| f.table == table && f.operation == operation);
        match position {
            Some(index) => {
                let fault = faults.remove(index);
                debug!(%table, ?operation, "Injected backend failure");
                Err(BackendError::Api {
                    status: 503,
                    message: fault.message,
                })
            }
            None => Ok(()),
        }
    }

    async fn write_table<R>(&self, table: Table, f: impl FnOnce(&mut Vec<Row>) -> R) -> R {
        let mut state = self.inner.state.write().await;
        f(state.tables.entry(table).or_default())
    }

    async fn user_for(&self, token: &AccessToken) -> Option<Identity> {
        let state = self.inner.state.read().await;
        let id = *state.tokens.get(token.expose())?;
        let email = state
            .users
            .values()
            .find(|user| user.id == id)
            .map(|user| user.email.clone());
        Some(Identity { id, email })
    }
}

/// A memory session bound to one caller.
pub struct MemorySession {
    backend: MemoryBackend,
    token: Option<AccessToken>,
}

#[async_trait]
impl DataService for MemorySession {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        tokio::task::yield_now().await;
        query.validate()?;
        self.backend.take_fault(query.table, Operation::Select)?;

        let state = self.backend.inner.state.read().await;
        let mut rows: Vec<Row> = state
            .tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_cells(a.get(order.column), b.get(order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<(), BackendError> {
        tokio::task::yield_now().await;
        table.check_row(&row)?;
        self.backend.take_fault(table, Operation::Insert)?;

        self.backend
            .write_table(table, |rows| {
                let key = primary_key(table);
                let duplicate = key.iter().all(|column| row.contains_key(*column))
                    && rows.iter().any(|existing| {
                        key.iter()
                            .all(|column| existing.get(*column) == row.get(*column))
                    });
                if duplicate {
                    return Err(BackendError::Api {
                        status: 409,
                        message: format!(
                            "duplicate key value violates unique constraint \"{table}_pkey\""
                        ),
                    });
                }
                rows.push(row);
                Ok(())
            })
            .await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<(), BackendError> {
        tokio::task::yield_now().await;
        query.validate_write("update")?;
        query.table.check_row(&patch)?;
        self.backend.take_fault(query.table, Operation::Update)?;

        self.backend
            .write_table(query.table, |rows| {
                for row in rows.iter_mut().filter(|row| matches(row, &query.filters)) {
                    for (column, value) in &patch {
                        row.insert(column.clone(), value.clone());
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn delete(&self, query: &Query) -> Result<(), BackendError> {
        tokio::task::yield_now().await;
        query.validate_write("delete")?;
        self.backend.take_fault(query.table, Operation::Delete)?;

        self.backend
            .write_table(query.table, |rows| {
                rows.retain(|row| !matches(row, &query.filters));
            })
            .await;
        Ok(())
    }

    async fn current_identity(&self) -> Result<Option<Identity>, BackendError> {
        tokio::task::yield_now().await;
        match &self.token {
            Some(token) => Ok(self.backend.user_for(token).await),
            None => Ok(None),
        }
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if let Some(token) = &self.token {
            self.backend
                .inner
                .state
                .write()
                .await
                .tokens
                .remove(token.expose());
        }
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

const fn primary_key(table: Table) -> &'static [&'static str] {
    match table {
        Table::UserRoles => &["user_id", "role"],
        Table::Products | Table::Cart | Table::Profiles | Table::CheckoutIntents => &["id"],
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let cell = row.get(filter.column()).map(cell_text);
        match filter {
            Filter::Eq { value, .. } => cell.as_ref() == Some(value),
            Filter::In { values, .. } => cell.is_some_and(|cell| values.contains(&cell)),
        }
    })
}

/// Nulls sort last; timestamps chronologically; numbers numerically.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(row) => row,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let backend = MemoryBackend::new();
        let data = backend.session(None);
        for (id, at) in [
            ("a", "2024-01-01T00:00:00Z"),
            ("b", "2024-01-01T00:00:00.5Z"),
            ("c", "2023-12-31T23:59:59Z"),
        ] {
            data.insert(
                Table::Products,
                row(json!({ "id": id, "name": id, "price": "1.00", "grade": "HG", "created_at": at })),
            )
            .await
            .expect("insert");
        }

        let rows = data
            .select(&Query::table(Table::Products).order_desc("created_at"))
            .await
            .expect("select");
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap_or("")).collect();
        assert_eq!(ids, ["b", "a", "c"]);

        let rows = data
            .select(&Query::table(Table::Products).is_in("id", ["a", "c"]))
            .await
            .expect("select");
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_numeric_filter_matches_text() {
        let backend = MemoryBackend::new();
        let data = backend.session(None);
        data.insert(
            Table::Cart,
            row(json!({ "id": "e1", "user_id": "u", "product_id": "p", "quantity": 3 })),
        )
        .await
        .expect("insert");

        let rows = data
            .select(&Query::table(Table::Cart).eq("quantity", 3))
            .await
            .expect("select");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_primary_key() {
        let backend = MemoryBackend::new();
        let data = backend.session(None);
        let entry = row(json!({ "id": "e1", "user_id": "u", "product_id": "p", "quantity": 1 }));
        data.insert(Table::Cart, entry.clone()).await.expect("first insert");

        let err = data.insert(Table::Cart, entry).await.expect_err("duplicate");
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let backend = MemoryBackend::new();
        let data = backend.session(None);
        data.insert(
            Table::Cart,
            row(json!({ "id": "e1", "user_id": "u", "product_id": "p", "quantity": 1 })),
        )
        .await
        .expect("insert");

        data.update(
            &Query::table(Table::Cart).eq("id", "e1"),
            row(json!({ "quantity": 2 })),
        )
        .await
        .expect("update");
        assert_eq!(backend.rows(Table::Cart).await[0]["quantity"], json!(2));

        data.delete(&Query::table(Table::Cart).eq("id", "e1"))
            .await
            .expect("delete");
        assert!(backend.rows(Table::Cart).await.is_empty());
    }

    #[tokio::test]
    async fn test_fault_injection_fires_once() {
        let backend = MemoryBackend::new();
        let data = backend.session(None);
        backend.fail_next(Table::Products, Operation::Select, "boom");

        let err = data
            .select(&Query::table(Table::Products))
            .await
            .expect_err("injected");
        assert_eq!(err.to_string(), "boom");
        assert!(data.select(&Query::table(Table::Products)).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_and_sign_out() {
        let backend = MemoryBackend::new();
        let id = backend.create_user("Amuro@example.com", "gundam").await;

        assert!(matches!(
            backend.sign_in("amuro@example.com", "wrong").await,
            Err(BackendError::InvalidCredentials)
        ));

        let session = backend
            .sign_in("amuro@example.com", "gundam")
            .await
            .expect("sign in");
        assert_eq!(session.identity.id, id);

        let data = backend.session(Some(session.access_token.clone()));
        let identity = data.current_identity().await.expect("identity");
        assert_eq!(identity.map(|i| i.id), Some(id));

        data.sign_out().await.expect("sign out");
        assert_eq!(data.current_identity().await.expect("identity"), None);
    }
}
