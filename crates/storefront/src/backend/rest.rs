//! REST client for the hosted data service.
//!
//! Speaks the PostgREST table dialect (`/rest/v1/{table}`) and the GoTrue
//! auth dialect (`/auth/v1/...`). Every request carries the project `apikey`
//! and a bearer token: the caller's access token when signed in, the
//! anonymous key otherwise, so row-level security applies per user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{
    AccessToken, AuthSession, BackendError, DataService, Filter, Identity, Query, Row, Table,
};
use crate::config::RestBackendConfig;

/// Maximum number of response body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Shared REST client. Cheap to clone.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
}

/// GoTrue user payload.
#[derive(Debug, Deserialize)]
struct UserPayload {
    id: gundam_store_core::UserId,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserPayload> for Identity {
    fn from(user: UserPayload) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

/// GoTrue token grant payload.
#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    user: UserPayload,
}

impl RestBackend {
    /// Create a new REST backend client.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the HTTP client cannot be built.
    pub fn new(config: &RestBackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                base_url: config.url.trim_end_matches('/').to_string(),
                anon_key: config.anon_key.clone(),
            }),
        })
    }

    /// Open a session for the holder of `token`.
    #[must_use]
    pub fn session(&self, token: Option<AccessToken>) -> RestSession {
        RestSession {
            backend: self.clone(),
            token,
        }
    }

    /// Password sign-in.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidCredentials` on 400/401, or the transport error.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let params = [("grant_type".to_string(), "password".to_string())];
        let response = self
            .request(Method::POST, "auth/v1/token", &params, None)?
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(BackendError::InvalidCredentials);
        }

        let payload: TokenPayload = check(response).await?.json().await?;

        Ok(AuthSession {
            access_token: AccessToken::new(payload.access_token),
            identity: payload.user.into(),
        })
    }

    /// Check the auth service health endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn ping(&self) -> Result<(), BackendError> {
        let response = self
            .request(Method::GET, "auth/v1/health", &[], None)?
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        token: Option<&AccessToken>,
    ) -> Result<RequestBuilder, BackendError> {
        let endpoint = format!("{}/{path}", self.inner.base_url);
        let url = if params.is_empty() {
            Url::parse(&endpoint)
        } else {
            Url::parse_with_params(&endpoint, params)
        }
        .map_err(|e| BackendError::Config(format!("invalid backend url: {e}")))?;
        let anon_key = self.inner.anon_key.expose_secret();
        let bearer = token.map_or(anon_key, AccessToken::expose);

        Ok(self
            .inner
            .client
            .request(method, url)
            .header("apikey", anon_key)
            .bearer_auth(bearer))
    }
}

/// A REST session bound to one caller.
pub struct RestSession {
    backend: RestBackend,
    token: Option<AccessToken>,
}

impl RestSession {
    fn table_request(
        &self,
        method: Method,
        table: Table,
        params: &[(String, String)],
    ) -> Result<RequestBuilder, BackendError> {
        self.backend.request(
            method,
            &format!("rest/v1/{}", table.name()),
            params,
            self.token.as_ref(),
        )
    }
}

#[async_trait]
impl DataService for RestSession {
    #[instrument(skip(self), fields(table = %query.table))]
    async fn select(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        query.validate()?;

        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(query));
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }

        let response = self
            .table_request(Method::GET, query.table, &params)?
            .send()
            .await?;

        let rows: Vec<Row> = check(response).await?.json().await?;
        debug!(rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, row))]
    async fn insert(&self, table: Table, row: Row) -> Result<(), BackendError> {
        table.check_row(&row)?;

        let response = self
            .table_request(Method::POST, table, &[])?
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;

        check(response).await.map(|_| ())
    }

    #[instrument(skip(self, patch), fields(table = %query.table))]
    async fn update(&self, query: &Query, patch: Row) -> Result<(), BackendError> {
        query.validate_write("update")?;
        query.table.check_row(&patch)?;

        let response = self
            .table_request(Method::PATCH, query.table, &filter_params(query))?
            .header("Prefer", "return=minimal")
            .json(&patch)
            .send()
            .await?;

        check(response).await.map(|_| ())
    }

    #[instrument(skip(self), fields(table = %query.table))]
    async fn delete(&self, query: &Query) -> Result<(), BackendError> {
        query.validate_write("delete")?;

        let response = self
            .table_request(Method::DELETE, query.table, &filter_params(query))?
            .send()
            .await?;

        check(response).await.map(|_| ())
    }

    async fn current_identity(&self) -> Result<Option<Identity>, BackendError> {
        let Some(token) = &self.token else {
            return Ok(None);
        };

        let response = self
            .backend
            .request(Method::GET, "auth/v1/user", &[], Some(token))?
            .send()
            .await?;

        // Expired or revoked tokens are simply "not signed in"
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!("Access token rejected by auth service");
            return Ok(None);
        }

        let user: UserPayload = check(response).await?.json().await?;
        Ok(Some(user.into()))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(token) = &self.token else {
            return Ok(());
        };

        let response = self
            .backend
            .request(Method::POST, "auth/v1/logout", &[], Some(token))?
            .send()
            .await?;

        check(response).await.map(|_| ())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Encode filters as PostgREST query parameters.
fn filter_params(query: &Query) -> Vec<(String, String)> {
    query
        .filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq { column, value } => ((*column).to_string(), format!("eq.{value}")),
            Filter::In { column, values } => {
                let list = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
                    .collect::<Vec<_>>()
                    .join(",");
                ((*column).to_string(), format!("in.({list})"))
            }
        })
        .collect()
}

/// Turn a non-success response into `BackendError::Api`.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body.chars().take(ERROR_BODY_LIMIT).collect()
        }
    });

    tracing::warn!(status = %status, message = %message, "Backend returned non-success status");

    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Extract the human-readable message from a PostgREST or GoTrue error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_params_eq_and_in() {
        let query = Query::table(Table::Cart)
            .eq("user_id", "u1")
            .is_in("product_id", ["a", "b\"c"]);

        assert_eq!(
            filter_params(&query),
            vec![
                ("user_id".to_string(), "eq.u1".to_string()),
                ("product_id".to_string(), "in.(\"a\",\"b\\\"c\")".to_string()),
            ]
        );
    }

    #[test]
    fn test_filter_params_empty_in_list() {
        let query = Query::table(Table::Products).is_in("id", Vec::<String>::new());
        assert_eq!(
            filter_params(&query),
            vec![("id".to_string(), "in.()".to_string())]
        );
    }

    #[test]
    fn test_error_message_prefers_message_field() {
        let body = r#"{"code":"42501","message":"permission denied for table products"}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("permission denied for table products")
        );
    }

    #[test]
    fn test_error_message_gotrue_shape() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Invalid login credentials")
        );
    }

    #[test]
    fn test_error_message_non_json() {
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }
}
