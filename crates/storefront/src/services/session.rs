//! Session resolution.
//!
//! Turns a backend session into a [`CurrentUser`]: the identity from the
//! auth service, the admin capability from `user_roles`, and the username
//! from `profiles`. Role and profile lookups are cached per user.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use gundam_store_core::{AppRole, UserId};

use crate::backend::{BackendError, DataService, Query, Table, select_as};
use crate::cache::{CacheValue, QueryCache, QueryKey};
use crate::models::CurrentUser;

/// Errors from session resolution.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default)]
    username: Option<String>,
}

/// Resolves the caller behind a backend session.
pub struct SessionResolver<'a> {
    data: &'a dyn DataService,
    cache: &'a QueryCache,
}

impl<'a> SessionResolver<'a> {
    #[must_use]
    pub const fn new(data: &'a dyn DataService, cache: &'a QueryCache) -> Self {
        Self { data, cache }
    }

    /// The current user, or `None` for an anonymous session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Backend` if any lookup fails.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> Result<Option<CurrentUser>, SessionError> {
        let Some(identity) = self.data.current_identity().await? else {
            return Ok(None);
        };

        let is_admin = self.is_admin(identity.id).await?;
        let username = self.username(identity.id).await?;

        debug!(user_id = %identity.id, is_admin, "Resolved session");

        Ok(Some(CurrentUser {
            id: identity.id,
            email: identity.email,
            username,
            is_admin,
        }))
    }

    /// Like [`SessionResolver::resolve`], but anonymous sessions are an error.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAuthenticated` when nobody is signed in.
    pub async fn require(&self) -> Result<CurrentUser, SessionError> {
        self.resolve().await?.ok_or(SessionError::NotAuthenticated)
    }

    /// Revoke the backend session and forget everything cached for `user`.
    ///
    /// # Errors
    ///
    /// Returns the backend error if revocation fails.
    #[instrument(skip(self))]
    pub async fn sign_out(&self, user: Option<UserId>) -> Result<(), SessionError> {
        self.data.sign_out().await?;
        if let Some(user) = user {
            self.cache.invalidate_user(user).await;
        }
        Ok(())
    }

    async fn is_admin(&self, user: UserId) -> Result<bool, SessionError> {
        let key = QueryKey::IsAdmin(user);
        if let Some(CacheValue::Flag(flag)) = self.cache.get(&key).await {
            return Ok(flag);
        }

        let read_at = self.cache.generation();
        let rows = self
            .data
            .select(
                &Query::table(Table::UserRoles)
                    .eq("user_id", user)
                    .eq("role", AppRole::Admin),
            )
            .await?;
        let is_admin = !rows.is_empty();

        self.cache
            .insert(key, CacheValue::Flag(is_admin), read_at)
            .await;
        Ok(is_admin)
    }

    async fn username(&self, user: UserId) -> Result<Option<String>, SessionError> {
        let key = QueryKey::Profile(user);
        if let Some(CacheValue::Username(username)) = self.cache.get(&key).await {
            return Ok(username);
        }

        let read_at = self.cache.generation();
        let profiles: Vec<ProfileRow> =
            select_as(self.data, &Query::table(Table::Profiles).eq("id", user)).await?;
        let username = profiles.into_iter().next().and_then(|p| p.username);

        self.cache
            .insert(key, CacheValue::Username(username.clone()), read_at)
            .await;
        Ok(username)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_anonymous_session_resolves_to_none() {
        let backend = MemoryBackend::new();
        let cache = QueryCache::new(Duration::from_secs(60));
        let data = backend.session(None);

        let resolver = SessionResolver::new(&data, &cache);
        assert_eq!(resolver.resolve().await.expect("resolve"), None);
        assert!(matches!(
            resolver.require().await,
            Err(SessionError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_resolves_admin_flag_and_username() {
        let backend = MemoryBackend::new();
        let cache = QueryCache::new(Duration::from_secs(60));
        let id = backend.create_user("char@zeon.test", "sazabi").await;
        backend.grant_role(id, AppRole::Admin).await;
        backend.set_username(id, "char").await;
        let data = backend.session(Some(backend.issue_token(id).await));

        let user = SessionResolver::new(&data, &cache)
            .require()
            .await
            .expect("user");

        assert_eq!(user.id, id);
        assert!(user.is_admin);
        assert_eq!(user.username.as_deref(), Some("char"));
        assert_eq!(user.email.as_deref(), Some("char@zeon.test"));
    }

    #[tokio::test]
    async fn test_plain_user_is_not_admin() {
        let backend = MemoryBackend::new();
        let cache = QueryCache::new(Duration::from_secs(60));
        let id = backend.create_user("amuro@efsf.test", "rx78").await;
        backend.grant_role(id, AppRole::User).await;
        let data = backend.session(Some(backend.issue_token(id).await));

        let user = SessionResolver::new(&data, &cache)
            .require()
            .await
            .expect("user");

        assert!(!user.is_admin);
        assert_eq!(user.username, None);
        assert_eq!(user.display_name(), "amuro@efsf.test");
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let backend = MemoryBackend::new();
        let cache = QueryCache::new(Duration::from_secs(60));
        let id = backend.create_user("kamille@aeug.test", "zeta").await;
        let data = backend.session(Some(backend.issue_token(id).await));
        let resolver = SessionResolver::new(&data, &cache);

        resolver.sign_out(Some(id)).await.expect("sign out");

        assert_eq!(resolver.resolve().await.expect("resolve"), None);
        assert!(cache.get(&QueryKey::IsAdmin(id)).await.is_none());
    }
}
