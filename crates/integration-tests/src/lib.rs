//! Integration test support for Gundam Store.
//!
//! Every test gets its own store on the in-memory backend. HTTP tests spawn
//! the real router on an ephemeral port and talk to it with a cookie-aware
//! `reqwest` client, the same way a browser session would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gundam-store-integration-tests
//! ```

use std::net::SocketAddr;

use reqwest::Client;
use tokio::net::TcpListener;

use gundam_store::backend::{Backend, MemoryBackend};
use gundam_store::config::StoreConfig;
use gundam_store::models::CurrentUser;
use gundam_store::seed;
use gundam_store::services::ProductForm;
use gundam_store::state::AppState;
use gundam_store_core::{AppRole, Grade, Product};

/// A store backed by its own in-memory backend.
pub struct TestStore {
    pub backend: MemoryBackend,
    pub state: AppState,
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TestStore {
    #[must_use]
    pub fn new() -> Self {
        let backend = MemoryBackend::new();
        let state =
            AppState::with_backend(StoreConfig::in_memory(), Backend::Memory(backend.clone()));
        Self { backend, state }
    }

    /// Insert a product directly into the backend.
    ///
    /// # Panics
    ///
    /// Panics if the product is invalid or the insert fails.
    pub async fn add_product(&self, name: &str, price: &str, grade: Grade) -> Product {
        let product = ProductForm {
            name: name.to_string(),
            price: price.to_string(),
            grade,
            link: None,
        }
        .into_product()
        .expect("valid product");

        let data = self.backend.session(None);
        seed::insert_products(&data, std::slice::from_ref(&product))
            .await
            .expect("insert product");
        self.state.cache().invalidate_catalog().await;
        product
    }

    /// Register a user and describe them the way the session resolver would.
    pub async fn add_user(&self, email: &str, password: &str, admin: bool) -> CurrentUser {
        let id = self.backend.create_user(email, password).await;
        if admin {
            self.backend.grant_role(id, AppRole::Admin).await;
        }
        CurrentUser {
            id,
            email: Some(email.to_string()),
            username: None,
            is_admin: admin,
        }
    }

    /// Serve the full application on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn spawn(&self) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local address");
        let app = gundam_store::app(self.state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        TestServer { addr }
    }
}

/// A running store.
pub struct TestServer {
    addr: SocketAddr,
}

impl TestServer {
    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// A client that keeps the session cookie between requests.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// A client signed in as `email`.
    ///
    /// # Panics
    ///
    /// Panics if the login request fails or is rejected.
    pub async fn login(&self, email: &str, password: &str) -> Client {
        let client = self.client();
        let resp = client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request");
        assert!(
            resp.status().is_success(),
            "login failed with {}",
            resp.status()
        );
        client
    }
}
