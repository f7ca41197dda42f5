//! Seed the hosted backend with products from a YAML file.
//!
//! Products are created through the admin service, so the account passed
//! on the command line must hold the admin role. The `users` section of the
//! file is ignored here: accounts on the hosted service are created through
//! its own auth dashboard.

use std::path::Path;

use tracing::{info, warn};

use gundam_store::backend::Backend;
use gundam_store::cache::QueryCache;
use gundam_store::seed::SeedFile;
use gundam_store::services::{AdminManager, SessionResolver};

/// Create every product in `file_path` as the admin `email`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the file cannot be
/// parsed, a product is invalid, sign-in fails, or an insert fails.
pub async fn products(
    file_path: &Path,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::rest_config()?;

    info!(path = %file_path.display(), "Loading seed file");
    let seed = SeedFile::load(file_path)?;

    // Validate everything before touching the backend
    seed.products()?;
    if !seed.users.is_empty() {
        warn!(
            users = seed.users.len(),
            "Skipping users; create them in the backend's auth dashboard"
        );
    }

    let backend = Backend::from_config(&config.backend)?;
    let auth = backend.sign_in(email, password).await?;
    let data = backend.session(Some(auth.access_token));
    let cache = QueryCache::new(config.cache_ttl);

    let admin = SessionResolver::new(data.as_ref(), &cache).require().await?;
    let manager = AdminManager::new(data.as_ref(), &cache);

    for form in seed.products {
        let product = manager.create_product(Some(&admin), form).await?;
        info!(id = %product.id, name = %product.name, "Created product");
    }

    info!("Seeding complete");
    Ok(())
}
