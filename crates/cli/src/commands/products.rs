//! Catalog inspection.

use tracing::info;

use gundam_store::backend::Backend;
use gundam_store::cache::QueryCache;
use gundam_store::services::{CatalogReader, SessionResolver};
use gundam_store_core::Grade;

/// Log the catalog as seen by `email`, newest first, optionally filtered by grade.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, sign-in fails, or the
/// select fails.
pub async fn list(
    grade: Option<Grade>,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::rest_config()?;
    let backend = Backend::from_config(&config.backend)?;
    let auth = backend.sign_in(email, password).await?;
    let data = backend.session(Some(auth.access_token));
    let cache = QueryCache::new(config.cache_ttl);

    let user = SessionResolver::new(data.as_ref(), &cache).require().await?;
    let products = CatalogReader::new(data.as_ref(), &cache)
        .list_by_grade(Some(&user), grade)
        .await?;

    for product in &products {
        info!(
            id = %product.id,
            grade = %product.grade,
            price = %product.price.display(),
            "{}",
            product.name
        );
    }
    info!(count = products.len(), "Listed products");
    Ok(())
}
