//! Cart and checkout.
//!
//! # Invariants
//!
//! - At most one `cart` row per (user, product): adds take a per-pair lock
//!   around lookup-then-write, and legacy duplicates are merged on the next add
//! - Checkout removes the purchased products from the catalog
//!
//! # Checkout sequence
//!
//! 1. Finish any pending intent left by an earlier, partially failed checkout
//! 2. Insert a `checkout_intents` row naming the products and the total
//! 3. Delete the user's cart rows for those products
//! 4. Delete the products
//! 5. Delete the intent
//!
//! Steps 3 to 5 are idempotent, so a checkout that fails after step 2 is
//! completed by the next checkout instead of leaving a half-applied purchase.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use gundam_store_core::{
    CartEntry, CartEntryId, CartLine, CheckoutIntentId, Price, Product, ProductId, UserId,
    compute_total,
};

use crate::backend::{BackendError, DataService, Query, Row, Table, select_as, to_row};
use crate::cache::{CacheValue, QueryCache, QueryKey};
use crate::models::CurrentUser;

use super::locks::KeyedLocks;

/// Per-(user, product) locks serializing add-to-cart.
pub type CartLocks = KeyedLocks<(UserId, ProductId)>;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Please sign in to use your cart")]
    NotAuthenticated,

    #[error("Product not found")]
    ProductNotFound(ProductId),

    #[error("Failed to look up product: {0}")]
    ProductLookupFailed(#[source] BackendError),

    #[error("Failed to add to cart: {0}")]
    CartWriteFailed(#[source] BackendError),

    #[error("Failed to remove from cart: {0}")]
    RemoveFailed(#[source] BackendError),

    #[error("Failed to load cart: {0}")]
    ReadFailed(#[source] BackendError),
}

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Please sign in to check out")]
    NotAuthenticated,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Checkout failed: {0}")]
    CheckoutFailed(#[source] BackendError),
}

impl From<BackendError> for CheckoutError {
    fn from(err: BackendError) -> Self {
        Self::CheckoutFailed(err)
    }
}

/// A user's cart joined with its products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Price,
    pub item_count: u32,
}

impl CartView {
    fn new(lines: Vec<CartLine>) -> Self {
        let total = compute_total(&lines);
        let item_count = lines
            .iter()
            .fold(0_u32, |count, line| count.saturating_add(line.quantity));
        Self {
            lines,
            total,
            item_count,
        }
    }
}

/// Outcome of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
    pub intent_id: CheckoutIntentId,
    pub product_ids: Vec<ProductId>,
    pub total: Price,
    /// Whether this receipt completes an earlier, interrupted checkout.
    pub resumed: bool,
}

/// A row of `checkout_intents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckoutIntent {
    id: CheckoutIntentId,
    user_id: UserId,
    product_ids: Vec<ProductId>,
    total: Price,
    created_at: DateTime<Utc>,
}

impl CheckoutIntent {
    fn receipt(self, resumed: bool) -> CheckoutReceipt {
        CheckoutReceipt {
            intent_id: self.id,
            product_ids: self.product_ids,
            total: self.total,
            resumed,
        }
    }
}

/// Cart operations for the caller of one request.
pub struct CartManager<'a> {
    data: &'a dyn DataService,
    cache: &'a QueryCache,
    locks: &'a CartLocks,
}

impl<'a> CartManager<'a> {
    #[must_use]
    pub const fn new(data: &'a dyn DataService, cache: &'a QueryCache, locks: &'a CartLocks) -> Self {
        Self { data, cache, locks }
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add one unit of `product_id` to the user's cart.
    ///
    /// Increments the existing entry for the product, or creates one with
    /// quantity 1.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` without a user,
    /// `CartError::ProductNotFound` for an unknown product,
    /// `CartError::ProductLookupFailed` if the product cannot be read, and
    /// `CartError::CartWriteFailed` if the cart update fails.
    #[instrument(skip(self, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn add_to_cart(
        &self,
        user: Option<&CurrentUser>,
        product_id: ProductId,
    ) -> Result<CartEntry, CartError> {
        let user = user.ok_or(CartError::NotAuthenticated)?;
        let _guard = self.locks.lock((user.id, product_id)).await;

        let product = self
            .data
            .select(&Query::table(Table::Products).eq("id", product_id))
            .await
            .map_err(CartError::ProductLookupFailed)?;
        if product.is_empty() {
            return Err(CartError::ProductNotFound(product_id));
        }

        let entries: Vec<CartEntry> = select_as(
            self.data,
            &Query::table(Table::Cart)
                .eq("user_id", user.id)
                .eq("product_id", product_id),
        )
        .await
        .map_err(CartError::CartWriteFailed)?;

        let entry = match entries.split_first() {
            None => {
                let entry = CartEntry {
                    id: CartEntryId::generate(),
                    user_id: user.id,
                    product_id,
                    quantity: 1,
                };
                let row = to_row(&entry).map_err(CartError::CartWriteFailed)?;
                self.data
                    .insert(Table::Cart, row)
                    .await
                    .map_err(CartError::CartWriteFailed)?;
                entry
            }
            Some((first, duplicates)) => {
                let quantity = entries
                    .iter()
                    .fold(1_u32, |total, e| total.saturating_add(e.quantity));

                self.data
                    .update(
                        &Query::table(Table::Cart).eq("id", first.id),
                        quantity_patch(quantity),
                    )
                    .await
                    .map_err(CartError::CartWriteFailed)?;

                if !duplicates.is_empty() {
                    warn!(
                        count = duplicates.len(),
                        "Merging duplicate cart entries"
                    );
                    self.data
                        .delete(
                            &Query::table(Table::Cart)
                                .eq("user_id", user.id)
                                .is_in("id", duplicates.iter().map(|e| e.id)),
                        )
                        .await
                        .map_err(CartError::CartWriteFailed)?;
                }

                CartEntry {
                    quantity,
                    ..first.clone()
                }
            }
        };

        self.cache.invalidate(&QueryKey::Cart(user.id)).await;
        info!(entry_id = %entry.id, quantity = entry.quantity, "Added to cart");
        Ok(entry)
    }

    /// Remove one cart entry owned by the user.
    ///
    /// Removing an entry that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` without a user and
    /// `CartError::RemoveFailed` if the backend fails.
    #[instrument(skip(self, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn remove_from_cart(
        &self,
        user: Option<&CurrentUser>,
        entry_id: CartEntryId,
    ) -> Result<(), CartError> {
        let user = user.ok_or(CartError::NotAuthenticated)?;

        self.data
            .delete(
                &Query::table(Table::Cart)
                    .eq("id", entry_id)
                    .eq("user_id", user.id),
            )
            .await
            .map_err(CartError::RemoveFailed)?;

        self.cache.invalidate(&QueryKey::Cart(user.id)).await;
        info!("Removed from cart");
        Ok(())
    }

    /// The user's cart joined with its products.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` without a user and
    /// `CartError::ReadFailed` if the backend fails.
    #[instrument(skip(self, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn list_cart(&self, user: Option<&CurrentUser>) -> Result<CartView, CartError> {
        let user = user.ok_or(CartError::NotAuthenticated)?;

        if let Some(lines) = self.cache.cart(user.id).await {
            return Ok(CartView::new(lines.as_ref().clone()));
        }

        let read_at = self.cache.generation();
        let lines = self
            .fetch_cart(user.id)
            .await
            .map_err(CartError::ReadFailed)?;

        self.cache
            .insert(
                QueryKey::Cart(user.id),
                CacheValue::Cart(Arc::new(lines.clone())),
                read_at,
            )
            .await;
        Ok(CartView::new(lines))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Purchase everything in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` without a user,
    /// `CheckoutError::EmptyCart` when there is nothing to buy, and
    /// `CheckoutError::CheckoutFailed` if any backend step fails. A failure
    /// after the intent is recorded is completed by the next checkout.
    #[instrument(skip(self, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn checkout(&self, user: Option<&CurrentUser>) -> Result<CheckoutReceipt, CheckoutError> {
        let user = user.ok_or(CheckoutError::NotAuthenticated)?;

        let mut resumed = self.complete_pending(user.id).await?;

        // Entries whose product was sold elsewhere are not purchasable
        let lines = self.fetch_cart(user.id).await?;
        if lines.is_empty() {
            // An interrupted checkout that just completed is the purchase
            return resumed
                .pop()
                .map(|intent| intent.receipt(true))
                .ok_or(CheckoutError::EmptyCart);
        }

        let mut seen = HashSet::new();
        let product_ids: Vec<ProductId> = lines
            .iter()
            .map(|line| line.product.id)
            .filter(|id| seen.insert(*id))
            .collect();

        let intent = CheckoutIntent {
            id: CheckoutIntentId::generate(),
            user_id: user.id,
            product_ids,
            total: compute_total(&lines),
            created_at: Utc::now(),
        };

        self.data
            .insert(Table::CheckoutIntents, to_row(&intent)?)
            .await?;

        let outcome = self.complete_intent(&intent).await;
        self.invalidate_after_checkout(user.id).await;
        outcome?;

        info!(
            intent_id = %intent.id,
            products = intent.product_ids.len(),
            total = %intent.total,
            "Checkout completed"
        );
        Ok(intent.receipt(false))
    }

    /// Complete every pending checkout of the user.
    ///
    /// Returns the number of checkouts completed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` without a user and
    /// `CheckoutError::CheckoutFailed` if the backend fails.
    #[instrument(skip(self, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn resume_pending_checkout(
        &self,
        user: Option<&CurrentUser>,
    ) -> Result<usize, CheckoutError> {
        let user = user.ok_or(CheckoutError::NotAuthenticated)?;
        Ok(self.complete_pending(user.id).await?.len())
    }

    async fn complete_pending(&self, user: UserId) -> Result<Vec<CheckoutIntent>, CheckoutError> {
        let pending: Vec<CheckoutIntent> = select_as(
            self.data,
            &Query::table(Table::CheckoutIntents)
                .eq("user_id", user)
                .order_asc("created_at"),
        )
        .await?;

        if pending.is_empty() {
            return Ok(pending);
        }

        let mut outcome = Ok(());
        for intent in &pending {
            warn!(intent_id = %intent.id, "Resuming interrupted checkout");
            outcome = self.complete_intent(intent).await;
            if outcome.is_err() {
                break;
            }
        }
        self.invalidate_after_checkout(user).await;
        outcome?;

        Ok(pending)
    }

    async fn complete_intent(&self, intent: &CheckoutIntent) -> Result<(), BackendError> {
        let ids = || intent.product_ids.iter();

        self.data
            .delete(
                &Query::table(Table::Cart)
                    .eq("user_id", intent.user_id)
                    .is_in("product_id", ids()),
            )
            .await?;

        self.data
            .delete(&Query::table(Table::Products).is_in("id", ids()))
            .await?;

        self.data
            .delete(&Query::table(Table::CheckoutIntents).eq("id", intent.id))
            .await
    }

    async fn invalidate_after_checkout(&self, user: UserId) {
        self.cache.invalidate(&QueryKey::Cart(user)).await;
        self.cache.invalidate_catalog().await;
    }

    /// Cart lines of `user` whose product still exists.
    async fn fetch_cart(&self, user: UserId) -> Result<Vec<CartLine>, BackendError> {
        let entries: Vec<CartEntry> =
            select_as(self.data, &Query::table(Table::Cart).eq("user_id", user)).await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: HashSet<ProductId> = entries.iter().map(|e| e.product_id).collect();
        let products: HashMap<ProductId, Product> = select_as::<Product>(
            self.data,
            &Query::table(Table::Products).is_in("id", ids),
        )
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

        let lines = entries
            .iter()
            .filter_map(|entry| match products.get(&entry.product_id) {
                Some(product) => Some(CartLine {
                    entry_id: entry.id,
                    product: product.clone(),
                    quantity: entry.quantity,
                }),
                None => {
                    warn!(
                        entry_id = %entry.id,
                        product_id = %entry.product_id,
                        "Cart entry references a missing product"
                    );
                    None
                }
            })
            .collect();

        Ok(lines)
    }
}

fn quantity_patch(quantity: u32) -> Row {
    let mut patch = Row::new();
    patch.insert("quantity".to_string(), Value::from(quantity));
    patch
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use gundam_store_core::Grade;

    use super::*;
    use crate::backend::testing::GatedSelect;
    use crate::backend::{MemoryBackend, Operation};

    struct Fixture {
        backend: MemoryBackend,
        cache: QueryCache,
        locks: CartLocks,
        user: CurrentUser,
    }

    impl Fixture {
        async fn new() -> Self {
            let backend = MemoryBackend::new();
            let id = backend.create_user("amuro@efsf.test", "rx78").await;
            Self {
                backend,
                cache: QueryCache::new(Duration::from_secs(60)),
                locks: CartLocks::new(),
                user: CurrentUser {
                    id,
                    email: Some("amuro@efsf.test".to_string()),
                    username: None,
                    is_admin: false,
                },
            }
        }

        async fn product(&self, name: &str, cents: u32) -> ProductId {
            let product = Product {
                id: ProductId::generate(),
                name: name.to_string(),
                price: Price::from_cents(cents),
                grade: Grade::HG,
                link: None,
                created_at: Utc::now(),
            };
            self.backend
                .session(None)
                .insert(Table::Products, to_row(&product).expect("row"))
                .await
                .expect("insert product");
            product.id
        }
    }

    #[tokio::test]
    async fn test_add_requires_user() {
        let fx = Fixture::new().await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);

        let err = cart
            .add_to_cart(None, ProductId::generate())
            .await
            .expect_err("anonymous");
        assert!(matches!(err, CartError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let fx = Fixture::new().await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);

        let err = cart
            .add_to_cart(Some(&fx.user), ProductId::generate())
            .await
            .expect_err("unknown product");
        assert!(matches!(err, CartError::ProductNotFound(_)));
        assert!(fx.backend.rows(Table::Cart).await.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_add_merges() {
        let fx = Fixture::new().await;
        let p = fx.product("RX-78-2 Gundam", 2999).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);

        for _ in 0..3 {
            cart.add_to_cart(Some(&fx.user), p).await.expect("add");
        }

        let view = cart.list_cart(Some(&fx.user)).await.expect("list");
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 3);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.total, Price::from_cents(8997));
    }

    #[tokio::test]
    async fn test_add_merges_legacy_duplicates() {
        let fx = Fixture::new().await;
        let p = fx.product("Zaku II", 1599).await;
        let data = fx.backend.session(None);
        for quantity in [2, 1] {
            let entry = CartEntry {
                id: CartEntryId::generate(),
                user_id: fx.user.id,
                product_id: p,
                quantity,
            };
            data.insert(Table::Cart, to_row(&entry).expect("row"))
                .await
                .expect("insert");
        }
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);

        let entry = cart.add_to_cart(Some(&fx.user), p).await.expect("add");

        assert_eq!(entry.quantity, 4);
        assert_eq!(fx.backend.rows(Table::Cart).await.len(), 1);
    }

    #[tokio::test]
    async fn test_add_failure_is_cart_write_failed() {
        let fx = Fixture::new().await;
        let p = fx.product("Gouf", 2250).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        fx.backend
            .fail_next(Table::Cart, Operation::Insert, "row-level security violation");

        let err = cart
            .add_to_cart(Some(&fx.user), p)
            .await
            .expect_err("injected");
        assert!(matches!(err, CartError::CartWriteFailed(_)));
        assert!(err.to_string().contains("row-level security violation"));
    }

    #[tokio::test]
    async fn test_product_lookup_failure_is_not_a_write_failure() {
        let fx = Fixture::new().await;
        let p = fx.product("Guncannon", 1900).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        fx.backend
            .fail_next(Table::Products, Operation::Select, "statement timeout");

        let err = cart
            .add_to_cart(Some(&fx.user), p)
            .await
            .expect_err("injected");
        assert!(matches!(err, CartError::ProductLookupFailed(_)));
        assert!(fx.backend.rows(Table::Cart).await.is_empty());
    }

    #[tokio::test]
    async fn test_cart_view_read_during_add_is_not_cached() {
        let fx = Fixture::new().await;
        let p = fx.product("Gundam Mk-II", 2800).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        cart.add_to_cart(Some(&fx.user), p).await.expect("add");

        let gated = GatedSelect::new(fx.backend.session(None), Table::Cart);
        let reader = CartManager::new(&gated, &fx.cache, &fx.locks);

        let (in_flight, ()) = tokio::join!(reader.list_cart(Some(&fx.user)), async {
            gated.reached().await;
            cart.add_to_cart(Some(&fx.user), p).await.expect("second add");
            gated.release();
        });
        assert_eq!(in_flight.expect("list").lines[0].quantity, 1);

        let view = cart.list_cart(Some(&fx.user)).await.expect("list");
        assert_eq!(view.lines[0].quantity, 2);
        assert_eq!(view.total, Price::from_cents(5600));
    }

    #[tokio::test]
    async fn test_out_of_range_price_is_a_read_failure() {
        let fx = Fixture::new().await;
        let data = fx.backend.session(None);
        let id = ProductId::generate();
        let Value::Object(row) = serde_json::json!({
            "id": id,
            "name": "Psycho Gundam",
            "price": "79228162514264337593543950335",
            "grade": "HG",
            "created_at": Utc::now(),
        }) else {
            panic!("expected object");
        };
        data.insert(Table::Products, row).await.expect("insert");
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        cart.add_to_cart(Some(&fx.user), id).await.expect("add");
        cart.add_to_cart(Some(&fx.user), id).await.expect("add");

        let err = cart.list_cart(Some(&fx.user)).await.expect_err("undecodable price");
        assert!(matches!(err, CartError::ReadFailed(BackendError::Json(_))));
        assert!(matches!(
            cart.checkout(Some(&fx.user)).await,
            Err(CheckoutError::CheckoutFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_only_touches_own_entries() {
        let fx = Fixture::new().await;
        let p = fx.product("Dom", 1999).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        let entry = cart.add_to_cart(Some(&fx.user), p).await.expect("add");

        let intruder = CurrentUser {
            id: UserId::generate(),
            email: None,
            username: None,
            is_admin: false,
        };
        cart.remove_from_cart(Some(&intruder), entry.id)
            .await
            .expect("no-op");
        assert_eq!(fx.backend.rows(Table::Cart).await.len(), 1);

        cart.remove_from_cart(Some(&fx.user), entry.id)
            .await
            .expect("remove");
        let view = cart.list_cart(Some(&fx.user)).await.expect("list");
        assert!(view.lines.iter().all(|line| line.entry_id != entry.id));
    }

    #[tokio::test]
    async fn test_list_skips_missing_products() {
        let fx = Fixture::new().await;
        let kept = fx.product("Gelgoog", 2500).await;
        let gone = fx.product("Gyan", 2400).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        cart.add_to_cart(Some(&fx.user), kept).await.expect("add");
        cart.add_to_cart(Some(&fx.user), gone).await.expect("add");
        data.delete(&Query::table(Table::Products).eq("id", gone))
            .await
            .expect("delete");

        let view = cart.list_cart(Some(&fx.user)).await.expect("list");
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].product.id, kept);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let fx = Fixture::new().await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);

        let err = cart.checkout(Some(&fx.user)).await.expect_err("empty");
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(fx.backend.rows(Table::CheckoutIntents).await.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_removes_cart_and_products() {
        let fx = Fixture::new().await;
        let rx78 = fx.product("RX-78-2 Gundam", 2999).await;
        let sazabi = fx.product("Sazabi", 5499).await;
        let other = fx.product("Zeta Gundam", 4000).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        cart.add_to_cart(Some(&fx.user), rx78).await.expect("add");
        cart.add_to_cart(Some(&fx.user), rx78).await.expect("add");
        cart.add_to_cart(Some(&fx.user), sazabi).await.expect("add");

        let receipt = cart.checkout(Some(&fx.user)).await.expect("checkout");

        assert_eq!(receipt.total, Price::from_cents(11497));
        assert_eq!(receipt.product_ids, vec![rx78, sazabi]);
        assert!(!receipt.resumed);
        assert!(cart.list_cart(Some(&fx.user)).await.expect("list").lines.is_empty());
        let remaining: Vec<_> = fx
            .backend
            .rows(Table::Products)
            .await
            .iter()
            .filter_map(|row| row["id"].as_str().map(str::to_string))
            .collect();
        assert_eq!(remaining, vec![other.to_string()]);
        assert!(fx.backend.rows(Table::CheckoutIntents).await.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_checkout_is_resumed() {
        let fx = Fixture::new().await;
        let p = fx.product("Nu Gundam", 6000).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        cart.add_to_cart(Some(&fx.user), p).await.expect("add");
        fx.backend
            .fail_next(Table::Products, Operation::Delete, "connection reset");

        let err = cart.checkout(Some(&fx.user)).await.expect_err("interrupted");
        assert!(matches!(err, CheckoutError::CheckoutFailed(_)));
        assert_eq!(fx.backend.rows(Table::CheckoutIntents).await.len(), 1);
        assert_eq!(fx.backend.rows(Table::Products).await.len(), 1);

        let completed = cart
            .resume_pending_checkout(Some(&fx.user))
            .await
            .expect("resume");
        assert_eq!(completed, 1);
        assert!(fx.backend.rows(Table::Products).await.is_empty());
        assert!(fx.backend.rows(Table::CheckoutIntents).await.is_empty());
    }

    #[tokio::test]
    async fn test_next_checkout_completes_interrupted_one() {
        let fx = Fixture::new().await;
        let p = fx.product("Hi-Nu Gundam", 7000).await;
        let data = fx.backend.session(None);
        let cart = CartManager::new(&data, &fx.cache, &fx.locks);
        cart.add_to_cart(Some(&fx.user), p).await.expect("add");
        fx.backend
            .fail_next(Table::CheckoutIntents, Operation::Delete, "timeout");
        cart.checkout(Some(&fx.user)).await.expect_err("interrupted");

        let receipt = cart.checkout(Some(&fx.user)).await.expect("resumed");

        assert!(receipt.resumed);
        assert_eq!(receipt.product_ids, vec![p]);
        assert_eq!(receipt.total, Price::from_cents(7000));
        assert!(fx.backend.rows(Table::CheckoutIntents).await.is_empty());
    }
}
