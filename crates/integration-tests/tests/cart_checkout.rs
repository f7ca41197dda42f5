//! Integration tests for cart and checkout through the service layer.
//!
//! Run with: cargo test -p gundam-store-integration-tests

use gundam_store::backend::{Operation, Table};
use gundam_store::services::{CartError, CartManager, CatalogReader, CheckoutError};
use gundam_store_core::{Grade, Price, ProductId};
use gundam_store_integration_tests::TestStore;

// ============================================================================
// Add / Remove
// ============================================================================

#[tokio::test]
async fn test_serial_adds_merge_into_one_entry() {
    let store = TestStore::new();
    let kit = store.add_product("Nu Gundam", "54.00", Grade::RG).await;
    let user = store.add_user("amuro@efsf.test", "white-base", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());

    for _ in 0..3 {
        cart.add_to_cart(Some(&user), kit.id).await.expect("add");
    }

    let view = cart.list_cart(Some(&user)).await.expect("list");
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].quantity, 3);
    assert_eq!(view.total, Price::from_cents(16_200));
    assert_eq!(store.backend.rows(Table::Cart).await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_adds_create_single_entry() {
    let store = TestStore::new();
    let kit = store.add_product("Zaku II", "19.99", Grade::HG).await;
    let user = store.add_user("char@neo-zeon.test", "red-comet", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());

    let (first, second) = tokio::join!(
        cart.add_to_cart(Some(&user), kit.id),
        cart.add_to_cart(Some(&user), kit.id),
    );
    first.expect("first add");
    second.expect("second add");

    let rows = store.backend.rows(Table::Cart).await;
    assert_eq!(rows.len(), 1, "concurrent adds must not duplicate the entry");
    assert_eq!(rows[0]["quantity"], 2);
    assert!(store.state.cart_locks().is_empty());
}

#[tokio::test]
async fn test_add_requires_user_and_existing_product() {
    let store = TestStore::new();
    let kit = store.add_product("Zaku II", "19.99", Grade::HG).await;
    let user = store.add_user("kai@efsf.test", "guncannon", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());

    assert!(matches!(
        cart.add_to_cart(None, kit.id).await,
        Err(CartError::NotAuthenticated)
    ));
    assert!(matches!(
        cart.add_to_cart(Some(&user), ProductId::generate()).await,
        Err(CartError::ProductNotFound(_))
    ));
    assert!(store.backend.rows(Table::Cart).await.is_empty());
}

#[tokio::test]
async fn test_remove_only_touches_own_entries() {
    let store = TestStore::new();
    let kit = store.add_product("Gouf", "22.00", Grade::HG).await;
    let owner = store.add_user("ramba@zeon.test", "blue-giant", false).await;
    let other = store.add_user("hayato@efsf.test", "guntank", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());
    let entry = cart.add_to_cart(Some(&owner), kit.id).await.expect("add");

    cart.remove_from_cart(Some(&other), entry.id)
        .await
        .expect("foreign remove is a no-op");
    assert_eq!(cart.list_cart(Some(&owner)).await.expect("list").lines.len(), 1);

    cart.remove_from_cart(Some(&owner), entry.id)
        .await
        .expect("remove");
    let view = cart.list_cart(Some(&owner)).await.expect("list");
    assert!(view.lines.is_empty());
    assert_eq!(view.total, Price::ZERO);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_purchases_cart_and_removes_products() {
    let store = TestStore::new();
    let rx78 = store.add_product("RX-78-2", "24.99", Grade::HG).await;
    let sazabi = store.add_product("Sazabi", "89.98", Grade::MG).await;
    let unsold = store.add_product("Acguy", "12.00", Grade::SD).await;
    let user = store.add_user("bright@efsf.test", "white-base", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());
    cart.add_to_cart(Some(&user), rx78.id).await.expect("add");
    cart.add_to_cart(Some(&user), sazabi.id).await.expect("add");

    let view = cart.list_cart(Some(&user)).await.expect("list");
    assert_eq!(view.total, Price::from_cents(11_497));
    assert_eq!(view.total.display(), "$114.97");

    let receipt = cart.checkout(Some(&user)).await.expect("checkout");
    assert_eq!(receipt.total, Price::from_cents(11_497));
    assert!(!receipt.resumed);

    assert!(cart.list_cart(Some(&user)).await.expect("list").lines.is_empty());
    let catalog = CatalogReader::new(&data, store.state.cache())
        .list_products(Some(&user))
        .await
        .expect("catalog");
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].id, unsold.id);
    assert!(store.backend.rows(Table::CheckoutIntents).await.is_empty());
}

#[tokio::test]
async fn test_checkout_with_empty_cart() {
    let store = TestStore::new();
    let user = store.add_user("mirai@efsf.test", "white-base", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());

    assert!(matches!(
        cart.checkout(Some(&user)).await,
        Err(CheckoutError::EmptyCart)
    ));
    assert!(matches!(
        cart.checkout(None).await,
        Err(CheckoutError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_interrupted_checkout_is_resumed() {
    let store = TestStore::new();
    let kit = store.add_product("Hyaku Shiki", "45.00", Grade::MG).await;
    let user = store.add_user("quattro@aeug.test", "gold-suit", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());
    cart.add_to_cart(Some(&user), kit.id).await.expect("add");

    store
        .backend
        .fail_next(Table::Products, Operation::Delete, "products unavailable");
    let err = cart.checkout(Some(&user)).await.expect_err("checkout fails");
    assert!(matches!(err, CheckoutError::CheckoutFailed(_)));

    // The intent survives the failure and the product is still listed
    assert_eq!(store.backend.rows(Table::CheckoutIntents).await.len(), 1);
    assert_eq!(store.backend.rows(Table::Products).await.len(), 1);

    let resumed = cart
        .resume_pending_checkout(Some(&user))
        .await
        .expect("resume");
    assert_eq!(resumed, 1);
    assert!(store.backend.rows(Table::Products).await.is_empty());
    assert!(store.backend.rows(Table::CheckoutIntents).await.is_empty());
}

#[tokio::test]
async fn test_catalog_change_refreshes_cart_view() {
    let store = TestStore::new();
    let kit = store.add_product("Dom", "30.00", Grade::HG).await;
    let buyer = store.add_user("ortega@zeon.test", "black-tri-stars", false).await;
    let seller = store.add_user("mash@zeon.test", "black-tri-stars", false).await;

    let data = store.backend.session(None);
    let cart = CartManager::new(&data, store.state.cache(), store.state.cart_locks());
    cart.add_to_cart(Some(&buyer), kit.id).await.expect("add");
    cart.add_to_cart(Some(&seller), kit.id).await.expect("add");
    assert_eq!(cart.list_cart(Some(&buyer)).await.expect("list").lines.len(), 1);

    cart.checkout(Some(&seller)).await.expect("checkout");

    // The product is gone, so the other cart no longer shows it
    let view = cart.list_cart(Some(&buyer)).await.expect("list");
    assert!(view.lines.is_empty());
    assert_eq!(view.total, Price::ZERO);
}
