mod common;

use assert_matches::assert_matches;
use common::{test_address, TestApp};
use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_api::auth::AuthContext;
use storefront_api::entities::order::{self, PaymentMethod};
use storefront_api::errors::ServiceError;
use storefront_api::services::orders::OrderResponse;
use uuid::Uuid;

async fn place_cod_order(app: &TestApp, ctx: &AuthContext, seller_id: Uuid) -> OrderResponse {
    let product = app.seed_product(seller_id, "chair", 800).await;
    app.state
        .services
        .carts
        .add_item(ctx.user_id, product, 1)
        .await
        .unwrap();
    app.state
        .services
        .orders
        .create_cod_order(ctx, test_address())
        .await
        .unwrap()
}

#[tokio::test]
async fn cod_order_starts_unpaid_and_clears_the_cart() {
    let app = TestApp::new().await;
    let ctx = app.customer();
    let seller = app.seller();
    let order = place_cod_order(&app, &ctx, seller.user_id).await;

    assert_eq!(order.payment_method, PaymentMethod::Cod);
    assert!(!order.is_paid);
    assert!(order.paid_at.is_none());
    assert_eq!(order.checkout_session_id, None);
    // 800 under threshold: 100 shipping, 10% tax
    assert_eq!(order.items_subtotal_minor, 800);
    assert_eq!(order.shipping_fee_minor, 100);
    assert_eq!(order.tax_minor, 80);
    assert_eq!(order.total_minor, 980);
    assert_eq!(order.items.len(), 1);

    let cart = app.state.services.carts.get_cart(ctx.user_id).await.unwrap();
    assert!(cart.items.is_empty());
}

#[tokio::test]
async fn cod_order_requires_a_non_empty_cart() {
    let app = TestApp::new().await;
    let ctx = app.customer();
    let err = app
        .state
        .services
        .orders
        .create_cod_order(&ctx, test_address())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn cod_order_with_a_zero_total_is_rejected() {
    // Free products with shipping and tax zeroed would otherwise produce a
    // cash-on-delivery order that collects nothing.
    let app = TestApp::with_pricing(1000, 0, 0).await;
    let ctx = app.customer();
    let seller = app.seller();
    let freebie = app.seed_product(seller.user_id, "freebie", 0).await;
    app.state
        .services
        .carts
        .add_item(ctx.user_id, freebie, 3)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .orders
        .create_cod_order(&ctx, test_address())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);

    // The cart survives the rejection.
    let cart = app.state.services.carts.get_cart(ctx.user_id).await.unwrap();
    assert_eq!(cart.items.len(), 1);
}

#[tokio::test]
async fn only_the_owner_or_an_admin_can_read_an_order() {
    let app = TestApp::new().await;
    let owner = app.customer();
    let stranger = app.customer();
    let admin = app.admin();
    let seller = app.seller();
    let order = place_cod_order(&app, &owner, seller.user_id).await;

    assert!(app.state.services.orders.get_order(&owner, order.id).await.is_ok());
    assert!(app.state.services.orders.get_order(&admin, order.id).await.is_ok());
    let err = app
        .state
        .services
        .orders
        .get_order(&stranger, order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let app = TestApp::new().await;
    let ctx = app.customer();
    let err = app
        .state
        .services
        .orders
        .get_order(&ctx, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn marking_delivered_is_admin_only_and_idempotent() {
    let app = TestApp::new().await;
    let owner = app.customer();
    let admin = app.admin();
    let seller = app.seller();
    let order = place_cod_order(&app, &owner, seller.user_id).await;

    // The owner cannot mark their own order delivered.
    let err = app
        .state
        .services
        .orders
        .mark_delivered(&owner, order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    let first = app
        .state
        .services
        .orders
        .mark_delivered(&admin, order.id)
        .await
        .unwrap();
    assert!(first.is_delivered);
    let delivered_at = first.delivered_at.expect("delivered timestamp set");

    // Re-marking succeeds without touching the original timestamp.
    let second = app
        .state
        .services
        .orders
        .mark_delivered(&admin, order.id)
        .await
        .unwrap();
    assert!(second.is_delivered);
    assert_eq!(second.delivered_at, Some(delivered_at));
}

#[tokio::test]
async fn delete_is_restricted_to_owner_or_admin() {
    let app = TestApp::new().await;
    let owner = app.customer();
    let stranger = app.customer();
    let seller = app.seller();
    let order = place_cod_order(&app, &owner, seller.user_id).await;

    let err = app
        .state
        .services
        .orders
        .delete_order(&stranger, order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    app.state
        .services
        .orders
        .delete_order(&owner, order.id)
        .await
        .unwrap();
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);

    // Deleting again reports not found.
    let err = app
        .state
        .services
        .orders
        .delete_order(&owner, order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn users_see_only_their_own_orders() {
    let app = TestApp::new().await;
    let alice = app.customer();
    let bob = app.customer();
    let seller = app.seller();
    place_cod_order(&app, &alice, seller.user_id).await;
    place_cod_order(&app, &alice, seller.user_id).await;
    place_cod_order(&app, &bob, seller.user_id).await;

    let mine = app
        .state
        .services
        .orders
        .list_for_user(alice.user_id)
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|o| o.user_id == alice.user_id));
}

#[tokio::test]
async fn sellers_see_orders_containing_their_products_exactly_once() {
    let app = TestApp::new().await;
    let buyer = app.customer();
    let seller = app.seller();
    let other_seller = app.seller();

    // One order with two of the seller's products plus someone else's.
    let hat = app.seed_product(seller.user_id, "hat", 400).await;
    let scarf = app.seed_product(seller.user_id, "scarf", 300).await;
    let boots = app.seed_product(other_seller.user_id, "boots", 900).await;
    for product in [hat, scarf, boots] {
        app.state
            .services
            .carts
            .add_item(buyer.user_id, product, 1)
            .await
            .unwrap();
    }
    let mixed = app
        .state
        .services
        .orders
        .create_cod_order(&buyer, test_address())
        .await
        .unwrap();

    // A second order with none of the seller's products.
    app.state
        .services
        .carts
        .add_item(buyer.user_id, boots, 1)
        .await
        .unwrap();
    app.state
        .services
        .orders
        .create_cod_order(&buyer, test_address())
        .await
        .unwrap();

    let seller_orders = app
        .state
        .services
        .orders
        .list_for_seller(&seller)
        .await
        .unwrap();
    assert_eq!(seller_orders.len(), 1);
    assert_eq!(seller_orders[0].id, mixed.id);

    let other_orders = app
        .state
        .services
        .orders
        .list_for_seller(&other_seller)
        .await
        .unwrap();
    assert_eq!(other_orders.len(), 2);

    // Customers cannot use the seller listing.
    let err = app
        .state
        .services
        .orders
        .list_for_seller(&buyer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    // Neither can admins: their view is the unfiltered paginated listing,
    // and a seller-scoped query for an admin id would always come up empty.
    let admin = app.admin();
    let err = app
        .state
        .services
        .orders
        .list_for_seller(&admin)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
}

#[tokio::test]
async fn admin_listing_is_paginated_and_admin_only() {
    let app = TestApp::new().await;
    let admin = app.admin();
    let customer = app.customer();
    let seller = app.seller();
    for _ in 0..3 {
        place_cod_order(&app, &customer, seller.user_id).await;
    }

    let page = app
        .state
        .services
        .orders
        .list_all(&admin, 1, 2)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.orders.len(), 2);

    let page_two = app
        .state
        .services
        .orders
        .list_all(&admin, 2, 2)
        .await
        .unwrap();
    assert_eq!(page_two.orders.len(), 1);

    let err = app
        .state
        .services
        .orders
        .list_all(&customer, 1, 10)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
}
