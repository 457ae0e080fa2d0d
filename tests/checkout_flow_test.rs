mod common;

use assert_matches::assert_matches;
use common::{test_address, TestApp};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use storefront_api::entities::pending_payment::{self, PaymentStatus};
use storefront_api::errors::ServiceError;
use storefront_api::services::checkout::SnapshotLineItem;

#[tokio::test]
async fn creating_a_session_persists_an_unpaid_pending_payment() {
    let app = TestApp::new().await;
    let ctx = app.customer();
    let seller = app.seller();
    let book = app.seed_product(seller.user_id, "book", 500).await;
    let pen = app.seed_product(seller.user_id, "pen", 300).await;

    app.state
        .services
        .carts
        .add_item(ctx.user_id, book, 1)
        .await
        .unwrap();
    app.state
        .services
        .carts
        .add_item(ctx.user_id, pen, 1)
        .await
        .unwrap();

    let session = app
        .state
        .services
        .checkout
        .create_checkout_session(ctx.user_id, test_address())
        .await
        .unwrap();

    // 800 subtotal is under the 1000 free-shipping threshold
    assert_eq!(session.breakdown.items_subtotal_minor, 800);
    assert_eq!(session.breakdown.shipping_fee_minor, 100);
    assert_eq!(session.breakdown.tax_minor, 80);
    assert_eq!(session.breakdown.total_minor, 980);
    assert!(!session.checkout_url.is_empty());

    let pending = pending_payment::Entity::find()
        .filter(pending_payment::Column::CheckoutSessionId.eq(session.checkout_session_id.as_str()))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("pending payment persisted");
    assert_eq!(pending.status, PaymentStatus::Unpaid);
    assert_eq!(pending.user_id, ctx.user_id);
    assert_eq!(pending.total_minor, 980);
    assert_eq!(pending.order_id, None);

    let snapshot: Vec<SnapshotLineItem> =
        serde_json::from_value(pending.line_items.clone()).unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().any(|l| l.product_id == book && l.unit_price_minor == 500));
}

#[tokio::test]
async fn session_creation_leaves_the_cart_intact() {
    let app = TestApp::new().await;
    let ctx = app.customer();
    let seller = app.seller();
    let product = app.seed_product(seller.user_id, "mug", 700).await;

    app.state
        .services
        .carts
        .add_item(ctx.user_id, product, 2)
        .await
        .unwrap();
    app.state
        .services
        .checkout
        .create_checkout_session(ctx.user_id, test_address())
        .await
        .unwrap();

    // The cart is only cleared once the payment is confirmed.
    let cart = app.state.services.carts.get_cart(ctx.user_id).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
}

#[tokio::test]
async fn provider_failure_leaves_no_pending_payment_behind() {
    let app = TestApp::new().await;
    let ctx = app.customer();
    let seller = app.seller();
    let product = app.seed_product(seller.user_id, "lamp", 2500).await;

    app.state
        .services
        .carts
        .add_item(ctx.user_id, product, 1)
        .await
        .unwrap();

    app.provider.fail_session_creation(true);
    let err = app
        .state
        .services
        .checkout
        .create_checkout_session(ctx.user_id, test_address())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PaymentProviderError(_));

    let pending_count = pending_payment::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(pending_count, 0);

    // Cart untouched; the shopper can retry.
    let cart = app.state.services.carts.get_cart(ctx.user_id).await.unwrap();
    assert_eq!(cart.items.len(), 1);
}

#[tokio::test]
async fn empty_cart_cannot_be_checked_out() {
    let app = TestApp::new().await;
    let ctx = app.customer();

    let err = app
        .state
        .services
        .checkout
        .create_checkout_session(ctx.user_id, test_address())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.provider.session_count(), 0);
}

#[tokio::test]
async fn free_shipping_applies_at_the_threshold() {
    let app = TestApp::new().await;
    let ctx = app.customer();
    let seller = app.seller();
    let product = app.seed_product(seller.user_id, "kettle", 500).await;

    app.state
        .services
        .carts
        .add_item(ctx.user_id, product, 2)
        .await
        .unwrap();

    let session = app
        .state
        .services
        .checkout
        .create_checkout_session(ctx.user_id, test_address())
        .await
        .unwrap();
    assert_eq!(session.breakdown.items_subtotal_minor, 1000);
    assert_eq!(session.breakdown.shipping_fee_minor, 0);
    assert_eq!(session.breakdown.total_minor, 1100);
}
