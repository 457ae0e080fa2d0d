mod common;

use assert_matches::assert_matches;
use common::TestApp;
use storefront_api::errors::ServiceError;
use storefront_api::services::products::{CreateProductInput, UpdateProductInput};

fn new_product(name: &str, price_minor: i64) -> CreateProductInput {
    CreateProductInput {
        name: name.to_string(),
        description: None,
        image_url: None,
        price_minor,
    }
}

#[tokio::test]
async fn sellers_create_and_list_their_own_catalog() {
    let app = TestApp::new().await;
    let seller = app.seller();
    let other_seller = app.seller();

    let lamp = app
        .state
        .services
        .products
        .create_product(&seller, new_product("lamp", 2500))
        .await
        .unwrap();
    assert_eq!(lamp.seller_id, seller.user_id);
    assert_eq!(lamp.price_minor, 2500);
    assert!(lamp.is_active);

    app.state
        .services
        .products
        .create_product(&other_seller, new_product("rug", 4000))
        .await
        .unwrap();

    let mine = app
        .state
        .services
        .products
        .list_for_seller(&seller)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, lamp.id);
}

#[tokio::test]
async fn customers_cannot_create_products() {
    let app = TestApp::new().await;
    let customer = app.customer();

    let err = app
        .state
        .services
        .products
        .create_product(&customer, new_product("contraband", 100))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    let err = app
        .state
        .services
        .products
        .list_for_seller(&customer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
}

#[tokio::test]
async fn only_the_owning_seller_or_an_admin_can_edit() {
    let app = TestApp::new().await;
    let owner = app.seller();
    let rival = app.seller();
    let admin = app.admin();

    let chair = app
        .state
        .services
        .products
        .create_product(&owner, new_product("chair", 800))
        .await
        .unwrap();

    let err = app
        .state
        .services
        .products
        .update_product(
            &rival,
            chair.id,
            UpdateProductInput {
                price_minor: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    let updated = app
        .state
        .services
        .products
        .update_product(
            &owner,
            chair.id,
            UpdateProductInput {
                price_minor: Some(900),
                name: Some("armchair".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price_minor, 900);
    assert_eq!(updated.name, "armchair");

    // Admins may edit any seller's product.
    let updated = app
        .state
        .services
        .products
        .update_product(
            &admin,
            chair.id,
            UpdateProductInput {
                description: Some("refurbished".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("refurbished"));
}

#[tokio::test]
async fn deactivated_products_leave_carts_and_orders_alone() {
    let app = TestApp::new().await;
    let seller = app.seller();
    let shopper = app.customer();

    let poster = app
        .state
        .services
        .products
        .create_product(&seller, new_product("poster", 300))
        .await
        .unwrap();
    app.state
        .services
        .carts
        .add_item(shopper.user_id, poster.id, 1)
        .await
        .unwrap();

    let retired = app
        .state
        .services
        .products
        .deactivate_product(&seller, poster.id)
        .await
        .unwrap();
    assert!(!retired.is_active);

    // Retired products are hidden from shoppers and cannot be added anew.
    let err = app
        .state
        .services
        .products
        .get_product(poster.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
    let err = app
        .state
        .services
        .carts
        .add_item(shopper.user_id, poster.id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // Deactivating twice is a no-op.
    let again = app
        .state
        .services
        .products
        .deactivate_product(&seller, poster.id)
        .await
        .unwrap();
    assert!(!again.is_active);
}

#[tokio::test]
async fn negative_prices_are_rejected() {
    let app = TestApp::new().await;
    let seller = app.seller();

    let err = app
        .state
        .services
        .products
        .create_product(&seller, new_product("broken", -1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
