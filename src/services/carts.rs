use crate::db::DbPool;
use crate::entities::{cart, cart_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// A cart line joined with its live product data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemView {
    pub product_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    /// Live catalog price; carts never cache prices
    pub unit_price_minor: i64,
    pub quantity: i32,
    pub line_total_minor: i64,
}

/// The cart as returned to callers: live-priced lines plus their subtotal.
/// Shipping and tax are checkout concerns and are not shown here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub cart_id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItemView>,
    pub items_subtotal_minor: i64,
}

/// Cart operations: one cart per user, at most one line per product.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }

    /// Adds a product to the user's cart. If the product is already in the
    /// cart the existing line's quantity is incremented; a second line is
    /// never created for the same product.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let txn = self.db.begin().await?;
        let cart = Self::get_or_create_cart(&txn, user_id).await?;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .one(&txn)
            .await?;

        let event = match existing {
            Some(item) => {
                let new_quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
                    ServiceError::ValidationError("Quantity overflows".to_string())
                })?;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
                Event::CartItemUpdated {
                    cart_id: cart.id,
                    product_id: product.id,
                }
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?;
                Event::CartItemAdded {
                    cart_id: cart.id,
                    product_id: product.id,
                }
            }
        };
        txn.commit().await?;

        self.send_event(event).await;
        self.get_cart(user_id).await
    }

    /// Replaces the quantity of an existing cart line
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1; remove the item instead".to_string(),
            ));
        }

        let cart = self.find_cart(user_id).await?;
        let item = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.send_event(Event::CartItemUpdated {
            cart_id: cart.id,
            product_id,
        })
        .await;
        self.get_cart(user_id).await
    }

    /// Removes a single product line from the cart
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let cart = self.find_cart(user_id).await?;
        let item = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        cart_item::Entity::delete_by_id(item.id).exec(&*self.db).await?;

        self.send_event(Event::CartItemRemoved {
            cart_id: cart.id,
            product_id,
        })
        .await;
        self.get_cart(user_id).await
    }

    /// Empties the cart. A no-op for users with no cart yet.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let cart = match cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        {
            Some(cart) => cart,
            None => return Ok(()),
        };

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;

        self.send_event(Event::CartCleared(cart.id)).await;
        Ok(())
    }

    /// Returns the cart with live product prices. Users who never added
    /// anything get an empty view rather than an error.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = match cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        {
            Some(cart) => cart,
            None => {
                return Ok(CartView {
                    cart_id: Uuid::nil(),
                    user_id,
                    items: Vec::new(),
                    items_subtotal_minor: 0,
                })
            }
        };

        let lines = self.items_with_products(user_id).await?;
        let mut items = Vec::with_capacity(lines.len());
        let mut items_subtotal_minor: i64 = 0;
        for (product, quantity) in lines {
            let line_total = product
                .price_minor
                .checked_mul(i64::from(quantity))
                .ok_or_else(|| {
                    ServiceError::InternalError("Cart line total overflows".to_string())
                })?;
            items_subtotal_minor = items_subtotal_minor
                .checked_add(line_total)
                .ok_or_else(|| ServiceError::InternalError("Cart subtotal overflows".to_string()))?;
            items.push(CartItemView {
                product_id: product.id,
                name: product.name,
                image_url: product.image_url,
                unit_price_minor: product.price_minor,
                quantity,
                line_total_minor: line_total,
            });
        }

        Ok(CartView {
            cart_id: cart.id,
            user_id,
            items,
            items_subtotal_minor,
        })
    }

    /// Cart lines joined with their products, in insertion order. Checkout
    /// uses this to build its price/snapshot input.
    pub async fn items_with_products(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(product::Model, i32)>, ServiceError> {
        let cart = match cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        {
            Some(cart) => cart,
            None => return Ok(Vec::new()),
        };

        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (item, maybe_product) in rows {
            let product = maybe_product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart item {} references missing product {}",
                    item.id, item.product_id
                ))
            })?;
            lines.push((product, item.quantity));
        }
        Ok(lines)
    }

    /// Clears the user's cart inside an existing transaction, so the clear
    /// commits (or rolls back) atomically with order creation.
    pub async fn clear_in_txn(
        txn: &sea_orm::DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        if let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(txn)
            .await?
        {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(txn)
                .await?;
        }
        Ok(())
    }

    async fn find_cart(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart is empty".to_string()))
    }

    async fn get_or_create_cart(
        txn: &sea_orm::DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(txn)
            .await?
        {
            return Ok(cart);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(txn)
        .await;

        match cart {
            Ok(cart) => Ok(cart),
            // Lost a race against a concurrent first-add; the winner's row
            // satisfies the unique user_id index, use it.
            Err(_) => cart::Entity::find()
                .filter(cart::Column::UserId.eq(user_id))
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError("Cart creation race left no cart".to_string())
                }),
        }
    }
}
