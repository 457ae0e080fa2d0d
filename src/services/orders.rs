use crate::auth::AuthContext;
use crate::config::PricingConfig;
use crate::db::DbPool;
use crate::entities::order::{self, PaymentMethod};
use crate::entities::{order_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::carts::CartService;
use crate::services::checkout::ShippingAddress;
use crate::services::pricing::{price_line_items, PricedLineItem};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Order line as returned to API callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price_minor: i64,
    pub quantity: i32,
}

/// Full order view assembled from the order row and its items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItemResponse>,
    pub shipping_address: serde_json::Value,
    pub payment_method: PaymentMethod,
    pub currency: String,
    pub items_subtotal_minor: i64,
    pub shipping_fee_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderResponse {
    pub fn from_parts(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    name: item.name,
                    image_url: item.image_url,
                    unit_price_minor: item.unit_price_minor,
                    quantity: item.quantity,
                })
                .collect(),
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            currency: order.currency,
            items_subtotal_minor: order.items_subtotal_minor,
            shipping_fee_minor: order.shipping_fee_minor,
            tax_minor: order.tax_minor,
            total_minor: order.total_minor,
            is_paid: order.is_paid,
            paid_at: order.paid_at,
            is_delivered: order.is_delivered,
            delivered_at: order.delivered_at,
            checkout_session_id: order.checkout_session_id,
            created_at: order.created_at,
        }
    }
}

/// A page of orders for the admin listing
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Order lifecycle: cash-on-delivery creation, reads with ownership checks,
/// delivery marking, deletion, and the per-role listings.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    carts: CartService,
    pricing: PricingConfig,
    default_currency: String,
    event_sender: Option<EventSender>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        carts: CartService,
        pricing: PricingConfig,
        default_currency: String,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            carts,
            pricing,
            default_currency,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }

    /// Creates a cash-on-delivery order directly from the caller's cart.
    /// Prices go through the same engine as hosted checkout; the order starts
    /// unpaid and the cart is cleared in the same transaction.
    #[instrument(skip(self, shipping_address))]
    pub async fn create_cod_order(
        &self,
        ctx: &AuthContext,
        shipping_address: ShippingAddress,
    ) -> Result<OrderResponse, ServiceError> {
        shipping_address.validate()?;

        let lines = self.carts.items_with_products(ctx.user_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cannot create an order from an empty cart".to_string(),
            ));
        }

        let priced: Vec<PricedLineItem> = lines
            .iter()
            .map(|(product, quantity)| PricedLineItem {
                unit_price_minor: product.price_minor,
                quantity: *quantity,
            })
            .collect();
        let breakdown = price_line_items(&priced, &self.pricing)?;
        if breakdown.total_minor <= 0 {
            return Err(ServiceError::ValidationError(
                "Order total must be positive".to_string(),
            ));
        }

        let address_json = serde_json::to_value(&shipping_address)
            .map_err(|e| ServiceError::InternalError(format!("Address serialization: {}", e)))?;

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(ctx.user_id),
            shipping_address: Set(address_json),
            payment_method: Set(PaymentMethod::Cod),
            payment_result: Set(None),
            currency: Set(self.default_currency.clone()),
            items_subtotal_minor: Set(breakdown.items_subtotal_minor),
            shipping_fee_minor: Set(breakdown.shipping_fee_minor),
            tax_minor: Set(breakdown.tax_minor),
            total_minor: Set(breakdown.total_minor),
            is_paid: Set(false),
            paid_at: Set(None),
            is_delivered: Set(false),
            delivered_at: Set(None),
            checkout_session_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (product, quantity) in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(product.id),
                name: Set(product.name.clone()),
                image_url: Set(product.image_url.clone()),
                unit_price_minor: Set(product.price_minor),
                quantity: Set(*quantity),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        CartService::clear_in_txn(&txn, ctx.user_id).await?;
        txn.commit().await?;

        info!(order_id = %order.id, total_minor = order.total_minor, "cod order created");
        self.send_event(Event::OrderCreated(order.id)).await;

        Ok(OrderResponse::from_parts(order, items))
    }

    /// Fetches a single order; only the owner or an admin may read it
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        ctx: &AuthContext,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.find_order(order_id).await?;
        if !ctx.can_act_on(order.user_id) {
            return Err(ServiceError::Unauthorized(
                "Not authorized to view this order".to_string(),
            ));
        }
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        Ok(OrderResponse::from_parts(order, items))
    }

    /// Marks an order as delivered. Admin only. Re-marking an already
    /// delivered order succeeds without touching the original timestamp.
    #[instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        ctx: &AuthContext,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        if !ctx.is_admin() {
            return Err(ServiceError::Unauthorized(
                "Only admins can mark orders delivered".to_string(),
            ));
        }

        let order = self.find_order(order_id).await?;
        let order = if order.is_delivered {
            order
        } else {
            let mut active: order::ActiveModel = order.into();
            active.is_delivered = Set(true);
            active.delivered_at = Set(Some(Utc::now()));
            active.updated_at = Set(Utc::now());
            let updated = active.update(&*self.db).await?;
            self.send_event(Event::OrderDelivered(updated.id)).await;
            updated
        };

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        Ok(OrderResponse::from_parts(order, items))
    }

    /// Deletes an order and its items. Owner or admin only.
    #[instrument(skip(self))]
    pub async fn delete_order(
        &self,
        ctx: &AuthContext,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let order = self.find_order(order_id).await?;
        if !ctx.can_act_on(order.user_id) {
            return Err(ServiceError::Unauthorized(
                "Not authorized to delete this order".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(order.id).exec(&txn).await?;
        txn.commit().await?;

        self.send_event(Event::OrderDeleted(order_id)).await;
        Ok(())
    }

    /// All of the caller's own orders, newest first
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.attach_items(orders).await
    }

    /// Orders containing at least one line for a product owned by the caller.
    /// Each order appears once however many of its lines match. Sellers only;
    /// admins use the unfiltered paginated listing instead.
    #[instrument(skip(self))]
    pub async fn list_for_seller(
        &self,
        ctx: &AuthContext,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        if !ctx.is_seller() {
            return Err(ServiceError::Unauthorized(
                "Seller listing requires a seller account".to_string(),
            ));
        }

        let order_ids: Vec<Uuid> = order_item::Entity::find()
            .select_only()
            .column(order_item::Column::OrderId)
            .distinct()
            .inner_join(product::Entity)
            .filter(product::Column::SellerId.eq(ctx.user_id))
            .into_tuple()
            .all(&*self.db)
            .await?;

        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let orders = order::Entity::find()
            .filter(order::Column::Id.is_in(order_ids))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.attach_items(orders).await
    }

    /// Paginated listing of every order in the system. Admin only.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        ctx: &AuthContext,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        if !ctx.is_admin() {
            return Err(ServiceError::Unauthorized(
                "Only admins can list all orders".to_string(),
            ));
        }

        let per_page = per_page.clamp(1, 100);
        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        let orders = self.attach_items(orders).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    async fn find_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn attach_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        if !ids.is_empty() {
            for item in order_item::Entity::find()
                .filter(order_item::Column::OrderId.is_in(ids))
                .all(&*self.db)
                .await?
            {
                by_order.entry(item.order_id).or_default().push(item);
            }
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderResponse::from_parts(order, items)
            })
            .collect())
    }
}
