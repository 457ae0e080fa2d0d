use crate::auth::AuthContext;
use crate::db::DbPool;
use crate::entities::product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Input for creating a catalog product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_minor: i64,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_minor: Option<i64>,
}

/// Seller-scoped catalog management. Products are never hard-deleted: orders
/// keep their own value copies, but carts reference live rows, so retirement
/// is a soft `is_active = false`.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
    default_currency: String,
    event_sender: Option<EventSender>,
}

impl ProductService {
    pub fn new(
        db: Arc<DbPool>,
        default_currency: String,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            default_currency,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }

    /// Creates a product owned by the calling seller
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        ctx: &AuthContext,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if !ctx.is_seller() && !ctx.is_admin() {
            return Err(ServiceError::Unauthorized(
                "Only sellers can create products".to_string(),
            ));
        }
        input.validate()?;

        let now = Utc::now();
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(ctx.user_id),
            name: Set(input.name),
            description: Set(input.description),
            image_url: Set(input.image_url),
            price_minor: Set(input.price_minor),
            currency: Set(self.default_currency.clone()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %created.id, "product created");
        self.send_event(Event::ProductCreated(created.id)).await;
        Ok(created)
    }

    /// Updates a product; only the owning seller or an admin may edit.
    /// Price changes affect future cart reads and snapshots only — existing
    /// pending payments and orders keep their captured prices.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        ctx: &AuthContext,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let existing = self.find_owned(ctx, product_id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(price_minor) = input.price_minor {
            active.price_minor = Set(price_minor);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.send_event(Event::ProductUpdated(updated.id)).await;
        Ok(updated)
    }

    /// Retires a product from the catalog. It can no longer be added to
    /// carts; completed orders are unaffected.
    #[instrument(skip(self))]
    pub async fn deactivate_product(
        &self,
        ctx: &AuthContext,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.find_owned(ctx, product_id).await?;
        if !existing.is_active {
            return Ok(existing);
        }

        let mut active: product::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.send_event(Event::ProductDeactivated(updated.id)).await;
        Ok(updated)
    }

    /// A single active product, as shoppers see it
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// The calling seller's own catalog, retired rows included
    #[instrument(skip(self))]
    pub async fn list_for_seller(
        &self,
        ctx: &AuthContext,
    ) -> Result<Vec<product::Model>, ServiceError> {
        if !ctx.is_seller() && !ctx.is_admin() {
            return Err(ServiceError::Unauthorized(
                "Catalog listing requires a seller account".to_string(),
            ));
        }
        Ok(product::Entity::find()
            .filter(product::Column::SellerId.eq(ctx.user_id))
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    async fn find_owned(
        &self,
        ctx: &AuthContext,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        if !ctx.can_act_on(existing.seller_id) {
            return Err(ServiceError::Unauthorized(
                "Not authorized to manage this product".to_string(),
            ));
        }
        Ok(existing)
    }
}
