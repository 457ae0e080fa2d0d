use crate::config::{PaymentProviderConfig, PricingConfig};
use crate::db::DbPool;
use crate::entities::pending_payment::{self, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::carts::CartService;
use crate::services::payment_provider::{
    CreateSessionRequest, PaymentProvider, ProviderLineItem,
};
use crate::services::pricing::{price_line_items, PriceBreakdown, PricedLineItem};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Destination address captured at checkout time
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip: String,
}

/// Value copy of a cart line at session-creation time. Persisted as JSON on
/// the pending payment and copied verbatim onto the order at reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLineItem {
    pub product_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price_minor: i64,
    pub quantity: i32,
}

/// What the caller needs to hand the shopper off to the hosted payment page
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub checkout_session_id: String,
    pub checkout_url: String,
    pub breakdown: PriceBreakdown,
}

/// Opens hosted checkout sessions.
///
/// The provider call happens before any write: if the provider rejects or
/// times out, nothing is persisted and the cart is untouched, so no pending
/// payment can exist without a live provider session behind it.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    carts: CartService,
    provider: Arc<dyn PaymentProvider>,
    pricing: PricingConfig,
    provider_config: PaymentProviderConfig,
    default_currency: String,
    event_sender: Option<EventSender>,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DbPool>,
        carts: CartService,
        provider: Arc<dyn PaymentProvider>,
        pricing: PricingConfig,
        provider_config: PaymentProviderConfig,
        default_currency: String,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            carts,
            provider,
            pricing,
            provider_config,
            default_currency,
            event_sender,
        }
    }

    #[instrument(skip(self, shipping_address))]
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        shipping_address: ShippingAddress,
    ) -> Result<CheckoutSession, ServiceError> {
        shipping_address.validate()?;

        let lines = self.carts.items_with_products(user_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cannot check out an empty cart".to_string(),
            ));
        }

        let snapshot: Vec<SnapshotLineItem> = lines
            .iter()
            .map(|(product, quantity)| SnapshotLineItem {
                product_id: product.id,
                name: product.name.clone(),
                image_url: product.image_url.clone(),
                unit_price_minor: product.price_minor,
                quantity: *quantity,
            })
            .collect();

        let priced: Vec<PricedLineItem> = snapshot
            .iter()
            .map(|line| PricedLineItem {
                unit_price_minor: line.unit_price_minor,
                quantity: line.quantity,
            })
            .collect();
        let breakdown = price_line_items(&priced, &self.pricing)?;

        // Provider first, persistence second. A provider failure here leaves
        // no record at all.
        let session = self
            .provider
            .create_session(self.build_provider_request(&snapshot, &breakdown))
            .await?;

        pending_payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            checkout_session_id: Set(session.session_id.clone()),
            status: Set(PaymentStatus::Unpaid),
            payment_method: Set("hosted_checkout".to_string()),
            line_items: Set(serde_json::to_value(&snapshot).map_err(|e| {
                ServiceError::InternalError(format!("Failed to serialize cart snapshot: {}", e))
            })?),
            shipping_address: Set(serde_json::to_value(&shipping_address).map_err(|e| {
                ServiceError::InternalError(format!("Failed to serialize address: {}", e))
            })?),
            currency: Set(self.default_currency.clone()),
            items_subtotal_minor: Set(breakdown.items_subtotal_minor),
            shipping_fee_minor: Set(breakdown.shipping_fee_minor),
            tax_minor: Set(breakdown.tax_minor),
            total_minor: Set(breakdown.total_minor),
            receipt_url: Set(None),
            order_id: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(
            session_id = %session.session_id,
            total_minor = breakdown.total_minor,
            "checkout session created"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CheckoutSessionCreated {
                    user_id,
                    session_id: session.session_id.clone(),
                })
                .await;
        }

        Ok(CheckoutSession {
            checkout_session_id: session.session_id,
            checkout_url: session.checkout_url,
            breakdown,
        })
    }

    /// Product lines plus synthetic shipping/tax lines, so the hosted page
    /// displays the same grand total we computed and persisted.
    fn build_provider_request(
        &self,
        snapshot: &[SnapshotLineItem],
        breakdown: &PriceBreakdown,
    ) -> CreateSessionRequest {
        let mut line_items: Vec<ProviderLineItem> = snapshot
            .iter()
            .map(|line| ProviderLineItem {
                name: line.name.clone(),
                unit_amount_minor: line.unit_price_minor,
                quantity: line.quantity,
            })
            .collect();
        if breakdown.shipping_fee_minor > 0 {
            line_items.push(ProviderLineItem {
                name: "Shipping".to_string(),
                unit_amount_minor: breakdown.shipping_fee_minor,
                quantity: 1,
            });
        }
        if breakdown.tax_minor > 0 {
            line_items.push(ProviderLineItem {
                name: "Tax".to_string(),
                unit_amount_minor: breakdown.tax_minor,
                quantity: 1,
            });
        }

        CreateSessionRequest {
            line_items,
            currency: self.default_currency.clone(),
            success_url: self.provider_config.success_url.clone(),
            cancel_url: self.provider_config.cancel_url.clone(),
        }
    }
}
