use crate::db::DbPool;
use crate::entities::order::{self, PaymentMethod};
use crate::entities::pending_payment::{self, PaymentStatus};
use crate::entities::order_item;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::carts::CartService;
use crate::services::checkout::{ShippingAddress, SnapshotLineItem};
use crate::services::payment_provider::PaymentProvider;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of a confirmation call. `already_processed` is true when the order
/// had been materialized by an earlier call for the same session.
#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub already_processed: bool,
}

/// Turns externally confirmed payments into orders, exactly once per session.
///
/// Confirmation may be invoked any number of times for the same session id
/// (page refresh, retried webhook, races between the two); every call after
/// the first returns the same order without side effects. The unique index on
/// `orders.checkout_session_id` is the final arbiter when two calls race past
/// the lookup.
#[derive(Clone)]
pub struct PaymentReconciliationService {
    db: Arc<DbPool>,
    provider: Arc<dyn PaymentProvider>,
    event_sender: Option<EventSender>,
}

impl PaymentReconciliationService {
    pub fn new(
        db: Arc<DbPool>,
        provider: Arc<dyn PaymentProvider>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            provider,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, session_id: &str) -> Result<ConfirmedPayment, ServiceError> {
        // The provider is the only source of truth for payment completion.
        let status = self.provider.get_session_status(session_id).await?;
        if status.status != PaymentStatus::Paid {
            return Err(ServiceError::PaymentNotCompleted(format!(
                "Session {} is not paid",
                session_id
            )));
        }

        let pending = pending_payment::Entity::find()
            .filter(pending_payment::Column::CheckoutSessionId.eq(session_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No pending payment for session {}", session_id))
            })?;

        // Fast path: a previous confirmation already materialized the order.
        if let Some(existing) = self.find_order_for_session(session_id).await? {
            return self.load_confirmed(existing, true).await;
        }

        let snapshot = Self::validate_snapshot(&pending)?;
        let address: ShippingAddress =
            serde_json::from_value(pending.shipping_address.clone()).map_err(|e| {
                ServiceError::IncompletePaymentRecord(format!(
                    "Pending payment {} has an unreadable shipping address: {}",
                    pending.id, e
                ))
            })?;
        // Round-trips cleanly; keeps the stored form canonical.
        let address_json = serde_json::to_value(&address)
            .map_err(|e| ServiceError::InternalError(format!("Address serialization: {}", e)))?;

        let txn = self.db.begin().await?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let inserted = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(pending.user_id),
            shipping_address: Set(address_json),
            payment_method: Set(PaymentMethod::HostedCheckout),
            payment_result: Set(Some(json!({
                "session_id": session_id,
                "status": "paid",
                "payer_email": status.payer_email,
            }))),
            currency: Set(pending.currency.clone()),
            items_subtotal_minor: Set(pending.items_subtotal_minor),
            shipping_fee_minor: Set(pending.shipping_fee_minor),
            tax_minor: Set(pending.tax_minor),
            total_minor: Set(pending.total_minor),
            is_paid: Set(true),
            paid_at: Set(Some(now)),
            is_delivered: Set(false),
            delivered_at: Set(None),
            checkout_session_id: Set(Some(session_id.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await;

        let order = match inserted {
            Ok(order) => order,
            Err(err) => {
                // A concurrent confirmation hit the unique session-id index
                // first. Drop our transaction and return the winner's order.
                drop(txn);
                if let Some(existing) = self.find_order_for_session(session_id).await? {
                    warn!(session_id, "lost confirmation race; returning existing order");
                    return self.load_confirmed(existing, true).await;
                }
                return Err(err.into());
            }
        };

        for line in &snapshot {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                name: Set(line.name.clone()),
                image_url: Set(line.image_url.clone()),
                unit_price_minor: Set(line.unit_price_minor),
                quantity: Set(line.quantity),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        let mut pending_active: pending_payment::ActiveModel = pending.clone().into();
        pending_active.status = Set(PaymentStatus::Paid);
        pending_active.receipt_url = Set(status.receipt_url.clone());
        pending_active.order_id = Set(Some(order.id));
        pending_active.updated_at = Set(now);
        pending_active.update(&txn).await?;

        CartService::clear_in_txn(&txn, pending.user_id).await?;

        txn.commit().await?;

        info!(session_id, order_id = %order.id, "payment confirmed and order created");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PaymentConfirmed {
                    session_id: session_id.to_string(),
                    order_id: order.id,
                })
                .await;
            sender.send_or_log(Event::OrderCreated(order.id)).await;
        }

        self.load_confirmed(order, false).await
    }

    async fn find_order_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CheckoutSessionId.eq(session_id))
            .one(&*self.db)
            .await?)
    }

    async fn load_confirmed(
        &self,
        order: order::Model,
        already_processed: bool,
    ) -> Result<ConfirmedPayment, ServiceError> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        Ok(ConfirmedPayment {
            order,
            items,
            already_processed,
        })
    }

    /// A paid session whose stored snapshot cannot produce a complete order
    /// is a data-integrity failure, not a client error: the shopper has been
    /// charged and we must not silently drop lines.
    fn validate_snapshot(
        pending: &pending_payment::Model,
    ) -> Result<Vec<SnapshotLineItem>, ServiceError> {
        let snapshot: Vec<SnapshotLineItem> = serde_json::from_value(pending.line_items.clone())
            .map_err(|e| {
                ServiceError::IncompletePaymentRecord(format!(
                    "Pending payment {} has an unreadable line-item snapshot: {}",
                    pending.id, e
                ))
            })?;

        if snapshot.is_empty() {
            return Err(ServiceError::IncompletePaymentRecord(format!(
                "Pending payment {} has no line items",
                pending.id
            )));
        }
        for line in &snapshot {
            if line.name.is_empty() || line.quantity < 1 || line.unit_price_minor < 0 {
                return Err(ServiceError::IncompletePaymentRecord(format!(
                    "Pending payment {} has an invalid line for product {}",
                    pending.id, line.product_id
                )));
            }
        }
        Ok(snapshot)
    }
}
