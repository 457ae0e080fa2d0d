use crate::config::PricingConfig;
use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A line item as seen by the pricing engine: captured unit price and quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLineItem {
    /// Unit price in minor currency units
    pub unit_price_minor: i64,
    pub quantity: i32,
}

/// Price breakdown persisted verbatim on pending payments and orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items_subtotal_minor: i64,
    pub shipping_fee_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
}

/// Computes the canonical price breakdown for a set of line items.
///
/// Every order-creation path uses this single function, at session-creation
/// time and at COD creation time alike; reconciliation copies the stored
/// session-time output instead of recomputing against live prices. All
/// arithmetic is exact: minor-unit integers throughout, with a fixed-point
/// decimal intermediate (round-half-up, scale 0) for the tax multiplication.
pub fn price_line_items(
    items: &[PricedLineItem],
    pricing: &PricingConfig,
) -> Result<PriceBreakdown, ServiceError> {
    let mut items_subtotal_minor: i64 = 0;
    for item in items {
        if item.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Line item quantity must be at least 1".to_string(),
            ));
        }
        if item.unit_price_minor < 0 {
            return Err(ServiceError::ValidationError(
                "Line item price cannot be negative".to_string(),
            ));
        }
        let line_total = item
            .unit_price_minor
            .checked_mul(i64::from(item.quantity))
            .ok_or_else(|| {
                ServiceError::ValidationError("Line item total overflows".to_string())
            })?;
        items_subtotal_minor = items_subtotal_minor.checked_add(line_total).ok_or_else(|| {
            ServiceError::ValidationError("Cart subtotal overflows".to_string())
        })?;
    }

    let shipping_fee_minor = if items_subtotal_minor >= pricing.free_shipping_threshold_minor {
        0
    } else {
        pricing.flat_shipping_fee_minor
    };

    let tax_minor = tax_for_subtotal(items_subtotal_minor, pricing.tax_rate_bps)?;

    let total_minor = items_subtotal_minor + shipping_fee_minor + tax_minor;

    Ok(PriceBreakdown {
        items_subtotal_minor,
        shipping_fee_minor,
        tax_minor,
        total_minor,
    })
}

/// `round_half_up(subtotal * rate)` in minor units, via exact decimals
fn tax_for_subtotal(subtotal_minor: i64, tax_rate_bps: u32) -> Result<i64, ServiceError> {
    let rate = Decimal::from(tax_rate_bps) / dec!(10000);
    let tax = (Decimal::from(subtotal_minor) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    tax.to_i64()
        .ok_or_else(|| ServiceError::ValidationError("Tax amount overflows".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pricing() -> PricingConfig {
        PricingConfig {
            free_shipping_threshold_minor: 1000,
            flat_shipping_fee_minor: 100,
            tax_rate_bps: 1000,
        }
    }

    #[test]
    fn subtotal_at_threshold_ships_free() {
        // cart [{price: 500, qty: 2}] -> 1000/0/100/1100
        let items = [PricedLineItem {
            unit_price_minor: 500,
            quantity: 2,
        }];
        let breakdown = price_line_items(&items, &test_pricing()).unwrap();
        assert_eq!(breakdown.items_subtotal_minor, 1000);
        assert_eq!(breakdown.shipping_fee_minor, 0);
        assert_eq!(breakdown.tax_minor, 100);
        assert_eq!(breakdown.total_minor, 1100);
    }

    #[test]
    fn subtotal_below_threshold_pays_flat_fee() {
        // cart [{price: 300, qty: 1}] -> 300/100/30/430
        let items = [PricedLineItem {
            unit_price_minor: 300,
            quantity: 1,
        }];
        let breakdown = price_line_items(&items, &test_pricing()).unwrap();
        assert_eq!(breakdown.items_subtotal_minor, 300);
        assert_eq!(breakdown.shipping_fee_minor, 100);
        assert_eq!(breakdown.tax_minor, 30);
        assert_eq!(breakdown.total_minor, 430);
    }

    #[test]
    fn tax_rounds_half_up() {
        // 8.75% of 126 = 11.025 -> 11; 8.75% of 120 = 10.5 -> 11
        let pricing = PricingConfig {
            free_shipping_threshold_minor: 100_000,
            flat_shipping_fee_minor: 0,
            tax_rate_bps: 875,
        };
        let tax = |subtotal: i64| {
            price_line_items(
                &[PricedLineItem {
                    unit_price_minor: subtotal,
                    quantity: 1,
                }],
                &pricing,
            )
            .unwrap()
            .tax_minor
        };
        assert_eq!(tax(126), 11);
        assert_eq!(tax(120), 11);
        assert_eq!(tax(119), 10);
    }

    #[test]
    fn pricing_is_deterministic() {
        let items = [
            PricedLineItem {
                unit_price_minor: 1999,
                quantity: 3,
            },
            PricedLineItem {
                unit_price_minor: 537,
                quantity: 7,
            },
        ];
        let a = price_line_items(&items, &test_pricing()).unwrap();
        let b = price_line_items(&items, &test_pricing()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.total_minor,
            a.items_subtotal_minor + a.shipping_fee_minor + a.tax_minor
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let items = [PricedLineItem {
            unit_price_minor: 100,
            quantity: 0,
        }];
        let err = price_line_items(&items, &test_pricing()).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn empty_cart_prices_to_flat_fee_plus_zero() {
        // The checkout path rejects empty carts before pricing; the engine
        // itself stays total-consistent anyway.
        let breakdown = price_line_items(&[], &test_pricing()).unwrap();
        assert_eq!(breakdown.items_subtotal_minor, 0);
        assert_eq!(
            breakdown.total_minor,
            breakdown.shipping_fee_minor + breakdown.tax_minor
        );
    }
}
