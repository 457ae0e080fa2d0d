pub mod carts;
pub mod checkout;
pub mod orders;
pub mod payment_provider;
pub mod payments;
pub mod pricing;
pub mod products;

pub use carts::CartService;
pub use checkout::CheckoutService;
pub use orders::OrderService;
pub use payment_provider::{HostedCheckoutClient, PaymentProvider};
pub use payments::PaymentReconciliationService;
pub use products::ProductService;
