pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod pending_payment;
pub mod product;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use pending_payment::Entity as PendingPayment;
pub use product::Entity as Product;

pub use cart::Model as CartModel;
pub use cart_item::Model as CartItemModel;
pub use order::Model as OrderModel;
pub use order_item::Model as OrderItemModel;
pub use pending_payment::Model as PendingPaymentModel;
pub use product::Model as ProductModel;
