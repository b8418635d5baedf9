pub mod checkout_session;
pub mod order;
pub mod payment_transaction;
pub mod status;

pub use checkout_session::{Entity as CheckoutSession, SessionStatus};
pub use order::Entity as Order;
pub use payment_transaction::{Entity as PaymentTransaction, TransactionStatus};
pub use status::Entity as Status;
