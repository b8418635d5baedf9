pub mod checkout;
pub mod money;

pub use checkout::{CustomerSnapshot, LineItem, PaymentMethod};
pub use money::{format_major, from_minor_units, to_minor_units};
