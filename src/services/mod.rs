// Checkout and payment flow
pub mod bank_transfer;
pub mod confirmation;
pub mod payment_transactions;
pub mod reconciler;
pub mod token_issuance;

// Orders and customer communication
pub mod notifications;
pub mod orders;

// Identifier generation
pub mod references;
