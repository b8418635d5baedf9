pub mod checkout;
pub mod health;
pub mod orders;
pub mod payments;

use crate::config::AppConfig;
use crate::providers::ProviderRegistry;
use crate::repositories::{StoreHealth, Stores};
use crate::services::{
    bank_transfer::BankTransferService, confirmation::ConfirmationService,
    notifications::OrderNotifier, orders::OrderService,
    payment_transactions::PaymentTransactionService, reconciler::WebhookReconciler,
    token_issuance::TokenIssuanceService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub tokens: Arc<TokenIssuanceService>,
    pub reconciler: Arc<WebhookReconciler>,
    pub transactions: Arc<PaymentTransactionService>,
    pub bank_transfers: Arc<BankTransferService>,
    pub orders: Arc<OrderService>,
    pub confirmation: Arc<ConfirmationService>,
    pub store_health: Arc<dyn StoreHealth>,
}

impl AppServices {
    /// Wires every service onto one set of stores and one provider registry.
    pub fn new(
        config: &AppConfig,
        stores: Stores,
        registry: Arc<ProviderRegistry>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        let currency = config.default_currency.clone();
        let orders = OrderService::new(stores.orders.clone(), stores.statuses.clone());

        let tokens = TokenIssuanceService::new(
            registry.paytr(),
            stores.sessions.clone(),
            currency.clone(),
        );
        let transactions = Arc::new(PaymentTransactionService::new(
            stores.transactions.clone(),
            registry.clone(),
            currency.clone(),
        ));
        let reconciler = WebhookReconciler::new(
            registry.paytr(),
            stores.sessions.clone(),
            orders.clone(),
            notifier.clone(),
            currency.clone(),
        )
        .with_transactions(transactions.clone());
        let bank_transfers = BankTransferService::new(orders.clone(), notifier, currency);
        let confirmation = ConfirmationService::new(
            stores.sessions.clone(),
            orders.clone(),
            config.confirmation_poll_attempts,
            config.confirmation_poll_interval(),
        );

        Self {
            tokens: Arc::new(tokens),
            reconciler: Arc::new(reconciler),
            transactions,
            bank_transfers: Arc::new(bank_transfers),
            orders: Arc::new(orders),
            confirmation: Arc::new(confirmation),
            store_health: stores.health,
        }
    }
}
