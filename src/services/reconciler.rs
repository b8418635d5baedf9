use super::notifications::{notify_order_created, OrderNotifier};
use super::orders::OrderService;
use super::payment_transactions::{PaymentTransactionService, TransactionWebhookOutcome};
use crate::entities::{checkout_session, SessionStatus};
use crate::errors::ServiceError;
use crate::models::{to_minor_units, PaymentMethod};
use crate::providers::PaytrProvider;
use crate::repositories::{CheckoutSessionStore, NewOrder};
use crate::webhooks::{PaytrCallback, WebhookRecord, WebhookStatus};
use metrics::counter;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// What a verified callback did. Every variant is acknowledged to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    OrderCreated { order_id: Uuid, reference: String },
    /// Session already settled, or another delivery got there first
    Duplicate { reference: String },
    UnknownSession { reference: String },
    PaymentFailed { reference: String },
    /// Intermediate status; nothing to do yet
    Ignored { reference: String },
    /// The reference named a payment transaction rather than a checkout session
    Transaction {
        reference: String,
        outcome: TransactionWebhookOutcome,
    },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::OrderCreated { .. } => "order_created",
            ReconcileOutcome::Duplicate { .. } => "duplicate",
            ReconcileOutcome::UnknownSession { .. } => "unknown_session",
            ReconcileOutcome::PaymentFailed { .. } => "payment_failed",
            ReconcileOutcome::Ignored { .. } => "ignored",
            ReconcileOutcome::Transaction { .. } => "transaction",
        }
    }
}

/// Turns PayTR's server-to-server callback into at most one order per session.
#[derive(Clone)]
pub struct WebhookReconciler {
    paytr: Arc<PaytrProvider>,
    sessions: Arc<dyn CheckoutSessionStore>,
    orders: OrderService,
    notifier: Arc<dyn OrderNotifier>,
    currency: String,
    transactions: Option<Arc<PaymentTransactionService>>,
}

impl WebhookReconciler {
    pub fn new(
        paytr: Arc<PaytrProvider>,
        sessions: Arc<dyn CheckoutSessionStore>,
        orders: OrderService,
        notifier: Arc<dyn OrderNotifier>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            paytr,
            sessions,
            orders,
            notifier,
            currency: currency.into(),
            transactions: None,
        }
    }

    /// Callbacks whose `merchant_oid` is not a checkout session are applied to
    /// the payment transaction of that id instead.
    pub fn with_transactions(mut self, transactions: Arc<PaymentTransactionService>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    /// Parses and authenticates the form body, then reconciles it.
    ///
    /// A bad hash is an `AuthenticationError` and nothing is touched.
    pub async fn handle_paytr_callback(
        &self,
        body: &[u8],
    ) -> Result<ReconcileOutcome, ServiceError> {
        let callback = PaytrCallback::from_form(body)?;
        if !self.paytr.verify_callback(&callback) {
            counter!("storefront_payments.webhooks.rejected", 1, "provider" => "paytr");
            warn!(merchant_oid = %callback.merchant_oid, "PayTR callback hash mismatch");
            return Err(ServiceError::AuthenticationError(
                "PayTR callback hash mismatch".to_string(),
            ));
        }
        let record = callback.into_record()?;
        let outcome = self.reconcile(record).await?;
        counter!("storefront_payments.webhooks.processed", 1, "outcome" => outcome.label());
        Ok(outcome)
    }

    /// Applies an authenticated record to its checkout session, or to the
    /// payment transaction of the same id when no session exists.
    #[instrument(skip(self, record), fields(reference = %record.transaction_id, status = ?record.status))]
    pub async fn reconcile(&self, record: WebhookRecord) -> Result<ReconcileOutcome, ServiceError> {
        let reference = record.transaction_id.clone();
        let Some(session) = self.sessions.get_by_id(&reference).await? else {
            return self.reconcile_transaction(record).await;
        };

        match (session.status, record.status) {
            (SessionStatus::Processed, _) => {
                info!("session already processed");
                return Ok(ReconcileOutcome::Duplicate { reference });
            }
            (SessionStatus::Failed, WebhookStatus::Success) => {
                warn!("success callback for a session already marked failed");
                return Ok(ReconcileOutcome::Duplicate { reference });
            }
            (SessionStatus::Failed, _) => return Ok(ReconcileOutcome::Duplicate { reference }),
            (SessionStatus::New, _) => {}
        }

        check_amount(&session, &record)?;

        match record.status {
            WebhookStatus::Success => self.settle(session).await,
            WebhookStatus::Failed | WebhookStatus::Cancelled => {
                if self.sessions.mark_failed(&reference).await? {
                    info!(reason = ?record.error, "payment failed; session closed");
                    Ok(ReconcileOutcome::PaymentFailed { reference })
                } else {
                    Ok(ReconcileOutcome::Duplicate { reference })
                }
            }
            WebhookStatus::Pending | WebhookStatus::Refunded => {
                Ok(ReconcileOutcome::Ignored { reference })
            }
        }
    }

    async fn reconcile_transaction(
        &self,
        record: WebhookRecord,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let reference = record.transaction_id.clone();
        let outcome = match &self.transactions {
            Some(transactions) => transactions.apply_webhook(&record).await?,
            None => TransactionWebhookOutcome::UnknownTransaction,
        };
        if outcome == TransactionWebhookOutcome::UnknownTransaction {
            warn!("callback for an unknown checkout session; acknowledging without changes");
            return Ok(ReconcileOutcome::UnknownSession { reference });
        }
        info!(?outcome, "callback applied to a payment transaction");
        Ok(ReconcileOutcome::Transaction { reference, outcome })
    }

    async fn settle(
        &self,
        session: checkout_session::Model,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let reference = session.id.clone();
        let status_id = self.orders.received_status_id().await?;

        if !self.sessions.mark_processed(&reference).await? {
            info!("lost the race to another delivery of this callback");
            return Ok(ReconcileOutcome::Duplicate { reference });
        }

        let created = self
            .orders
            .create(NewOrder {
                products: session.cart_items,
                status_id,
                total: session.total_amount,
                currency: self.currency.clone(),
                user: session.user_data,
                payment_method: PaymentMethod::CreditCard.as_str().to_string(),
                payment_reference: Some(reference.clone()),
                payment_provider_reference: Some(reference.clone()),
            })
            .await;

        let order = match created {
            Ok(order) => order,
            Err(ServiceError::Conflict(_)) => {
                warn!("order for this reference already exists");
                return Ok(ReconcileOutcome::Duplicate { reference });
            }
            Err(e) => {
                counter!("storefront_payments.reconciliation.required", 1);
                error!(
                    error = %e,
                    reference = %reference,
                    "session marked processed but the order insert failed; manual reconciliation required"
                );
                return Err(ServiceError::ReconciliationRequired(reference));
            }
        };

        info!(order_id = %order.id, total = %order.total, "order created from payment callback");
        notify_order_created(self.notifier.as_ref(), &order).await;
        Ok(ReconcileOutcome::OrderCreated {
            order_id: order.id,
            reference,
        })
    }
}

/// The charged amount must equal the staged session total, whatever the
/// outcome. A success without an amount is malformed.
fn check_amount(
    session: &checkout_session::Model,
    record: &WebhookRecord,
) -> Result<(), ServiceError> {
    let received = match (record.amount_minor, record.status) {
        (Some(received), _) => received,
        (None, WebhookStatus::Success) => {
            return Err(ServiceError::BadRequest(
                "callback carries no amount".to_string(),
            ))
        }
        (None, _) => return Ok(()),
    };
    let expected = to_minor_units(session.total_amount)?;
    if expected != received {
        counter!("storefront_payments.webhooks.amount_mismatch", 1);
        warn!(expected, received, "callback amount differs from the checkout session");
        return Err(ServiceError::AmountMismatch {
            reference: session.id.clone(),
            expected,
            received,
        });
    }
    Ok(())
}
