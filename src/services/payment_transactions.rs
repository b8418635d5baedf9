use super::references::new_transaction_id;
use crate::entities::{payment_transaction, TransactionStatus};
use crate::errors::ServiceError;
use crate::models::{to_minor_units, CustomerSnapshot, LineItem, PaymentMethod};
use crate::providers::{PaymentRequest, ProviderKind, ProviderRegistry};
use crate::repositories::{TransactionStore, TransactionUpdate};
use crate::webhooks::WebhookRecord;
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    #[schema(value_type = String, example = "150.00")]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default = "default_installments")]
    #[validate(range(min = 1, max = 12, message = "installmentCount must be between 1 and 12"))]
    pub installment_count: u8,
    #[serde(default)]
    pub user: CustomerSnapshot,
    #[serde(default)]
    pub cart_items: Vec<LineItem>,
}

fn default_installments() -> u8 {
    1
}

/// Where the request came from; stored as transaction metadata.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_ip: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: String,
    #[schema(value_type = String)]
    pub status: TransactionStatus,
    #[schema(value_type = String, example = "150.00")]
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub installment_count: i32,
    pub provider: String,
    pub provider_reference: Option<String>,
    /// Hosted payment page, only right after initialization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<payment_transaction::Model> for TransactionView {
    fn from(model: payment_transaction::Model) -> Self {
        Self {
            id: model.id,
            status: model.status,
            amount: model.amount,
            currency: model.currency,
            payment_method: model.payment_method,
            installment_count: model.installment_count,
            provider: model.provider,
            provider_reference: model.provider_reference,
            payment_url: None,
            failure_reason: model.failure_reason,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// What a webhook did to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionWebhookOutcome {
    Applied {
        from: TransactionStatus,
        to: TransactionStatus,
    },
    /// Already in the reported status
    Duplicate,
    /// Reported status would move the transaction backwards
    Ignored,
    UnknownTransaction,
}

/// Generic process / status / refund / webhook path over `PaymentTransaction`.
#[derive(Clone)]
pub struct PaymentTransactionService {
    transactions: Arc<dyn TransactionStore>,
    registry: Arc<ProviderRegistry>,
    default_currency: String,
}

impl PaymentTransactionService {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        registry: Arc<ProviderRegistry>,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            transactions,
            registry,
            default_currency: default_currency.into(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    async fn load(&self, id: &str) -> Result<payment_transaction::Model, ServiceError> {
        self.transactions
            .get_transaction(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", id)))
    }

    /// Moves `current` to `next`; `Ok(false)` when someone else moved it first.
    async fn advance(
        &self,
        current: &payment_transaction::Model,
        next: TransactionStatus,
        provider_reference: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<bool, ServiceError> {
        if !current.status.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "payment {} cannot move from {:?} to {:?}",
                current.id, current.status, next
            )));
        }
        self.transactions
            .transition(
                &current.id,
                current.status,
                TransactionUpdate {
                    status: next,
                    provider_reference,
                    failure_reason,
                },
            )
            .await
    }

    /// Creates a `processing` transaction and settles it as far as the
    /// active adapter allows without a webhook.
    #[instrument(skip(self, request, context), fields(method = request.payment_method.as_str(), amount = %request.amount))]
    pub async fn process_payment(
        &self,
        request: ProcessPaymentRequest,
        context: RequestContext,
    ) -> Result<TransactionView, ServiceError> {
        request.validate()?;
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError("amount must be positive".to_string()));
        }

        let provider = self.registry.active();
        let now = Utc::now();
        let currency = request
            .currency
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.default_currency.clone());
        let created = self
            .transactions
            .create_transaction(payment_transaction::Model {
                id: new_transaction_id(),
                status: TransactionStatus::Processing,
                amount: request.amount,
                currency: currency.clone(),
                payment_method: request.payment_method.as_str().to_string(),
                installment_count: i32::from(request.installment_count),
                provider: provider.kind().as_str().to_string(),
                provider_reference: None,
                metadata: Some(json!({
                    "clientIp": context.client_ip,
                    "userAgent": context.user_agent,
                })),
                failure_reason: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(transaction_id = %created.id, provider = %provider.kind(), "payment transaction created");

        if request.payment_method == PaymentMethod::BankTransfer {
            self.advance(&created, TransactionStatus::WaitingConfirmation, None, None)
                .await?;
            return Ok(self.load(&created.id).await?.into());
        }

        let init = provider
            .initialize_payment(&PaymentRequest {
                reference: created.id.clone(),
                amount: request.amount,
                currency,
                payment_method: request.payment_method,
                installment_count: request.installment_count,
                customer: request.user,
                items: request.cart_items,
                client_ip: context.client_ip,
            })
            .await;

        let init = match init {
            Ok(init) => init,
            Err(e) => {
                self.advance(&created, TransactionStatus::Failed, None, Some(e.to_string()))
                    .await?;
                return Err(e);
            }
        };

        let payment_url = init.payment_url.clone();
        match (init.success, init.payment_url.is_some()) {
            // Waiting for the provider's webhook
            (true, true) => {}
            (true, false) => {
                self.advance(&created, TransactionStatus::Completed, init.transaction_id, None)
                    .await?;
            }
            (false, _) => {
                warn!(error = ?init.error, "provider declined payment initialization");
                self.advance(&created, TransactionStatus::Failed, None, init.error)
                    .await?;
            }
        }

        let mut view: TransactionView = self.load(&created.id).await?.into();
        view.payment_url = payment_url;
        Ok(view)
    }

    pub async fn get_payment_status(&self, id: &str) -> Result<TransactionView, ServiceError> {
        Ok(self.load(id).await?.into())
    }

    /// Refunds a `completed` transaction, fully or partially.
    #[instrument(skip(self))]
    pub async fn refund_payment(
        &self,
        id: &str,
        amount: Option<Decimal>,
    ) -> Result<TransactionView, ServiceError> {
        let current = self.load(id).await?;
        if current.status != TransactionStatus::Completed {
            return Err(ServiceError::InvalidStatus(format!(
                "only completed payments can be refunded, {} is {:?}",
                id, current.status
            )));
        }
        let amount = amount.unwrap_or(current.amount);
        if amount <= Decimal::ZERO || amount > current.amount {
            return Err(ServiceError::ValidationError(format!(
                "refund amount must be between 0 and {}",
                current.amount
            )));
        }

        let kind: ProviderKind = current.provider.parse()?;
        let provider = self.registry.get(kind).ok_or_else(|| {
            ServiceError::ConfigurationError(format!("no adapter for provider {}", kind))
        })?;
        let provider_id = current
            .provider_reference
            .clone()
            .unwrap_or_else(|| current.id.clone());
        let refund = provider.refund_payment(&provider_id, amount).await?;
        if !refund.success {
            return Err(ServiceError::UpstreamError(
                refund
                    .error
                    .unwrap_or_else(|| format!("{} refused the refund", kind)),
            ));
        }

        if !self
            .advance(&current, TransactionStatus::Refunded, None, None)
            .await?
        {
            warn!(transaction_id = %id, "transaction changed while the refund was in flight");
        }
        counter!("storefront_payments.refunds.completed", 1);
        Ok(self.load(id).await?.into())
    }

    /// Applies a verified webhook record. Forward moves only; repeats are no-ops.
    #[instrument(skip(self, record), fields(transaction_id = %record.transaction_id, provider = %record.provider))]
    pub async fn apply_webhook(
        &self,
        record: &WebhookRecord,
    ) -> Result<TransactionWebhookOutcome, ServiceError> {
        let Some(current) = self.transactions.get_transaction(&record.transaction_id).await? else {
            warn!("webhook for an unknown transaction");
            return Ok(TransactionWebhookOutcome::UnknownTransaction);
        };

        let target = record.status.transaction_status();
        if current.status == target {
            return Ok(TransactionWebhookOutcome::Duplicate);
        }
        if !current.status.can_transition_to(target) {
            warn!(from = ?current.status, to = ?target, "webhook would move the transaction backwards");
            return Ok(TransactionWebhookOutcome::Ignored);
        }
        if target == TransactionStatus::Completed {
            if let Some(received) = record.amount_minor {
                let expected = to_minor_units(current.amount)?;
                if expected != received {
                    counter!("storefront_payments.webhooks.amount_mismatch", 1);
                    return Err(ServiceError::AmountMismatch {
                        reference: current.id.clone(),
                        expected,
                        received,
                    });
                }
            }
        }

        let moved = self
            .transactions
            .transition(
                &current.id,
                current.status,
                TransactionUpdate {
                    status: target,
                    provider_reference: record.reference.clone(),
                    failure_reason: record.error.clone(),
                },
            )
            .await?;
        if !moved {
            return Ok(TransactionWebhookOutcome::Duplicate);
        }
        info!(from = ?current.status, to = ?target, "transaction updated from webhook");
        Ok(TransactionWebhookOutcome::Applied {
            from: current.status,
            to: target,
        })
    }

    /// Authenticates and applies a JSON webhook named by its provider header.
    pub async fn handle_webhook(
        &self,
        provider: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<TransactionWebhookOutcome, ServiceError> {
        let provider = provider
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ServiceError::BadRequest("x-payment-provider header is required".to_string()))?;
        let kind: ProviderKind = provider.parse()?;
        let adapter = self
            .registry
            .get(kind)
            .ok_or_else(|| ServiceError::BadRequest(format!("unsupported provider {}", kind)))?;

        let signature = signature.unwrap_or_default();
        if !adapter.verify_webhook_signature(body, signature) {
            counter!("storefront_payments.webhooks.rejected", 1, "provider" => kind.as_str());
            warn!(provider = %kind, "webhook signature verification failed");
            return Err(ServiceError::AuthenticationError(
                "invalid webhook signature".to_string(),
            ));
        }

        let record = adapter.parse_webhook_data(body)?;
        self.apply_webhook(&record).await
    }
}
