use super::notifications::{notify_order_created, OrderNotifier};
use super::orders::{OrderService, OrderView};
use super::references::{new_bank_transfer_reference, validate_reference};
use crate::errors::ServiceError;
use crate::models::{CustomerSnapshot, LineItem, PaymentMethod};
use crate::repositories::NewOrder;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user: CustomerSnapshot,
    #[serde(default)]
    pub cart_items: Vec<LineItem>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "150.00")]
    pub total_amount: Option<Decimal>,
}

impl BankTransferRequest {
    fn validate(&self) -> Result<Decimal, ServiceError> {
        if self.user.full_name().is_empty() {
            return Err(ServiceError::ValidationError("customer name is required".to_string()));
        }
        if self.user.email.trim().is_empty() {
            return Err(ServiceError::ValidationError("email is required".to_string()));
        }
        let total = self
            .total_amount
            .filter(|t| *t > Decimal::ZERO)
            .ok_or_else(|| ServiceError::ValidationError("totalAmount must be positive".to_string()))?;
        if self.cart_items.is_empty() {
            return Err(ServiceError::ValidationError("cartItems must not be empty".to_string()));
        }
        if let Some(id) = self.session_id.as_deref() {
            validate_reference(id)?;
        }
        Ok(total)
    }
}

/// Orders paid by wire transfer. No provider is involved; the order is
/// recorded straight away and reconciled against the bank statement later.
#[derive(Clone)]
pub struct BankTransferService {
    orders: OrderService,
    notifier: Arc<dyn OrderNotifier>,
    currency: String,
}

impl BankTransferService {
    pub fn new(
        orders: OrderService,
        notifier: Arc<dyn OrderNotifier>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            notifier,
            currency: currency.into(),
        }
    }

    #[instrument(skip(self, request), fields(session_id = ?request.session_id))]
    pub async fn create_order(&self, request: BankTransferRequest) -> Result<OrderView, ServiceError> {
        let total = request.validate()?;
        let reference = request
            .session_id
            .clone()
            .unwrap_or_else(new_bank_transfer_reference);
        let status_id = self.orders.received_status_id().await?;

        let order = self
            .orders
            .create(NewOrder {
                products: serde_json::to_value(&request.cart_items)?,
                status_id,
                total,
                currency: self.currency.clone(),
                user: serde_json::to_value(&request.user)?,
                payment_method: PaymentMethod::BankTransfer.as_str().to_string(),
                payment_reference: Some(reference.clone()),
                payment_provider_reference: Some(reference.clone()),
            })
            .await?;
        counter!("storefront_payments.orders.bank_transfer", 1);
        info!(order_id = %order.id, %reference, "bank transfer order recorded");

        notify_order_created(self.notifier.as_ref(), &order).await;
        self.orders.view(order).await
    }
}
