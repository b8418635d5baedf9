use crate::config::NotificationConfig;
use crate::entities::order;
use crate::errors::ServiceError;
use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Payload handed to the mail service after an order is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: Uuid,
    pub payment_reference: Option<String>,
    pub payment_method: String,
    pub email: String,
    pub customer_name: String,
    pub total: Decimal,
    pub currency: String,
    pub items: Value,
}

impl OrderConfirmation {
    pub fn from_order(order: &order::Model) -> Self {
        let field = |key: &str| {
            order
                .user
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        let customer_name = format!("{} {}", field("firstName"), field("lastName"))
            .trim()
            .to_string();
        Self {
            order_id: order.id,
            payment_reference: order.payment_reference.clone(),
            payment_method: order.payment_method.clone(),
            email: field("email"),
            customer_name,
            total: order.total,
            currency: order.currency.clone(),
            items: order.products.clone(),
        }
    }
}

/// Fire-and-forget "send order confirmation" collaborator.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), ServiceError>;
}

/// Posts confirmations as JSON to the mail service.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::ConfigurationError(format!("notifier client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl OrderNotifier for HttpNotifier {
    #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id))]
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(confirmation)
            .send()
            .await?;
        if response.status().is_success() {
            info!("order confirmation dispatched");
            Ok(())
        } else {
            Err(ServiceError::UpstreamError(format!(
                "mail service responded with HTTP {}",
                response.status().as_u16()
            )))
        }
    }
}

/// Used when no mail endpoint is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), ServiceError> {
        info!(
            order_id = %confirmation.order_id,
            reference = ?confirmation.payment_reference,
            email = %confirmation.email,
            "order confirmation (no mail endpoint configured)"
        );
        Ok(())
    }
}

pub fn notifier_from_config(
    config: &NotificationConfig,
) -> Result<Arc<dyn OrderNotifier>, ServiceError> {
    match config
        .order_confirmation_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
    {
        Some(url) => Ok(Arc::new(HttpNotifier::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Sends the confirmation inline. Failures are logged and never reach the caller.
pub async fn notify_order_created(notifier: &dyn OrderNotifier, order: &order::Model) {
    let confirmation = OrderConfirmation::from_order(order);
    if let Err(e) = notifier.send_order_confirmation(&confirmation).await {
        counter!("storefront_payments.notifications.failed", 1);
        warn!(error = %e, order_id = %order.id, "order confirmation could not be sent");
    }
}
