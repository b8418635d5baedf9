//! Inbound provider notifications, parsed into one canonical record before any
//! reconciliation logic sees them.

pub mod iyzico;
pub mod papara;
pub mod paytr;

use crate::entities::TransactionStatus;
use crate::errors::ServiceError;
use crate::providers::ProviderKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use iyzico::IyzicoWebhook;
pub use papara::PaparaWebhook;
pub use paytr::PaytrCallback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Success,
    Failed,
    Pending,
    Refunded,
    Cancelled,
}

impl WebhookStatus {
    pub fn transaction_status(&self) -> TransactionStatus {
        match self {
            WebhookStatus::Success => TransactionStatus::Completed,
            WebhookStatus::Failed => TransactionStatus::Failed,
            WebhookStatus::Pending => TransactionStatus::Processing,
            WebhookStatus::Refunded => TransactionStatus::Refunded,
            WebhookStatus::Cancelled => TransactionStatus::Cancelled,
        }
    }
}

/// Provider-neutral view of a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookRecord {
    pub provider: ProviderKind,
    /// Our identifier: checkout session id for PayTR, transaction id otherwise
    pub transaction_id: String,
    pub status: WebhookStatus,
    /// Charged amount in minor units, when the provider reports one
    pub amount_minor: Option<i64>,
    /// Provider-side reference
    pub reference: Option<String>,
    pub error: Option<String>,
}

/// A JSON webhook body of one specific provider.
pub trait WebhookPayload: DeserializeOwned {
    const PROVIDER: ProviderKind;

    fn into_record(self) -> Result<WebhookRecord, ServiceError>;
}

/// JSON webhook tagged with the provider it came from.
#[derive(Debug, Clone)]
pub struct GenericWebhook<P> {
    pub payload: P,
}

impl<P: WebhookPayload> GenericWebhook<P> {
    pub fn parse(body: &[u8]) -> Result<Self, ServiceError> {
        let payload = serde_json::from_slice(body).map_err(|e| {
            ServiceError::BadRequest(format!("invalid {} webhook body: {}", P::PROVIDER, e))
        })?;
        Ok(Self { payload })
    }

    pub fn provider(&self) -> ProviderKind {
        P::PROVIDER
    }

    pub fn into_record(self) -> Result<WebhookRecord, ServiceError> {
        self.payload.into_record()
    }
}

fn require_id(value: String, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ServiceError::BadRequest(format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn statuses_map_onto_transaction_statuses() {
        assert_eq!(
            WebhookStatus::Success.transaction_status(),
            TransactionStatus::Completed
        );
        assert_eq!(
            WebhookStatus::Pending.transaction_status(),
            TransactionStatus::Processing
        );
    }

    #[test]
    fn generic_webhook_rejects_malformed_json() {
        let result = GenericWebhook::<IyzicoWebhook>::parse(b"{not json");
        assert_matches!(result, Err(ServiceError::BadRequest(msg)) if msg.contains("iyzico"));
    }
}
