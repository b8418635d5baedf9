use super::{require_id, WebhookRecord, WebhookStatus};
use crate::errors::ServiceError;
use crate::providers::ProviderKind;
use serde::Deserialize;

/// Form body PayTR posts to the notification URL once a payment settles.
///
/// Values stay as sent; the hash covers their exact string form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaytrCallback {
    pub merchant_oid: String,
    pub status: String,
    /// Charged amount in minor units
    pub total_amount: String,
    pub hash: String,
    #[serde(default)]
    pub failed_reason_code: Option<String>,
    #[serde(default)]
    pub failed_reason_msg: Option<String>,
    #[serde(default)]
    pub test_mode: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Basket amount before installment interest
    #[serde(default)]
    pub payment_amount: Option<String>,
}

impl PaytrCallback {
    pub fn from_form(body: &[u8]) -> Result<Self, ServiceError> {
        serde_urlencoded::from_bytes(body)
            .map_err(|e| ServiceError::BadRequest(format!("invalid PayTR callback form: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn failure_reason(&self) -> Option<String> {
        match (&self.failed_reason_code, &self.failed_reason_msg) {
            (Some(code), Some(msg)) => Some(format!("{}: {}", code, msg)),
            (None, Some(msg)) => Some(msg.clone()),
            (Some(code), None) => Some(code.clone()),
            (None, None) => None,
        }
    }

    pub fn into_record(self) -> Result<WebhookRecord, ServiceError> {
        let amount_minor = self.total_amount.trim().parse::<i64>().map_err(|_| {
            ServiceError::BadRequest(format!(
                "total_amount '{}' is not an integer amount",
                self.total_amount
            ))
        })?;
        let status = if self.is_success() {
            WebhookStatus::Success
        } else {
            WebhookStatus::Failed
        };
        let error = self.failure_reason();

        Ok(WebhookRecord {
            provider: ProviderKind::Paytr,
            transaction_id: require_id(self.merchant_oid, "merchant_oid")?,
            status,
            amount_minor: Some(amount_minor),
            reference: None,
            error,
        })
    }
}
