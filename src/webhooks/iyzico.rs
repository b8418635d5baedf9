use super::{require_id, WebhookPayload, WebhookRecord, WebhookStatus};
use crate::errors::ServiceError;
use crate::models::to_minor_units;
use crate::providers::ProviderKind;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IyzicoWebhook {
    /// Set to our transaction id when the payment is initialized
    pub payment_conversation_id: String,
    pub status: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub iyzi_reference_code: Option<String>,
    #[serde(default)]
    pub iyzi_event_type: Option<String>,
    #[serde(default)]
    pub paid_price: Option<Decimal>,
    #[serde(default)]
    pub error_message: Option<String>,
}

fn map_status(raw: &str) -> WebhookStatus {
    match raw.to_ascii_uppercase().as_str() {
        "SUCCESS" => WebhookStatus::Success,
        "FAILURE" | "FAILED" => WebhookStatus::Failed,
        "REFUND" | "REFUNDED" => WebhookStatus::Refunded,
        "CANCEL" | "CANCELLED" => WebhookStatus::Cancelled,
        _ => WebhookStatus::Pending,
    }
}

impl WebhookPayload for IyzicoWebhook {
    const PROVIDER: ProviderKind = ProviderKind::Iyzico;

    fn into_record(self) -> Result<WebhookRecord, ServiceError> {
        let amount_minor = self.paid_price.map(to_minor_units).transpose()?;
        Ok(WebhookRecord {
            provider: Self::PROVIDER,
            transaction_id: require_id(self.payment_conversation_id, "paymentConversationId")?,
            status: map_status(&self.status),
            amount_minor,
            reference: self.payment_id.or(self.iyzi_reference_code),
            error: self.error_message,
        })
    }
}
