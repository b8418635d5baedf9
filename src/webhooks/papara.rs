use super::{require_id, WebhookPayload, WebhookRecord, WebhookStatus};
use crate::errors::ServiceError;
use crate::models::to_minor_units;
use crate::providers::ProviderKind;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Papara reports payment status as an integer: 0 pending, 1 completed, 2 refunded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaparaWebhook {
    pub id: String,
    /// Our transaction id
    pub reference_id: String,
    pub status: i32,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl WebhookPayload for PaparaWebhook {
    const PROVIDER: ProviderKind = ProviderKind::Papara;

    fn into_record(self) -> Result<WebhookRecord, ServiceError> {
        let status = match (self.status, self.error_code) {
            (_, Some(code)) if code != 0 => WebhookStatus::Failed,
            (1, _) => WebhookStatus::Success,
            (2, _) => WebhookStatus::Refunded,
            (0, _) => WebhookStatus::Pending,
            _ => WebhookStatus::Failed,
        };
        Ok(WebhookRecord {
            provider: Self::PROVIDER,
            transaction_id: require_id(self.reference_id, "referenceId")?,
            status,
            amount_minor: self.amount.map(to_minor_units).transpose()?,
            reference: Some(self.id),
            error: self.error_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::GenericWebhook;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"id":"p1","referenceId":"txn_1","status":1,"amount":99.9}"#, WebhookStatus::Success)]
    #[case(r#"{"id":"p1","referenceId":"txn_1","status":0}"#, WebhookStatus::Pending)]
    #[case(r#"{"id":"p1","referenceId":"txn_1","status":2}"#, WebhookStatus::Refunded)]
    #[case(r#"{"id":"p1","referenceId":"txn_1","status":1,"errorCode":997,"errorMessage":"declined"}"#, WebhookStatus::Failed)]
    fn status_codes(#[case] body: &str, #[case] expected: WebhookStatus) {
        let record = GenericWebhook::<PaparaWebhook>::parse(body.as_bytes())
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(record.status, expected);
        assert_eq!(record.transaction_id, "txn_1");
    }

    #[test]
    fn blank_reference_is_rejected() {
        let body = br#"{"id":"p1","referenceId":"  ","status":1}"#;
        assert!(GenericWebhook::<PaparaWebhook>::parse(body)
            .unwrap()
            .into_record()
            .is_err());
    }
}
