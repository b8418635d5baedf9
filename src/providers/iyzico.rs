use super::generic::JsonWebhookProvider;
use crate::config::GenericProviderConfig;
use crate::signature::{DigestEncoding, HashAlgorithm, WebhookScheme};
use crate::webhooks::IyzicoWebhook;

/// iyzico signs webhook bodies with HMAC-SHA256, hex encoded.
pub const IYZICO_WEBHOOK_SCHEME: WebhookScheme =
    WebhookScheme::new(HashAlgorithm::Sha256, DigestEncoding::Hex);

pub type IyzicoProvider = JsonWebhookProvider<IyzicoWebhook>;

impl IyzicoProvider {
    pub fn iyzico(config: GenericProviderConfig) -> Self {
        Self::new(config, IYZICO_WEBHOOK_SCHEME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use crate::models::{CustomerSnapshot, PaymentMethod};
    use crate::providers::{PaymentProvider, PaymentRequest, ProviderKind};
    use crate::webhooks::WebhookStatus;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn config(enabled: bool, sandbox: bool) -> GenericProviderConfig {
        GenericProviderConfig {
            enabled,
            sandbox,
            api_key: Some("api-key".into()),
            api_secret: Some("api-secret".into()),
            webhook_secret: Some("whsec".into()),
            base_url: Some("https://sandbox-api.iyzipay.com".into()),
            webhook_url: Some("https://shop.example.com/api/v1/payments/webhook".into()),
            return_url: Some("https://shop.example.com/checkout/return".into()),
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            reference: "txn_1".into(),
            amount: dec!(99.90),
            currency: "TL".into(),
            payment_method: PaymentMethod::CreditCard,
            installment_count: 1,
            customer: CustomerSnapshot::default(),
            items: vec![],
            client_ip: "127.0.0.1".into(),
        }
    }

    #[test]
    fn verifies_hex_sha256_over_raw_body() {
        let provider = IyzicoProvider::iyzico(config(false, false));
        let body = br#"{"paymentConversationId":"txn_1","status":"SUCCESS"}"#;
        let signature = IYZICO_WEBHOOK_SCHEME.sign(body, "whsec").unwrap();
        assert_eq!(provider.kind(), ProviderKind::Iyzico);
        assert!(provider.verify_webhook_signature(body, &signature));
        assert!(!provider.verify_webhook_signature(body, "deadbeef"));

        let record = provider.parse_webhook_data(body).unwrap();
        assert_eq!(record.status, WebhookStatus::Success);
    }

    #[test]
    fn missing_webhook_secret_fails_closed() {
        let mut cfg = config(true, true);
        cfg.webhook_secret = None;
        let provider = IyzicoProvider::iyzico(cfg);
        let body = b"{}";
        let signature = IYZICO_WEBHOOK_SCHEME.sign(body, "whsec").unwrap();
        assert!(!provider.verify_webhook_signature(body, &signature));
    }

    #[tokio::test]
    async fn disabled_adapter_refuses_checkout() {
        let provider = IyzicoProvider::iyzico(config(false, true));
        assert_matches!(
            provider.initialize_payment(&request()).await,
            Err(ServiceError::ConfigurationError(_))
        );
    }

    #[tokio::test]
    async fn sandbox_checkout_completes_without_redirect() {
        let provider = IyzicoProvider::iyzico(config(true, true));
        let response = provider.initialize_payment(&request()).await.unwrap();
        assert!(response.success);
        assert_eq!(response.transaction_id.as_deref(), Some("txn_1"));
        assert!(response.payment_url.is_none());
    }

    #[tokio::test]
    async fn live_checkout_reports_unavailable() {
        let provider = IyzicoProvider::iyzico(config(true, false));
        let response = provider.initialize_payment(&request()).await.unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().contains("sandbox"));
    }

    #[tokio::test]
    async fn missing_urls_fail_closed() {
        let mut cfg = config(true, true);
        cfg.webhook_url = None;
        cfg.return_url = Some(String::new());
        let provider = IyzicoProvider::iyzico(cfg);
        assert_matches!(
            provider.initialize_payment(&request()).await,
            Err(ServiceError::ConfigurationError(msg)) if msg == "iyzico webhook_url, return_url not set"
        );
        assert_matches!(
            provider.refund_payment("txn_1", dec!(1)).await,
            Err(ServiceError::ConfigurationError(_))
        );
    }
}
