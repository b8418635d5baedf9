use super::generic::JsonWebhookProvider;
use crate::config::GenericProviderConfig;
use crate::signature::{DigestEncoding, HashAlgorithm, WebhookScheme};
use crate::webhooks::PaparaWebhook;

/// Papara signs webhook bodies with HMAC-SHA1, hex encoded.
pub const PAPARA_WEBHOOK_SCHEME: WebhookScheme =
    WebhookScheme::new(HashAlgorithm::Sha1, DigestEncoding::Hex);

pub type PaparaProvider = JsonWebhookProvider<PaparaWebhook>;

impl PaparaProvider {
    pub fn papara(config: GenericProviderConfig) -> Self {
        Self::new(config, PAPARA_WEBHOOK_SCHEME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::PaymentProvider;
    use rust_decimal_macros::dec;

    #[test]
    fn sha256_signature_does_not_pass_for_papara() {
        let provider = PaparaProvider::papara(GenericProviderConfig {
            webhook_secret: Some("whsec".into()),
            ..Default::default()
        });
        let body = br#"{"id":"p1","referenceId":"txn_1","status":1}"#;
        let sha1 = PAPARA_WEBHOOK_SCHEME.sign(body, "whsec").unwrap();
        let sha256 = crate::providers::iyzico::IYZICO_WEBHOOK_SCHEME
            .sign(body, "whsec")
            .unwrap();
        assert!(provider.verify_webhook_signature(body, &sha1));
        assert!(!provider.verify_webhook_signature(body, &sha256));
    }

    #[tokio::test]
    async fn sandbox_refund_echoes_amount() {
        let provider = PaparaProvider::papara(GenericProviderConfig {
            enabled: true,
            sandbox: true,
            api_key: Some("k".into()),
            api_secret: Some("s".into()),
            base_url: Some("https://merchant-api.test.papara.com".into()),
            webhook_url: Some("https://shop.example.com/api/v1/payments/webhook".into()),
            return_url: Some("https://shop.example.com/checkout/return".into()),
            ..Default::default()
        });
        let refund = provider.refund_payment("txn_1", dec!(10)).await.unwrap();
        assert!(refund.success);
        assert_eq!(refund.amount, Some(dec!(10)));
    }
}
