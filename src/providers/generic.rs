use super::{
    PaymentInitResponse, PaymentProvider, PaymentRequest, ProviderKind, ProviderPaymentStatus,
    RefundResponse,
};
use crate::config::GenericProviderConfig;
use crate::entities::TransactionStatus;
use crate::errors::ServiceError;
use crate::signature::WebhookScheme;
use crate::webhooks::{GenericWebhook, WebhookPayload, WebhookRecord};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::marker::PhantomData;
use tracing::{info, instrument};

/// Adapter for a provider that signs JSON webhooks with an HMAC over the body.
///
/// Only the webhook half talks to the outside world. Checkout calls succeed in
/// sandbox mode without a redirect and are refused otherwise.
pub struct JsonWebhookProvider<P> {
    config: GenericProviderConfig,
    scheme: WebhookScheme,
    _payload: PhantomData<fn() -> P>,
}

impl<P: WebhookPayload> JsonWebhookProvider<P> {
    pub fn new(config: GenericProviderConfig, scheme: WebhookScheme) -> Self {
        Self {
            config,
            scheme,
            _payload: PhantomData,
        }
    }

    fn ensure_usable(&self) -> Result<(), ServiceError> {
        if !self.config.enabled {
            return Err(ServiceError::ConfigurationError(format!(
                "{} is not enabled",
                P::PROVIDER
            )));
        }
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !present(&self.config.api_key) || !present(&self.config.api_secret) {
            return Err(ServiceError::ConfigurationError(format!(
                "{} API credentials are not set",
                P::PROVIDER
            )));
        }
        let missing: Vec<&str> = [
            ("base_url", &self.config.base_url),
            ("webhook_url", &self.config.webhook_url),
            ("return_url", &self.config.return_url),
        ]
        .into_iter()
        .filter(|(_, value)| !present(value))
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ServiceError::ConfigurationError(format!(
                "{} {} not set",
                P::PROVIDER,
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn unavailable(&self, what: &str) -> String {
        format!("{} {} is only available in sandbox mode", P::PROVIDER, what)
    }
}

#[async_trait]
impl<P> PaymentProvider for JsonWebhookProvider<P>
where
    P: WebhookPayload + Send + Sync + 'static,
{
    fn kind(&self) -> ProviderKind {
        P::PROVIDER
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[instrument(skip(self, request), fields(reference = %request.reference))]
    async fn initialize_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentInitResponse, ServiceError> {
        self.ensure_usable()?;
        if !self.config.sandbox {
            return Ok(PaymentInitResponse::failed(self.unavailable("checkout")));
        }
        info!(provider = %P::PROVIDER, amount = %request.amount, "sandbox payment accepted");
        Ok(PaymentInitResponse {
            success: true,
            transaction_id: Some(request.reference.clone()),
            payment_url: None,
            error: None,
        })
    }

    async fn get_payment_status(
        &self,
        transaction_id: &str,
    ) -> Result<ProviderPaymentStatus, ServiceError> {
        self.ensure_usable()?;
        if !self.config.sandbox {
            return Err(ServiceError::UpstreamError(self.unavailable("status inquiry")));
        }
        Ok(ProviderPaymentStatus {
            status: TransactionStatus::Completed,
            amount: None,
            message: Some(format!("sandbox status for {}", transaction_id)),
        })
    }

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<RefundResponse, ServiceError> {
        self.ensure_usable()?;
        if !self.config.sandbox {
            return Ok(RefundResponse {
                success: false,
                error: Some(self.unavailable("refund")),
                ..Default::default()
            });
        }
        Ok(RefundResponse {
            success: true,
            refund_id: Some(format!("{}-refund", transaction_id)),
            amount: Some(amount),
            error: None,
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        self.scheme
            .verify(payload, self.config.webhook_secret.as_deref(), signature)
    }

    fn parse_webhook_data(&self, payload: &[u8]) -> Result<WebhookRecord, ServiceError> {
        GenericWebhook::<P>::parse(payload)?.into_record()
    }
}
