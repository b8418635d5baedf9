//! Payment provider adapters behind one trait, selected by a static lookup.

pub mod generic;
pub mod iyzico;
pub mod papara;
pub mod paytr;

use crate::config::PaymentsConfig;
use crate::entities::TransactionStatus;
use crate::errors::ServiceError;
use crate::models::{CustomerSnapshot, LineItem, PaymentMethod};
use crate::webhooks::WebhookRecord;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use utoipa::ToSchema;

pub use generic::JsonWebhookProvider;
pub use iyzico::IyzicoProvider;
pub use papara::PaparaProvider;
pub use paytr::{PaytrProvider, PaytrToken, PaytrTokenRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Paytr,
    Iyzico,
    Papara,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Paytr, ProviderKind::Iyzico, ProviderKind::Papara];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Paytr => "paytr",
            ProviderKind::Iyzico => "iyzico",
            ProviderKind::Papara => "papara",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paytr" => Ok(ProviderKind::Paytr),
            "iyzico" => Ok(ProviderKind::Iyzico),
            "papara" => Ok(ProviderKind::Papara),
            other => Err(ServiceError::BadRequest(format!(
                "unknown payment provider '{}'",
                other
            ))),
        }
    }
}

/// Everything an adapter needs to start a payment.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Our reference; PayTR calls it `merchant_oid`
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub installment_count: u8,
    pub customer: CustomerSnapshot,
    pub items: Vec<LineItem>,
    pub client_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PaymentInitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Hosted payment page; absent when the payment completed without a redirect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentInitResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPaymentStatus {
    pub status: TransactionStatus,
    pub amount: Option<Decimal>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RefundResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Uniform contract every provider adapter implements, enabled or not.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn is_enabled(&self) -> bool;

    async fn initialize_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentInitResponse, ServiceError>;

    async fn get_payment_status(
        &self,
        transaction_id: &str,
    ) -> Result<ProviderPaymentStatus, ServiceError>;

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<RefundResponse, ServiceError>;

    /// Must fail closed when the adapter has no secret.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;

    fn parse_webhook_data(&self, payload: &[u8]) -> Result<WebhookRecord, ServiceError>;
}

/// All adapters, keyed by kind, with the single enabled one singled out.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
    active: Arc<dyn PaymentProvider>,
    paytr: Arc<PaytrProvider>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("active", &self.active.kind())
            .finish()
    }
}

impl ProviderRegistry {
    /// Builds every adapter with one shared HTTP client.
    pub fn from_config(config: &PaymentsConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ServiceError::ConfigurationError(format!("http client: {}", e)))?;

        let paytr = Arc::new(PaytrProvider::new(config.paytr.clone(), client.clone()));
        let iyzico: Arc<dyn PaymentProvider> =
            Arc::new(IyzicoProvider::iyzico(config.iyzico.clone()));
        let papara: Arc<dyn PaymentProvider> =
            Arc::new(PaparaProvider::papara(config.papara.clone()));

        Self::new(paytr, vec![iyzico, papara])
    }

    /// Fails unless exactly one adapter reports itself enabled.
    pub fn new(
        paytr: Arc<PaytrProvider>,
        others: Vec<Arc<dyn PaymentProvider>>,
    ) -> Result<Self, ServiceError> {
        let mut providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>> = HashMap::new();
        let paytr_dyn: Arc<dyn PaymentProvider> = paytr.clone();
        providers.insert(ProviderKind::Paytr, paytr_dyn);
        for provider in others {
            providers.insert(provider.kind(), provider);
        }

        let mut enabled: Vec<Arc<dyn PaymentProvider>> = providers
            .values()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect();
        if enabled.len() != 1 {
            let mut names: Vec<&str> = enabled.iter().map(|p| p.kind().as_str()).collect();
            names.sort_unstable();
            return Err(ServiceError::ConfigurationError(format!(
                "exactly one payment provider must be enabled, found {:?}",
                names
            )));
        }
        let active = enabled.remove(0);
        info!(provider = %active.kind(), "payment provider selected");

        Ok(Self {
            providers,
            active,
            paytr,
        })
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn active(&self) -> Arc<dyn PaymentProvider> {
        self.active.clone()
    }

    pub fn active_kind(&self) -> ProviderKind {
        self.active.kind()
    }

    /// Typed handle for the iFrame token and callback flows.
    pub fn paytr(&self) -> Arc<PaytrProvider> {
        self.paytr.clone()
    }
}
