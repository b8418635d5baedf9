use super::{
    PaymentInitResponse, PaymentProvider, PaymentRequest, ProviderKind, ProviderPaymentStatus,
    RefundResponse,
};
use crate::config::PaytrConfig;
use crate::entities::TransactionStatus;
use crate::errors::ServiceError;
use crate::models::{format_major, to_minor_units, CustomerSnapshot, LineItem};
use crate::signature::paytr::flag;
use crate::signature::{PaytrSigner, TokenSignature};
use crate::webhooks::{PaytrCallback, WebhookRecord};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

const TOKEN_PATH: &str = "odeme/api/get-token";
const IFRAME_PATH: &str = "odeme/guvenli";
const STATUS_PATH: &str = "odeme/durum-sorgu";
const REFUND_PATH: &str = "odeme/iade";

/// Signed inputs for one iFrame token call.
#[derive(Debug, Clone, PartialEq)]
pub struct PaytrTokenRequest {
    pub merchant_oid: String,
    pub email: String,
    /// Minor units
    pub payment_amount: i64,
    /// Base64 of the JSON basket
    pub user_basket: String,
    pub user_ip: String,
    pub user_name: String,
    pub user_address: String,
    pub user_phone: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaytrToken {
    pub token: String,
    pub iframe_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenApiResponse {
    status: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusApiResponse {
    status: String,
    #[serde(default)]
    payment_amount: Option<String>,
    #[serde(default)]
    payment_total: Option<String>,
    #[serde(default)]
    err_no: Option<String>,
    #[serde(default)]
    err_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundApiResponse {
    status: String,
    #[serde(default)]
    return_amount: Option<String>,
    #[serde(default)]
    err_no: Option<String>,
    #[serde(default)]
    err_msg: Option<String>,
}

fn api_error(err_no: Option<String>, err_msg: Option<String>) -> String {
    match (err_no, err_msg) {
        (Some(no), Some(msg)) => format!("{} ({})", msg, no),
        (None, Some(msg)) => msg,
        (Some(no), None) => format!("error {}", no),
        (None, None) => "unknown PayTR error".to_string(),
    }
}

/// `[[name, "unit price", quantity], ...]` as JSON, then base64.
pub fn encode_basket(items: &[LineItem]) -> Result<String, ServiceError> {
    let rows: Vec<serde_json::Value> = items
        .iter()
        .map(|item| {
            serde_json::json!([item.name, format_major(item.unit_price), item.quantity])
        })
        .collect();
    let json = serde_json::to_string(&rows)?;
    Ok(general_purpose::STANDARD.encode(json))
}

/// PayTR iFrame API adapter: token issuance, callback verification, status
/// inquiry and refunds.
#[derive(Clone)]
pub struct PaytrProvider {
    config: PaytrConfig,
    signer: PaytrSigner,
    client: reqwest::Client,
}

impl std::fmt::Debug for PaytrProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaytrProvider")
            .field("enabled", &self.config.enabled)
            .field("merchant_id", &self.config.merchant_id)
            .field("api_base_url", &self.config.api_base_url)
            .field("signer", &self.signer)
            .finish()
    }
}

impl PaytrProvider {
    pub fn new(config: PaytrConfig, client: reqwest::Client) -> Self {
        let signer = PaytrSigner::new(config.merchant_key.clone(), config.merchant_salt.clone());
        Self {
            config,
            signer,
            client,
        }
    }

    pub fn signer(&self) -> &PaytrSigner {
        &self.signer
    }

    fn merchant_id(&self) -> Result<&str, ServiceError> {
        self.config
            .merchant_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ServiceError::ConfigurationError("PayTR merchant id is not set".to_string())
            })
    }

    /// `merchant_ok_url` and `merchant_fail_url`; PayTR sends the customer back to one of them.
    fn return_urls(&self) -> Result<(&str, &str), ServiceError> {
        fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ServiceError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    ServiceError::ConfigurationError(format!("PayTR {} is not set", name))
                })
        }
        Ok((
            required(&self.config.ok_url, "ok_url")?,
            required(&self.config.fail_url, "fail_url")?,
        ))
    }

    /// Errors unless id, key, salt and both return URLs are present.
    pub fn ensure_configured(&self) -> Result<(), ServiceError> {
        self.merchant_id()?;
        if !self.signer.is_configured() {
            return Err(ServiceError::ConfigurationError(
                "PayTR merchant key or salt is not set".to_string(),
            ));
        }
        self.return_urls()?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    pub fn iframe_url(&self, token: &str) -> String {
        format!("{}/{}", self.endpoint(IFRAME_PATH), token)
    }

    pub fn build_token_request(
        &self,
        merchant_oid: &str,
        customer: &CustomerSnapshot,
        items: &[LineItem],
        total_amount: Decimal,
        client_ip: &str,
        currency: &str,
    ) -> Result<PaytrTokenRequest, ServiceError> {
        Ok(PaytrTokenRequest {
            merchant_oid: merchant_oid.to_string(),
            email: customer.email.trim().to_string(),
            payment_amount: to_minor_units(total_amount)?,
            user_basket: encode_basket(items)?,
            user_ip: client_ip.to_string(),
            user_name: customer.full_name(),
            user_address: customer.delivery_address(),
            user_phone: customer.phone.clone().unwrap_or_default(),
            currency: currency.to_string(),
        })
    }

    fn token_signature<'a>(
        &'a self,
        merchant_id: &'a str,
        request: &'a PaytrTokenRequest,
    ) -> TokenSignature<'a> {
        TokenSignature {
            merchant_id,
            user_ip: &request.user_ip,
            merchant_oid: &request.merchant_oid,
            email: &request.email,
            payment_amount: request.payment_amount,
            user_basket: &request.user_basket,
            no_installment: self.config.no_installment,
            max_installment: self.config.max_installment,
            currency: &request.currency,
            test_mode: self.config.test_mode,
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .form(form)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamError(format!("PayTR unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::UpstreamError(format!("PayTR response: {}", e)))?;
        if !status.is_success() {
            warn!(%status, path, "PayTR returned an HTTP error");
            return Err(ServiceError::UpstreamError(format!(
                "PayTR responded with HTTP {}",
                status.as_u16()
            )));
        }
        serde_json::from_str(&body).map_err(|e| {
            ServiceError::UpstreamError(format!("PayTR returned an unreadable body: {}", e))
        })
    }

    /// Calls the token endpoint once. A `failed` answer becomes an
    /// `UpstreamError` carrying PayTR's reason.
    #[instrument(skip(self, request), fields(merchant_oid = %request.merchant_oid, amount = request.payment_amount))]
    pub async fn request_token(
        &self,
        request: &PaytrTokenRequest,
    ) -> Result<PaytrToken, ServiceError> {
        let merchant_id = self.merchant_id()?;
        let (ok_url, fail_url) = self.return_urls()?;
        let paytr_token = self
            .signer
            .sign_token(&self.token_signature(merchant_id, request))?;

        let form: Vec<(&str, String)> = vec![
            ("merchant_id", merchant_id.to_string()),
            ("user_ip", request.user_ip.clone()),
            ("merchant_oid", request.merchant_oid.clone()),
            ("email", request.email.clone()),
            ("payment_amount", request.payment_amount.to_string()),
            ("paytr_token", paytr_token),
            ("user_basket", request.user_basket.clone()),
            ("debug_on", flag(self.config.debug_on).to_string()),
            ("no_installment", flag(self.config.no_installment).to_string()),
            ("max_installment", self.config.max_installment.to_string()),
            ("user_name", request.user_name.clone()),
            ("user_address", request.user_address.clone()),
            ("user_phone", request.user_phone.clone()),
            ("merchant_ok_url", ok_url.to_string()),
            ("merchant_fail_url", fail_url.to_string()),
            ("timeout_limit", self.config.timeout_limit_minutes.to_string()),
            ("currency", request.currency.clone()),
            ("test_mode", flag(self.config.test_mode).to_string()),
            ("lang", self.config.lang.clone()),
        ];

        let answer: TokenApiResponse = self.post_form(TOKEN_PATH, &form).await?;
        match (answer.status.as_str(), answer.token) {
            ("success", Some(token)) if !token.is_empty() => {
                debug!("PayTR token issued");
                Ok(PaytrToken {
                    iframe_url: self.iframe_url(&token),
                    token,
                })
            }
            _ => {
                let reason = answer
                    .reason
                    .unwrap_or_else(|| "PayTR did not return a token".to_string());
                warn!(%reason, "PayTR refused the token request");
                Err(ServiceError::UpstreamError(reason))
            }
        }
    }

    pub fn verify_callback(&self, callback: &PaytrCallback) -> bool {
        self.signer.verify_callback(
            &callback.merchant_oid,
            &callback.status,
            &callback.total_amount,
            &callback.hash,
        )
    }
}

#[async_trait]
impl PaymentProvider for PaytrProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Paytr
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn initialize_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentInitResponse, ServiceError> {
        self.ensure_configured()?;
        let token_request = self.build_token_request(
            &request.reference,
            &request.customer,
            &request.items,
            request.amount,
            &request.client_ip,
            &request.currency,
        )?;
        match self.request_token(&token_request).await {
            Ok(token) => Ok(PaymentInitResponse {
                success: true,
                transaction_id: Some(request.reference.clone()),
                payment_url: Some(token.iframe_url),
                error: None,
            }),
            Err(ServiceError::UpstreamError(reason)) => Ok(PaymentInitResponse::failed(reason)),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn get_payment_status(
        &self,
        transaction_id: &str,
    ) -> Result<ProviderPaymentStatus, ServiceError> {
        let merchant_id = self.merchant_id()?;
        let paytr_token = self.signer.sign_status_query(merchant_id, transaction_id)?;
        let form = [
            ("merchant_id", merchant_id.to_string()),
            ("merchant_oid", transaction_id.to_string()),
            ("paytr_token", paytr_token),
        ];
        let answer: StatusApiResponse = self.post_form(STATUS_PATH, &form).await?;
        match answer.status.as_str() {
            "success" => Ok(ProviderPaymentStatus {
                status: TransactionStatus::Completed,
                amount: answer
                    .payment_total
                    .or(answer.payment_amount)
                    .and_then(|raw| Decimal::from_str(raw.trim()).ok()),
                message: None,
            }),
            "failed" => Ok(ProviderPaymentStatus {
                status: TransactionStatus::Failed,
                amount: None,
                message: answer.err_msg,
            }),
            _ => Err(ServiceError::UpstreamError(api_error(
                answer.err_no,
                answer.err_msg,
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<RefundResponse, ServiceError> {
        let merchant_id = self.merchant_id()?;
        let return_amount = format_major(amount);
        let paytr_token = self
            .signer
            .sign_refund(merchant_id, transaction_id, &return_amount)?;
        let form = [
            ("merchant_id", merchant_id.to_string()),
            ("merchant_oid", transaction_id.to_string()),
            ("return_amount", return_amount),
            ("paytr_token", paytr_token),
        ];
        let answer: RefundApiResponse = self.post_form(REFUND_PATH, &form).await?;
        if answer.status == "success" {
            Ok(RefundResponse {
                success: true,
                refund_id: Some(transaction_id.to_string()),
                amount: answer
                    .return_amount
                    .and_then(|raw| Decimal::from_str(raw.trim()).ok())
                    .or(Some(amount)),
                error: None,
            })
        } else {
            Ok(RefundResponse {
                success: false,
                error: Some(api_error(answer.err_no, answer.err_msg)),
                ..Default::default()
            })
        }
    }

    /// `payload` is the raw form body. An empty `signature` falls back to the
    /// form's own `hash` field.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(mut callback) = PaytrCallback::from_form(payload) else {
            return false;
        };
        if !signature.is_empty() {
            callback.hash = signature.to_string();
        }
        self.verify_callback(&callback)
    }

    fn parse_webhook_data(&self, payload: &[u8]) -> Result<WebhookRecord, ServiceError> {
        PaytrCallback::from_form(payload)?.into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> PaytrConfig {
        PaytrConfig {
            merchant_id: Some("123456".into()),
            merchant_key: Some("merchant-key".into()),
            merchant_salt: Some("merchant-salt".into()),
            test_mode: true,
            api_base_url: base_url.to_string(),
            ok_url: Some("https://shop.example.com/checkout/ok".into()),
            fail_url: Some("https://shop.example.com/checkout/fail".into()),
            ..PaytrConfig::default()
        }
    }

    fn item(name: &str, price: Decimal, quantity: u32) -> LineItem {
        LineItem {
            product_id: "1".into(),
            name: name.into(),
            unit_price: price,
            quantity,
            image: None,
            brand_id: None,
            category_id: None,
        }
    }

    fn customer() -> CustomerSnapshot {
        CustomerSnapshot {
            first_name: "Ayse".into(),
            last_name: "Kaya".into(),
            email: "ayse@example.com".into(),
            ..Default::default()
        }
    }

    #[test]
    fn basket_is_base64_json_with_two_decimal_prices() {
        let encoded = encode_basket(&[item("Mask", dec!(75), 2)]).unwrap();
        let decoded = general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), r#"[["Mask","75.00",2]]"#);
    }

    #[test]
    fn token_request_uses_minor_units() {
        let provider = PaytrProvider::new(config("http://localhost"), reqwest::Client::new());
        let request = provider
            .build_token_request(
                "ABC123",
                &customer(),
                &[item("Mask", dec!(75), 2)],
                dec!(150.00),
                "85.34.78.112",
                "TL",
            )
            .unwrap();
        assert_eq!(request.payment_amount, 15000);
        assert_eq!(request.user_name, "Ayse Kaya");

        let signature = provider.token_signature("123456", &request);
        assert!(signature
            .fields("merchant-salt")
            .canonical()
            .contains("ayse@example.com15000"));
    }

    #[tokio::test]
    async fn successful_token_call_returns_iframe_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odeme/api/get-token"))
            .and(body_string_contains("merchant_oid=ABC123"))
            .and(body_string_contains("payment_amount=15000"))
            .and(body_string_contains("test_mode=1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "token": "tok_abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = PaytrProvider::new(config(&server.uri()), reqwest::Client::new());
        let request = provider
            .build_token_request("ABC123", &customer(), &[item("Mask", dec!(75), 2)], dec!(150), "1.2.3.4", "TL")
            .unwrap();
        let token = provider.request_token(&request).await.unwrap();
        assert_eq!(token.token, "tok_abc");
        assert_eq!(token.iframe_url, format!("{}/odeme/guvenli/tok_abc", server.uri()));
    }

    #[tokio::test]
    async fn posted_flags_match_the_signed_flags() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odeme/api/get-token"))
            .and(body_string_contains("no_installment=1"))
            .and(body_string_contains("test_mode=0"))
            .and(body_string_contains("debug_on=0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "token": "tok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.no_installment = true;
        cfg.test_mode = false;
        let provider = PaytrProvider::new(cfg, reqwest::Client::new());
        let request = provider
            .build_token_request("ABC123", &customer(), &[item("Mask", dec!(75), 2)], dec!(150), "1.2.3.4", "TL")
            .unwrap();
        let canonical = provider
            .token_signature("123456", &request)
            .fields("merchant-salt")
            .canonical();
        assert!(canonical.contains("1.2.3.4ABC123"));
        assert!(canonical.ends_with("10TL0merchant-salt"));
        provider.request_token(&request).await.unwrap();
    }

    #[tokio::test]
    async fn failed_token_call_surfaces_provider_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odeme/api/get-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "failed", "reason": "paytr_token gecersiz"}),
            ))
            .mount(&server)
            .await;

        let provider = PaytrProvider::new(config(&server.uri()), reqwest::Client::new());
        let request = provider
            .build_token_request("ABC123", &customer(), &[item("Mask", dec!(75), 2)], dec!(150), "1.2.3.4", "TL")
            .unwrap();
        assert_matches!(
            provider.request_token(&request).await,
            Err(ServiceError::UpstreamError(reason)) if reason == "paytr_token gecersiz"
        );
    }

    #[tokio::test]
    async fn missing_merchant_id_is_a_configuration_error() {
        let mut cfg = config("http://localhost");
        cfg.merchant_id = None;
        let provider = PaytrProvider::new(cfg, reqwest::Client::new());
        assert_matches!(
            provider.ensure_configured(),
            Err(ServiceError::ConfigurationError(_))
        );
        assert_matches!(
            provider.get_payment_status("ABC123").await,
            Err(ServiceError::ConfigurationError(_))
        );
    }

    #[tokio::test]
    async fn token_call_refuses_missing_return_urls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "success", "token": "tok"}),
            ))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.fail_url = Some("  ".into());
        let provider = PaytrProvider::new(cfg, reqwest::Client::new());
        assert_matches!(
            provider.ensure_configured(),
            Err(ServiceError::ConfigurationError(msg)) if msg.contains("fail_url")
        );
        let request = provider
            .build_token_request("ABC123", &customer(), &[item("Mask", dec!(75), 2)], dec!(150), "1.2.3.4", "TL")
            .unwrap();
        assert_matches!(
            provider.request_token(&request).await,
            Err(ServiceError::ConfigurationError(_))
        );
    }

    #[tokio::test]
    async fn status_inquiry_maps_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odeme/durum-sorgu"))
            .and(body_string_contains("merchant_oid=ABC123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "payment_amount": "150.00",
                "payment_total": "150.00",
                "currency": "TL"
            })))
            .mount(&server)
            .await;

        let provider = PaytrProvider::new(config(&server.uri()), reqwest::Client::new());
        let status = provider.get_payment_status("ABC123").await.unwrap();
        assert_eq!(status.status, TransactionStatus::Completed);
        assert_eq!(status.amount, Some(dec!(150.00)));
    }

    #[tokio::test]
    async fn refund_error_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odeme/iade"))
            .and(body_string_contains("return_amount=50.00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "err_no": "006",
                "err_msg": "iade tutari odeme tutarindan fazla"
            })))
            .mount(&server)
            .await;

        let provider = PaytrProvider::new(config(&server.uri()), reqwest::Client::new());
        let refund = provider.refund_payment("ABC123", dec!(50)).await.unwrap();
        assert!(!refund.success);
        assert_eq!(
            refund.error.as_deref(),
            Some("iade tutari odeme tutarindan fazla (006)")
        );
    }

    #[test]
    fn webhook_signature_uses_form_hash() {
        let provider = PaytrProvider::new(config("http://localhost"), reqwest::Client::new());
        let hash = provider
            .signer()
            .sign_callback("ABC123", "success", "15000")
            .unwrap();
        let body = serde_urlencoded::to_string([
            ("merchant_oid", "ABC123"),
            ("status", "success"),
            ("total_amount", "15000"),
            ("hash", hash.as_str()),
        ])
        .unwrap();
        assert!(provider.verify_webhook_signature(body.as_bytes(), ""));
        assert!(!provider.verify_webhook_signature(body.as_bytes(), "AAAA"));

        let record = provider.parse_webhook_data(body.as_bytes()).unwrap();
        assert_eq!(record.amount_minor, Some(15000));
    }
}
