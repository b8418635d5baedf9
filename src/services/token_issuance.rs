use super::references::{new_session_id, validate_reference};
use crate::entities::SessionStatus;
use crate::errors::ServiceError;
use crate::models::{CustomerSnapshot, LineItem};
use crate::providers::{PaymentProvider, PaytrProvider};
use crate::repositories::{CheckoutSessionStore, NewCheckoutSession};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn, Span};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Reused verbatim when present, so a retried checkout keeps its session
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user: CustomerSnapshot,
    #[serde(default)]
    pub cart_items: Vec<LineItem>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "150.00")]
    pub total_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub iframe_url: String,
    pub session_id: String,
}

/// Checks the fields PayTR cannot do without and returns the total.
fn validate_request(request: &TokenRequest) -> Result<Decimal, ServiceError> {
    if request.user.email.trim().is_empty() {
        return Err(ServiceError::ValidationError("email is required".to_string()));
    }
    let total = match request.total_amount {
        Some(total) if total > Decimal::ZERO => total,
        Some(_) => {
            return Err(ServiceError::ValidationError(
                "totalAmount must be positive".to_string(),
            ))
        }
        None => return Err(ServiceError::ValidationError("totalAmount is required".to_string())),
    };
    if request.cart_items.is_empty() {
        return Err(ServiceError::ValidationError("cartItems must not be empty".to_string()));
    }
    if let Some(item) = request.cart_items.iter().find(|i| i.quantity == 0) {
        return Err(ServiceError::ValidationError(format!(
            "quantity of {} must be at least 1",
            item.name
        )));
    }
    if let Some(id) = request.session_id.as_deref() {
        validate_reference(id)?;
    }
    Ok(total)
}

/// Stages the checkout session and obtains a PayTR iFrame token for it.
#[derive(Clone)]
pub struct TokenIssuanceService {
    paytr: Arc<PaytrProvider>,
    sessions: Arc<dyn CheckoutSessionStore>,
    currency: String,
}

impl TokenIssuanceService {
    pub fn new(
        paytr: Arc<PaytrProvider>,
        sessions: Arc<dyn CheckoutSessionStore>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            paytr,
            sessions,
            currency: currency.into(),
        }
    }

    /// Validates, upserts the session as `new`, signs and calls PayTR once.
    #[instrument(skip(self, request), fields(session_id = tracing::field::Empty, client_ip = %client_ip))]
    pub async fn issue_token(
        &self,
        request: TokenRequest,
        client_ip: &str,
    ) -> Result<TokenResponse, ServiceError> {
        let total = validate_request(&request)?;
        if !self.paytr.is_enabled() {
            return Err(ServiceError::ConfigurationError(
                "PayTR is not the enabled payment provider".to_string(),
            ));
        }
        self.paytr.ensure_configured()?;

        let session_id = request.session_id.clone().unwrap_or_else(new_session_id);
        Span::current().record("session_id", session_id.as_str());

        let session = self
            .sessions
            .upsert(NewCheckoutSession {
                id: session_id.clone(),
                user_data: serde_json::to_value(&request.user)?,
                cart_items: serde_json::to_value(&request.cart_items)?,
                total_amount: total,
                status: SessionStatus::New,
            })
            .await?;
        if session.status.is_terminal() {
            warn!(status = session.status.as_str(), "token requested for a settled session");
            return Err(ServiceError::Conflict(format!(
                "checkout session {} is already {}",
                session_id,
                session.status.as_str()
            )));
        }

        let token_request = self.paytr.build_token_request(
            &session_id,
            &request.user,
            &request.cart_items,
            total,
            client_ip,
            &self.currency,
        )?;
        let token = match self.paytr.request_token(&token_request).await {
            Ok(token) => token,
            Err(e) => {
                counter!("storefront_payments.tokens.failed", 1);
                return Err(e);
            }
        };
        counter!("storefront_payments.tokens.issued", 1);
        info!(amount = token_request.payment_amount, "payment token issued");

        Ok(TokenResponse {
            token: token.token,
            iframe_url: token.iframe_url,
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaytrConfig;
    use crate::repositories::MemoryStore;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn paytr(base_url: &str) -> Arc<PaytrProvider> {
        Arc::new(PaytrProvider::new(
            PaytrConfig {
                merchant_id: Some("123456".into()),
                merchant_key: Some("key".into()),
                merchant_salt: Some("salt".into()),
                api_base_url: base_url.into(),
                ok_url: Some("https://shop.example.com/checkout/ok".into()),
                fail_url: Some("https://shop.example.com/checkout/fail".into()),
                ..PaytrConfig::default()
            },
            reqwest::Client::new(),
        ))
    }

    fn request(session_id: Option<&str>) -> TokenRequest {
        TokenRequest {
            session_id: session_id.map(str::to_string),
            user: CustomerSnapshot {
                first_name: "Ayse".into(),
                last_name: "Kaya".into(),
                email: "ayse@example.com".into(),
                ..Default::default()
            },
            cart_items: vec![LineItem {
                product_id: "1".into(),
                name: "Mask".into(),
                unit_price: dec!(75),
                quantity: 2,
                image: None,
                brand_id: None,
                category_id: None,
            }],
            total_amount: Some(dec!(150.00)),
        }
    }

    #[test]
    fn validation_names_the_missing_field() {
        let mut no_email = request(None);
        no_email.user.email = " ".into();
        assert_matches!(validate_request(&no_email), Err(ServiceError::ValidationError(m)) if m.contains("email"));

        let mut no_amount = request(None);
        no_amount.total_amount = None;
        assert_matches!(validate_request(&no_amount), Err(ServiceError::ValidationError(m)) if m.contains("totalAmount"));

        let mut no_items = request(None);
        no_items.cart_items.clear();
        assert_matches!(validate_request(&no_items), Err(ServiceError::ValidationError(m)) if m.contains("cartItems"));

        assert_matches!(
            validate_request(&request(Some("ABC-123"))),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn session_is_written_before_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odeme/api/get-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "failed", "reason": "basket invalid"}),
            ))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let service = TokenIssuanceService::new(paytr(&server.uri()), store.clone(), "TL");
        let result = service.issue_token(request(Some("ABC123")), "1.2.3.4").await;
        assert_matches!(result, Err(ServiceError::UpstreamError(r)) if r == "basket invalid");

        let session = store.get_by_id("ABC123").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::New);
        assert_eq!(session.total_amount, dec!(150.00));
    }

    #[tokio::test]
    async fn issues_token_with_minor_amount() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odeme/api/get-token"))
            .and(body_string_contains("payment_amount=15000"))
            .and(body_string_contains("merchant_oid=ABC123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "token": "tok"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let service = TokenIssuanceService::new(paytr(&server.uri()), store, "TL");
        let response = service
            .issue_token(request(Some("ABC123")), "1.2.3.4")
            .await
            .unwrap();
        assert_eq!(response.token, "tok");
        assert_eq!(response.session_id, "ABC123");
        assert!(response.iframe_url.ends_with("/odeme/guvenli/tok"));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(PaytrProvider::new(PaytrConfig::default(), reqwest::Client::new()));
        let service = TokenIssuanceService::new(provider, store.clone(), "TL");
        assert_matches!(
            service.issue_token(request(Some("ABC123")), "1.2.3.4").await,
            Err(ServiceError::ConfigurationError(_))
        );
        assert!(store.get_by_id("ABC123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settled_session_is_not_reissued() {
        let store = Arc::new(MemoryStore::new());
        let service = TokenIssuanceService::new(paytr("http://127.0.0.1:9"), store.clone(), "TL");
        store
            .upsert(NewCheckoutSession {
                id: "ABC123".into(),
                user_data: serde_json::json!({}),
                cart_items: serde_json::json!([]),
                total_amount: dec!(150),
                status: SessionStatus::New,
            })
            .await
            .unwrap();
        store.mark_processed("ABC123").await.unwrap();

        assert_matches!(
            service.issue_token(request(Some("ABC123")), "1.2.3.4").await,
            Err(ServiceError::Conflict(_))
        );
    }
}
