#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use storefront_payments::{
    config::{AppConfig, PaytrConfig},
    handlers::AppServices,
    providers::ProviderRegistry,
    repositories::{MemoryStore, Stores},
    services::notifications::LogNotifier,
    signature::PaytrSigner,
    AppState,
};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const MERCHANT_ID: &str = "123456";
pub const MERCHANT_KEY: &str = "test-merchant-key";
pub const MERCHANT_SALT: &str = "test-merchant-salt";
pub const IYZICO_WEBHOOK_SECRET: &str = "iyzico-webhook-secret";

/// Application wired onto the in-process store, with PayTR pointed at a mock server.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub paytr: MockServer,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after `customize` has adjusted the default test configuration.
    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let paytr = MockServer::start().await;

        let mut cfg = AppConfig::new(
            "memory://".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.confirmation_poll_attempts = 2;
        cfg.confirmation_poll_interval_ms = 20;
        cfg.payments.paytr = PaytrConfig {
            merchant_id: Some(MERCHANT_ID.to_string()),
            merchant_key: Some(MERCHANT_KEY.to_string()),
            merchant_salt: Some(MERCHANT_SALT.to_string()),
            test_mode: true,
            api_base_url: paytr.uri(),
            ok_url: Some("https://shop.example.com/checkout/success".to_string()),
            fail_url: Some("https://shop.example.com/checkout/failure".to_string()),
            ..PaytrConfig::default()
        };
        cfg.payments.iyzico.api_key = Some("iyzico-key".to_string());
        cfg.payments.iyzico.api_secret = Some("iyzico-secret".to_string());
        cfg.payments.iyzico.webhook_secret = Some(IYZICO_WEBHOOK_SECRET.to_string());
        cfg.payments.iyzico.sandbox = true;
        cfg.payments.iyzico.base_url = Some("https://sandbox-api.iyzipay.com".to_string());
        cfg.payments.iyzico.webhook_url =
            Some("https://shop.example.com/api/v1/payments/webhook".to_string());
        cfg.payments.iyzico.return_url =
            Some("https://shop.example.com/checkout/return".to_string());
        customize(&mut cfg);

        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(
            ProviderRegistry::from_config(&cfg.payments).expect("valid provider configuration"),
        );
        let services = AppServices::new(
            &cfg,
            Stores::from_shared(store.clone()),
            registry,
            Arc::new(LogNotifier),
        );
        let state = AppState {
            config: Arc::new(cfg),
            services,
        };
        let router = storefront_payments::build_router(state.clone());

        Self {
            router,
            state,
            store,
            paytr,
        }
    }

    /// PayTR answers every token request with `token`.
    pub async fn mock_token(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path("/odeme/api/get-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "success", "token": token})),
            )
            .mount(&self.paytr)
            .await;
    }

    pub fn signer(&self) -> PaytrSigner {
        PaytrSigner::new(
            Some(MERCHANT_KEY.to_string()),
            Some(MERCHANT_SALT.to_string()),
        )
    }

    /// Form body PayTR would post for this outcome, signed with the test secrets.
    pub fn callback_form(&self, merchant_oid: &str, status: &str, total_amount: &str) -> String {
        let hash = self
            .signer()
            .sign_callback(merchant_oid, status, total_amount)
            .expect("sign callback");
        serde_urlencoded::to_string([
            ("merchant_oid", merchant_oid),
            ("status", status),
            ("total_amount", total_amount),
            ("hash", hash.as_str()),
        ])
        .expect("encode callback form")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .expect("build request"),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.post_json_with_headers(uri, body, &[]).await
    }

    pub async fn post_json_with_headers(
        &self,
        uri: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(
            builder
                .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
                .expect("build request"),
        )
        .await
    }

    pub async fn post_raw(&self, uri: &str, content_type: &str, body: Vec<u8>, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", content_type);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(body)).expect("build request"))
            .await
    }

    pub async fn post_callback(&self, form: String) -> Response {
        self.post_raw(
            "/api/v1/payments/paytr/callback",
            "application/x-www-form-urlencoded",
            form.into_bytes(),
            &[],
        )
        .await
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Checkout payload for one 75.00 item bought twice.
pub fn checkout(session_id: Option<&str>) -> Value {
    let mut body = json!({
        "user": {
            "firstName": "Ayse",
            "lastName": "Kaya",
            "email": "ayse@example.com",
            "phone": "05551112233",
            "address": "Ataturk Cd. 5",
            "city": "Izmir"
        },
        "cartItems": [
            {"id": "42", "name": "CPAP Mask", "price": "75.00", "quantity": 2}
        ],
        "totalAmount": "150.00"
    });
    if let Some(id) = session_id {
        body["sessionId"] = json!(id);
    }
    body
}
