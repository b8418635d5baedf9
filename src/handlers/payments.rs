use crate::errors::{ErrorResponse, ServiceError};
use crate::handlers::AppState;
use crate::middleware_helpers::ClientIp;
use crate::services::payment_transactions::{
    ProcessPaymentRequest, RequestContext, TransactionView, TransactionWebhookOutcome,
};
use crate::services::token_issuance::{TokenRequest, TokenResponse};
use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

pub const PROVIDER_HEADER: &str = "x-payment-provider";
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Body PayTR treats as a successful delivery
const PAYTR_ACK: &str = "OK";

#[derive(Debug, Default, Deserialize, ToSchema)]
#[schema(example = json!({"amount": "50.00", "reason": "Damaged on arrival"}))]
pub struct RefundRequest {
    /// Defaults to the full transaction amount
    #[schema(value_type = Option<String>, example = "50.00")]
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// applied, duplicate, ignored or unknown_transaction
    pub outcome: String,
}

impl From<TransactionWebhookOutcome> for WebhookAck {
    fn from(outcome: TransactionWebhookOutcome) -> Self {
        let outcome = match outcome {
            TransactionWebhookOutcome::Applied { .. } => "applied",
            TransactionWebhookOutcome::Duplicate => "duplicate",
            TransactionWebhookOutcome::Ignored => "ignored",
            TransactionWebhookOutcome::UnknownTransaction => "unknown_transaction",
        };
        Self {
            received: true,
            outcome: outcome.to_string(),
        }
    }
}

/// Issue a PayTR iFrame token for a checkout
#[utoipa::path(
    post,
    path = "/api/v1/payments/paytr/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid checkout data", body = ErrorResponse),
        (status = 409, description = "Checkout session already settled", body = ErrorResponse),
        (status = 500, description = "Provider not configured", body = ErrorResponse),
        (status = 502, description = "PayTR refused or was unreachable", body = ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn issue_paytr_token(
    State(state): State<AppState>,
    client_ip: ClientIp,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ServiceError> {
    let response = state
        .services
        .tokens
        .issue_token(request, client_ip.as_str())
        .await?;
    Ok(Json(response))
}

/// PayTR server-to-server payment notification
///
/// Answers the literal `OK` whenever PayTR should stop retrying.
#[utoipa::path(
    post,
    path = "/api/v1/payments/paytr/callback",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Acknowledged", body = String, content_type = "text/plain"),
        (status = 400, description = "Malformed form or amount mismatch", body = String, content_type = "text/plain"),
        (status = 401, description = "Hash mismatch", body = String, content_type = "text/plain"),
        (status = 500, description = "Internal failure; PayTR will retry", body = ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn paytr_callback(State(state): State<AppState>, body: Bytes) -> Response {
    match state.services.reconciler.handle_paytr_callback(&body).await {
        Ok(_) => (StatusCode::OK, PAYTR_ACK).into_response(),
        Err(ServiceError::AuthenticationError(_)) => (
            StatusCode::UNAUTHORIZED,
            "PAYTR notification failed: bad hash",
        )
            .into_response(),
        Err(ServiceError::AmountMismatch { .. }) => (
            StatusCode::BAD_REQUEST,
            "PAYTR notification failed: amount mismatch",
        )
            .into_response(),
        Err(ServiceError::BadRequest(message)) => (
            StatusCode::BAD_REQUEST,
            format!("PAYTR notification failed: {}", message),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "PayTR callback could not be processed");
            e.into_response()
        }
    }
}

/// JSON webhook from the iyzico or Papara adapters
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    params(
        ("x-payment-provider" = String, Header, description = "paytr, iyzico or papara"),
        ("x-webhook-signature" = String, Header, description = "HMAC of the raw body")
    ),
    responses(
        (status = 200, description = "Webhook accepted", body = WebhookAck),
        (status = 400, description = "Missing provider or invalid payload", body = ErrorResponse),
        (status = 401, description = "Invalid signature", body = ErrorResponse),
        (status = 500, description = "Downstream failure", body = ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let outcome = state
        .services
        .transactions
        .handle_webhook(header(PROVIDER_HEADER), header(SIGNATURE_HEADER), &body)
        .await?;
    Ok(Json(outcome.into()))
}

/// Start a payment through the active provider
#[utoipa::path(
    post,
    path = "/api/v1/payments/process",
    request_body = ProcessPaymentRequest,
    responses(
        (status = 201, description = "Transaction created", body = TransactionView),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Provider error", body = ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    client_ip: ClientIp,
    headers: HeaderMap,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<(StatusCode, Json<TransactionView>), ServiceError> {
    let context = RequestContext {
        client_ip: client_ip.0,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    let view = state
        .services
        .transactions
        .process_payment(request, context)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current status of a payment transaction
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}/status",
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction found", body = TransactionView),
        (status = 404, description = "Unknown transaction", body = ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionView>, ServiceError> {
    Ok(Json(
        state.services.transactions.get_payment_status(&id).await?,
    ))
}

/// Refund a completed payment, fully or partially
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/refund",
    params(("id" = String, Path, description = "Transaction id")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refunded", body = TransactionView),
        (status = 400, description = "Not refundable", body = ErrorResponse),
        (status = 404, description = "Unknown transaction", body = ErrorResponse),
        (status = 502, description = "Provider refused the refund", body = ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<TransactionView>, ServiceError> {
    if let Some(reason) = request.reason.as_deref() {
        tracing::info!(transaction_id = %id, %reason, "refund requested");
    }
    Ok(Json(
        state
            .services
            .transactions
            .refund_payment(&id, request.amount)
            .await?,
    ))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/paytr/token", post(issue_paytr_token))
        .route("/paytr/callback", post(paytr_callback))
        .route("/webhook", post(payment_webhook))
        .route("/process", post(process_payment))
        .route("/:id/status", get(payment_status))
        .route("/:id/refund", post(refund_payment))
}
