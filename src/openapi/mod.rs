use crate::handlers::AppState;
use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Payments API",
        description = r#"
# Storefront Payments API

Payment token issuance and provider webhook reconciliation for the storefront.

## Flow

1. The checkout page requests a PayTR iFrame token. The cart and customer are
   staged as a checkout session keyed by the returned `sessionId`.
2. PayTR posts the payment result to the callback endpoint. A verified success
   turns the session into exactly one order.
3. The return page polls the confirmation endpoint for that order.

## Error Handling

JSON endpoints answer errors with:

```json
{
  "error": "Bad Request",
  "code": "validation_error",
  "message": "Validation error: email is required",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-03-09T10:30:00Z"
}
```

The PayTR callback answers plain text, `OK` on every outcome PayTR must not retry.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Payments", description = "Token issuance, callbacks, webhooks and transactions"),
        (name = "Orders", description = "Order creation and lookup"),
        (name = "Checkout", description = "Checkout session status and confirmation"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Payments
        crate::handlers::payments::issue_paytr_token,
        crate::handlers::payments::paytr_callback,
        crate::handlers::payments::payment_webhook,
        crate::handlers::payments::process_payment,
        crate::handlers::payments::payment_status,
        crate::handlers::payments::refund_payment,

        // Orders
        crate::handlers::orders::create_bank_transfer_order,
        crate::handlers::orders::get_order_by_reference,

        // Checkout
        crate::handlers::checkout::get_session,
        crate::handlers::checkout::await_confirmation,

        // Health
        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            crate::models::LineItem,
            crate::models::CustomerSnapshot,
            crate::models::PaymentMethod,
            crate::services::token_issuance::TokenRequest,
            crate::services::token_issuance::TokenResponse,
            crate::services::payment_transactions::ProcessPaymentRequest,
            crate::services::payment_transactions::TransactionView,
            crate::services::bank_transfer::BankTransferRequest,
            crate::services::orders::OrderView,
            crate::services::confirmation::SessionView,
            crate::handlers::payments::RefundRequest,
            crate::handlers::payments::WebhookAck,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
