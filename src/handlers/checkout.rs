use crate::errors::{ErrorResponse, ServiceError};
use crate::handlers::AppState;
use crate::services::confirmation::{Confirmation, SessionView};
use crate::services::orders::OrderView;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

/// Status of a checkout session
#[utoipa::path(
    get,
    path = "/api/v1/checkout/sessions/{id}",
    params(("id" = String, Path, description = "Checkout session id")),
    responses(
        (status = 200, description = "Session found", body = SessionView),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ServiceError> {
    Ok(Json(state.services.confirmation.session_status(&id).await?))
}

/// Wait briefly for the payment callback and return the resulting order
#[utoipa::path(
    get,
    path = "/api/v1/checkout/sessions/{id}/confirmation",
    params(("id" = String, Path, description = "Checkout session id")),
    responses(
        (status = 200, description = "Payment confirmed", body = OrderView),
        (status = 202, description = "Not confirmed yet; poll again", body = SessionView),
        (status = 402, description = "Payment failed", body = SessionView),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn await_confirmation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let response = match state.services.confirmation.await_confirmation(&id).await? {
        Confirmation::Confirmed(order) => (StatusCode::OK, Json(order)).into_response(),
        Confirmation::Failed(session) => {
            (StatusCode::PAYMENT_REQUIRED, Json(session)).into_response()
        }
        Confirmation::Pending(session) => (StatusCode::ACCEPTED, Json(session)).into_response(),
    };
    Ok(response)
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/confirmation", get(await_confirmation))
}
