use crate::errors::{ErrorResponse, ServiceError};
use crate::handlers::AppState;
use crate::services::bank_transfer::BankTransferRequest;
use crate::services::orders::OrderView;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};

/// Record an order paid by bank transfer
#[utoipa::path(
    post,
    path = "/api/v1/orders/bank-transfer",
    request_body = BankTransferRequest,
    responses(
        (status = 201, description = "Order recorded", body = OrderView),
        (status = 400, description = "Invalid checkout data", body = ErrorResponse),
        (status = 409, description = "Reference already used", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_bank_transfer_order(
    State(state): State<AppState>,
    Json(request): Json<BankTransferRequest>,
) -> Result<(StatusCode, Json<OrderView>), ServiceError> {
    let order = state.services.bank_transfers.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Look up an order by its payment reference
#[utoipa::path(
    get,
    path = "/api/v1/orders/reference/{reference}",
    params(("reference" = String, Path, description = "Checkout session id or bank-transfer reference")),
    responses(
        (status = 200, description = "Order found", body = OrderView),
        (status = 404, description = "No order for this reference", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<OrderView>, ServiceError> {
    Ok(Json(
        state.services.orders.get_by_reference(&reference).await?,
    ))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/bank-transfer", post(create_bank_transfer_order))
        .route("/reference/:reference", get(get_order_by_reference))
}
