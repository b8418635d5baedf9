use crate::entities::{order, status};
use crate::errors::ServiceError;
use crate::repositories::{NewOrder, OrderStore, StatusStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order as returned to the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub payment_reference: Option<String>,
    pub payment_provider_reference: Option<String>,
    pub payment_method: String,
    /// Machine name of the order status, e.g. `order_received`
    pub status: String,
    pub status_display_name: String,
    #[schema(value_type = String, example = "150.00")]
    pub total: Decimal,
    pub currency: String,
    #[schema(value_type = Object)]
    pub products: Value,
    #[schema(value_type = Object)]
    pub user: Value,
    pub created_at: DateTime<Utc>,
}

/// Read side of orders plus status resolution.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    statuses: Arc<dyn StatusStore>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, statuses: Arc<dyn StatusStore>) -> Self {
        Self { orders, statuses }
    }

    /// Resolves a status id by its stable name.
    pub async fn status_id(&self, name: &str) -> Result<i32, ServiceError> {
        match self.statuses.find_by_name(name).await? {
            Some(found) => Ok(found.id),
            None => {
                error!(status = name, "status row missing; was the database seeded?");
                Err(ServiceError::persistence(format!(
                    "status '{}' is not present",
                    name
                )))
            }
        }
    }

    pub async fn received_status_id(&self) -> Result<i32, ServiceError> {
        self.status_id(status::ORDER_RECEIVED).await
    }

    /// `Conflict` when the payment reference already has an order.
    pub async fn create(&self, new_order: NewOrder) -> Result<order::Model, ServiceError> {
        self.orders.create_order(new_order).await
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        self.orders.find_by_reference(reference).await
    }

    pub async fn view(&self, model: order::Model) -> Result<OrderView, ServiceError> {
        let (status, status_display_name) = match self.statuses.find_status(model.status_id).await? {
            Some(s) => (s.name, s.display_name),
            None => (format!("status_{}", model.status_id), String::new()),
        };
        Ok(OrderView {
            id: model.id,
            payment_reference: model.payment_reference,
            payment_provider_reference: model.payment_provider_reference,
            payment_method: model.payment_method,
            status,
            status_display_name,
            total: model.total,
            currency: model.currency,
            products: model.products,
            user: model.user,
            created_at: model.created_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_by_reference(&self, reference: &str) -> Result<OrderView, ServiceError> {
        let model = self.find_by_reference(reference).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Order with reference {} not found", reference))
        })?;
        self.view(model).await
    }
}
