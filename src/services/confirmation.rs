use super::orders::{OrderService, OrderView};
use crate::entities::{checkout_session, SessionStatus};
use crate::errors::ServiceError;
use crate::repositories::CheckoutSessionStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    /// `new`, `processed` or `failed`
    pub status: String,
    #[schema(value_type = String, example = "150.00")]
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<checkout_session::Model> for SessionView {
    fn from(model: checkout_session::Model) -> Self {
        Self {
            id: model.id,
            status: model.status.as_str().to_string(),
            total_amount: model.total_amount,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    Confirmed(OrderView),
    Failed(SessionView),
    /// Still `new` after the last poll
    Pending(SessionView),
}

/// Lets the storefront's return page wait for the callback to land.
#[derive(Clone)]
pub struct ConfirmationService {
    sessions: Arc<dyn CheckoutSessionStore>,
    orders: OrderService,
    attempts: u32,
    interval: Duration,
}

impl ConfirmationService {
    pub fn new(
        sessions: Arc<dyn CheckoutSessionStore>,
        orders: OrderService,
        attempts: u32,
        interval: Duration,
    ) -> Self {
        Self {
            sessions,
            orders,
            attempts: attempts.max(1),
            interval,
        }
    }

    async fn load(&self, id: &str) -> Result<checkout_session::Model, ServiceError> {
        self.sessions
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Checkout session {} not found", id)))
    }

    pub async fn session_status(&self, id: &str) -> Result<SessionView, ServiceError> {
        Ok(self.load(id).await?.into())
    }

    /// Polls a fixed number of times with a fixed delay in between.
    #[instrument(skip(self))]
    pub async fn await_confirmation(&self, id: &str) -> Result<Confirmation, ServiceError> {
        let mut last = self.load(id).await?;
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                tokio::time::sleep(self.interval).await;
                last = self.load(id).await?;
            }
            match last.status {
                SessionStatus::Failed => return Ok(Confirmation::Failed(last.into())),
                SessionStatus::Processed => {
                    // The order lands right after the session flips
                    if let Some(order) = self.orders.find_by_reference(id).await? {
                        return Ok(Confirmation::Confirmed(self.orders.view(order).await?));
                    }
                }
                SessionStatus::New => {}
            }
            debug!(attempt, "payment not confirmed yet");
        }
        Ok(Confirmation::Pending(last.into()))
    }
}
