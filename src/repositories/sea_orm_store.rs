use super::{
    CheckoutSessionStore, NewCheckoutSession, NewOrder, OrderStore, StatusStore, StoreHealth,
    TransactionStore, TransactionUpdate,
};
use crate::entities::{
    checkout_session, order, payment_transaction, status, SessionStatus, TransactionStatus,
};
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Relational store on a sea-orm connection (PostgreSQL or SQLite).
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn move_session(&self, id: &str, next: SessionStatus) -> Result<bool, ServiceError> {
        let result = checkout_session::Entity::update_many()
            .col_expr(checkout_session::Column::Status, Expr::value(next))
            .col_expr(checkout_session::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(checkout_session::Column::Id.eq(id))
            .filter(checkout_session::Column::Status.eq(SessionStatus::New))
            .exec(self.db())
            .await
            .map_err(|e| {
                error!(error = %e, session_id = %id, to = next.as_str(), "session transition failed");
                ServiceError::DatabaseError(e)
            })?;
        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl CheckoutSessionStore for SeaOrmStore {
    async fn upsert(
        &self,
        session: NewCheckoutSession,
    ) -> Result<checkout_session::Model, ServiceError> {
        let now = Utc::now();
        let id = session.id.clone();
        let model = checkout_session::ActiveModel {
            id: Set(session.id),
            user_data: Set(session.user_data),
            cart_items: Set(session.cart_items),
            total_amount: Set(session.total_amount),
            status: Set(session.status),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Conflicting rows are refreshed only while still `new`.
        let rows = checkout_session::Entity::insert(model)
            .on_conflict(
                OnConflict::column(checkout_session::Column::Id)
                    .update_columns([
                        checkout_session::Column::UserData,
                        checkout_session::Column::CartItems,
                        checkout_session::Column::TotalAmount,
                        checkout_session::Column::UpdatedAt,
                    ])
                    .action_and_where(
                        Expr::col((checkout_session::Entity, checkout_session::Column::Status))
                            .eq(SessionStatus::New.as_str()),
                    )
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;
        debug!(session_id = %id, rows, "checkout session upserted");

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| ServiceError::persistence(format!("session {} vanished after upsert", id)))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<checkout_session::Model>, ServiceError> {
        Ok(checkout_session::Entity::find_by_id(id.to_string())
            .one(self.db())
            .await?)
    }

    async fn mark_processed(&self, id: &str) -> Result<bool, ServiceError> {
        self.move_session(id, SessionStatus::Processed).await
    }

    async fn mark_failed(&self, id: &str) -> Result<bool, ServiceError> {
        self.move_session(id, SessionStatus::Failed).await
    }
}

#[async_trait]
impl OrderStore for SeaOrmStore {
    async fn create_order(&self, new_order: NewOrder) -> Result<order::Model, ServiceError> {
        let reference = new_order.payment_reference.clone().unwrap_or_default();
        let model = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            products: Set(new_order.products),
            status_id: Set(new_order.status_id),
            total: Set(new_order.total),
            currency: Set(new_order.currency),
            user: Set(new_order.user),
            payment_method: Set(new_order.payment_method),
            payment_reference: Set(new_order.payment_reference),
            payment_provider_reference: Set(new_order.payment_provider_reference),
            created_at: Set(Utc::now()),
        };
        model.insert(self.db()).await.map_err(|e| {
            ServiceError::from_db(
                e,
                &format!("an order with payment reference {} already exists", reference),
            )
        })
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::PaymentReference.eq(reference))
            .one(self.db())
            .await?)
    }
}

#[async_trait]
impl StatusStore for SeaOrmStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<status::Model>, ServiceError> {
        Ok(status::Entity::find()
            .filter(status::Column::Name.eq(name))
            .one(self.db())
            .await?)
    }

    async fn find_status(&self, id: i32) -> Result<Option<status::Model>, ServiceError> {
        Ok(status::Entity::find_by_id(id).one(self.db()).await?)
    }
}

#[async_trait]
impl TransactionStore for SeaOrmStore {
    async fn create_transaction(
        &self,
        transaction: payment_transaction::Model,
    ) -> Result<payment_transaction::Model, ServiceError> {
        let id = transaction.id.clone();
        let active = payment_transaction::ActiveModel {
            id: Set(transaction.id),
            status: Set(transaction.status),
            amount: Set(transaction.amount),
            currency: Set(transaction.currency),
            payment_method: Set(transaction.payment_method),
            installment_count: Set(transaction.installment_count),
            provider: Set(transaction.provider),
            provider_reference: Set(transaction.provider_reference),
            metadata: Set(transaction.metadata),
            failure_reason: Set(transaction.failure_reason),
            created_at: Set(transaction.created_at),
            updated_at: Set(transaction.updated_at),
        };
        active
            .insert(self.db())
            .await
            .map_err(|e| ServiceError::from_db(e, &format!("transaction {} already exists", id)))
    }

    async fn get_transaction(
        &self,
        id: &str,
    ) -> Result<Option<payment_transaction::Model>, ServiceError> {
        Ok(payment_transaction::Entity::find_by_id(id.to_string())
            .one(self.db())
            .await?)
    }

    async fn transition(
        &self,
        id: &str,
        expected: TransactionStatus,
        update: TransactionUpdate,
    ) -> Result<bool, ServiceError> {
        let mut query = payment_transaction::Entity::update_many()
            .col_expr(payment_transaction::Column::Status, Expr::value(update.status))
            .col_expr(payment_transaction::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(reference) = update.provider_reference {
            query = query.col_expr(
                payment_transaction::Column::ProviderReference,
                Expr::value(reference),
            );
        }
        if let Some(reason) = update.failure_reason {
            query = query.col_expr(
                payment_transaction::Column::FailureReason,
                Expr::value(reason),
            );
        }
        let result = query
            .filter(payment_transaction::Column::Id.eq(id))
            .filter(payment_transaction::Column::Status.eq(expected))
            .exec(self.db())
            .await?;
        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl StoreHealth for SeaOrmStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.db().ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrator::Migrator;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;
    use serde_json::json;

    async fn store() -> SeaOrmStore {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmStore::new(Arc::new(db))
    }

    fn session(id: &str, total: rust_decimal::Decimal) -> NewCheckoutSession {
        NewCheckoutSession {
            id: id.into(),
            user_data: json!({"email": "ayse@example.com"}),
            cart_items: json!([{"productId": "1", "quantity": 2}]),
            total_amount: total,
            status: SessionStatus::New,
        }
    }

    #[tokio::test]
    async fn upsert_refreshes_new_sessions_only() {
        let store = store().await;
        store.upsert(session("ABC123", dec!(100))).await.unwrap();
        let refreshed = store.upsert(session("ABC123", dec!(150))).await.unwrap();
        assert_eq!(refreshed.total_amount, dec!(150));

        assert!(store.mark_processed("ABC123").await.unwrap());
        let untouched = store.upsert(session("ABC123", dec!(999))).await.unwrap();
        assert_eq!(untouched.status, SessionStatus::Processed);
        assert_eq!(untouched.total_amount, dec!(150));
    }

    #[tokio::test]
    async fn mark_is_compare_and_swap() {
        let store = store().await;
        store.upsert(session("S1", dec!(10))).await.unwrap();

        assert!(store.mark_processed("S1").await.unwrap());
        assert!(!store.mark_processed("S1").await.unwrap());
        assert!(!store.mark_failed("S1").await.unwrap());
        assert!(!store.mark_processed("missing").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_payment_reference_is_a_conflict() {
        let store = store().await;
        let received = store.find_by_name("order_received").await.unwrap().unwrap();
        let new_order = NewOrder {
            products: json!([]),
            status_id: received.id,
            total: dec!(150),
            currency: "TL".into(),
            user: json!({}),
            payment_method: "credit_card".into(),
            payment_reference: Some("ABC123".into()),
            payment_provider_reference: Some("ABC123".into()),
        };
        store.create_order(new_order.clone()).await.unwrap();
        assert_matches!(
            store.create_order(new_order).await,
            Err(ServiceError::Conflict(_))
        );
        assert!(store.find_by_reference("ABC123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transaction_transition_requires_expected_status() {
        let store = store().await;
        let now = Utc::now();
        store
            .create_transaction(payment_transaction::Model {
                id: "txn_1".into(),
                status: TransactionStatus::Processing,
                amount: dec!(50),
                currency: "TL".into(),
                payment_method: "credit_card".into(),
                installment_count: 1,
                provider: "paytr".into(),
                provider_reference: None,
                metadata: None,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let done = TransactionUpdate {
            status: TransactionStatus::Completed,
            provider_reference: Some("prov_1".into()),
            failure_reason: None,
        };
        assert!(!store
            .transition("txn_1", TransactionStatus::Pending, done.clone())
            .await
            .unwrap());
        assert!(store
            .transition("txn_1", TransactionStatus::Processing, done)
            .await
            .unwrap());

        let stored = store.get_transaction("txn_1").await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert_eq!(stored.provider_reference.as_deref(), Some("prov_1"));
        store.ping().await.unwrap();
    }
}
