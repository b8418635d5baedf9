//! Storage seams. Each trait has a sea-orm implementation and an in-process one.

use crate::entities::{checkout_session, order, payment_transaction, status, SessionStatus};
use crate::entities::TransactionStatus;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::prelude::Json;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod memory;
pub mod sea_orm_store;

pub use memory::MemoryStore;
pub use sea_orm_store::SeaOrmStore;

/// Snapshot written at token issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckoutSession {
    pub id: String,
    pub user_data: Json,
    pub cart_items: Json,
    pub total_amount: Decimal,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub products: Json,
    pub status_id: i32,
    pub total: Decimal,
    pub currency: String,
    pub user: Json,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub payment_provider_reference: Option<String>,
}

/// Terminal-state write for a payment transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub status: TransactionStatus,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
}

#[async_trait]
pub trait CheckoutSessionStore: Send + Sync {
    /// Inserts or refreshes the snapshot of a `new` session. A session that
    /// already reached `processed` or `failed` is returned untouched.
    async fn upsert(
        &self,
        session: NewCheckoutSession,
    ) -> Result<checkout_session::Model, ServiceError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<checkout_session::Model>, ServiceError>;

    /// `new → processed`. True only for the caller that performed the move.
    async fn mark_processed(&self, id: &str) -> Result<bool, ServiceError>;

    /// `new → failed`. True only for the caller that performed the move.
    async fn mark_failed(&self, id: &str) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// `Conflict` when `payment_reference` is already taken.
    async fn create_order(&self, order: NewOrder) -> Result<order::Model, ServiceError>;

    async fn find_by_reference(&self, reference: &str)
        -> Result<Option<order::Model>, ServiceError>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<status::Model>, ServiceError>;

    async fn find_status(&self, id: i32) -> Result<Option<status::Model>, ServiceError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create_transaction(
        &self,
        transaction: payment_transaction::Model,
    ) -> Result<payment_transaction::Model, ServiceError>;

    async fn get_transaction(&self, id: &str) -> Result<Option<payment_transaction::Model>, ServiceError>;

    /// Applies `update` only while the row is still in `expected`.
    async fn transition(
        &self,
        id: &str,
        expected: TransactionStatus,
        update: TransactionUpdate,
    ) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), ServiceError>;
}

/// The store handles services are built from.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn CheckoutSessionStore>,
    pub orders: Arc<dyn OrderStore>,
    pub statuses: Arc<dyn StatusStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub health: Arc<dyn StoreHealth>,
}

impl Stores {
    pub fn sea_orm(db: Arc<DatabaseConnection>) -> Self {
        Self::from_shared(Arc::new(SeaOrmStore::new(db)))
    }

    pub fn in_memory() -> Self {
        Self::from_shared(Arc::new(MemoryStore::new()))
    }

    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: CheckoutSessionStore
            + OrderStore
            + StatusStore
            + TransactionStore
            + StoreHealth
            + 'static,
    {
        Self {
            sessions: store.clone(),
            orders: store.clone(),
            statuses: store.clone(),
            transactions: store.clone(),
            health: store,
        }
    }
}
