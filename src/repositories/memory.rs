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
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<String, checkout_session::Model>,
    orders: Vec<order::Model>,
    statuses: Vec<status::Model>,
    transactions: HashMap<String, payment_transaction::Model>,
}

/// In-process store with the same semantics as [`super::SeaOrmStore`]: the
/// status table comes pre-seeded, session moves are compare-and-swap and
/// `payment_reference` is unique.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    reject_orders: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let statuses = status::SEED
            .iter()
            .enumerate()
            .map(|(idx, (name, display_name, description))| status::Model {
                id: idx as i32 + 1,
                name: name.to_string(),
                display_name: display_name.to_string(),
                description: Some(description.to_string()),
            })
            .collect();
        Self {
            tables: RwLock::new(Tables {
                statuses,
                ..Default::default()
            }),
            reject_orders: AtomicBool::new(false),
        }
    }

    /// Makes every following order insert fail, as an unavailable orders table would.
    pub fn reject_order_inserts(&self, reject: bool) {
        self.reject_orders.store(reject, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    async fn move_session(&self, id: &str, next: SessionStatus) -> Result<bool, ServiceError> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(id) {
            Some(session) if session.status == SessionStatus::New => {
                session.status = next;
                session.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CheckoutSessionStore for MemoryStore {
    async fn upsert(
        &self,
        session: NewCheckoutSession,
    ) -> Result<checkout_session::Model, ServiceError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let record = tables
            .sessions
            .entry(session.id.clone())
            .and_modify(|existing| {
                if !existing.status.is_terminal() {
                    existing.user_data = session.user_data.clone();
                    existing.cart_items = session.cart_items.clone();
                    existing.total_amount = session.total_amount;
                    existing.updated_at = now;
                }
            })
            .or_insert_with(|| checkout_session::Model {
                id: session.id.clone(),
                user_data: session.user_data.clone(),
                cart_items: session.cart_items.clone(),
                total_amount: session.total_amount,
                status: session.status,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<checkout_session::Model>, ServiceError> {
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn mark_processed(&self, id: &str) -> Result<bool, ServiceError> {
        self.move_session(id, SessionStatus::Processed).await
    }

    async fn mark_failed(&self, id: &str) -> Result<bool, ServiceError> {
        self.move_session(id, SessionStatus::Failed).await
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, new_order: NewOrder) -> Result<order::Model, ServiceError> {
        if self.reject_orders.load(Ordering::SeqCst) {
            return Err(ServiceError::persistence("orders table unavailable"));
        }
        let mut tables = self.tables.write().await;
        if let Some(reference) = new_order.payment_reference.as_deref() {
            if tables
                .orders
                .iter()
                .any(|o| o.payment_reference.as_deref() == Some(reference))
            {
                return Err(ServiceError::Conflict(format!(
                    "an order with payment reference {} already exists",
                    reference
                )));
            }
        }
        let model = order::Model {
            id: Uuid::new_v4(),
            products: new_order.products,
            status_id: new_order.status_id,
            total: new_order.total,
            currency: new_order.currency,
            user: new_order.user,
            payment_method: new_order.payment_method,
            payment_reference: new_order.payment_reference,
            payment_provider_reference: new_order.payment_provider_reference,
            created_at: Utc::now(),
        };
        tables.orders.push(model.clone());
        Ok(model)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(self
            .tables
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<status::Model>, ServiceError> {
        Ok(self
            .tables
            .read()
            .await
            .statuses
            .iter()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn find_status(&self, id: i32) -> Result<Option<status::Model>, ServiceError> {
        Ok(self
            .tables
            .read()
            .await
            .statuses
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn create_transaction(
        &self,
        transaction: payment_transaction::Model,
    ) -> Result<payment_transaction::Model, ServiceError> {
        let mut tables = self.tables.write().await;
        if tables.transactions.contains_key(&transaction.id) {
            return Err(ServiceError::Conflict(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        tables
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(transaction)
    }

    async fn get_transaction(
        &self,
        id: &str,
    ) -> Result<Option<payment_transaction::Model>, ServiceError> {
        Ok(self.tables.read().await.transactions.get(id).cloned())
    }

    async fn transition(
        &self,
        id: &str,
        expected: TransactionStatus,
        update: TransactionUpdate,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.tables.write().await;
        match tables.transactions.get_mut(id) {
            Some(txn) if txn.status == expected => {
                txn.status = update.status;
                if update.provider_reference.is_some() {
                    txn.provider_reference = update.provider_reference;
                }
                if update.failure_reason.is_some() {
                    txn.failure_reason = update.failure_reason;
                }
                txn.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
