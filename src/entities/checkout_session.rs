use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl SessionStatus {
    /// `processed` and `failed` are never left once entered
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::New)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::New => "new",
            SessionStatus::Processed => "processed",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Pre-order staging record; `id` doubles as the provider's `merchant_oid`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_data: Json,
    pub cart_items: Json,
    pub total_amount: Decimal,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
