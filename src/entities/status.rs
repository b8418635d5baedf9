use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stable machine key of the status every new order starts in
pub const ORDER_RECEIVED: &str = "order_received";
pub const ORDER_CONFIRMED: &str = "order_confirmed";
pub const ORDER_PREPARING: &str = "order_preparing";
pub const ORDER_SHIPPED: &str = "order_shipped";
pub const ORDER_DELIVERED: &str = "order_delivered";
pub const ORDER_CANCELLED: &str = "order_cancelled";

/// Seeded rows as `(name, display_name, description)`, in id order.
pub const SEED: [(&str, &str, &str); 6] = [
    (ORDER_RECEIVED, "Order received", "Order placed, awaiting confirmation"),
    (ORDER_CONFIRMED, "Order confirmed", "Payment confirmed by the store"),
    (ORDER_PREPARING, "Preparing", "Order is being prepared for shipment"),
    (ORDER_SHIPPED, "Shipped", "Handed over to the carrier"),
    (ORDER_DELIVERED, "Delivered", "Delivered to the customer"),
    (ORDER_CANCELLED, "Cancelled", "Order cancelled"),
];

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "statuses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
