//! Orders.
//!
//! Orders are cash-on-delivery snapshots of a cart at checkout time, stored
//! at `orders/<id>`. Admins move them through [`OrderStatus`] or delete
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OrderError;
use crate::store::DocumentStore;

/// Storage prefix for orders.
pub const ORDER_PREFIX: &str = "orders/";

/// Default and only payment method.
pub const CASH_ON_DELIVERY: &str = "COD";

/// Fulfilment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "confirmed")]
    Confirmed,
    #[serde(alias = "shipped")]
    Shipped,
    #[serde(alias = "delivered")]
    Delivered,
    #[serde(alias = "cancelled")]
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// A priced line captured at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub dob: Option<String>,
    pub address: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: f64,
    #[serde(default)]
    pub status: OrderStatus,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn order_key(id: &str) -> String {
    format!("{ORDER_PREFIX}{id}")
}

/// Order persistence.
#[derive(Debug, Clone)]
pub struct OrderBook {
    store: DocumentStore,
}

impl OrderBook {
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Persist a new order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Store`] if storage fails.
    pub async fn insert(&self, order: &Order) -> Result<(), OrderError> {
        self.store.put(&order_key(&order.id), order).await?;
        Ok(())
    }

    /// Fetch an order.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`] if absent.
    /// - [`OrderError::Store`] if storage fails.
    pub async fn get(&self, id: &str) -> Result<Order, OrderError> {
        self.store
            .get(&order_key(id))
            .await?
            .ok_or_else(|| OrderError::NotFound {
                order_id: id.to_owned(),
            })
    }

    /// The `limit` most recent orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Store`] if storage fails.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Order>, OrderError> {
        let mut orders: Vec<Order> = self.store.scan(ORDER_PREFIX).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    /// Change an order's status.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`] if absent.
    /// - [`OrderError::Store`] if storage fails.
    pub async fn set_status(
        &self,
        id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut order = self.get(id).await?;
        order.status = status;
        order.updated_at = now;
        self.store.put(&order_key(id), &order).await?;

        info!(order_id = %id, status = %status, "order status changed");

        Ok(order)
    }

    /// Delete an order. Returns the removed order.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`] if absent.
    /// - [`OrderError::Store`] if storage fails.
    pub async fn delete(&self, id: &str) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        self.store.delete(&order_key(id)).await?;

        info!(order_id = %id, "order deleted");

        Ok(order)
    }
}
