//! Checkout: turn a cart into an order.
//!
//! Each user may place one order every two minutes. The slot is claimed
//! before any storage work and released if the placement fails. The
//! cooldown is kept in memory, so it resets when the process restarts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::catalog::Catalog;
use crate::error::{CatalogError, CheckoutError, OrderError, UserError};
use crate::order::{CASH_ON_DELIVERY, Order, OrderBook, OrderItem, OrderStatus};
use crate::user::{User, UserStore};

/// Minimum gap between two orders by the same user.
pub const ORDER_COOLDOWN_SECS: i64 = 120;

/// Delivery details submitted with an order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
}

impl OrderDetails {
    fn validate(&self) -> Result<(), CheckoutError> {
        let missing: Vec<&str> = [
            ("fullName", &self.full_name),
            ("phone", &self.phone),
            ("address", &self.address),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::Invalid {
                reason: format!("missing {}", missing.join(", ")),
            })
        }
    }
}

impl From<UserError> for CheckoutError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::Store(s) => Self::Store(s),
            other => Self::Invalid {
                reason: other.to_string(),
            },
        }
    }
}

impl From<CatalogError> for CheckoutError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Store(s) => Self::Store(s),
            other => Self::Invalid {
                reason: other.to_string(),
            },
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Store(s) => Self::Store(s),
            other @ OrderError::NotFound { .. } => Self::Invalid {
                reason: other.to_string(),
            },
        }
    }
}

/// Places orders and enforces the per-user cooldown.
#[derive(Debug, Clone)]
pub struct Checkout {
    users: UserStore,
    catalog: Catalog,
    orders: OrderBook,
    last_order: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl Checkout {
    #[must_use]
    pub fn new(users: UserStore, catalog: Catalog, orders: OrderBook) -> Self {
        Self {
            users,
            catalog,
            orders,
            last_order: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// Lines are priced from the current catalog. Lines whose product has
    /// vanished are skipped; an out-of-stock product rejects the whole
    /// order. On success the cart is cleared and the cooldown starts; a
    /// failed placement leaves the cooldown where it was.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Cooldown`] if the user ordered less than two minutes ago.
    /// - [`CheckoutError::EmptyCart`] if the cart has no lines.
    /// - [`CheckoutError::Invalid`] if delivery details are missing.
    /// - [`CheckoutError::OutOfStock`] if any product is out of stock.
    /// - [`CheckoutError::NothingToOrder`] if no line could be priced.
    /// - [`CheckoutError::Store`] if storage fails.
    pub async fn place_order(
        &self,
        user: &User,
        details: OrderDetails,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        let previous = self.reserve(&user.id, now).await?;
        let placed = self.place_reserved(user, details, now).await;
        if placed.is_err() {
            self.release(&user.id, now, previous).await;
        }
        placed
    }

    /// Claim the user's cooldown slot at `now` under one lock, so concurrent
    /// placements by the same user cannot both get past the check. Stale
    /// entries are pruned on the way. Returns the slot's previous value.
    async fn reserve(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CheckoutError> {
        let cooldown = Duration::seconds(ORDER_COOLDOWN_SECS);
        let mut last_order = self.last_order.lock().await;
        if let Some(last) = last_order.get(user_id).copied() {
            let elapsed = now - last;
            if elapsed < cooldown {
                return Err(CheckoutError::Cooldown {
                    retry_after_secs: (cooldown - elapsed).num_seconds().max(1),
                });
            }
        }
        last_order.retain(|_, at| now - *at < cooldown);
        Ok(last_order.insert(user_id.to_owned(), now))
    }

    /// Undo a reservation after a failed placement.
    async fn release(
        &self,
        user_id: &str,
        reserved: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) {
        let mut last_order = self.last_order.lock().await;
        if last_order.get(user_id) != Some(&reserved) {
            return;
        }
        match previous {
            Some(at) => last_order.insert(user_id.to_owned(), at),
            None => last_order.remove(user_id),
        };
    }

    async fn place_reserved(
        &self,
        user: &User,
        details: OrderDetails,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        if user.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        details.validate()?;

        let mut items = Vec::with_capacity(user.cart.len());
        let mut total = 0.0_f64;
        for line in &user.cart {
            let Some(product) = self.catalog.find_product(&line.product_id).await? else {
                continue;
            };
            if !product.in_stock {
                return Err(CheckoutError::OutOfStock { name: product.name });
            }
            total += product.price * f64::from(line.quantity);
            items.push(OrderItem {
                product_id: product.id.clone(),
                image: product.primary_image().map(str::to_owned),
                name: product.name,
                price: product.price,
                quantity: line.quantity,
            });
        }
        if items.is_empty() {
            return Err(CheckoutError::NothingToOrder);
        }

        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            full_name: details.full_name.trim().to_owned(),
            email: user.email.clone(),
            phone: details.phone.trim().to_owned(),
            dob: details.dob,
            address: details.address.trim().to_owned(),
            postal_code: details.postal_code,
            province: details.province,
            items,
            total,
            status: OrderStatus::Pending,
            payment_method: CASH_ON_DELIVERY.to_owned(),
            created_at: now,
            updated_at: now,
        };
        self.orders.insert(&order).await?;

        let mut stored = self.users.get(&user.id).await?;
        stored.cart.clear();
        stored.updated_at = now;
        self.users.save(&stored).await?;

        info!(order_id = %order.id, user_id = %user.id, total = order.total, "order placed");

        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{Product, ProductDraft};
    use crate::store::DocumentStore;
    use crate::user::{CartLine, Identity};
    use vivid_storage::MemoryBackend;

    struct Fixture {
        checkout: Checkout,
        users: UserStore,
        catalog: Catalog,
        orders: OrderBook,
    }

    fn fixture() -> Fixture {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let users = UserStore::new(store.clone());
        let catalog = Catalog::new(store.clone());
        let orders = OrderBook::new(store);
        Fixture {
            checkout: Checkout::new(users.clone(), catalog.clone(), orders.clone()),
            users,
            catalog,
            orders,
        }
    }

    async fn product(catalog: &Catalog, name: &str, price: f64, in_stock: bool) -> Product {
        let draft: ProductDraft = serde_json::from_value(serde_json::json!({
            "name": name, "price": price, "inStock": in_stock
        }))
        .unwrap();
        catalog.create_product(draft, Utc::now()).await.unwrap()
    }

    async fn shopper(users: &UserStore, cart: Vec<CartLine>) -> User {
        let mut user = users
            .upsert_from_identity(
                &Identity {
                    google_id: "g1".to_owned(),
                    email: Some("ana@example.com".to_owned()),
                    name: Some("Ana".to_owned()),
                    picture: None,
                },
                false,
                Utc::now(),
            )
            .await
            .unwrap();
        user.cart = cart;
        users.save(&user).await.unwrap();
        user
    }

    fn details() -> OrderDetails {
        OrderDetails {
            full_name: "Ana Silva".to_owned(),
            phone: "555-0100".to_owned(),
            address: "1 Main St".to_owned(),
            ..OrderDetails::default()
        }
    }

    fn line(product_id: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: product_id.to_owned(),
            quantity,
        }
    }

    #[tokio::test]
    async fn places_order_and_clears_cart() {
        let f = fixture();
        let lamp = product(&f.catalog, "Lamp", 10.0, true).await;
        let mug = product(&f.catalog, "Mug", 2.5, true).await;
        let user = shopper(&f.users, vec![line(&lamp.id, 2), line(&mug.id, 4), line("gone", 1)]).await;

        let order = f.checkout.place_order(&user, details(), Utc::now()).await.unwrap();
        assert_eq!(order.items.len(), 2);
        assert!((order.total - 30.0).abs() < f64::EPSILON);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_method, "COD");
        assert_eq!(order.email, "ana@example.com");

        assert!(f.users.get(&user.id).await.unwrap().cart.is_empty());
        assert_eq!(f.orders.recent(50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_order_within_two_minutes_is_rejected() {
        let f = fixture();
        let lamp = product(&f.catalog, "Lamp", 10.0, true).await;
        let user = shopper(&f.users, vec![line(&lamp.id, 1)]).await;
        let now = Utc::now();
        f.checkout.place_order(&user, details(), now).await.unwrap();

        let mut user = f.users.get(&user.id).await.unwrap();
        user.cart = vec![line(&lamp.id, 1)];
        let err = f
            .checkout
            .place_order(&user, details(), now + Duration::seconds(30))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Cooldown { retry_after_secs: 90 }));

        let second = f
            .checkout
            .place_order(&user, details(), now + Duration::seconds(121))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
    }

    #[tokio::test]
    async fn cooldown_slot_is_claimed_before_placement_finishes() {
        let f = fixture();
        let now = Utc::now();
        f.checkout.reserve("u1", now).await.unwrap();

        let err = f.checkout.reserve("u1", now).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Cooldown { retry_after_secs: 120 }));
        assert!(f.checkout.reserve("u2", now).await.is_ok());
    }

    #[tokio::test]
    async fn failed_order_releases_the_cooldown() {
        let f = fixture();
        let lamp = product(&f.catalog, "Lamp", 10.0, false).await;
        let user = shopper(&f.users, vec![line(&lamp.id, 1)]).await;
        let now = Utc::now();
        let err = f.checkout.place_order(&user, details(), now).await.unwrap_err();
        assert!(matches!(err, CheckoutError::OutOfStock { .. }));

        let desk = product(&f.catalog, "Desk", 50.0, true).await;
        let mut user = f.users.get(&user.id).await.unwrap();
        user.cart = vec![line(&desk.id, 1)];
        let order = f.checkout.place_order(&user, details(), now).await.unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].name, "Desk");
    }

    #[tokio::test]
    async fn stale_cooldowns_are_pruned() {
        let f = fixture();
        let then = Utc::now();
        f.checkout.reserve("u1", then).await.unwrap();
        f.checkout.reserve("u2", then).await.unwrap();

        f.checkout
            .reserve("u3", then + Duration::seconds(ORDER_COOLDOWN_SECS + 1))
            .await
            .unwrap();
        let tracked: Vec<String> = f.checkout.last_order.lock().await.keys().cloned().collect();
        assert_eq!(tracked, vec!["u3".to_owned()]);
    }

    #[tokio::test]
    async fn out_of_stock_rejects_order() {
        let f = fixture();
        let lamp = product(&f.catalog, "Lamp", 10.0, false).await;
        let user = shopper(&f.users, vec![line(&lamp.id, 1)]).await;
        let err = f.checkout.place_order(&user, details(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::OutOfStock { ref name } if name == "Lamp"));
    }

    #[tokio::test]
    async fn cart_of_vanished_products_has_nothing_to_order() {
        let f = fixture();
        let user = shopper(&f.users, vec![line("gone", 1)]).await;
        let err = f.checkout.place_order(&user, details(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NothingToOrder));
    }

    #[tokio::test]
    async fn missing_details_are_invalid() {
        let f = fixture();
        let lamp = product(&f.catalog, "Lamp", 10.0, true).await;
        let user = shopper(&f.users, vec![line(&lamp.id, 1)]).await;
        let err = f
            .checkout
            .place_order(&user, OrderDetails::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Invalid { .. }));
    }
}
