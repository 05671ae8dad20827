//! Shopping carts.
//!
//! The cart is a list of `(product_id, quantity)` lines stored on the user
//! document. Prices are never stored in the cart; the summary reads them
//! from the current catalog.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{CatalogError, UserError};
use crate::user::{CartLine, User, UserStore};

/// A cart line as submitted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartInput {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// A priced cart line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummaryLine {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: f64,
    pub quantity: u32,
}

/// The cart priced against the current catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartSummaryLine>,
    pub total: f64,
}

/// Cart operations over user documents.
#[derive(Debug, Clone)]
pub struct CartService {
    users: UserStore,
    catalog: Catalog,
}

impl CartService {
    #[must_use]
    pub fn new(users: UserStore, catalog: Catalog) -> Self {
        Self { users, catalog }
    }

    /// Replace the user's cart.
    ///
    /// Lines without a product ID or with a non-positive quantity are
    /// dropped. Returns the number of lines kept.
    ///
    /// # Errors
    ///
    /// - [`UserError::NotFound`] if the user is gone.
    /// - [`UserError::Store`] if storage fails.
    pub async fn save(&self, user_id: &str, items: Vec<CartInput>) -> Result<usize, UserError> {
        let mut user = self.users.get(user_id).await?;
        user.cart = items
            .into_iter()
            .filter_map(|item| {
                let product_id = item.product_id.filter(|p| !p.is_empty())?;
                let quantity = u32::try_from(item.quantity?).ok().filter(|q| *q > 0)?;
                Some(CartLine {
                    product_id,
                    quantity,
                })
            })
            .collect();
        user.updated_at = chrono::Utc::now();
        self.users.save(&user).await?;

        debug!(user_id = %user_id, lines = user.cart.len(), "cart saved");

        Ok(user.cart.len())
    }

    /// Empty the user's cart.
    ///
    /// # Errors
    ///
    /// - [`UserError::NotFound`] if the user is gone.
    /// - [`UserError::Store`] if storage fails.
    pub async fn clear(&self, user_id: &str) -> Result<(), UserError> {
        let mut user = self.users.get(user_id).await?;
        user.cart.clear();
        user.updated_at = chrono::Utc::now();
        self.users.save(&user).await?;
        Ok(())
    }

    /// Price the cart. Lines whose product no longer exists are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if storage fails.
    pub async fn summary(&self, user: &User) -> Result<CartSummary, CatalogError> {
        let mut items = Vec::with_capacity(user.cart.len());
        let mut total = 0.0_f64;

        for line in &user.cart {
            let Some(product) = self.catalog.find_product(&line.product_id).await? else {
                continue;
            };
            total += product.price * f64::from(line.quantity);
            items.push(CartSummaryLine {
                product_id: product.id.clone(),
                image: product.primary_image().map(str::to_owned),
                name: product.name,
                price: product.price,
                quantity: line.quantity,
            });
        }

        Ok(CartSummary { items, total })
    }
}
