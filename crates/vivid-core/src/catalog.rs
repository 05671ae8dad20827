//! Products and categories.
//!
//! Admin forms post loosely typed data: booleans arrive as `"on"` or
//! `"true"`, features as a JSON array or as newline-separated text, prices
//! and indexes as strings. [`ProductDraft`] accepts all of those shapes and
//! normalizes them before anything reaches storage.
//!
//! Products live at `products/<id>`, categories at `categories/<id>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::store::DocumentStore;

/// Storage prefix for products.
pub const PRODUCT_PREFIX: &str = "products/";

/// Storage prefix for categories.
pub const CATEGORY_PREFIX: &str = "categories/";

/// Category assigned when the admin leaves it blank.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

fn default_true() -> bool {
    true
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subtitle: String,
    pub price: f64,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image, used as the cart and order thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}

/// A number that may arrive as JSON number or as form text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    /// Numeric value, parsing text when needed.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Whole-number value; fractions are truncated.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            Self::Number(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A boolean flag as sent by HTML forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl Flag {
    /// `true`, `"true"`, `"on"`, or a list containing `"true"` or `"on"`.
    #[must_use]
    pub fn is_set(&self) -> bool {
        fn truthy(s: &str) -> bool {
            s == "true" || s == "on"
        }
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => truthy(s),
            Self::List(items) => items.iter().any(|s| truthy(s)),
        }
    }
}

/// Product features as a list or as text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Features {
    List(Vec<String>),
    Text(String),
}

impl Features {
    /// Normalize to a list. Text is tried as a JSON array first, then split
    /// into trimmed non-empty lines.
    #[must_use]
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::List(items) => items,
            Self::Text(text) => serde_json::from_str::<Vec<String>>(&text).unwrap_or_else(|_| {
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_owned)
                    .collect()
            }),
        }
    }
}

/// One URL or several.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UrlList {
    One(String),
    Many(Vec<String>),
}

impl UrlList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(url) => vec![url],
            Self::Many(urls) => urls,
        }
    }
}

/// Admin input for creating or updating a product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub price: Option<Numeric>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Option<Features>,
    #[serde(default)]
    pub is_featured: Option<Flag>,
    #[serde(default)]
    pub in_stock: Option<Flag>,
    /// Newly added image URLs.
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Images kept from the previous version (update only).
    #[serde(default)]
    pub existing_image_urls: Option<UrlList>,
    #[serde(default)]
    pub primary_index: Option<Numeric>,
}

/// Fields of a draft after normalization.
struct Normalized {
    name: String,
    subtitle: String,
    price: f64,
    tag: String,
    category: String,
    description: String,
    features: Vec<String>,
    is_featured: bool,
    in_stock: bool,
    image_urls: Vec<String>,
}

impl ProductDraft {
    fn normalize(self) -> Result<Normalized, CatalogError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(CatalogError::Invalid {
                reason: "product name is required".to_owned(),
            });
        }

        let price = self
            .price
            .as_ref()
            .and_then(Numeric::as_f64)
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or_else(|| CatalogError::Invalid {
                reason: "price must be a non-negative number".to_owned(),
            })?;

        let mut image_urls: Vec<String> = self
            .existing_image_urls
            .map(UrlList::into_vec)
            .unwrap_or_default();
        image_urls.extend(self.image_urls);
        image_urls.retain(|u| !u.trim().is_empty());

        if let Some(idx) = self.primary_index.as_ref().and_then(Numeric::as_index) {
            move_to_front(&mut image_urls, idx);
        }

        let category = self
            .category
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_category);

        Ok(Normalized {
            name,
            subtitle: self.subtitle.unwrap_or_default(),
            price,
            tag: self.tag.unwrap_or_default(),
            category,
            description: self.description.unwrap_or_default(),
            features: self.features.map(Features::into_list).unwrap_or_default(),
            is_featured: self.is_featured.as_ref().is_some_and(Flag::is_set),
            in_stock: self.in_stock.as_ref().is_some_and(Flag::is_set),
            image_urls,
        })
    }
}

/// Move the image at `idx` to the front when `0 < idx < len`.
fn move_to_front(urls: &mut Vec<String>, idx: i64) {
    let Ok(idx) = usize::try_from(idx) else {
        return;
    };
    if idx > 0 && idx < urls.len() {
        let primary = urls.remove(idx);
        urls.insert(0, primary);
    }
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of [`Catalog::migrate_legacy_images`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Names of products that were converted.
    pub migrated: Vec<String>,
    /// Names of products that carried a legacy field but already had a list.
    pub skipped: Vec<String>,
}

fn product_key(id: &str) -> String {
    format!("{PRODUCT_PREFIX}{id}")
}

fn category_key(id: &str) -> String {
    format!("{CATEGORY_PREFIX}{id}")
}

/// Product and category persistence.
#[derive(Debug, Clone)]
pub struct Catalog {
    store: DocumentStore,
}

impl Catalog {
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if storage fails.
    pub async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let mut products: Vec<Product> = self.store.scan(PRODUCT_PREFIX).await?;
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    /// Fetch a product, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if storage fails.
    pub async fn find_product(&self, id: &str) -> Result<Option<Product>, CatalogError> {
        Ok(self.store.get(&product_key(id)).await?)
    }

    /// Fetch a product.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::ProductNotFound`] if absent.
    /// - [`CatalogError::Store`] if storage fails.
    pub async fn get_product(&self, id: &str) -> Result<Product, CatalogError> {
        self.find_product(id)
            .await?
            .ok_or_else(|| CatalogError::ProductNotFound {
                product_id: id.to_owned(),
            })
    }

    /// Create a product from admin input.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Invalid`] if name or price is missing or malformed.
    /// - [`CatalogError::Store`] if storage fails.
    pub async fn create_product(
        &self,
        draft: ProductDraft,
        now: DateTime<Utc>,
    ) -> Result<Product, CatalogError> {
        let n = draft.normalize()?;
        let product = Product {
            id: uuid::Uuid::new_v4().to_string(),
            name: n.name,
            subtitle: n.subtitle,
            price: n.price,
            tag: n.tag,
            image_urls: n.image_urls,
            category: n.category,
            description: n.description,
            is_featured: n.is_featured,
            in_stock: n.in_stock,
            features: n.features,
            created_at: now,
            updated_at: now,
        };
        self.store.put(&product_key(&product.id), &product).await?;

        info!(product_id = %product.id, name = %product.name, "product created");

        Ok(product)
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::ProductNotFound`] if absent.
    /// - [`CatalogError::Invalid`] if the draft is malformed.
    /// - [`CatalogError::Store`] if storage fails.
    pub async fn update_product(
        &self,
        id: &str,
        draft: ProductDraft,
        now: DateTime<Utc>,
    ) -> Result<Product, CatalogError> {
        let mut product = self.get_product(id).await?;
        let n = draft.normalize()?;

        product.name = n.name;
        product.subtitle = n.subtitle;
        product.price = n.price;
        product.tag = n.tag;
        product.image_urls = n.image_urls;
        product.category = n.category;
        product.description = n.description;
        product.is_featured = n.is_featured;
        product.in_stock = n.in_stock;
        product.features = n.features;
        product.updated_at = now;

        self.store.put(&product_key(id), &product).await?;

        info!(product_id = %id, "product updated");

        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::ProductNotFound`] if absent.
    /// - [`CatalogError::Store`] if storage fails.
    pub async fn delete_product(&self, id: &str) -> Result<(), CatalogError> {
        let key = product_key(id);
        if !self.store.exists(&key).await? {
            return Err(CatalogError::ProductNotFound {
                product_id: id.to_owned(),
            });
        }
        self.store.delete(&key).await?;

        info!(product_id = %id, "product deleted");

        Ok(())
    }

    /// Number of products.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if storage fails.
    pub async fn count_products(&self) -> Result<usize, CatalogError> {
        Ok(self.store.keys(PRODUCT_PREFIX).await?.len())
    }

    /// Convert products that still carry a single `imageUrl` into the
    /// `imageUrls` list form.
    ///
    /// Documents that already have `imageUrls` are left alone and reported
    /// as skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if storage fails.
    pub async fn migrate_legacy_images(&self) -> Result<MigrationReport, CatalogError> {
        let mut report = MigrationReport::default();

        for (key, mut doc) in self.store.scan_raw(PRODUCT_PREFIX).await? {
            let Some(obj) = doc.as_object_mut() else {
                warn!(key = %key, "product document is not an object, skipping");
                continue;
            };
            let name = obj
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(key.as_str())
                .to_owned();

            let legacy = match obj.get("imageUrl") {
                Some(serde_json::Value::String(url)) if !url.is_empty() => url.clone(),
                _ => continue,
            };

            if obj.contains_key("imageUrls") {
                report.skipped.push(name);
                continue;
            }

            obj.insert(
                "imageUrls".to_owned(),
                serde_json::Value::Array(vec![serde_json::Value::String(legacy)]),
            );
            obj.remove("imageUrl");
            self.store.put_raw(&key, &doc).await?;

            info!(key = %key, "migrated legacy product image");
            report.migrated.push(name);
        }

        Ok(report)
    }

    /// All categories sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] if storage fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        let mut categories: Vec<Category> = self.store.scan(CATEGORY_PREFIX).await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    /// Create a category with a unique name.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Invalid`] if the name is empty.
    /// - [`CatalogError::DuplicateCategory`] if the name is taken (ignoring case).
    /// - [`CatalogError::Store`] if storage fails.
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Category, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Invalid {
                reason: "category name is required".to_owned(),
            });
        }

        let existing: Vec<Category> = self.store.scan(CATEGORY_PREFIX).await?;
        if existing.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(CatalogError::DuplicateCategory {
                name: name.to_owned(),
            });
        }

        let category = Category {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_owned(),
            description: description.unwrap_or_default().to_owned(),
            created_at: now,
        };
        self.store.put(&category_key(&category.id), &category).await?;

        info!(category_id = %category.id, name = %category.name, "category created");

        Ok(category)
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::CategoryNotFound`] if absent.
    /// - [`CatalogError::Store`] if storage fails.
    pub async fn delete_category(&self, id: &str) -> Result<(), CatalogError> {
        let key = category_key(id);
        if !self.store.exists(&key).await? {
            return Err(CatalogError::CategoryNotFound {
                category_id: id.to_owned(),
            });
        }
        self.store.delete(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vivid_storage::{MemoryBackend, StorageBackend};

    fn make_catalog() -> (Catalog, MemoryBackend) {
        let backend = MemoryBackend::new();
        let catalog = Catalog::new(DocumentStore::new(Arc::new(backend.clone())));
        (catalog, backend)
    }

    fn draft(json: serde_json::Value) -> ProductDraft {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn features_accept_json_text_and_lines() {
        let d = draft(serde_json::json!({"features": "[\"a\",\"b\"]"}));
        assert_eq!(d.features.unwrap().into_list(), vec!["a", "b"]);

        let d = draft(serde_json::json!({"features": " one \n\n two\n"}));
        assert_eq!(d.features.unwrap().into_list(), vec!["one", "two"]);

        let d = draft(serde_json::json!({"features": ["x"]}));
        assert_eq!(d.features.unwrap().into_list(), vec!["x"]);
    }

    #[test]
    fn flags_accept_form_shapes() {
        let d = draft(serde_json::json!({"isFeatured": "on", "inStock": ["", "true"]}));
        assert!(d.is_featured.unwrap().is_set());
        assert!(d.in_stock.unwrap().is_set());

        let d = draft(serde_json::json!({"isFeatured": "false", "inStock": true}));
        assert!(!d.is_featured.unwrap().is_set());
        assert!(d.in_stock.unwrap().is_set());
    }

    #[test]
    fn primary_index_moves_image_to_front() {
        let mut urls = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        move_to_front(&mut urls, 2);
        assert_eq!(urls, vec!["c", "a", "b"]);
        move_to_front(&mut urls, 0);
        move_to_front(&mut urls, 7);
        move_to_front(&mut urls, -1);
        assert_eq!(urls, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn create_normalizes_draft() {
        let (catalog, _) = make_catalog();
        let product = catalog
            .create_product(
                draft(serde_json::json!({
                    "name": " Lamp ",
                    "price": "19.5",
                    "imageUrls": ["a.jpg", "b.jpg"],
                    "primaryIndex": "1",
                    "inStock": "on",
                })),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(product.name, "Lamp");
        assert!((product.price - 19.5).abs() < f64::EPSILON);
        assert_eq!(product.category, DEFAULT_CATEGORY);
        assert_eq!(product.image_urls, vec!["b.jpg", "a.jpg"]);
        assert!(product.in_stock);
        assert!(!product.is_featured);
    }

    #[tokio::test]
    async fn create_rejects_missing_price() {
        let (catalog, _) = make_catalog();
        let err = catalog
            .create_product(draft(serde_json::json!({"name": "Lamp"})), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { .. }));
    }

    #[tokio::test]
    async fn update_merges_existing_and_new_images() {
        let (catalog, _) = make_catalog();
        let now = Utc::now();
        let product = catalog
            .create_product(
                draft(serde_json::json!({"name": "Mug", "price": 5, "imageUrls": ["old.jpg"]})),
                now,
            )
            .await
            .unwrap();

        let updated = catalog
            .update_product(
                &product.id,
                draft(serde_json::json!({
                    "name": "Mug",
                    "price": 6,
                    "existingImageUrls": "old.jpg",
                    "imageUrls": ["new.jpg"],
                    "primaryIndex": 1,
                })),
                now,
            )
            .await
            .unwrap();
        assert_eq!(updated.image_urls, vec!["new.jpg", "old.jpg"]);
        assert_eq!(updated.created_at, product.created_at);
    }

    #[tokio::test]
    async fn update_and_delete_missing_product_is_not_found() {
        let (catalog, _) = make_catalog();
        let err = catalog
            .update_product("nope", draft(serde_json::json!({"name": "x", "price": 1})), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::ProductNotFound { .. }));
        let err = catalog.delete_product("nope").await.unwrap_err();
        assert!(matches!(err, CatalogError::ProductNotFound { .. }));
    }

    #[tokio::test]
    async fn categories_are_unique_and_sorted() {
        let (catalog, _) = make_catalog();
        let now = Utc::now();
        catalog.create_category("Lamps", None, now).await.unwrap();
        catalog.create_category("Chairs", Some("Seating"), now).await.unwrap();

        let err = catalog.create_category("lamps", None, now).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCategory { .. }));
        let err = catalog.create_category("  ", None, now).await.unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { .. }));

        let names: Vec<_> = catalog
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Chairs", "Lamps"]);
    }

    #[tokio::test]
    async fn legacy_image_migration() {
        let (catalog, backend) = make_catalog();
        let now = Utc::now().to_rfc3339();
        let old = serde_json::json!({
            "id": "p1", "name": "Old", "price": 1.0, "imageUrl": "http://img/old.jpg",
            "createdAt": now, "updatedAt": now,
        });
        let both = serde_json::json!({
            "id": "p2", "name": "Both", "price": 1.0, "imageUrl": "x", "imageUrls": ["y"],
            "createdAt": now, "updatedAt": now,
        });
        backend.put("products/p1", &serde_json::to_vec(&old).unwrap()).await.unwrap();
        backend.put("products/p2", &serde_json::to_vec(&both).unwrap()).await.unwrap();

        let report = catalog.migrate_legacy_images().await.unwrap();
        assert_eq!(report.migrated, vec!["Old"]);
        assert_eq!(report.skipped, vec!["Both"]);

        let product = catalog.get_product("p1").await.unwrap();
        assert_eq!(product.image_urls, vec!["http://img/old.jpg"]);

        let again = catalog.migrate_legacy_images().await.unwrap();
        assert!(again.migrated.is_empty());
    }
}
