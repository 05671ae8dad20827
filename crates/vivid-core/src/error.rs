//! Error types for `vivid-core`.
//!
//! One enum per subsystem. Each variant carries the identifier it failed on
//! so the HTTP layer can turn it into a precise status code and message.

use vivid_storage::StorageError;

use crate::moderation::Violation;

/// Errors from the typed document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage backend returned an error.
    #[error("store backend error: {0}")]
    Storage(#[from] StorageError),

    /// A document could not be serialized or deserialized.
    #[error("document codec error at '{key}': {reason}")]
    Codec { key: String, reason: String },
}

/// Errors from user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// No user with this ID.
    #[error("user '{user_id}' not found")]
    NotFound { user_id: String },

    /// The identity provider returned no email address.
    #[error("identity for '{google_id}' has no email address")]
    MissingEmail { google_id: String },

    /// The store returned an error.
    #[error("user store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from product and category operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No product with this ID.
    #[error("product '{product_id}' not found")]
    ProductNotFound { product_id: String },

    /// No category with this ID.
    #[error("category '{category_id}' not found")]
    CategoryNotFound { category_id: String },

    /// A category with the same name already exists.
    #[error("category '{name}' already exists")]
    DuplicateCategory { name: String },

    /// The submitted product or category is invalid.
    #[error("invalid catalog input: {reason}")]
    Invalid { reason: String },

    /// The store returned an error.
    #[error("catalog store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from comment operations.
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    /// The comment text was empty after trimming.
    #[error("comment text required")]
    EmptyText,

    /// The product being commented on does not exist.
    #[error("product '{product_id}' not found")]
    ProductNotFound { product_id: String },

    /// No comment with this ID on the given product.
    #[error("comment '{comment_id}' not found")]
    NotFound { comment_id: String },

    /// The reply target does not exist on this product.
    #[error("parent comment '{parent_id}' not found")]
    ParentNotFound { parent_id: String },

    /// The actor may not delete this comment.
    #[error("not allowed to delete this comment")]
    Forbidden,

    /// The content filter rejected the comment.
    #[error("comment blocked by moderation: {violation}")]
    Violation { violation: Violation },

    /// Top-level comment posted too soon after the previous one.
    #[error("you can comment on this product again in about {retry_hours} hour(s)")]
    RateLimited { retry_hours: i64 },

    /// The store returned an error.
    #[error("comment store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from ban, appeal, and moderation operations.
#[derive(Debug, thiserror::Error)]
pub enum BanError {
    /// No ban record with this ID.
    #[error("ban record '{ban_id}' not found")]
    NotFound { ban_id: String },

    /// No ban record exists for the given email.
    #[error("no ban found for '{email}'")]
    NoBanForEmail { email: String },

    /// The request was malformed (bad duration, empty appeal, ...).
    #[error("invalid ban request: {reason}")]
    Invalid { reason: String },

    /// The store returned an error.
    #[error("ban store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from checkout.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The user's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// None of the cart lines refer to an existing product.
    #[error("none of the products in the cart are available")]
    NothingToOrder,

    /// A product in the cart is out of stock.
    #[error("product {name} is out of stock")]
    OutOfStock { name: String },

    /// The user placed an order too recently.
    #[error("please wait a few minutes before placing another order")]
    Cooldown { retry_after_secs: i64 },

    /// Required delivery details were missing.
    #[error("invalid order details: {reason}")]
    Invalid { reason: String },

    /// The store returned an error.
    #[error("checkout store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from order administration.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// No order with this ID.
    #[error("order '{order_id}' not found")]
    NotFound { order_id: String },

    /// The store returned an error.
    #[error("order store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from announcement operations.
#[derive(Debug, thiserror::Error)]
pub enum AnnouncementError {
    /// No announcement with this ID.
    #[error("announcement '{announcement_id}' not found")]
    NotFound { announcement_id: String },

    /// Title or message missing.
    #[error("invalid announcement: {reason}")]
    Invalid { reason: String },

    /// The store returned an error.
    #[error("announcement store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The store returned an error.
    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from event sinks.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The event could not be serialized.
    #[error("event serialization failed: {reason}")]
    Serialization { reason: String },

    /// A sink failed to deliver the event.
    #[error("event sink '{name}' failed: {reason}")]
    SinkFailure { name: String, reason: String },
}

/// Errors from dashboard statistics.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Comment(#[from] CommentError),
}
