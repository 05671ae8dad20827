//! HTTP error types for the Vivid Vision server.
//!
//! Maps domain errors from `vivid-core` into HTTP responses. Every error
//! produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`; some carry extra fields (`retryHours`,
//! `banType`, ...) merged into the same object.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use tracing::error;

use vivid_core::error::{
    AnnouncementError, BanError, CatalogError, CheckoutError, CommentError, OrderError,
    SessionError, StatsError, StoreError, UserError,
};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Not logged in.
    Unauthorized(String),
    /// Logged in but not allowed.
    Forbidden(String),
    /// Requested resource not found (also used to hide admin routes).
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// A conflicting resource already exists.
    Conflict(String),
    /// Rate limit or cooldown hit.
    TooManyRequests(String),
    /// Internal server error.
    Internal(String),
    /// Another error with extra top-level fields in the body.
    Detailed {
        inner: Box<AppError>,
        fields: Map<String, Value>,
    },
}

impl AppError {
    /// Attach extra fields to the JSON body. Non-object values are ignored.
    #[must_use]
    pub fn with_fields(self, fields: Value) -> Self {
        let Value::Object(fields) = fields else {
            return self;
        };
        Self::Detailed {
            inner: Box::new(self),
            fields,
        }
    }

    fn parts(self) -> (StatusCode, &'static str, String, Map<String, Value>) {
        match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, Map::new()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, Map::new()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, Map::new()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, Map::new()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, Map::new()),
            Self::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", msg, Map::new())
            }
            Self::Internal(msg) => {
                error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    msg,
                    Map::new(),
                )
            }
            Self::Detailed { inner, fields } => {
                let (status, kind, msg, mut extra) = inner.parts();
                extra.extend(fields);
                (status, kind, msg, extra)
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::TooManyRequests(msg)
            | Self::Internal(msg) => f.write_str(msg),
            Self::Detailed { inner, .. } => inner.fmt(f),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message, extra) = self.parts();

        let mut body = Map::new();
        body.insert("error".to_owned(), Value::from(kind));
        body.insert("message".to_owned(), Value::from(message));
        body.extend(extra);

        (status, axum::Json(Value::Object(body))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound { .. } => Self::NotFound("User not found".to_owned()),
            UserError::MissingEmail { .. } => Self::BadRequest(err.to_string()),
            UserError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound { .. } | CatalogError::CategoryNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            CatalogError::DuplicateCategory { .. } => Self::Conflict(err.to_string()),
            CatalogError::Invalid { .. } => Self::BadRequest(err.to_string()),
            CatalogError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<CommentError> for AppError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::EmptyText => Self::BadRequest("Comment text required".to_owned()),
            CommentError::ParentNotFound { .. } => {
                Self::BadRequest("Parent comment not found".to_owned())
            }
            CommentError::ProductNotFound { .. } => Self::NotFound("Product not found".to_owned()),
            CommentError::NotFound { .. } => Self::NotFound("Comment not found".to_owned()),
            CommentError::Forbidden => {
                Self::Forbidden("Not allowed to delete this comment".to_owned())
            }
            CommentError::Violation { .. } => {
                Self::Forbidden("Comment blocked by moderation.".to_owned())
            }
            CommentError::RateLimited { retry_hours } => {
                Self::TooManyRequests(format!(
                    "You can comment on this product again in about {retry_hours} hour(s)."
                ))
                .with_fields(serde_json::json!({ "retryHours": retry_hours }))
            }
            CommentError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<BanError> for AppError {
    fn from(err: BanError) -> Self {
        match err {
            BanError::NotFound { .. } => Self::NotFound("Ban record not found".to_owned()),
            BanError::NoBanForEmail { .. } => {
                Self::NotFound("No ban found for this email".to_owned())
            }
            BanError::Invalid { .. } => Self::BadRequest(err.to_string()),
            BanError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::BadRequest("Cart is empty".to_owned()),
            CheckoutError::NothingToOrder
            | CheckoutError::OutOfStock { .. }
            | CheckoutError::Invalid { .. } => Self::BadRequest(err.to_string()),
            CheckoutError::Cooldown { retry_after_secs } => Self::TooManyRequests(
                "Please wait a few minutes before placing another order.".to_owned(),
            )
            .with_fields(serde_json::json!({ "retryAfterSecs": retry_after_secs })),
            CheckoutError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound { .. } => Self::NotFound("Order not found".to_owned()),
            OrderError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<AnnouncementError> for AppError {
    fn from(err: AnnouncementError) -> Self {
        match err {
            AnnouncementError::NotFound { .. } => Self::NotFound(err.to_string()),
            AnnouncementError::Invalid { .. } => Self::BadRequest(err.to_string()),
            AnnouncementError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<StatsError> for AppError {
    fn from(err: StatsError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_comment_carries_retry_hours() {
        let response = AppError::from(CommentError::RateLimited { retry_hours: 7 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"], "rate_limited");
        assert_eq!(body["retryHours"], 7);
    }

    #[tokio::test]
    async fn detailed_keeps_inner_status() {
        let response = AppError::Forbidden("banned".to_owned())
            .with_fields(serde_json::json!({ "banType": "temporary" }))
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["message"], "banned");
        assert_eq!(body["banType"], "temporary");
    }

    #[test]
    fn missing_ban_for_email_is_not_found() {
        let err = AppError::from(BanError::NoBanForEmail {
            email: "a@b.c".to_owned(),
        });
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
