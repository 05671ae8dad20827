//! Public catalog routes: products, categories, and active announcements.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use vivid_core::announcement::Announcement;
use vivid_core::catalog::{Category, Product};

use crate::error::AppError;
use crate::state::AppState;

/// Build the public catalog router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .route("/api/categories", get(list_categories))
        .route("/api/announcements/active", get(active_announcements))
}

async fn list_products(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.catalog.list_products().await?))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    state
        .catalog
        .find_product(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Not found".to_owned()))
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.catalog.list_categories().await?))
}

async fn active_announcements(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    Ok(Json(state.announcements.active().await?))
}
