//! Admin back-office API, mounted at `/api/admin`.
//!
//! Every handler starts with [`Viewer::require_admin`], so the whole tree is
//! a 404 for anyone who is not an admin. Mutations are recorded as `ADMIN`
//! events.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, patch, post, put};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use vivid_core::announcement::{Announcement, AnnouncementDraft};
use vivid_core::ban::{AppealDecision, BanRecord, BanRequest, BanType};
use vivid_core::catalog::{Category, Numeric, Product, ProductDraft};
use vivid_core::comment::Comment;
use vivid_core::events::Event;
use vivid_core::order::{Order, OrderStatus};
use vivid_core::stats::{self, Statistics};
use vivid_core::user::{User, UserPage};

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::notify::post_content;
use crate::state::AppState;

/// Default page size for the user listing.
const USERS_PAGE_SIZE: usize = 20;
/// How many unreplied comments the dashboard shows.
const UNREPLIED_LIMIT: usize = 100;
/// How many recent orders the dashboard shows.
const RECENT_ORDERS: usize = 50;

/// Build the admin router (relative to `/api/admin`).
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/promote", post(promote_user))
        .route("/users/{id}/demote", post(demote_user))
        .route("/users/{id}/ban", post(ban_user))
        .route("/users/{id}/unban", post(unban_user))
        .route("/banned", get(list_banned))
        .route("/banned/{id}/appeal", post(resolve_appeal))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", put(update_product).delete(delete_product))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", delete(delete_category))
        .route("/comments/unreplied", get(unreplied_comments))
        .route("/comments/{id}/reply", post(reply_to_comment))
        .route("/statistics", get(statistics))
        .route("/developer", post(developer_message))
        .route("/orders", get(list_orders))
        .route("/orders/{id}/status", patch(set_order_status))
        .route("/orders/{id}", delete(delete_order))
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route(
            "/announcements/{id}",
            patch(toggle_announcement).delete(delete_announcement),
        )
}

fn admin_event(admin: &User, action: &str, meta: Value) -> Event {
    Event::new("ADMIN", action).actor(admin).meta(meta)
}

#[derive(Debug, Deserialize)]
struct UserListQuery {
    search: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserPage>, AppError> {
    viewer.require_admin()?;
    let page = state
        .users
        .list(
            query.search.as_deref(),
            query.page.unwrap_or(1),
            query.limit.unwrap_or(USERS_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

async fn promote_user(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    if !state.access.is_super_admin(&admin.email) {
        return Err(AppError::Forbidden(
            "Only Super Admins can promote users.".to_owned(),
        ));
    }

    let user = state.users.set_admin(&id, true).await?;
    state.record(admin_event(
        admin,
        "USER_PROMOTE",
        json!({ "promotedUser": user.email }),
    ));
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn demote_user(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    if !state.access.is_super_admin(&admin.email) {
        return Err(AppError::Forbidden(
            "Only Super Admins can demote users.".to_owned(),
        ));
    }

    let target = state.users.get(&id).await?;
    if state.access.is_protected(&target.email) {
        return Err(AppError::Forbidden("Cannot demote owner".to_owned()));
    }

    let user = state.users.set_admin(&id, false).await?;
    state.record(admin_event(
        admin,
        "USER_DEMOTE",
        json!({ "demotedUser": user.email }),
    ));
    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BanForm {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    ban_type: Option<BanType>,
    #[serde(default)]
    ban_duration: Option<Numeric>,
}

async fn ban_user(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(form): Json<BanForm>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    let target = state.users.get(&id).await?;
    if state.access.is_protected(&target.email) {
        return Err(AppError::Forbidden("Cannot ban owner".to_owned()));
    }

    let request = BanRequest {
        reason: form.reason.clone(),
        ban_type: form.ban_type,
        duration_hours: form.ban_duration.as_ref().and_then(Numeric::as_index),
    };
    let record = state
        .bans
        .ban_user(&target, request, &admin.email, Utc::now())
        .await?;

    state.record(admin_event(
        admin,
        "USER_BAN",
        json!({
            "bannedUser": target.email,
            "reason": record.reason,
            "type": record.ban_type,
            "expiresAt": record.expires_at,
        }),
    ));
    Ok(Json(json!({ "success": true })))
}

/// `POST /users/{id}/unban` where `id` is the ban record's ID.
async fn unban_user(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    let record = state.bans.unban(&id).await?;
    state.record(admin_event(
        admin,
        "USER_UNBAN",
        json!({ "unbannedUser": record.user.email }),
    ));
    Ok(Json(json!({ "success": true })))
}

async fn list_banned(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<BanRecord>>, AppError> {
    viewer.require_admin()?;
    Ok(Json(state.bans.list().await?))
}

#[derive(Debug, Deserialize)]
struct AppealForm {
    decision: AppealDecision,
}

async fn resolve_appeal(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(form): Json<AppealForm>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    let record = state
        .bans
        .resolve_appeal(&id, form.decision, Utc::now())
        .await?;
    state.record(admin_event(
        admin,
        "APPEAL_RESOLVE",
        json!({
            "banId": record.id,
            "user": record.user.email,
            "appealStatus": record.appeal_status,
        }),
    ));
    Ok(Json(json!({
        "success": true,
        "appealStatus": record.appeal_status,
    })))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<Product>>, AppError> {
    viewer.require_admin()?;
    Ok(Json(state.catalog.list_products().await?))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, AppError> {
    let admin = viewer.require_admin()?;
    let product = state.catalog.create_product(draft, Utc::now()).await?;
    state.record(admin_event(
        admin,
        "PRODUCT_CREATE",
        json!({ "productId": product.id, "name": product.name }),
    ));
    Ok(Json(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, AppError> {
    let admin = viewer.require_admin()?;
    let product = state.catalog.update_product(&id, draft, Utc::now()).await?;
    state.record(admin_event(
        admin,
        "PRODUCT_UPDATE",
        json!({ "productId": product.id, "name": product.name }),
    ));
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    state.catalog.delete_product(&id).await?;
    state.record(admin_event(admin, "PRODUCT_DELETE", json!({ "productId": id })));
    Ok(Json(json!({ "ok": true })))
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<Category>>, AppError> {
    viewer.require_admin()?;
    Ok(Json(state.catalog.list_categories().await?))
}

#[derive(Debug, Deserialize)]
struct CategoryForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Json(form): Json<CategoryForm>,
) -> Result<Json<Category>, AppError> {
    let admin = viewer.require_admin()?;
    let category = state
        .catalog
        .create_category(&form.name, form.description.as_deref(), Utc::now())
        .await?;
    state.record(admin_event(
        admin,
        "CATEGORY_CREATE",
        json!({ "categoryId": category.id, "name": category.name }),
    ));
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    state.catalog.delete_category(&id).await?;
    state.record(admin_event(admin, "CATEGORY_DELETE", json!({ "categoryId": id })));
    Ok(Json(json!({ "ok": true })))
}

async fn unreplied_comments(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<Comment>>, AppError> {
    viewer.require_admin()?;
    Ok(Json(state.comments.unreplied(UNREPLIED_LIMIT).await?))
}

#[derive(Debug, Deserialize)]
struct ReplyForm {
    #[serde(default)]
    text: String,
}

async fn reply_to_comment(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(form): Json<ReplyForm>,
) -> Result<Json<Comment>, AppError> {
    let admin = viewer.require_admin()?;
    let reply = state
        .comments
        .admin_reply(&id, admin, &form.text, Utc::now())
        .await?;
    state.record(admin_event(
        admin,
        "COMMENT_REPLY",
        json!({ "commentId": id, "productId": reply.product_id }),
    ));
    Ok(Json(reply))
}

async fn statistics(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Statistics>, AppError> {
    viewer.require_admin()?;
    let stats = stats::collect(&state.users, &state.catalog, &state.comments, Utc::now()).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeveloperMessage {
    #[serde(default)]
    webhook_url: String,
    #[serde(default)]
    message: String,
}

/// `POST /developer`: post a message to an arbitrary webhook.
async fn developer_message(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Json(form): Json<DeveloperMessage>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    let url = form.webhook_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(AppError::BadRequest("A valid webhook URL is required".to_owned()));
    }
    if form.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message required".to_owned()));
    }

    if let Err(e) = post_content(&state.http, url, &form.message).await {
        warn!(error = %e, "developer webhook failed");
        return Err(AppError::Internal("Failed to send dev message".to_owned()));
    }
    info!(admin = %admin.email, "developer message sent");
    Ok(Json(json!({ "ok": true })))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<Order>>, AppError> {
    viewer.require_admin()?;
    Ok(Json(state.orders.recent(RECENT_ORDERS).await?))
}

#[derive(Debug, Deserialize)]
struct StatusForm {
    status: OrderStatus,
}

async fn set_order_status(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(form): Json<StatusForm>,
) -> Result<Json<Order>, AppError> {
    let admin = viewer.require_admin()?;
    let order = state
        .orders
        .set_status(&id, form.status, Utc::now())
        .await?;
    state.record(admin_event(
        admin,
        "ORDER_UPDATE",
        json!({ "orderId": order.id, "status": order.status }),
    ));
    Ok(Json(order))
}

async fn delete_order(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    let order = state.orders.delete(&id).await?;
    state.record(admin_event(
        admin,
        "ORDER_DELETE",
        json!({ "orderId": order.id, "customer": order.full_name }),
    ));
    Ok(Json(json!({ "success": true })))
}

async fn list_announcements(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    viewer.require_admin()?;
    Ok(Json(state.announcements.list().await?))
}

async fn create_announcement(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Json(draft): Json<AnnouncementDraft>,
) -> Result<Json<Announcement>, AppError> {
    let admin = viewer.require_admin()?;
    let announcement = state
        .announcements
        .create(draft, Some(&admin.email), Utc::now())
        .await?;
    state.record(admin_event(
        admin,
        "ANNOUNCEMENT_CREATE",
        json!({ "announcementId": announcement.id, "title": announcement.title }),
    ));
    Ok(Json(announcement))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleForm {
    is_active: bool,
}

async fn toggle_announcement(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(form): Json<ToggleForm>,
) -> Result<Json<Announcement>, AppError> {
    let admin = viewer.require_admin()?;
    let announcement = state
        .announcements
        .set_active(&id, form.is_active, Utc::now())
        .await?;
    state.record(admin_event(
        admin,
        "ANNOUNCEMENT_TOGGLE",
        json!({ "announcementId": id, "isActive": form.is_active }),
    ));
    Ok(Json(announcement))
}

async fn delete_announcement(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let admin = viewer.require_admin()?;
    state.announcements.delete(&id).await?;
    state.record(admin_event(
        admin,
        "ANNOUNCEMENT_DELETE",
        json!({ "announcementId": id }),
    ));
    Ok(Json(json!({ "ok": true })))
}
