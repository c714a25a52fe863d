use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::db::{
    LogFilter, MenuItem, MenuItemPatch, MenuItemRepo, NewMenuItem, NewRecommendationLog, Page,
    RecommendationLog, RecommendationLogRepo,
};
use crate::recommend::{self, RecommendRequest, RecommendResponse, Stats};
use crate::server::AppState;

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "CSAO recommendation engine API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "menu_items": "/menu-items",
            "recommendations": "/recommend",
            "logs": "/logs",
            "stats": "/stats",
        }
    }))
}

pub async fn list_menu_items(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<MenuItem>>> {
    Ok(Json(state.db.list_menu_items(page).await?))
}

pub async fn get_menu_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MenuItem>> {
    Ok(Json(state.db.get_menu_item(&id).await?))
}

pub async fn create_menu_item(
    State(state): State<AppState>,
    Json(item): Json<NewMenuItem>,
) -> ApiResult<(StatusCode, Json<MenuItem>)> {
    item.validate().map_err(ApiError::Validation)?;

    let created = state.db.create_menu_item(item).await?;
    info!("Created menu item {} ({})", created.name, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_menu_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<MenuItemPatch>,
) -> ApiResult<Json<MenuItem>> {
    patch.validate().map_err(ApiError::Validation)?;

    let updated = state.db.update_menu_item(&id, &patch).await?;
    info!("Updated menu item {}", id);
    Ok(Json(updated))
}

pub async fn delete_menu_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.delete_menu_item(&id).await?;
    info!("Deleted menu item {}", id);
    Ok(Json(json!({ "status": "deleted" })))
}

pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> ApiResult<Json<RecommendResponse>> {
    Ok(Json(recommend::recommend(state.db.as_ref(), request).await?))
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(filter): Query<LogFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<RecommendationLog>>> {
    Ok(Json(state.db.list_logs(&filter, page).await?))
}

pub async fn create_log(
    State(state): State<AppState>,
    Json(log): Json<NewRecommendationLog>,
) -> ApiResult<(StatusCode, Json<RecommendationLog>)> {
    log.validate().map_err(ApiError::Validation)?;
    let created = state.db.create_log(log).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn stats(
    State(state): State<AppState>,
    Query(filter): Query<LogFilter>,
) -> ApiResult<Json<Stats>> {
    Ok(Json(recommend::collect_stats(state.db.as_ref(), &filter).await?))
}
