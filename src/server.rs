use axum::{
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::api;
use crate::config::Config;
use crate::db::Repository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn Repository>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Repository>) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api::index))
        .route(
            "/menu-items",
            get(api::list_menu_items).post(api::create_menu_item),
        )
        .route(
            "/menu-items/:id",
            get(api::get_menu_item)
                .put(api::update_menu_item)
                .delete(api::delete_menu_item),
        )
        .route("/recommend", post(api::recommend))
        .route("/logs", get(api::list_logs).post(api::create_log))
        .route("/stats", get(api::stats))
}

pub fn build_router(state: AppState) -> Router {
    let mut routes = Router::new().nest("/api", api_routes());

    if let Some(ref appdir) = state.config.appdir {
        // The dashboard owns the root; the API stays reachable under /api.
        routes = routes.fallback_service(ServeDir::new(appdir));
    } else {
        routes = routes.merge(api_routes()).fallback(fallback_handler);
    }

    let routes: Router = routes.with_state(state);

    // Path rewriting has to happen before routing, so it wraps the router
    // instead of sitting in a route layer.
    let normalized = ServiceBuilder::new()
        .layer(axum::middleware::from_fn(crate::middleware::normalize_path))
        .service(routes);

    Router::new()
        .fallback_service(normalized)
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn fallback_handler(req: Request<axum::body::Body>) -> impl IntoResponse {
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::db::{seed_if_empty, MemoryRepository};

    async fn app() -> Router {
        let repo = MemoryRepository::new();
        seed_if_empty(&repo).await.unwrap();
        build_router(AppState::new(Config::default(), Arc::new(repo)))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_menu_crud() {
        let app = app().await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/menu-items",
            Some(json!({"name": "Jeera Rice", "category": "main", "cuisine": "indian", "price": 120, "is_veg": true, "popularity_score": 60})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("item_"));

        let (status, items) = send(&app, Method::GET, "/menu-items", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(items.as_array().unwrap().len(), 17);
        assert_eq!(items[0]["id"], id.as_str());

        let (status, updated) = send(&app, Method::PUT, &format!("/api/menu-items/{}", id), Some(json!({"price": 130}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"], 130.0);
        assert_eq!(updated["name"], "Jeera Rice");

        let (status, body) = send(&app, Method::DELETE, &format!("/menu-items/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "deleted"}));

        let (status, _) = send(&app, Method::GET, &format!("/menu-items/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_unknown_is_404_and_delete_unknown_is_ok() {
        let app = app().await;
        let (status, body) = send(&app, Method::PUT, "/menu-items/item_missing", Some(json!({"price": 10}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("item_missing"));

        let (status, body) = send(&app, Method::DELETE, "/menu-items/item_missing", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "deleted");
    }

    #[tokio::test]
    async fn test_validation_rejects_out_of_range() {
        let app = app().await;
        let (status, _) = send(&app, Method::POST, "/menu-items", Some(json!({"name": "Bad", "price": -1}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = send(&app, Method::POST, "/menu-items", Some(json!({"name": "Bad", "popularity_score": 101}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_recommend_and_logs() {
        let app = app().await;
        let (_, items) = send(&app, Method::GET, "/api/menu-items", None).await;
        let biryani = items
            .as_array()
            .unwrap()
            .iter()
            .find(|i| i["name"] == "Chicken Biryani")
            .unwrap()
            .clone();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/recommend",
            Some(json!({"cart_items": [biryani], "meal_time": "dinner", "cuisine": "indian", "user_segment": "frequent", "city": "hyderabad"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let recs = body["recommendations"].as_array().unwrap();
        assert_eq!(recs.len(), 6);
        assert!(recs.iter().all(|r| r["id"] != biryani["id"]));
        assert!(recs.iter().any(|r| r["name"] == "Butter Naan"));
        assert!(body["latency_ms"].is_u64());

        let (status, logs) = send(&app, Method::GET, "/logs", None).await;
        assert_eq!(status, StatusCode::OK);
        let logs = logs.as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["accepted_items"], json!([]));
        assert_eq!(logs[0]["recommended_items"].as_array().unwrap().len(), 6);
        assert_eq!(logs[0]["meal_time"], "dinner");
    }

    #[tokio::test]
    async fn test_create_log_and_stats() {
        let app = app().await;
        let (status, created) = send(
            &app,
            Method::POST,
            "/logs",
            Some(json!({
                "session_id": "session_1",
                "meal_time": "lunch",
                "user_segment": "budget",
                "city": "pune",
                "cart_items": [{"id": "a", "name": "Dosa", "category": "main", "price": 150}],
                "recommended_items": [{"id": "b", "name": "Idli", "category": "side", "price": 60}],
                "accepted_items": [{"id": "b", "name": "Idli", "category": "side", "price": 60}],
                "aov_before": 150,
                "aov_after": 210
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["id"].as_str().unwrap().starts_with("log_"));
        assert_eq!(created["latency_ms"], 0);

        let (status, stats) = send(&app, Method::GET, "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_items"], 16);
        assert_eq!(stats["total_logs"], 1);
        assert_eq!(stats["acceptance_rate"], 100.0);
        assert_eq!(stats["aov_lift"], 40.0);
    }

    #[tokio::test]
    async fn test_create_log_rejects_cart_overlap() {
        let app = app().await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/logs",
            Some(json!({
                "cart_items": [{"id": "a"}],
                "recommended_items": [{"id": "a"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_method_not_allowed_lists_methods() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(Request::builder().method(Method::GET).uri("/recommend").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = response.headers().get(header::ALLOW).unwrap().to_str().unwrap();
        assert!(allow.contains("POST"));

        let response = app
            .oneshot(Request::builder().method(Method::PATCH).uri("/api/menu-items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = response.headers().get(header::ALLOW).unwrap().to_str().unwrap();
        assert!(allow.contains("GET") && allow.contains("POST"));
    }

    #[tokio::test]
    async fn test_list_is_idempotent_and_pages() {
        let app = app().await;
        let (_, first) = send(&app, Method::GET, "/menu-items", None).await;
        let (_, second) = send(&app, Method::GET, "/menu-items", None).await;
        assert_eq!(first, second);

        let (_, page) = send(&app, Method::GET, "/menu-items?skip=2&limit=3", None).await;
        let page = page.as_array().unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0], first[2]);
    }

    #[tokio::test]
    async fn test_unknown_path_and_index() {
        let app = app().await;
        let (status, _) = send(&app, Method::GET, "/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoints"]["recommendations"], "/recommend");

        let (status, _) = send(&app, Method::GET, "/api/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_recommend_accepts_loose_context() {
        let app = app().await;
        let cart = json!([{"id": "x", "name": "Thali", "category": "main", "price": null, "cuisine": null}]);

        for body in [
            json!({"cart_items": cart, "meal_time": "brunch", "cuisine": "indian", "user_segment": "frequent"}),
            json!({"cart_items": cart, "meal_time": "dinner", "cuisine": null, "city": null}),
            json!({"cart_items": cart, "user_segment": "vip", "meal_time": null}),
            json!({"cart_items": null, "meal_time": 3}),
        ] {
            let (status, response) = send(&app, Method::POST, "/recommend", Some(body.clone())).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            assert!(response["recommendations"].is_array());
        }

        let (_, logs) = send(&app, Method::GET, "/logs", None).await;
        let logs = logs.as_array().unwrap();
        assert_eq!(logs.len(), 4);
        assert!(logs.iter().all(|l| l["user_segment"].is_null() || l["user_segment"] == "frequent"));
    }

    #[tokio::test]
    async fn test_create_log_accepts_loose_values() {
        let app = app().await;
        let (status, created) = send(
            &app,
            Method::POST,
            "/logs",
            Some(json!({
                "meal_time": "brunch",
                "user_segment": "vip",
                "city": null,
                "cart_items": [{"id": "a", "price": null}],
                "aov_before": null
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["meal_time"].is_null());
        assert!(created["user_segment"].is_null());
        assert_eq!(created["city"], "");
        assert_eq!(created["cart_items"][0]["price"], 0.0);
        assert_eq!(created["aov_before"], 0.0);
    }

    #[tokio::test]
    async fn test_logs_and_stats_filter_by_meal_time_and_segment() {
        let app = app().await;
        for (meal_time, segment, accepted) in [("dinner", "budget", 1), ("dinner", "premium", 0), ("lunch", "budget", 1)] {
            let accepted: Vec<Value> = (0..accepted).map(|_| json!({"id": "r1"})).collect();
            let (status, _) = send(
                &app,
                Method::POST,
                "/logs",
                Some(json!({
                    "meal_time": meal_time,
                    "user_segment": segment,
                    "recommended_items": [{"id": "r1"}, {"id": "r2"}],
                    "accepted_items": accepted
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, logs) = send(&app, Method::GET, "/logs?meal_time=dinner", None).await;
        assert_eq!(logs.as_array().unwrap().len(), 2);
        let (_, logs) = send(&app, Method::GET, "/api/logs?meal_time=dinner&user_segment=budget&limit=5", None).await;
        assert_eq!(logs.as_array().unwrap().len(), 1);

        let (_, stats) = send(&app, Method::GET, "/stats", None).await;
        assert_eq!(stats["total_logs"], 3);
        let (status, stats) = send(&app, Method::GET, "/stats?user_segment=budget", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_logs"], 2);
        assert_eq!(stats["acceptance_rate"], 50.0);
        let (_, stats) = send(&app, Method::GET, "/stats?meal_time=dinner", None).await;
        assert_eq!(stats["total_logs"], 2);
        assert_eq!(stats["acceptance_rate"], 25.0);
    }
}
