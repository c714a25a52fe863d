use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::scoring::{generate_recommendations, Context};
use crate::db::{
    null_as_default, DbResult, ItemSnapshot, MenuItemRepo, NewRecommendationLog, RecommendationLogRepo,
    Repository, ScoredItem,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cart_items: Vec<ItemSnapshot>,
    #[serde(flatten)]
    pub context: Context,
    /// Generated when the caller does not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<ScoredItem>,
    pub latency_ms: u64,
}

/// Score the current catalog against the cart and record the event.
///
/// The log written here never carries acceptances; those arrive through
/// separate log-create calls once the shopper acts on the rail.
pub async fn recommend<R: Repository + ?Sized>(repo: &R, request: RecommendRequest) -> DbResult<RecommendResponse> {
    let catalog = repo.all_menu_items().await?;

    let started = Instant::now();
    let recommendations = generate_recommendations(&catalog, &request.cart_items, &request.context);
    let latency_ms = started.elapsed().as_millis() as u64;

    debug!(
        candidates = catalog.len(),
        returned = recommendations.len(),
        latency_ms,
        "Scored cart"
    );

    let session_id = request
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let log = repo
        .create_log(NewRecommendationLog {
            session_id,
            meal_time: request.context.meal_time,
            user_segment: request.context.user_segment,
            city: request.context.city,
            cart_items: request.cart_items,
            recommended_items: recommendations.iter().map(ItemSnapshot::from).collect(),
            accepted_items: Vec::new(),
            aov_before: 0.0,
            aov_after: 0.0,
            latency_ms,
        })
        .await?;

    info!(
        log_id = %log.id,
        session_id = %log.session_id,
        recommended = recommendations.len(),
        "Recommendation served"
    );

    Ok(RecommendResponse {
        recommendations,
        latency_ms,
    })
}
