use std::sync::Arc;

use tracing::{error, info};

use super::{ApiClient, ClientError, ClientResult};
use crate::db::{cart_value, ItemSnapshot, NewRecommendationLog, ScoredItem};
use crate::recommend::{Context, RecommendRequest};

/// A shopper's cart as the simulator drives it.
///
/// Every add refreshes the add-on rail and records what was on the rail,
/// what got added and how the cart value moved. Removals only refresh.
pub struct CartSession {
    client: Arc<dyn ApiClient>,
    session_id: String,
    context: Context,
    cart: Vec<ItemSnapshot>,
    recommendations: Vec<ScoredItem>,
    latency_ms: u64,
}

impl CartSession {
    pub fn new(client: Arc<dyn ApiClient>, context: Context) -> Self {
        Self {
            client,
            session_id: format!("session_{}", uuid::Uuid::new_v4()),
            context,
            cart: Vec::new(),
            recommendations: Vec::new(),
            latency_ms: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn cart(&self) -> &[ItemSnapshot] {
        &self.cart
    }

    pub fn recommendations(&self) -> &[ScoredItem] {
        &self.recommendations
    }

    pub fn total_value(&self) -> f64 {
        cart_value(&self.cart)
    }

    /// Changing the context refreshes the rail for the current cart.
    pub async fn set_context(&mut self, context: Context) -> &[ScoredItem] {
        self.context = context;
        self.refresh().await;
        &self.recommendations
    }

    pub async fn add_item(&mut self, item: ItemSnapshot) -> &[ScoredItem] {
        let cart_before = self.cart.clone();
        let shown: Vec<ItemSnapshot> = self.recommendations.iter().map(ItemSnapshot::from).collect();
        let shown_latency = self.latency_ms;

        self.cart.push(item.clone());
        self.refresh().await;
        self.log_event(cart_before, shown, item, shown_latency).await;

        &self.recommendations
    }

    /// Add an item from the current rail to the cart.
    pub async fn accept_recommendation(&mut self, id: &str) -> ClientResult<&[ScoredItem]> {
        let item = self
            .recommendations
            .iter()
            .find(|r| r.item.id == id)
            .map(ItemSnapshot::from)
            .ok_or_else(|| ClientError::NotFound(format!("Not on the rail: {}", id)))?;

        info!(session_id = %self.session_id, item = %item.name, "Recommendation accepted");
        Ok(self.add_item(item).await)
    }

    pub async fn remove_item(&mut self, id: &str) -> &[ScoredItem] {
        self.cart.retain(|i| i.id != id);
        self.refresh().await;
        &self.recommendations
    }

    async fn refresh(&mut self) {
        if self.cart.is_empty() {
            self.recommendations.clear();
            self.latency_ms = 0;
            return;
        }

        let request = RecommendRequest {
            cart_items: self.cart.clone(),
            context: self.context.clone(),
            session_id: Some(self.session_id.clone()),
        };
        match self.client.recommend(&request).await {
            Ok(response) => {
                self.recommendations = response.recommendations;
                self.latency_ms = response.latency_ms;
            }
            Err(e) => {
                error!("Error getting recommendations: {}", e);
                self.recommendations.clear();
                self.latency_ms = 0;
            }
        }
    }

    async fn log_event(&self, cart_before: Vec<ItemSnapshot>, shown: Vec<ItemSnapshot>, added: ItemSnapshot, latency_ms: u64) {
        let aov_before = cart_value(&cart_before);
        let aov_after = aov_before + added.price;

        let log = NewRecommendationLog {
            session_id: self.session_id.clone(),
            meal_time: self.context.meal_time,
            user_segment: self.context.user_segment,
            city: self.context.city.clone(),
            cart_items: cart_before,
            recommended_items: shown,
            accepted_items: vec![added],
            aov_before,
            aov_after,
            latency_ms,
        };

        if let Err(e) = self.client.create_log(&log).await {
            error!("Error creating log: {}", e);
        }
    }
}
