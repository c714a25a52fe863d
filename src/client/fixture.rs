use std::sync::Arc;

use async_trait::async_trait;

use super::{ApiClient, ClientError, ClientResult};
use crate::db::{
    seed_if_empty, LogFilter, MemoryRepository, MenuItem, MenuItemPatch, MenuItemRepo, NewMenuItem,
    NewRecommendationLog, Page, RecommendationLog, RecommendationLogRepo, Repository,
};
use crate::recommend::{self, RecommendRequest, RecommendResponse, Stats};

/// In-process client. Runs the same store and scoring code as the server,
/// without a network hop.
pub struct FixtureClient {
    repo: Arc<dyn Repository>,
}

impl FixtureClient {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Fresh in-memory store holding the sample catalog.
    pub async fn seeded() -> ClientResult<Self> {
        let repo = MemoryRepository::new();
        seed_if_empty(&repo).await?;
        Ok(Self::new(Arc::new(repo)))
    }
}

#[async_trait]
impl ApiClient for FixtureClient {
    async fn list_menu_items(&self, page: Page) -> ClientResult<Vec<MenuItem>> {
        Ok(self.repo.list_menu_items(page).await?)
    }

    async fn get_menu_item(&self, id: &str) -> ClientResult<MenuItem> {
        Ok(self.repo.get_menu_item(id).await?)
    }

    async fn create_menu_item(&self, item: &NewMenuItem) -> ClientResult<MenuItem> {
        item.validate().map_err(ClientError::Validation)?;
        Ok(self.repo.create_menu_item(item.clone()).await?)
    }

    async fn update_menu_item(&self, id: &str, patch: &MenuItemPatch) -> ClientResult<MenuItem> {
        patch.validate().map_err(ClientError::Validation)?;
        Ok(self.repo.update_menu_item(id, patch).await?)
    }

    async fn delete_menu_item(&self, id: &str) -> ClientResult<()> {
        Ok(self.repo.delete_menu_item(id).await?)
    }

    async fn recommend(&self, request: &RecommendRequest) -> ClientResult<RecommendResponse> {
        Ok(recommend::recommend(self.repo.as_ref(), request.clone()).await?)
    }

    async fn list_logs(&self, filter: &LogFilter, page: Page) -> ClientResult<Vec<RecommendationLog>> {
        Ok(self.repo.list_logs(filter, page).await?)
    }

    async fn create_log(&self, log: &NewRecommendationLog) -> ClientResult<RecommendationLog> {
        log.validate().map_err(ClientError::Validation)?;
        Ok(self.repo.create_log(log.clone()).await?)
    }

    async fn stats(&self, filter: &LogFilter) -> ClientResult<Stats> {
        Ok(recommend::collect_stats(self.repo.as_ref(), filter).await?)
    }
}
