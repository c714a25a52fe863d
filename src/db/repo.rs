use async_trait::async_trait;

use super::model::*;

#[async_trait]
pub trait MenuItemRepo: Send + Sync {
    /// Newest first.
    async fn list_menu_items(&self, page: Page) -> DbResult<Vec<MenuItem>>;
    /// Insertion order; this is the snapshot the scorer iterates.
    async fn all_menu_items(&self) -> DbResult<Vec<MenuItem>>;
    async fn get_menu_item(&self, id: &str) -> DbResult<MenuItem>;
    async fn create_menu_item(&self, item: NewMenuItem) -> DbResult<MenuItem>;
    async fn update_menu_item(&self, id: &str, patch: &MenuItemPatch) -> DbResult<MenuItem>;
    /// Removing an unknown id is not an error.
    async fn delete_menu_item(&self, id: &str) -> DbResult<()>;
    async fn count_menu_items(&self) -> DbResult<usize>;
}

#[async_trait]
pub trait RecommendationLogRepo: Send + Sync {
    /// Newest first, restricted to logs the filter matches.
    async fn list_logs(&self, filter: &LogFilter, page: Page) -> DbResult<Vec<RecommendationLog>>;
    async fn create_log(&self, log: NewRecommendationLog) -> DbResult<RecommendationLog>;
    async fn count_logs(&self) -> DbResult<usize>;
}

pub trait Repository: MenuItemRepo + RecommendationLogRepo + Send + Sync {
    fn close(&self);
}
