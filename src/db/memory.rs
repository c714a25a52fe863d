use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::model::*;
use super::repo::*;

/// Store that keeps everything in process memory. Contents are lost on
/// restart; used when no database is configured and by the fixture client.
#[derive(Default)]
pub struct MemoryRepository {
    menu_items: RwLock<Vec<MenuItem>>,
    logs: RwLock<Vec<RecommendationLog>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first. Entries with equal timestamps come out most recently
/// inserted first, matching the SQLite ordering.
fn newest_first<T: Clone>(items: &[T], created: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    let mut sorted: Vec<T> = items.iter().rev().cloned().collect();
    sorted.sort_by(|a, b| created(b).cmp(&created(a)));
    sorted
}

#[async_trait]
impl MenuItemRepo for MemoryRepository {
    async fn list_menu_items(&self, page: Page) -> DbResult<Vec<MenuItem>> {
        let items = self.menu_items.read().await;
        Ok(page.apply(newest_first(items.as_slice(), |i| i.created_date)))
    }

    async fn all_menu_items(&self) -> DbResult<Vec<MenuItem>> {
        Ok(self.menu_items.read().await.clone())
    }

    async fn get_menu_item(&self, id: &str) -> DbResult<MenuItem> {
        let items = self.menu_items.read().await;
        items
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("Menu item not found: {}", id)))
    }

    async fn create_menu_item(&self, item: NewMenuItem) -> DbResult<MenuItem> {
        let item = item.into_item(new_item_id(), Utc::now());
        self.menu_items.write().await.push(item.clone());
        debug!("Created menu item {} ({})", item.name, item.id);
        Ok(item)
    }

    async fn update_menu_item(&self, id: &str, patch: &MenuItemPatch) -> DbResult<MenuItem> {
        let mut items = self.menu_items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| DbError::NotFound(format!("Menu item not found: {}", id)))?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn delete_menu_item(&self, id: &str) -> DbResult<()> {
        self.menu_items.write().await.retain(|i| i.id != id);
        Ok(())
    }

    async fn count_menu_items(&self) -> DbResult<usize> {
        Ok(self.menu_items.read().await.len())
    }
}

#[async_trait]
impl RecommendationLogRepo for MemoryRepository {
    async fn list_logs(&self, filter: &LogFilter, page: Page) -> DbResult<Vec<RecommendationLog>> {
        let logs = self.logs.read().await;
        let matching: Vec<RecommendationLog> = logs.iter().filter(|l| filter.matches(l)).cloned().collect();
        Ok(page.apply(newest_first(matching.as_slice(), |l| l.created_date)))
    }

    async fn create_log(&self, log: NewRecommendationLog) -> DbResult<RecommendationLog> {
        let log = log.into_log(new_log_id(), Utc::now());
        self.logs.write().await.push(log.clone());
        debug!("Created recommendation log {} for session {}", log.id, log.session_id);
        Ok(log)
    }

    async fn count_logs(&self) -> DbResult<usize> {
        Ok(self.logs.read().await.len())
    }
}

impl Repository for MemoryRepository {
    fn close(&self) {}
}
