use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::model::*;
use super::repo::*;

type MenuItemRow = (String, String, String, String, f64, bool, f64, String);

type LogRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
    String,
    f64,
    f64,
    i64,
    String,
);

const MENU_ITEM_COLUMNS: &str =
    "id, name, category, cuisine, price, is_veg, popularity_score, created_date";

const LOG_COLUMNS: &str = "id, session_id, meal_time, user_segment, city, cart_items, \
     recommended_items, accepted_items, aov_before, aov_after, latency_ms, created_date";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?.create_if_missing(true);

        // Every connection to an in-memory database is its own database, so
        // keep exactly one alive for the lifetime of the pool.
        let pool = if db_path.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let repo = Self { pool };

        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn menu_item_from_row(r: MenuItemRow) -> MenuItem {
    MenuItem {
        id: r.0,
        name: r.1,
        category: Category::from_db(&r.2),
        cuisine: r.3,
        price: r.4,
        is_veg: r.5,
        popularity_score: r.6,
        created_date: parse_time(&r.7),
    }
}

fn log_from_row(r: LogRow) -> DbResult<RecommendationLog> {
    Ok(RecommendationLog {
        id: r.0,
        session_id: r.1,
        meal_time: r.2.and_then(|s| s.parse().ok()),
        user_segment: r.3.and_then(|s| s.parse().ok()),
        city: r.4,
        cart_items: serde_json::from_str(&r.5)?,
        recommended_items: serde_json::from_str(&r.6)?,
        accepted_items: serde_json::from_str(&r.7)?,
        aov_before: r.8,
        aov_after: r.9,
        latency_ms: r.10.max(0) as u64,
        created_date: parse_time(&r.11),
    })
}

fn limit_offset(page: Page) -> (i64, i64) {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = page.limit.map(|l| l as i64).unwrap_or(-1);
    let offset = page.skip.unwrap_or(0) as i64;
    (limit, offset)
}

#[async_trait]
impl MenuItemRepo for SqliteRepository {
    async fn list_menu_items(&self, page: Page) -> DbResult<Vec<MenuItem>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items ORDER BY created_date DESC, rowid DESC LIMIT ? OFFSET ?",
            MENU_ITEM_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(menu_item_from_row).collect())
    }

    async fn all_menu_items(&self) -> DbResult<Vec<MenuItem>> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items ORDER BY rowid",
            MENU_ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(menu_item_from_row).collect())
    }

    async fn get_menu_item(&self, id: &str) -> DbResult<MenuItem> {
        sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items WHERE id = ?",
            MENU_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map(menu_item_from_row)
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => DbError::NotFound(format!("Menu item not found: {}", id)),
            _ => DbError::Sqlx(e),
        })
    }

    async fn create_menu_item(&self, item: NewMenuItem) -> DbResult<MenuItem> {
        let item = item.into_item(new_item_id(), Utc::now());

        sqlx::query(
            "INSERT INTO menu_items (id, name, category, cuisine, price, is_veg, popularity_score, created_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.category.as_str())
        .bind(&item.cuisine)
        .bind(item.price)
        .bind(item.is_veg)
        .bind(item.popularity_score)
        .bind(format_time(&item.created_date))
        .execute(&self.pool)
        .await?;

        debug!("Created menu item {} ({})", item.name, item.id);
        Ok(item)
    }

    async fn update_menu_item(&self, id: &str, patch: &MenuItemPatch) -> DbResult<MenuItem> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items WHERE id = ?",
            MENU_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Menu item not found: {}", id)))?;

        let mut item = menu_item_from_row(row);
        patch.apply(&mut item);

        sqlx::query(
            "UPDATE menu_items SET name = ?, category = ?, cuisine = ?, price = ?, is_veg = ?, popularity_score = ?
             WHERE id = ?",
        )
        .bind(&item.name)
        .bind(item.category.as_str())
        .bind(&item.cuisine)
        .bind(item.price)
        .bind(item.is_veg)
        .bind(item.popularity_score)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    async fn delete_menu_item(&self, id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM menu_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_menu_items(&self) -> DbResult<usize> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM menu_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl RecommendationLogRepo for SqliteRepository {
    async fn list_logs(&self, filter: &LogFilter, page: Page) -> DbResult<Vec<RecommendationLog>> {
        let (limit, offset) = limit_offset(page);
        let meal_time = filter.meal_time.map(|m| m.as_str());
        let user_segment = filter.user_segment.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {} FROM recommendation_logs
             WHERE (? IS NULL OR meal_time = ?) AND (? IS NULL OR user_segment = ?)
             ORDER BY created_date DESC, rowid DESC LIMIT ? OFFSET ?",
            LOG_COLUMNS
        ))
        .bind(meal_time)
        .bind(meal_time)
        .bind(user_segment)
        .bind(user_segment)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(log_from_row).collect()
    }

    async fn create_log(&self, log: NewRecommendationLog) -> DbResult<RecommendationLog> {
        let log = log.into_log(new_log_id(), Utc::now());

        sqlx::query(
            "INSERT INTO recommendation_logs
             (id, session_id, meal_time, user_segment, city, cart_items, recommended_items,
              accepted_items, aov_before, aov_after, latency_ms, created_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.id)
        .bind(&log.session_id)
        .bind(log.meal_time.map(|m| m.as_str()))
        .bind(log.user_segment.map(|s| s.as_str()))
        .bind(&log.city)
        .bind(serde_json::to_string(&log.cart_items)?)
        .bind(serde_json::to_string(&log.recommended_items)?)
        .bind(serde_json::to_string(&log.accepted_items)?)
        .bind(log.aov_before)
        .bind(log.aov_after)
        .bind(log.latency_ms as i64)
        .bind(format_time(&log.created_date))
        .execute(&self.pool)
        .await?;

        debug!("Created recommendation log {} for session {}", log.id, log.session_id);
        Ok(log)
    }

    async fn count_logs(&self) -> DbResult<usize> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM recommendation_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}

impl Repository for SqliteRepository {
    fn close(&self) {
        let pool = self.pool.clone();
        tokio::spawn(async move { pool.close().await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open() -> SqliteRepository {
        SqliteRepository::new("sqlite::memory:").await.unwrap()
    }

    fn naan() -> NewMenuItem {
        NewMenuItem::new("Butter Naan", Category::Side, "indian", 45.0, true, 88.0)
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let repo = open().await;

        let created = repo.create_menu_item(naan()).await.unwrap();
        assert!(created.id.starts_with("item_"));

        let fetched = repo.get_menu_item(&created.id).await.unwrap();
        assert_eq!(fetched.name, "Butter Naan");
        assert_eq!(fetched.category, Category::Side);
        assert!(fetched.is_veg);

        let patch = MenuItemPatch { price: Some(55.0), ..Default::default() };
        let updated = repo.update_menu_item(&created.id, &patch).await.unwrap();
        assert_eq!(updated.price, 55.0);
        assert_eq!(updated.name, "Butter Naan");
        assert_eq!(repo.get_menu_item(&created.id).await.unwrap().price, 55.0);

        repo.delete_menu_item(&created.id).await.unwrap();
        assert!(matches!(repo.get_menu_item(&created.id).await, Err(DbError::NotFound(_))));
        // Second delete is a no-op.
        repo.delete_menu_item(&created.id).await.unwrap();
        assert_eq!(repo.count_menu_items().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let repo = open().await;
        let result = repo.update_menu_item("item_missing", &MenuItemPatch::default()).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_newest_first_and_paging() {
        let repo = open().await;
        let first = repo.create_menu_item(naan()).await.unwrap();
        let second = repo
            .create_menu_item(NewMenuItem::new("Raita", Category::Condiment, "indian", 50.0, true, 75.0))
            .await
            .unwrap();

        let listed = repo.list_menu_items(Page::all()).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(listed, repo.list_menu_items(Page::all()).await.unwrap());

        let page = repo.list_menu_items(Page { skip: Some(1), limit: Some(1) }).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, first.id);

        let all = repo.all_menu_items().await.unwrap();
        assert_eq!(all[0].id, first.id);
    }

    #[tokio::test]
    async fn test_log_snapshots_round_trip() {
        let repo = open().await;
        let item = repo.create_menu_item(naan()).await.unwrap();

        let created = repo
            .create_log(NewRecommendationLog {
                session_id: "session_1".to_string(),
                meal_time: Some(MealTime::Dinner),
                user_segment: Some(UserSegment::Budget),
                city: "hyderabad".to_string(),
                accepted_items: vec![ItemSnapshot::from(&item)],
                aov_before: 280.0,
                aov_after: 325.0,
                latency_ms: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(created.id.starts_with("log_"));

        let logs = repo.list_logs(&LogFilter::all(), Page::all()).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].meal_time, Some(MealTime::Dinner));
        assert_eq!(logs[0].accepted_items[0].id, item.id);
        assert!(logs[0].cart_items.is_empty());
        assert_eq!(logs[0].aov_after, 325.0);
        assert_eq!(repo.count_logs().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_logs_filtered() {
        let repo = open().await;
        for (meal_time, user_segment) in [
            (Some(MealTime::Dinner), Some(UserSegment::Budget)),
            (Some(MealTime::Lunch), Some(UserSegment::Budget)),
            (Some(MealTime::Dinner), None),
        ] {
            repo.create_log(NewRecommendationLog { meal_time, user_segment, ..Default::default() })
                .await
                .unwrap();
        }

        let dinner = LogFilter { meal_time: Some(MealTime::Dinner), user_segment: None };
        let logs = repo.list_logs(&dinner, Page::all()).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.meal_time == Some(MealTime::Dinner)));

        let both = LogFilter { meal_time: Some(MealTime::Dinner), user_segment: Some(UserSegment::Budget) };
        assert_eq!(repo.list_logs(&both, Page::all()).await.unwrap().len(), 1);
        let premium = LogFilter { meal_time: None, user_segment: Some(UserSegment::Premium) };
        assert!(repo.list_logs(&premium, Page::all()).await.unwrap().is_empty());
        assert_eq!(repo.list_logs(&LogFilter::all(), Page::all()).await.unwrap().len(), 3);
    }
}
