use serde::{Deserialize, Serialize};

use crate::db::{DbResult, LogFilter, MenuItemRepo, Page, RecommendationLog, RecommendationLogRepo, Repository};

/// Aggregate figures for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_items: usize,
    pub total_logs: usize,
    pub total_recommended: usize,
    pub total_accepted: usize,
    /// Mean per-log acceptance in percent. Each log contributes
    /// accepted / recommended, counting an empty rail as one.
    pub acceptance_rate: f64,
    pub avg_aov_before: f64,
    pub avg_aov_after: f64,
    /// Relative AOV increase in percent, 0 when there is no baseline.
    pub aov_lift: f64,
    pub avg_latency_ms: f64,
}

impl Stats {
    pub fn from_logs(total_items: usize, logs: &[RecommendationLog]) -> Self {
        let total_logs = logs.len();
        let total_recommended: usize = logs.iter().map(|l| l.recommended_items.len()).sum();
        let total_accepted: usize = logs.iter().map(|l| l.accepted_items.len()).sum();

        let mean = |f: fn(&RecommendationLog) -> f64| {
            if total_logs == 0 {
                0.0
            } else {
                logs.iter().map(f).sum::<f64>() / total_logs as f64
            }
        };
        let avg_aov_before = mean(|l| l.aov_before);
        let avg_aov_after = mean(|l| l.aov_after);
        let avg_latency_ms = mean(|l| l.latency_ms as f64);
        let acceptance_rate =
            mean(|l| l.accepted_items.len() as f64 / l.recommended_items.len().max(1) as f64) * 100.0;

        let aov_lift = if avg_aov_before > 0.0 {
            (avg_aov_after - avg_aov_before) / avg_aov_before * 100.0
        } else {
            0.0
        };

        Self {
            total_items,
            total_logs,
            total_recommended,
            total_accepted,
            acceptance_rate,
            avg_aov_before,
            avg_aov_after,
            aov_lift,
            avg_latency_ms,
        }
    }
}

/// Figures over the logs the filter matches. `total_items` always counts the
/// whole catalog.
pub async fn collect_stats<R: Repository + ?Sized>(repo: &R, filter: &LogFilter) -> DbResult<Stats> {
    let total_items = repo.count_menu_items().await?;
    let logs = repo.list_logs(filter, Page::all()).await?;
    Ok(Stats::from_logs(total_items, &logs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_if_empty, ItemSnapshot, MealTime, MemoryRepository, NewRecommendationLog, UserSegment};
    use chrono::Utc;

    fn log(recommended: usize, accepted: usize, before: f64, after: f64, latency: u64) -> RecommendationLog {
        NewRecommendationLog {
            recommended_items: vec![ItemSnapshot::default(); recommended],
            accepted_items: vec![ItemSnapshot::default(); accepted],
            aov_before: before,
            aov_after: after,
            latency_ms: latency,
            ..Default::default()
        }
        .into_log("log_x".to_string(), Utc::now())
    }

    #[test]
    fn test_empty_logs() {
        let stats = Stats::from_logs(16, &[]);
        assert_eq!(stats.total_items, 16);
        assert_eq!(stats.acceptance_rate, 0.0);
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert_eq!(stats.aov_lift, 0.0);
    }

    #[test]
    fn test_rates_and_averages() {
        let logs = vec![log(6, 1, 200.0, 250.0, 2), log(6, 2, 300.0, 350.0, 4)];
        let stats = Stats::from_logs(16, &logs);
        assert_eq!(stats.total_recommended, 12);
        assert_eq!(stats.total_accepted, 3);
        // (1/6 + 2/6) / 2
        assert!((stats.acceptance_rate - 25.0).abs() < 1e-9);
        assert_eq!(stats.avg_aov_before, 250.0);
        assert_eq!(stats.avg_aov_after, 300.0);
        assert!((stats.aov_lift - 20.0).abs() < 1e-9);
        assert_eq!(stats.avg_latency_ms, 3.0);
    }

    #[test]
    fn test_acceptance_is_mean_of_per_log_rates() {
        // A first add has no rail yet: 1 accepted out of 0 shown counts as 1/1.
        let logs = vec![log(0, 1, 0.0, 120.0, 0), log(6, 1, 120.0, 170.0, 2)];
        let stats = Stats::from_logs(16, &logs);
        assert!((stats.acceptance_rate - (1.0 + 1.0 / 6.0) / 2.0 * 100.0).abs() < 1e-9);
        assert!((stats.acceptance_rate - 58.333).abs() < 1e-3);

        let stats = Stats::from_logs(16, &[log(0, 0, 0.0, 0.0, 0)]);
        assert_eq!(stats.acceptance_rate, 0.0);
    }

    #[tokio::test]
    async fn test_collect_stats_filtered() {
        let repo = MemoryRepository::new();
        seed_if_empty(&repo).await.unwrap();
        for (meal_time, user_segment, accepted) in [
            (MealTime::Dinner, UserSegment::Budget, 6),
            (MealTime::Dinner, UserSegment::Premium, 3),
            (MealTime::Lunch, UserSegment::Budget, 0),
        ] {
            repo.create_log(NewRecommendationLog {
                meal_time: Some(meal_time),
                user_segment: Some(user_segment),
                recommended_items: vec![ItemSnapshot::default(); 6],
                accepted_items: vec![ItemSnapshot::default(); accepted],
                latency_ms: accepted as u64,
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let all = collect_stats(&repo, &LogFilter::all()).await.unwrap();
        assert_eq!(all.total_items, 16);
        assert_eq!(all.total_logs, 3);
        assert!((all.acceptance_rate - 50.0).abs() < 1e-9);

        let dinner = LogFilter { meal_time: Some(MealTime::Dinner), user_segment: None };
        let stats = collect_stats(&repo, &dinner).await.unwrap();
        assert_eq!(stats.total_items, 16);
        assert_eq!(stats.total_logs, 2);
        assert!((stats.acceptance_rate - 75.0).abs() < 1e-9);
        assert_eq!(stats.avg_latency_ms, 4.5);

        let budget_lunch = LogFilter { meal_time: Some(MealTime::Lunch), user_segment: Some(UserSegment::Budget) };
        let stats = collect_stats(&repo, &budget_lunch).await.unwrap();
        assert_eq!(stats.total_logs, 1);
        assert_eq!(stats.acceptance_rate, 0.0);
    }
}
