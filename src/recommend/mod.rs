pub mod scoring;
pub mod service;
pub mod stats;

pub use scoring::{category_score, generate_recommendations, score_item, Context};
pub use service::{recommend, RecommendRequest, RecommendResponse};
pub use stats::{collect_stats, Stats};
