pub mod memory;
pub mod model;
pub mod repo;
pub mod seed;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use model::*;
pub use repo::*;
pub use seed::{sample_items, seed_if_empty};
pub use sqlite::SqliteRepository;
