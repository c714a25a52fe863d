pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};
pub use handlers::*;
