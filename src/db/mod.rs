mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
