// Service exports
pub mod cache;
pub mod postgres;
pub mod store;

pub use cache::{CacheManager, CacheKey, CacheError};
pub use postgres::{PostgresClient, PostgresPointStore, SourceSpec, rank_order_case};
pub use store::{PointStore, MemoryPointStore, StoredPoint, StoreError};
