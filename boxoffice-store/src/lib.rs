pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_repo;
pub mod reservation_repo;

pub use database::DbClient;
pub use memory::{MemoryLock, MemoryReservationStore};
pub use redis_repo::{RedisClient, RedisLock};
pub use reservation_repo::PgReservationStore;
