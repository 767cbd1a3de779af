/// Database model definitions.
pub mod models;
/// Persistence layer for games, payments and seasons.
pub mod pool_store;
/// Storage abstraction layer for database operations.
pub mod storage;
