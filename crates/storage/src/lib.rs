pub mod db;
pub mod kv;
pub mod profiles;

use thiserror::Error;

pub use db::{create_db, DbPool, SqliteStore};
pub use kv::{KeyValueStore, MemoryStore};
pub use profiles::{ProfileRepository, PROFILES_KEY};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}
