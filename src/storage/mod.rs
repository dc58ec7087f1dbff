pub mod migrations;
pub mod retention;
pub mod sqlite;
pub mod suggestions;

pub use suggestions::{CachedSuggestion, SuggestionStore};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to create pool: {0}")]
    CreatePool(#[from] deadpool_sqlite::CreatePoolError),

    #[error("pool error: {0}")]
    Pool(#[from] deadpool_sqlite::PoolError),

    #[error("interact error: {0}")]
    Interact(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl From<deadpool_sqlite::InteractError> for CacheError {
    fn from(e: deadpool_sqlite::InteractError) -> Self {
        CacheError::Interact(e.to_string())
    }
}
