use thiserror::Error;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed (disk, quota, engine-internal).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The embedded tab list of a session record failed to (de)serialise.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A mutation targeted a key absent from the collection.
    #[error("record not found: {collection}/{key}")]
    NotFound {
        collection: &'static str,
        key: i64,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
