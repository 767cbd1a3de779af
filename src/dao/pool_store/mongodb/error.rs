use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to read {collection} `{id}`")]
    Find {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list {collection}")]
    List {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert into {collection}")]
    Insert {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to update {collection} `{id}`")]
    Update {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete {collection} `{id}`")]
    Delete {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
}

/// Server code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

impl MongoDaoError {
    /// Whether an insert collided with the unique `id` index.
    pub fn is_duplicate_key(&self) -> bool {
        let MongoDaoError::Insert { source, .. } = self else {
            return false;
        };
        match source.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(err)) => err.code == DUPLICATE_KEY,
            ErrorKind::InsertMany(err) => err
                .write_errors
                .as_ref()
                .is_some_and(|errors| errors.iter().any(|err| err.code == DUPLICATE_KEY)),
            _ => false,
        }
    }
}
