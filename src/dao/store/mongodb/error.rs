use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// The database never answered during startup.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    /// A runtime health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// An insert or replace failed.
    #[error("failed to save {collection} record `{id}`")]
    Save {
        collection: &'static str,
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// An update failed.
    #[error("failed to update {collection} record `{id}`")]
    Update {
        collection: &'static str,
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// A read failed.
    #[error("failed to query collection `{collection}`")]
    Query {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// A delete failed.
    #[error("failed to delete from collection `{collection}`")]
    Delete {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// The pair already has a pending request.
    #[error("user `{user}` already has a pending request for academy `{academy}`")]
    DuplicatePendingRequest { user: Uuid, academy: Uuid },
    /// A stored id is not a UUID.
    #[error("document in `{collection}` holds malformed identifier `{value}`")]
    MalformedId {
        collection: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },
}

/// Whether the error is a unique index violation reported by the server.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}
