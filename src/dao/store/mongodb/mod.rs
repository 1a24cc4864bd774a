mod config;
mod connection;
mod error;
mod models;
/// [`EntityStore`](crate::dao::store::EntityStore) implementation over MongoDB.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicatePendingRequest { .. } => StorageError::duplicate(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
