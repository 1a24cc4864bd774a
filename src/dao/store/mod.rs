/// Process-local backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    AcademyEntity, MatchChange, MatchEntity, MatchQuery, PlayerRequestEntity, RequestChange,
    RequestQuery, UserEntity,
};
use crate::dao::storage::StorageResult;
use crate::state::match_machine::MatchStatus;

/// Abstraction over the persistence layer for academies, users, matches and player requests.
///
/// Status writes are compare-and-set operations keyed on the expected source states: they
/// return `None` when no record with that id is currently in one of those states.
pub trait EntityStore: Send + Sync {
    /// Short name of the backend, reported by the health check.
    fn backend(&self) -> &'static str;

    fn save_academy(&self, academy: AcademyEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_academy(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<AcademyEntity>>>;
    fn find_academies(&self, ids: Vec<Uuid>)
    -> BoxFuture<'static, StorageResult<Vec<AcademyEntity>>>;
    /// Add a user to an academy roster; a no-op when already present.
    fn add_academy_player(
        &self,
        academy_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;

    fn insert_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn list_matches(&self, query: MatchQuery) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn count_matches(&self, query: MatchQuery) -> BoxFuture<'static, StorageResult<u64>>;
    fn transition_match(
        &self,
        id: Uuid,
        expected: Vec<MatchStatus>,
        change: MatchChange,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete the match only if it is still in `status`.
    fn delete_match_if_status(
        &self,
        id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Bulk-delete finished matches whose last write is at or before `cutoff`.
    fn delete_finished_matches(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<u64>>;

    /// Insert a pending request; fails with a duplicate error when the pair already has one.
    fn insert_player_request(
        &self,
        record: PlayerRequestEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player_request(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRequestEntity>>>;
    fn list_player_requests(
        &self,
        query: RequestQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerRequestEntity>>>;
    /// Decide a request that is still pending.
    fn transition_player_request(
        &self,
        id: Uuid,
        change: RequestChange,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRequestEntity>>>;
    fn delete_player_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Remove requests whose expiry is at or before `now`.
    fn purge_expired_requests(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<u64>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
