//! Process-local [`EntityStore`] used for local runs and tests.
//!
//! Compare-and-set writes happen while holding the record's shard lock, which gives the
//! same single-winner guarantee as a conditional update in the database.

use std::{cmp::Reverse, sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            AcademyEntity, MatchChange, MatchEntity, MatchOrder, MatchQuery, PlayerRequestEntity,
            RequestChange, RequestQuery, UserEntity,
        },
        storage::{StorageError, StorageResult},
        store::EntityStore,
    },
    state::{match_machine::MatchStatus, request_machine::RequestStatus},
};

/// In-memory [`EntityStore`] implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    academies: DashMap<Uuid, AcademyEntity>,
    users: DashMap<Uuid, UserEntity>,
    matches: DashMap<Uuid, MatchEntity>,
    requests: DashMap<Uuid, PlayerRequestEntity>,
    /// `(user, academy)` -> id of the pending request for that pair.
    pending: DashMap<(Uuid, Uuid), Uuid>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryInner {
    fn add_academy_player(&self, academy_id: Uuid, user_id: Uuid) -> bool {
        let Some(mut academy) = self.academies.get_mut(&academy_id) else {
            return false;
        };
        if academy.players.contains(&user_id) {
            return false;
        }
        academy.players.push(user_id);
        true
    }

    fn list_matches(&self, query: &MatchQuery) -> Vec<MatchEntity> {
        let mut records: Vec<MatchEntity> = self
            .matches
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        match query.order {
            MatchOrder::DateTimeAsc => records.sort_by_key(|record| record.date_time),
            MatchOrder::CreatedAtDesc => records.sort_by_key(|record| Reverse(record.created_at)),
        }

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);
        records.into_iter().skip(skip).take(limit).collect()
    }

    fn transition_match(
        &self,
        id: Uuid,
        expected: &[MatchStatus],
        change: &MatchChange,
    ) -> Option<MatchEntity> {
        let mut record = self.matches.get_mut(&id)?;
        if !expected.contains(&record.status) {
            return None;
        }
        change.apply_to(&mut record);
        Some(record.clone())
    }

    fn delete_finished_matches(&self, cutoff: SystemTime) -> u64 {
        let mut removed = 0;
        self.matches.retain(|_, record| {
            let expired = record.status == MatchStatus::Finished && record.updated_at <= cutoff;
            removed += u64::from(expired);
            !expired
        });
        removed
    }

    fn insert_player_request(&self, record: PlayerRequestEntity) -> StorageResult<()> {
        if record.status != RequestStatus::Pending {
            self.requests.insert(record.id, record);
            return Ok(());
        }

        match self.pending.entry((record.user, record.academy)) {
            Entry::Occupied(_) => Err(StorageError::duplicate(format!(
                "user `{}` already has a pending request for academy `{}`",
                record.user, record.academy
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.id);
                self.requests.insert(record.id, record);
                Ok(())
            }
        }
    }

    fn transition_player_request(
        &self,
        id: Uuid,
        change: &RequestChange,
    ) -> Option<PlayerRequestEntity> {
        let updated = {
            let mut record = self.requests.get_mut(&id)?;
            if record.status != RequestStatus::Pending {
                return None;
            }
            change.apply_to(&mut record);
            record.clone()
        };
        self.release_pending(&updated);
        Some(updated)
    }

    fn delete_player_request(&self, id: Uuid) -> bool {
        match self.requests.remove(&id) {
            Some((_, record)) => {
                self.release_pending(&record);
                true
            }
            None => false,
        }
    }

    fn purge_expired_requests(&self, now: SystemTime) -> u64 {
        let mut removed = 0;
        self.requests.retain(|_, record| {
            let expired = record.expire_at.is_some_and(|expire_at| expire_at <= now);
            removed += u64::from(expired);
            !expired
        });
        removed
    }

    fn list_player_requests(&self, query: &RequestQuery) -> Vec<PlayerRequestEntity> {
        let mut records: Vec<PlayerRequestEntity> = self
            .requests
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| Reverse(record.created_at));
        records
    }

    fn release_pending(&self, record: &PlayerRequestEntity) {
        self.pending
            .remove_if(&(record.user, record.academy), |_, pending_id| {
                *pending_id == record.id
            });
    }
}

impl EntityStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn save_academy(&self, academy: AcademyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.academies.insert(academy.id, academy);
            Ok(())
        })
    }

    fn find_academy(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<AcademyEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.academies.get(&id).map(|entry| entry.clone())) })
    }

    fn find_academies(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<AcademyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(ids
                .iter()
                .filter_map(|id| store.inner.academies.get(id).map(|entry| entry.clone()))
                .collect())
        })
    }

    fn add_academy_player(
        &self,
        academy_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.add_academy_player(academy_id, user_id)) })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.users.insert(user.id, user);
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.users.get(&id).map(|entry| entry.clone())) })
    }

    fn insert_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.matches.insert(record.id, record);
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.matches.get(&id).map(|entry| entry.clone())) })
    }

    fn list_matches(
        &self,
        query: MatchQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.list_matches(&query)) })
    }

    fn count_matches(&self, query: MatchQuery) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .matches
                .iter()
                .filter(|entry| query.matches(entry.value()))
                .count() as u64)
        })
    }

    fn transition_match(
        &self,
        id: Uuid,
        expected: Vec<MatchStatus>,
        change: MatchChange,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.transition_match(id, &expected, &change)) })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.matches.remove(&id).is_some()) })
    }

    fn delete_match_if_status(
        &self,
        id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .matches
                .remove_if(&id, |_, record| record.status == status)
                .is_some())
        })
    }

    fn delete_finished_matches(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.delete_finished_matches(cutoff)) })
    }

    fn insert_player_request(
        &self,
        record: PlayerRequestEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_player_request(record) })
    }

    fn find_player_request(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.requests.get(&id).map(|entry| entry.clone())) })
    }

    fn list_player_requests(
        &self,
        query: RequestQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.list_player_requests(&query)) })
    }

    fn transition_player_request(
        &self,
        id: Uuid,
        change: RequestChange,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.transition_player_request(id, &change)) })
    }

    fn delete_player_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.delete_player_request(id)) })
    }

    fn purge_expired_requests(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.purge_expired_requests(now)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::models::HomeAway;

    fn sample_match(academy: Uuid, status: MatchStatus, updated_at: SystemTime) -> MatchEntity {
        MatchEntity {
            id: Uuid::new_v4(),
            academy,
            opponent: None,
            creator_id: Uuid::new_v4(),
            age_group: "2010".into(),
            date_time: updated_at,
            home_away: HomeAway::Home,
            location_description: "Main pitch".into(),
            location_geo: None,
            phone: "+100".into(),
            duration: None,
            description: "Friendly match".into(),
            status,
            finished_at: None,
            created_at: updated_at,
            updated_at,
        }
    }

    fn pending_request(user: Uuid, academy: Uuid) -> PlayerRequestEntity {
        let now = SystemTime::now();
        PlayerRequestEntity {
            id: Uuid::new_v4(),
            user,
            academy,
            user_name: "Sam".into(),
            user_email: "sam@example.com".into(),
            academy_name: "North FC".into(),
            status: RequestStatus::Pending,
            message: None,
            age: Some(12),
            position: None,
            response_message: None,
            expire_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn transition_only_applies_from_expected_states() {
        let store = MemoryStore::new();
        let record = sample_match(Uuid::new_v4(), MatchStatus::Requested, SystemTime::now());
        let id = record.id;
        store.insert_match(record).await.unwrap();

        let change = MatchChange {
            status: MatchStatus::Finished,
            opponent: None,
            finished_at: Some(SystemTime::now()),
            updated_at: SystemTime::now(),
        };
        let miss = store
            .transition_match(id, vec![MatchStatus::Confirmed], change.clone())
            .await
            .unwrap();
        assert!(miss.is_none());
        assert_eq!(
            store.find_match(id).await.unwrap().unwrap().status,
            MatchStatus::Requested
        );

        let hit = store
            .transition_match(id, vec![MatchStatus::Requested], change)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.status, MatchStatus::Finished);
    }

    #[tokio::test]
    async fn delete_finished_keys_on_cutoff() {
        let store = MemoryStore::new();
        let now = SystemTime::now();
        let old = sample_match(Uuid::new_v4(), MatchStatus::Finished, now - Duration::from_secs(3600));
        let fresh = sample_match(Uuid::new_v4(), MatchStatus::Finished, now);
        let open = sample_match(Uuid::new_v4(), MatchStatus::Confirmed, now - Duration::from_secs(3600));
        for record in [old, fresh.clone(), open.clone()] {
            store.insert_match(record).await.unwrap();
        }

        let deleted = store
            .delete_finished_matches(now - Duration::from_secs(900))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.find_match(fresh.id).await.unwrap().is_some());
        assert!(store.find_match(open.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sweep_count_ignores_concurrent_inserts() {
        let store = MemoryStore::new();
        let now = SystemTime::now();
        let stale = now - Duration::from_secs(3600);
        for _ in 0..500 {
            store
                .insert_match(sample_match(Uuid::new_v4(), MatchStatus::Finished, stale))
                .await
                .unwrap();
        }

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    store
                        .insert_match(sample_match(Uuid::new_v4(), MatchStatus::Requested, now))
                        .await
                        .unwrap();
                }
            })
        };
        let deleted = store
            .delete_finished_matches(now - Duration::from_secs(900))
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(deleted, 500);
        assert_eq!(store.inner.matches.len(), 500);
    }

    #[tokio::test]
    async fn purge_counts_only_expired_requests() {
        let store = MemoryStore::new();
        let now = SystemTime::now();
        let mut expired = pending_request(Uuid::new_v4(), Uuid::new_v4());
        expired.status = RequestStatus::Rejected;
        expired.expire_at = Some(now - Duration::from_secs(1));
        let mut later = pending_request(Uuid::new_v4(), Uuid::new_v4());
        later.status = RequestStatus::Rejected;
        later.expire_at = Some(now + Duration::from_secs(60));
        let open = pending_request(Uuid::new_v4(), Uuid::new_v4());
        for record in [expired, later.clone(), open.clone()] {
            store.insert_player_request(record).await.unwrap();
        }

        assert_eq!(store.purge_expired_requests(now).await.unwrap(), 1);
        assert_eq!(store.purge_expired_requests(now).await.unwrap(), 0);
        assert!(store.find_player_request(later.id).await.unwrap().is_some());
        assert!(store.find_player_request(open.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_pending_request_for_pair_is_duplicate() {
        let store = MemoryStore::new();
        let (user, academy) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_player_request(pending_request(user, academy))
            .await
            .unwrap();

        let err = store
            .insert_player_request(pending_request(user, academy))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { .. }));

        store
            .insert_player_request(pending_request(user, Uuid::new_v4()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deciding_a_request_frees_the_pair() {
        let store = MemoryStore::new();
        let (user, academy) = (Uuid::new_v4(), Uuid::new_v4());
        let first = pending_request(user, academy);
        let first_id = first.id;
        store.insert_player_request(first).await.unwrap();

        let change = RequestChange {
            status: RequestStatus::Rejected,
            expire_at: Some(SystemTime::now()),
            response_message: None,
            updated_at: SystemTime::now(),
        };
        assert!(
            store
                .transition_player_request(first_id, change.clone())
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .transition_player_request(first_id, change)
                .await
                .unwrap()
                .is_none()
        );

        store
            .insert_player_request(pending_request(user, academy))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn roster_add_is_idempotent() {
        let store = MemoryStore::new();
        let academy = AcademyEntity {
            id: Uuid::new_v4(),
            name: "North FC".into(),
            logo: None,
            phone: None,
            players: Vec::new(),
            created_at: SystemTime::now(),
        };
        let academy_id = academy.id;
        store.save_academy(academy).await.unwrap();
        let user = Uuid::new_v4();

        assert!(store.add_academy_player(academy_id, user).await.unwrap());
        assert!(!store.add_academy_player(academy_id, user).await.unwrap());
        let academy = store.find_academy(academy_id).await.unwrap().unwrap();
        assert_eq!(academy.players, vec![user]);
    }
}
