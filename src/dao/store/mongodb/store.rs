use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Bson, DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        ACADEMY_COLLECTION_NAME, MATCH_COLLECTION_NAME, MongoAcademyDocument, MongoMatchDocument,
        MongoPlayerRequestDocument, MongoUserDocument, REQUEST_COLLECTION_NAME,
        USER_COLLECTION_NAME,
    },
};
use crate::{
    dao::{
        models::{
            AcademyEntity, MatchChange, MatchEntity, MatchOrder, MatchQuery, PlayerRequestEntity,
            RequestChange, RequestQuery, UserEntity,
        },
        storage::StorageResult,
        store::EntityStore,
    },
    state::{match_machine::MatchStatus, request_machine::RequestStatus},
};

/// Status string written by older clients for what is now `confirmed`.
const LEGACY_CONFIRMED: &str = "accepted";

/// MongoDB-backed [`EntityStore`].
#[derive(Clone)]
pub struct MongoStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = establish_connection(&self.config).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

fn id_filter(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

/// Stored status strings that count as one of `statuses`.
fn status_values(statuses: &[MatchStatus]) -> Vec<&'static str> {
    let mut values: Vec<&'static str> = statuses.iter().map(|status| status.as_str()).collect();
    if statuses.contains(&MatchStatus::Confirmed) {
        values.push(LEGACY_CONFIRMED);
    }
    values
}

fn match_filter(query: &MatchQuery) -> Document {
    let mut filter = Document::new();
    if let Some(status) = query.status {
        filter.insert("status", doc! { "$in": status_values(&[status]) });
    }
    if let Some(academy) = query.academy {
        filter.insert("academy", academy.to_string());
    }
    if let Some(academy) = query.involving {
        let academy = academy.to_string();
        filter.insert(
            "$or",
            vec![
                Bson::Document(doc! { "academy": academy.clone() }),
                Bson::Document(doc! { "opponent": academy }),
            ],
        );
    }
    filter
}

fn match_sort(order: MatchOrder) -> Document {
    match order {
        MatchOrder::DateTimeAsc => doc! { "dateTime": 1 },
        MatchOrder::CreatedAtDesc => doc! { "createdAt": -1 },
    }
}

fn match_update(change: &MatchChange) -> Document {
    let mut set = doc! {
        "status": change.status.as_str(),
        "updatedAt": DateTime::from_system_time(change.updated_at),
    };
    if let Some(opponent) = change.opponent {
        set.insert("opponent", opponent.to_string());
    }
    if let Some(finished_at) = change.finished_at {
        set.insert("finishedAt", DateTime::from_system_time(finished_at));
    }
    doc! { "$set": set }
}

fn request_filter(query: &RequestQuery) -> Document {
    let mut filter = Document::new();
    if let Some(user) = query.user {
        filter.insert("user", user.to_string());
    }
    if let Some(academy) = query.academy {
        filter.insert("academy", academy.to_string());
    }
    filter
}

fn request_update(change: &RequestChange) -> Document {
    let mut set = doc! {
        "status": change.status.as_str(),
        "updatedAt": DateTime::from_system_time(change.updated_at),
    };
    if let Some(expire_at) = change.expire_at {
        set.insert("expireAt", DateTime::from_system_time(expire_at));
    }
    if let Some(message) = &change.response_message {
        set.insert("responseMessage", message.as_str());
    }
    doc! { "$set": set }
}

impl MongoStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let matches = database.collection::<Document>(MATCH_COLLECTION_NAME);
        let match_indexes = [
            (
                "status,updatedAt",
                IndexModel::builder()
                    .keys(doc! { "status": 1, "updatedAt": 1 })
                    .options(
                        IndexOptions::builder()
                            .name(Some("match_status_updated_idx".to_owned()))
                            .build(),
                    )
                    .build(),
            ),
            (
                "dateTime",
                IndexModel::builder()
                    .keys(doc! { "dateTime": 1 })
                    .options(
                        IndexOptions::builder()
                            .name(Some("match_date_time_idx".to_owned()))
                            .build(),
                    )
                    .build(),
            ),
        ];
        for (name, index) in match_indexes {
            matches
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: MATCH_COLLECTION_NAME,
                    index: name,
                    source,
                })?;
        }

        let requests = database.collection::<Document>(REQUEST_COLLECTION_NAME);
        let request_indexes = [
            (
                "expireAt",
                IndexModel::builder()
                    .keys(doc! { "expireAt": 1 })
                    .options(
                        IndexOptions::builder()
                            .name(Some("request_expire_ttl".to_owned()))
                            .expire_after(Some(Duration::ZERO))
                            .build(),
                    )
                    .build(),
            ),
            (
                "user,academy",
                IndexModel::builder()
                    .keys(doc! { "user": 1, "academy": 1 })
                    .options(
                        IndexOptions::builder()
                            .name(Some("request_pending_pair_idx".to_owned()))
                            .unique(Some(true))
                            .partial_filter_expression(Some(
                                doc! { "status": RequestStatus::Pending.as_str() },
                            ))
                            .build(),
                    )
                    .build(),
            ),
        ];
        for (name, index) in request_indexes {
            requests
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: REQUEST_COLLECTION_NAME,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.database.read().await.clone()
    }

    async fn academies(&self) -> Collection<MongoAcademyDocument> {
        self.database().await.collection(ACADEMY_COLLECTION_NAME)
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        self.database().await.collection(USER_COLLECTION_NAME)
    }

    async fn matches(&self) -> Collection<MongoMatchDocument> {
        self.database().await.collection(MATCH_COLLECTION_NAME)
    }

    async fn requests(&self) -> Collection<MongoPlayerRequestDocument> {
        self.database().await.collection(REQUEST_COLLECTION_NAME)
    }

    async fn save_academy(&self, academy: AcademyEntity) -> MongoResult<()> {
        let id = academy.id;
        let document = MongoAcademyDocument::from(academy);
        self.academies()
            .await
            .replace_one(id_filter(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: ACADEMY_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_academy(&self, id: Uuid) -> MongoResult<Option<AcademyEntity>> {
        self.academies()
            .await
            .find_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: ACADEMY_COLLECTION_NAME,
                source,
            })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn find_academies(&self, ids: Vec<Uuid>) -> MongoResult<Vec<AcademyEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let documents: Vec<MongoAcademyDocument> = self
            .academies()
            .await
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: ACADEMY_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: ACADEMY_COLLECTION_NAME,
                source,
            })?;
        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn add_academy_player(&self, academy_id: Uuid, user_id: Uuid) -> MongoResult<bool> {
        let result = self
            .academies()
            .await
            .update_one(
                id_filter(academy_id),
                doc! { "$addToSet": { "players": user_id.to_string() } },
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: ACADEMY_COLLECTION_NAME,
                id: academy_id,
                source,
            })?;
        Ok(result.modified_count > 0)
    }

    async fn save_user(&self, user: UserEntity) -> MongoResult<()> {
        let id = user.id;
        let document = MongoUserDocument::from(user);
        self.users()
            .await
            .replace_one(id_filter(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: USER_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> MongoResult<Option<UserEntity>> {
        self.users()
            .await
            .find_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: USER_COLLECTION_NAME,
                source,
            })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn insert_match(&self, record: MatchEntity) -> MongoResult<()> {
        let id = record.id;
        let document = MongoMatchDocument::from(record);
        self.matches()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: MATCH_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_match(&self, id: Uuid) -> MongoResult<Option<MatchEntity>> {
        self.matches()
            .await
            .find_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: MATCH_COLLECTION_NAME,
                source,
            })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_matches(&self, query: MatchQuery) -> MongoResult<Vec<MatchEntity>> {
        let collection = self.matches().await;
        let mut find = collection
            .find(match_filter(&query))
            .sort(match_sort(query.order))
            .skip(query.skip);
        if let Some(limit) = query.limit {
            find = find.limit(limit);
        }

        let documents: Vec<MongoMatchDocument> = find
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: MATCH_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: MATCH_COLLECTION_NAME,
                source,
            })?;
        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_matches(&self, query: MatchQuery) -> MongoResult<u64> {
        self.matches()
            .await
            .count_documents(match_filter(&query))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: MATCH_COLLECTION_NAME,
                source,
            })
    }

    async fn transition_match(
        &self,
        id: Uuid,
        expected: Vec<MatchStatus>,
        change: MatchChange,
    ) -> MongoResult<Option<MatchEntity>> {
        let mut filter = id_filter(id);
        filter.insert("status", doc! { "$in": status_values(&expected) });

        self.matches()
            .await
            .find_one_and_update(filter, match_update(&change))
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: MATCH_COLLECTION_NAME,
                id,
                source,
            })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn delete_match(&self, filter: Document) -> MongoResult<bool> {
        let result = self
            .matches()
            .await
            .delete_one(filter)
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: MATCH_COLLECTION_NAME,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_finished_matches(&self, cutoff: SystemTime) -> MongoResult<u64> {
        let result = self
            .matches()
            .await
            .delete_many(doc! {
                "status": MatchStatus::Finished.as_str(),
                "updatedAt": { "$lte": DateTime::from_system_time(cutoff) },
            })
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: MATCH_COLLECTION_NAME,
                source,
            })?;
        Ok(result.deleted_count)
    }

    async fn insert_player_request(&self, record: PlayerRequestEntity) -> MongoResult<()> {
        let (id, user, academy) = (record.id, record.user, record.academy);
        let document = MongoPlayerRequestDocument::from(record);
        self.requests()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicatePendingRequest { user, academy }
                } else {
                    MongoDaoError::Save {
                        collection: REQUEST_COLLECTION_NAME,
                        id,
                        source,
                    }
                }
            })?;
        Ok(())
    }

    async fn find_player_request(&self, id: Uuid) -> MongoResult<Option<PlayerRequestEntity>> {
        self.requests()
            .await
            .find_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: REQUEST_COLLECTION_NAME,
                source,
            })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_player_requests(
        &self,
        query: RequestQuery,
    ) -> MongoResult<Vec<PlayerRequestEntity>> {
        let documents: Vec<MongoPlayerRequestDocument> = self
            .requests()
            .await
            .find(request_filter(&query))
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: REQUEST_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: REQUEST_COLLECTION_NAME,
                source,
            })?;
        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn transition_player_request(
        &self,
        id: Uuid,
        change: RequestChange,
    ) -> MongoResult<Option<PlayerRequestEntity>> {
        let mut filter = id_filter(id);
        filter.insert("status", RequestStatus::Pending.as_str());

        self.requests()
            .await
            .find_one_and_update(filter, request_update(&change))
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: REQUEST_COLLECTION_NAME,
                id,
                source,
            })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn delete_player_request(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .requests()
            .await
            .delete_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: REQUEST_COLLECTION_NAME,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn purge_expired_requests(&self, now: SystemTime) -> MongoResult<u64> {
        let result = self
            .requests()
            .await
            .delete_many(doc! { "expireAt": { "$lte": DateTime::from_system_time(now) } })
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: REQUEST_COLLECTION_NAME,
                source,
            })?;
        Ok(result.deleted_count)
    }
}

impl EntityStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    fn save_academy(&self, academy: AcademyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_academy(academy).await.map_err(Into::into) })
    }

    fn find_academy(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<AcademyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_academy(id).await.map_err(Into::into) })
    }

    fn find_academies(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<AcademyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_academies(ids).await.map_err(Into::into) })
    }

    fn add_academy_player(
        &self,
        academy_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .add_academy_player(academy_id, user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_user(user).await.map_err(Into::into) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(id).await.map_err(Into::into) })
    }

    fn insert_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_match(record).await.map_err(Into::into) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn list_matches(
        &self,
        query: MatchQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches(query).await.map_err(Into::into) })
    }

    fn count_matches(&self, query: MatchQuery) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_matches(query).await.map_err(Into::into) })
    }

    fn transition_match(
        &self,
        id: Uuid,
        expected: Vec<MatchStatus>,
        change: MatchChange,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .transition_match(id, expected, change)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_match(id_filter(id)).await.map_err(Into::into) })
    }

    fn delete_match_if_status(
        &self,
        id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = id_filter(id);
            filter.insert("status", doc! { "$in": status_values(&[status]) });
            store.delete_match(filter).await.map_err(Into::into)
        })
    }

    fn delete_finished_matches(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.delete_finished_matches(cutoff).await.map_err(Into::into) })
    }

    fn insert_player_request(
        &self,
        record: PlayerRequestEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_player_request(record).await.map_err(Into::into) })
    }

    fn find_player_request(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player_request(id).await.map_err(Into::into) })
    }

    fn list_player_requests(
        &self,
        query: RequestQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_player_requests(query).await.map_err(Into::into) })
    }

    fn transition_player_request(
        &self,
        id: Uuid,
        change: RequestChange,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .transition_player_request(id, change)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_player_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_player_request(id).await.map_err(Into::into) })
    }

    fn purge_expired_requests(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.purge_expired_requests(now).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
