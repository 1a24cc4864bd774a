//! Player-request lifecycle engine.
//!
//! Requests move `pending -> approved | rejected` through a compare-and-set keyed on `pending`.
//! Rejected requests carry an `expire_at` and are removed by the store's expiry mechanism;
//! listings hide anything already past it.

use std::time::SystemTime;

use tracing::{debug, error, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Principal, Role},
    dao::{
        models::{PlayerRequestEntity, RequestChange, RequestQuery},
        store::EntityStore,
    },
    dto::player_requests::{CreatePlayerRequest, DecidePlayerRequest, PlayerRequestResponse},
    error::ServiceError,
    state::{SharedState, lifecycle::Lifecycle, request_machine::RequestStatus},
};

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("player request `{id}`"))
}

fn ensure_manages(principal: &Principal, academy_id: Uuid) -> Result<(), ServiceError> {
    if principal.manages_academy(academy_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "only the academy or an administrator may manage its player requests".into(),
        ))
    }
}

/// Load a request addressed to `academy_id`; requests of other academies read as absent.
async fn load_scoped(
    store: &dyn EntityStore,
    academy_id: Uuid,
    id: Uuid,
) -> Result<PlayerRequestEntity, ServiceError> {
    store
        .find_player_request(id)
        .await?
        .filter(|record| record.academy == academy_id)
        .ok_or_else(|| not_found(id))
}

/// Run the compare-and-set from `pending`, explaining a lost race when nothing matched.
async fn transition(
    store: &dyn EntityStore,
    record: &PlayerRequestEntity,
    change: RequestChange,
) -> Result<PlayerRequestEntity, ServiceError> {
    let target = change.status;
    RequestStatus::check(record.status, target)?;

    if let Some(updated) = store.transition_player_request(record.id, change).await? {
        return Ok(updated);
    }

    match store.find_player_request(record.id).await? {
        None => Err(not_found(record.id)),
        Some(current) => {
            RequestStatus::check(current.status, target)?;
            Err(ServiceError::Conflict(format!(
                "player request `{}` changed concurrently; retry the operation",
                record.id
            )))
        }
    }
}

fn not_expired(now: SystemTime) -> impl Fn(&PlayerRequestEntity) -> bool {
    move |record| record.expire_at.is_none_or(|expire_at| expire_at > now)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// File a join request from the calling user to `academy_id`.
pub async fn request(
    state: &SharedState,
    principal: &Principal,
    academy_id: Uuid,
    payload: CreatePlayerRequest,
) -> Result<PlayerRequestResponse, ServiceError> {
    principal.require_role(Role::User)?;
    payload.validate()?;

    let store = state.require_store().await?;
    let academy = store
        .find_academy(academy_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("academy `{academy_id}`")))?;
    let user = store
        .find_user(principal.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{}`", principal.id)))?;

    let now = SystemTime::now();
    let record = PlayerRequestEntity {
        id: Uuid::new_v4(),
        user: user.id,
        academy: academy.id,
        user_name: user.name,
        user_email: user.email,
        academy_name: academy.name,
        status: RequestStatus::Pending,
        message: non_blank(payload.message),
        age: payload.age,
        position: non_blank(payload.position),
        response_message: None,
        expire_at: None,
        created_at: now,
        updated_at: now,
    };

    store.insert_player_request(record.clone()).await?;
    info!(request_id = %record.id, user = %record.user, academy = %academy_id, "player request filed");
    Ok(record.into())
}

/// Approve or reject a pending request addressed to `academy_id`.
pub async fn decide(
    state: &SharedState,
    principal: &Principal,
    academy_id: Uuid,
    id: Uuid,
    payload: DecidePlayerRequest,
) -> Result<PlayerRequestResponse, ServiceError> {
    ensure_manages(principal, academy_id)?;
    payload.validate()?;

    let target = payload.status;
    if target == RequestStatus::Pending {
        return Err(ServiceError::InvalidInput(
            "decision must be `approved` or `rejected`".into(),
        ));
    }

    let store = state.require_store().await?;
    let record = load_scoped(store.as_ref(), academy_id, id).await?;

    let now = SystemTime::now();
    let expire_at = match target {
        RequestStatus::Rejected => Some(
            now.checked_add(state.config().request_rejection_ttl())
                .ok_or_else(|| {
                    ServiceError::InvalidInput(
                        "configured rejection expiry is out of range".into(),
                    )
                })?,
        ),
        _ => None,
    };
    let change = RequestChange {
        status: target,
        expire_at,
        response_message: non_blank(payload.reason),
        updated_at: now,
    };

    let updated = transition(store.as_ref(), &record, change).await?;
    info!(request_id = %id, academy = %academy_id, status = %target, "player request decided");

    if target == RequestStatus::Approved {
        // Best effort: the decision stands even if the roster write fails.
        match store.add_academy_player(academy_id, updated.user).await {
            Ok(true) => debug!(academy = %academy_id, user = %updated.user, "player added to roster"),
            Ok(false) => debug!(academy = %academy_id, user = %updated.user, "player already on roster"),
            Err(err) => error!(
                academy = %academy_id,
                user = %updated.user,
                error = %err,
                "failed to add approved player to roster"
            ),
        }
    }

    Ok(updated.into())
}

/// Delete a request addressed to `academy_id`; admins may delete any request.
pub async fn delete(
    state: &SharedState,
    principal: &Principal,
    academy_id: Uuid,
    id: Uuid,
) -> Result<(), ServiceError> {
    ensure_manages(principal, academy_id)?;
    let store = state.require_store().await?;

    if !principal.is_admin() {
        load_scoped(store.as_ref(), academy_id, id).await?;
    }
    if !store.delete_player_request(id).await? {
        return Err(not_found(id));
    }
    info!(request_id = %id, by = %principal.id, "player request deleted");
    Ok(())
}

/// Requests filed by the caller, newest first.
pub async fn list_my(
    state: &SharedState,
    principal: &Principal,
) -> Result<Vec<PlayerRequestResponse>, ServiceError> {
    let store = state.require_store().await?;
    let records = store
        .list_player_requests(RequestQuery {
            user: Some(principal.id),
            ..RequestQuery::default()
        })
        .await?;
    let live = not_expired(SystemTime::now());
    Ok(records
        .into_iter()
        .filter(|record| live(record))
        .map(Into::into)
        .collect())
}

/// Requests addressed to `academy_id`, newest first.
pub async fn list_academy(
    state: &SharedState,
    principal: &Principal,
    academy_id: Uuid,
) -> Result<Vec<PlayerRequestResponse>, ServiceError> {
    ensure_manages(principal, academy_id)?;
    let store = state.require_store().await?;
    let records = store
        .list_player_requests(RequestQuery {
            academy: Some(academy_id),
            ..RequestQuery::default()
        })
        .await?;
    let live = not_expired(SystemTime::now());
    Ok(records
        .into_iter()
        .filter(|record| live(record))
        .map(Into::into)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{AcademyEntity, UserEntity},
            store::memory::MemoryStore,
        },
        services::sweeper,
        state::AppState,
    };

    struct Fixture {
        state: SharedState,
        store: Arc<MemoryStore>,
        academy: Principal,
        user: Principal,
    }

    async fn fixture() -> Fixture {
        fixture_with(AppConfig::default()).await
    }

    async fn fixture_with(config: AppConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(config, store.clone());

        let academy_id = Uuid::new_v4();
        store
            .save_academy(AcademyEntity {
                id: academy_id,
                name: "North FC".into(),
                logo: None,
                phone: None,
                players: Vec::new(),
                created_at: SystemTime::now(),
            })
            .await
            .unwrap();

        let user_id = Uuid::new_v4();
        store
            .save_user(UserEntity {
                id: user_id,
                name: "Sam".into(),
                email: "sam@example.com".into(),
                role: Role::User,
                academy_id: None,
            })
            .await
            .unwrap();

        Fixture {
            state,
            store,
            academy: Principal {
                id: Uuid::new_v4(),
                role: Role::Academy,
                academy_id: Some(academy_id),
            },
            user: Principal {
                id: user_id,
                role: Role::User,
                academy_id: None,
            },
        }
    }

    impl Fixture {
        fn academy_id(&self) -> Uuid {
            self.academy.academy_id.unwrap()
        }

        async fn file(&self) -> PlayerRequestResponse {
            request(
                &self.state,
                &self.user,
                self.academy_id(),
                CreatePlayerRequest {
                    age: Some(12),
                    position: Some(" striker ".into()),
                    ..CreatePlayerRequest::default()
                },
            )
            .await
            .unwrap()
        }

        async fn decide(
            &self,
            id: Uuid,
            status: RequestStatus,
            reason: Option<&str>,
        ) -> Result<PlayerRequestResponse, ServiceError> {
            decide(
                &self.state,
                &self.academy,
                self.academy_id(),
                id,
                DecidePlayerRequest {
                    status,
                    reason: reason.map(str::to_owned),
                },
            )
            .await
        }
    }

    #[tokio::test]
    async fn duplicate_pending_request_is_a_conflict() {
        let f = fixture().await;
        let first = f.file().await;
        assert_eq!(first.status, RequestStatus::Pending);
        assert_eq!(first.user_name, "Sam");
        assert_eq!(first.academy_name, "North FC");
        assert_eq!(first.position.as_deref(), Some("striker"));

        let second = request(
            &f.state,
            &f.user,
            f.academy_id(),
            CreatePlayerRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(second, ServiceError::Conflict(_)));

        f.decide(first.id, RequestStatus::Approved, None)
            .await
            .unwrap();
        assert!(
            request(
                &f.state,
                &f.user,
                f.academy_id(),
                CreatePlayerRequest::default()
            )
            .await
            .is_ok()
        );
    }

    #[tokio::test]
    async fn approval_adds_the_player_once() {
        let f = fixture().await;
        let filed = f.file().await;
        let approved = f
            .decide(filed.id, RequestStatus::Approved, None)
            .await
            .unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.expire_at.is_none());

        let again = f
            .decide(filed.id, RequestStatus::Rejected, None)
            .await
            .unwrap_err();
        assert!(matches!(again, ServiceError::Conflict(_)));

        let academy = f.store.find_academy(f.academy_id()).await.unwrap().unwrap();
        assert_eq!(academy.players, vec![f.user.id]);
    }

    #[tokio::test]
    async fn rejection_sets_expiry_once_and_the_record_expires() {
        let f = fixture().await;
        let filed = f.file().await;
        f.decide(filed.id, RequestStatus::Rejected, Some("squad is full"))
            .await
            .unwrap();

        let record = f
            .store
            .find_player_request(filed.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, RequestStatus::Rejected);
        assert_eq!(record.response_message.as_deref(), Some("squad is full"));
        let expire_at = record.expire_at.unwrap();
        assert_eq!(expire_at, record.updated_at + Duration::from_secs(15 * 60));

        let retry = f.decide(filed.id, RequestStatus::Approved, None).await;
        assert!(retry.is_err());
        let unchanged = f
            .store
            .find_player_request(filed.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.expire_at, Some(expire_at));

        assert_eq!(list_my(&f.state, &f.user).await.unwrap().len(), 1);
        sweeper::sweep_once(f.store.as_ref(), expire_at, Duration::from_secs(900))
            .await
            .unwrap();
        assert!(list_my(&f.state, &f.user).await.unwrap().is_empty());
        assert!(
            list_academy(&f.state, &f.academy, f.academy_id())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn stale_snapshot_reports_the_current_state() {
        let f = fixture().await;
        let filed = f.file().await;
        let snapshot = f
            .store
            .find_player_request(filed.id)
            .await
            .unwrap()
            .unwrap();
        f.decide(filed.id, RequestStatus::Approved, None)
            .await
            .unwrap();

        let change = RequestChange {
            status: RequestStatus::Rejected,
            expire_at: Some(SystemTime::now()),
            response_message: None,
            updated_at: SystemTime::now(),
        };
        let err = transition(f.store.as_ref(), &snapshot, change.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(err.to_string().contains("approved"));
        assert_eq!(
            f.store
                .find_player_request(filed.id)
                .await
                .unwrap()
                .unwrap()
                .status,
            RequestStatus::Approved
        );

        f.store.delete_player_request(filed.id).await.unwrap();
        let gone = transition(f.store.as_ref(), &snapshot, change)
            .await
            .unwrap_err();
        assert!(matches!(gone, ServiceError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decisions_have_a_single_winner() {
        let f = fixture().await;
        let id = f.file().await.id;

        let tasks: Vec<_> = (0..16)
            .map(|n| {
                let state = f.state.clone();
                let academy = f.academy;
                let academy_id = f.academy_id();
                let status = if n % 2 == 0 {
                    RequestStatus::Approved
                } else {
                    RequestStatus::Rejected
                };
                tokio::spawn(async move {
                    decide(
                        &state,
                        &academy,
                        academy_id,
                        id,
                        DecidePlayerRequest {
                            status,
                            reason: None,
                        },
                    )
                    .await
                })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => assert!(matches!(err, ServiceError::Conflict(_)), "{err}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn out_of_range_rejection_expiry_is_refused() {
        let f = fixture_with(AppConfig {
            request_rejection_ttl_secs: u64::MAX,
            ..AppConfig::default()
        })
        .await;
        let filed = f.file().await;

        let err = f
            .decide(filed.id, RequestStatus::Rejected, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(
            f.store
                .find_player_request(filed.id)
                .await
                .unwrap()
                .unwrap()
                .status,
            RequestStatus::Pending
        );
    }

    #[tokio::test]
    async fn only_the_addressed_academy_or_admin_decides() {
        let f = fixture().await;
        let filed = f.file().await;

        let other = Principal {
            academy_id: Some(Uuid::new_v4()),
            ..f.academy
        };
        let err = decide(
            &f.state,
            &other,
            f.academy_id(),
            filed.id,
            DecidePlayerRequest {
                status: RequestStatus::Approved,
                reason: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let pending = f.decide(filed.id, RequestStatus::Pending, None).await;
        assert!(matches!(pending, Err(ServiceError::InvalidInput(_))));

        let admin = Principal {
            id: Uuid::new_v4(),
            role: Role::Admin,
            academy_id: None,
        };
        let decided = decide(
            &f.state,
            &admin,
            f.academy_id(),
            filed.id,
            DecidePlayerRequest {
                status: RequestStatus::Rejected,
                reason: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(decided.status, RequestStatus::Rejected);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_the_academy() {
        let f = fixture().await;
        let filed = f.file().await;

        let other_academy = Uuid::new_v4();
        let other = Principal {
            academy_id: Some(other_academy),
            ..f.academy
        };
        assert!(matches!(
            delete(&f.state, &other, other_academy, filed.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            delete(&f.state, &f.user, f.academy_id(), filed.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        delete(&f.state, &f.academy, f.academy_id(), filed.id)
            .await
            .unwrap();
        assert!(
            list_academy(&f.state, &f.academy, f.academy_id())
                .await
                .unwrap()
                .is_empty()
        );

        // Deleting frees the pair for a new pending request.
        f.file().await;
    }

    #[tokio::test]
    async fn only_users_file_requests() {
        let f = fixture().await;
        let err = request(
            &f.state,
            &f.academy,
            f.academy_id(),
            CreatePlayerRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let missing = request(
            &f.state,
            &f.user,
            Uuid::new_v4(),
            CreatePlayerRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));
    }
}
