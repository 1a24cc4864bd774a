//! Match lifecycle engine.
//!
//! Every mutation validates the move against [`MatchStatus`]'s edge table and then performs a
//! compare-and-set keyed on the table's source states, so concurrent callers cannot both win.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::SystemTime,
};

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Principal,
    dao::{
        models::{AcademyEntity, MatchChange, MatchEntity, MatchOrder, MatchQuery},
        store::EntityStore,
    },
    dto::{
        matches::{AdminMatchListQuery, CreateMatchRequest, MatchPage, MatchResponse},
        validation::{normalize_age_group, parse_rfc3339},
    },
    error::ServiceError,
    services::deferred_deletion,
    state::{SharedState, lifecycle::Lifecycle, match_machine::MatchStatus},
};

const DEFAULT_DESCRIPTION: &str = "Friendly match";
const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("match `{id}`"))
}

async fn load(store: &dyn EntityStore, id: Uuid) -> Result<MatchEntity, ServiceError> {
    store.find_match(id).await?.ok_or_else(|| not_found(id))
}

/// Attach academy display fields to each record.
async fn populate(
    store: &dyn EntityStore,
    records: Vec<MatchEntity>,
) -> Result<Vec<MatchResponse>, ServiceError> {
    let ids: BTreeSet<Uuid> = records
        .iter()
        .flat_map(|record| std::iter::once(record.academy).chain(record.opponent))
        .collect();
    let academies: HashMap<Uuid, AcademyEntity> = store
        .find_academies(ids.into_iter().collect())
        .await?
        .into_iter()
        .map(|academy| (academy.id, academy))
        .collect();

    Ok(records
        .into_iter()
        .map(|record| MatchResponse::new(record, |id| academies.get(&id)))
        .collect())
}

async fn populate_one(
    store: &dyn EntityStore,
    record: MatchEntity,
) -> Result<MatchResponse, ServiceError> {
    let ids = std::iter::once(record.academy)
        .chain(record.opponent)
        .collect();
    let academies = store.find_academies(ids).await?;
    Ok(MatchResponse::new(record, |id| {
        academies.iter().find(|academy| academy.id == id)
    }))
}

/// Run the compare-and-set for `target`, explaining a lost race when nothing matched.
async fn transition(
    store: &dyn EntityStore,
    record: &MatchEntity,
    target: MatchStatus,
    change: MatchChange,
) -> Result<MatchEntity, ServiceError> {
    MatchStatus::check(record.status, target)?;

    let sources = MatchStatus::sources_into(target);
    if let Some(updated) = store.transition_match(record.id, sources, change).await? {
        return Ok(updated);
    }

    match store.find_match(record.id).await? {
        None => Err(not_found(record.id)),
        Some(current) => {
            MatchStatus::check(current.status, target)?;
            Err(ServiceError::Conflict(format!(
                "match `{}` changed concurrently; retry the operation",
                record.id
            )))
        }
    }
}

/// Arm the optional per-match cleanup timer after a finish.
fn schedule_cleanup(state: &SharedState, id: Uuid) {
    let config = state.config();
    if config.deferred_deletion {
        deferred_deletion::schedule(Arc::clone(state), id, config.finished_match_grace());
    }
}

/// Create a match request on behalf of the caller's academy.
pub async fn create(
    state: &SharedState,
    principal: &Principal,
    payload: CreateMatchRequest,
) -> Result<MatchResponse, ServiceError> {
    let academy_id = principal.require_academy()?;
    payload.validate()?;

    let age_group = normalize_age_group(&payload.age_group)
        .ok_or_else(|| ServiceError::InvalidInput("ageGroup is required".into()))?;
    let date_time = parse_rfc3339(&payload.date_time).ok_or_else(|| {
        ServiceError::InvalidInput(format!("invalid dateTime `{}`", payload.date_time))
    })?;

    let store = state.require_store().await?;
    if store.find_academy(academy_id).await?.is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "academy `{academy_id}` does not exist"
        )));
    }

    let now = SystemTime::now();
    let record = MatchEntity {
        id: Uuid::new_v4(),
        academy: academy_id,
        opponent: None,
        creator_id: principal.id,
        age_group,
        date_time,
        home_away: payload.home_away,
        location_description: payload.location_description,
        location_geo: payload.location_geo.map(Into::into),
        phone: payload.phone,
        duration: payload.duration,
        description: payload
            .description
            .filter(|description| !description.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_owned()),
        status: MatchStatus::Requested,
        finished_at: None,
        created_at: now,
        updated_at: now,
    };

    store.insert_match(record.clone()).await?;
    info!(match_id = %record.id, academy = %academy_id, "match requested");
    populate_one(store.as_ref(), record).await
}

/// Accept an open request as the opponent.
pub async fn accept(
    state: &SharedState,
    principal: &Principal,
    id: Uuid,
) -> Result<MatchResponse, ServiceError> {
    let academy_id = principal.require_academy()?;
    let store = state.require_store().await?;
    if store.find_academy(academy_id).await?.is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "academy `{academy_id}` does not exist"
        )));
    }
    let record = load(store.as_ref(), id).await?;

    if record.academy == academy_id {
        return Err(ServiceError::Conflict(
            "an academy cannot accept its own match request".into(),
        ));
    }

    let change = MatchChange {
        status: MatchStatus::Confirmed,
        opponent: Some(academy_id),
        finished_at: None,
        updated_at: SystemTime::now(),
    };
    let updated = transition(store.as_ref(), &record, MatchStatus::Confirmed, change).await?;
    info!(match_id = %id, opponent = %academy_id, "match confirmed");
    populate_one(store.as_ref(), updated).await
}

/// Mark a confirmed match as finished; only the creating academy may do so.
pub async fn finish(
    state: &SharedState,
    principal: &Principal,
    id: Uuid,
) -> Result<MatchResponse, ServiceError> {
    let academy_id = principal.require_academy()?;
    let store = state.require_store().await?;
    let record = load(store.as_ref(), id).await?;

    if record.academy != academy_id {
        return Err(ServiceError::Forbidden(
            "only the creating academy may finish a match".into(),
        ));
    }

    let now = SystemTime::now();
    let change = MatchChange {
        status: MatchStatus::Finished,
        opponent: None,
        finished_at: Some(now),
        updated_at: now,
    };
    let updated = transition(store.as_ref(), &record, MatchStatus::Finished, change).await?;
    info!(match_id = %id, "match finished");
    schedule_cleanup(state, id);
    populate_one(store.as_ref(), updated).await
}

/// Generic transition for either participating academy.
///
/// Moves are checked against the same table as [`accept`] and [`finish`]. Entering
/// `confirmed` is refused here because only [`accept`] records the opponent.
pub async fn set_status(
    state: &SharedState,
    principal: &Principal,
    id: Uuid,
    target: MatchStatus,
) -> Result<MatchResponse, ServiceError> {
    let academy_id = principal.require_academy()?;
    let store = state.require_store().await?;
    let record = load(store.as_ref(), id).await?;

    if record.academy != academy_id && record.opponent != Some(academy_id) {
        return Err(ServiceError::Forbidden(
            "only the participating academies may change a match status".into(),
        ));
    }
    if target == MatchStatus::Confirmed {
        return Err(ServiceError::Conflict(
            "matches are confirmed through the accept operation".into(),
        ));
    }

    let now = SystemTime::now();
    let change = MatchChange {
        status: target,
        opponent: None,
        finished_at: (target == MatchStatus::Finished).then_some(now),
        updated_at: now,
    };
    let updated = transition(store.as_ref(), &record, target, change).await?;
    info!(match_id = %id, from = %record.status, to = %target, "match status changed");
    if target == MatchStatus::Finished {
        schedule_cleanup(state, id);
    }
    populate_one(store.as_ref(), updated).await
}

/// Hard delete: admins unconditionally, otherwise only the user who created the match.
pub async fn delete(
    state: &SharedState,
    principal: &Principal,
    id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    if !principal.is_admin() {
        let record = load(store.as_ref(), id).await?;
        if record.creator_id != principal.id {
            return Err(ServiceError::Forbidden(
                "only the creator or an administrator may delete a match".into(),
            ));
        }
    }

    if !store.delete_match(id).await? {
        return Err(not_found(id));
    }
    info!(match_id = %id, by = %principal.id, "match deleted");
    Ok(())
}

/// Every match, chronological.
pub async fn list(state: &SharedState) -> Result<Vec<MatchResponse>, ServiceError> {
    let store = state.require_store().await?;
    let records = store.list_matches(MatchQuery::default()).await?;
    populate(store.as_ref(), records).await
}

/// Matches the caller's academy created or accepted, chronological.
pub async fn list_mine(
    state: &SharedState,
    principal: &Principal,
) -> Result<Vec<MatchResponse>, ServiceError> {
    let academy_id = principal.require_academy()?;
    let store = state.require_store().await?;
    let records = store
        .list_matches(MatchQuery {
            involving: Some(academy_id),
            ..MatchQuery::default()
        })
        .await?;
    populate(store.as_ref(), records).await
}

/// Paginated administrative listing, newest first.
pub async fn list_admin(
    state: &SharedState,
    principal: &Principal,
    params: AdminMatchListQuery,
) -> Result<MatchPage, ServiceError> {
    if !principal.is_admin() {
        return Err(ServiceError::Forbidden(
            "administrative listing requires the admin role".into(),
        ));
    }

    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let skip = (page - 1)
        .checked_mul(limit)
        .filter(|skip| i64::try_from(*skip).is_ok())
        .ok_or_else(|| ServiceError::InvalidInput(format!("page {page} is out of range")))?;

    let filter = MatchQuery {
        status: params.status,
        academy: params.academy,
        order: MatchOrder::CreatedAtDesc,
        ..MatchQuery::default()
    };
    let store = state.require_store().await?;
    let total = store.count_matches(filter.clone()).await?;
    let records = store
        .list_matches(MatchQuery {
            skip,
            limit: i64::try_from(limit).ok(),
            ..filter
        })
        .await?;

    Ok(MatchPage {
        items: populate(store.as_ref(), records).await?,
        total,
        page,
        limit,
    })
}

/// Single match by id.
pub async fn get(state: &SharedState, id: Uuid) -> Result<MatchResponse, ServiceError> {
    let store = state.require_store().await?;
    let record = load(store.as_ref(), id).await?;
    populate_one(store.as_ref(), record).await
}
