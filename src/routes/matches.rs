use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    auth::Principal,
    dto::{
        ApiJson, ApiPath, ApiQuery,
        matches::{
            AdminMatchListQuery, CreateMatchRequest, MatchPage, MatchResponse,
            UpdateMatchStatusRequest,
        },
    },
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Match lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", get(list_matches).post(create_match))
        .route("/matches/my", get(list_my_matches))
        .route("/matches/admin", get(list_admin_matches))
        .route("/matches/{id}", get(get_match).delete(delete_match))
        .route("/matches/{id}/accept", post(accept_match))
        .route("/matches/{id}/finish", post(finish_match))
        .route("/matches/{id}/status", patch(update_match_status))
}

/// List every match in kick-off order.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    responses((status = 200, description = "All matches", body = [MatchResponse]))
)]
pub async fn list_matches(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchResponse>>, AppError> {
    Ok(Json(match_service::list(&state).await?))
}

/// Open a match request for the caller's academy.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Match requested", body = MatchResponse),
        (status = 400, description = "Invalid payload or unknown academy"),
        (status = 403, description = "Caller is not an academy")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    principal: Principal,
    ApiJson(payload): ApiJson<CreateMatchRequest>,
) -> Result<(StatusCode, Json<MatchResponse>), AppError> {
    let created = match_service::create(&state, &principal, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Matches the caller's academy created or accepted.
#[utoipa::path(
    get,
    path = "/matches/my",
    tag = "matches",
    security(("bearer" = [])),
    responses((status = 200, description = "Matches involving the caller's academy", body = [MatchResponse]))
)]
pub async fn list_my_matches(
    State(state): State<SharedState>,
    principal: Principal,
) -> Result<Json<Vec<MatchResponse>>, AppError> {
    Ok(Json(match_service::list_mine(&state, &principal).await?))
}

/// Paginated listing for administrators.
#[utoipa::path(
    get,
    path = "/matches/admin",
    tag = "matches",
    params(AdminMatchListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "One page of matches", body = MatchPage),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn list_admin_matches(
    State(state): State<SharedState>,
    principal: Principal,
    ApiQuery(params): ApiQuery<AdminMatchListQuery>,
) -> Result<Json<MatchPage>, AppError> {
    Ok(Json(
        match_service::list_admin(&state, &principal, params).await?,
    ))
}

/// Retrieve a single match.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match", body = MatchResponse),
        (status = 404, description = "No such match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MatchResponse>, AppError> {
    Ok(Json(match_service::get(&state, id).await?))
}

/// Accept an open request as the opponent academy.
#[utoipa::path(
    post,
    path = "/matches/{id}/accept",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Match confirmed", body = MatchResponse),
        (status = 404, description = "No such match"),
        (status = 409, description = "Own match or no longer requested")
    )
)]
pub async fn accept_match(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MatchResponse>, AppError> {
    Ok(Json(match_service::accept(&state, &principal, id).await?))
}

/// Close a confirmed match; creator academy only.
#[utoipa::path(
    post,
    path = "/matches/{id}/finish",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Match finished", body = MatchResponse),
        (status = 403, description = "Caller did not create the match"),
        (status = 409, description = "Match is not confirmed")
    )
)]
pub async fn finish_match(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MatchResponse>, AppError> {
    Ok(Json(match_service::finish(&state, &principal, id).await?))
}

/// Move a match along its lifecycle; either participating academy.
#[utoipa::path(
    patch,
    path = "/matches/{id}/status",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = UpdateMatchStatusRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Status changed", body = MatchResponse),
        (status = 403, description = "Caller does not participate"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn update_match_status(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateMatchStatusRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    Ok(Json(
        match_service::set_status(&state, &principal, id, payload.status).await?,
    ))
}

/// Hard delete; the creating user or an administrator.
#[utoipa::path(
    delete,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Match deleted"),
        (status = 403, description = "Caller may not delete this match"),
        (status = 404, description = "No such match")
    )
)]
pub async fn delete_match(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    match_service::delete(&state, &principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
