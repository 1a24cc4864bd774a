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
        ApiJson, ApiPath,
        player_requests::{CreatePlayerRequest, DecidePlayerRequest, PlayerRequestResponse},
    },
    error::AppError,
    services::request_service,
    state::SharedState,
};

/// Player join-request endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/playerRequests/my", get(list_my_requests))
        .route("/playerRequests/{academy_id}", post(create_request))
        .route(
            "/playerRequests/academy/{academy_id}",
            get(list_academy_requests),
        )
        .route(
            "/playerRequests/academy/{academy_id}/{id}",
            patch(decide_request).delete(delete_request),
        )
}

/// Ask to join an academy roster.
#[utoipa::path(
    post,
    path = "/playerRequests/{academy_id}",
    tag = "player-requests",
    params(("academy_id" = Uuid, Path, description = "Academy to join")),
    request_body = CreatePlayerRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Request filed", body = PlayerRequestResponse),
        (status = 404, description = "Unknown academy"),
        (status = 409, description = "A pending request already exists")
    )
)]
pub async fn create_request(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath(academy_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreatePlayerRequest>,
) -> Result<(StatusCode, Json<PlayerRequestResponse>), AppError> {
    let created = request_service::request(&state, &principal, academy_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Requests filed by the caller.
#[utoipa::path(
    get,
    path = "/playerRequests/my",
    tag = "player-requests",
    security(("bearer" = [])),
    responses((status = 200, description = "Caller's requests, newest first", body = [PlayerRequestResponse]))
)]
pub async fn list_my_requests(
    State(state): State<SharedState>,
    principal: Principal,
) -> Result<Json<Vec<PlayerRequestResponse>>, AppError> {
    Ok(Json(request_service::list_my(&state, &principal).await?))
}

/// Requests addressed to an academy.
#[utoipa::path(
    get,
    path = "/playerRequests/academy/{academy_id}",
    tag = "player-requests",
    params(("academy_id" = Uuid, Path, description = "Academy identifier")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Academy's requests, newest first", body = [PlayerRequestResponse]),
        (status = 403, description = "Caller does not manage this academy")
    )
)]
pub async fn list_academy_requests(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath(academy_id): ApiPath<Uuid>,
) -> Result<Json<Vec<PlayerRequestResponse>>, AppError> {
    Ok(Json(
        request_service::list_academy(&state, &principal, academy_id).await?,
    ))
}

/// Approve or reject a pending request.
#[utoipa::path(
    patch,
    path = "/playerRequests/academy/{academy_id}/{id}",
    tag = "player-requests",
    params(
        ("academy_id" = Uuid, Path, description = "Academy identifier"),
        ("id" = Uuid, Path, description = "Request identifier")
    ),
    request_body = DecidePlayerRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Request decided", body = PlayerRequestResponse),
        (status = 403, description = "Caller does not manage this academy"),
        (status = 409, description = "Request already decided")
    )
)]
pub async fn decide_request(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath((academy_id, id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<DecidePlayerRequest>,
) -> Result<Json<PlayerRequestResponse>, AppError> {
    Ok(Json(
        request_service::decide(&state, &principal, academy_id, id, payload).await?,
    ))
}

/// Delete a request addressed to the academy.
#[utoipa::path(
    delete,
    path = "/playerRequests/academy/{academy_id}/{id}",
    tag = "player-requests",
    params(
        ("academy_id" = Uuid, Path, description = "Academy identifier"),
        ("id" = Uuid, Path, description = "Request identifier")
    ),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Request deleted"),
        (status = 403, description = "Caller does not manage this academy"),
        (status = 404, description = "No such request")
    )
)]
pub async fn delete_request(
    State(state): State<SharedState>,
    principal: Principal,
    ApiPath((academy_id, id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    request_service::delete(&state, &principal, academy_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
