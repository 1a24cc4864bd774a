use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Academy Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::list_matches,
        crate::routes::matches::create_match,
        crate::routes::matches::list_my_matches,
        crate::routes::matches::list_admin_matches,
        crate::routes::matches::get_match,
        crate::routes::matches::accept_match,
        crate::routes::matches::finish_match,
        crate::routes::matches::update_match_status,
        crate::routes::matches::delete_match,
        crate::routes::player_requests::create_request,
        crate::routes::player_requests::list_my_requests,
        crate::routes::player_requests::list_academy_requests,
        crate::routes::player_requests::decide_request,
        crate::routes::player_requests::delete_request,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::GeoPointDto,
            crate::dto::matches::UpdateMatchStatusRequest,
            crate::dto::matches::AcademySummary,
            crate::dto::matches::MatchResponse,
            crate::dto::matches::MatchPage,
            crate::dto::player_requests::CreatePlayerRequest,
            crate::dto::player_requests::DecidePlayerRequest,
            crate::dto::player_requests::PlayerRequestResponse,
            crate::dao::models::HomeAway,
            crate::state::match_machine::MatchStatus,
            crate::state::request_machine::RequestStatus,
            crate::auth::Role,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Match requests between academies"),
        (name = "player-requests", description = "Players asking to join academy rosters"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by protected operations.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
