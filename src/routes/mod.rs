use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Match endpoints.
pub mod matches;
/// Player request endpoints.
pub mod player_requests;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(matches::router())
        .merge(player_requests::router())
        .merge(docs::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        auth::{Principal, Role, sign_for_tests},
        config::{AppConfig, DEVELOPMENT_JWT_SECRET},
        dao::{
            models::AcademyEntity,
            store::{EntityStore, memory::MemoryStore},
        },
        state::AppState,
    };

    async fn academy(store: &MemoryStore, name: &str) -> Principal {
        let record = AcademyEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            logo: None,
            phone: None,
            players: Vec::new(),
            created_at: SystemTime::now(),
        };
        let principal = Principal {
            id: Uuid::new_v4(),
            role: Role::Academy,
            academy_id: Some(record.id),
        };
        store.save_academy(record).await.unwrap();
        principal
    }

    fn config() -> AppConfig {
        AppConfig {
            deferred_deletion: false,
            ..AppConfig::default()
        }
    }

    fn bearer(principal: Principal) -> String {
        format!("Bearer {}", sign_for_tests(DEVELOPMENT_JWT_SECRET, principal))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthcheck_reports_degraded_without_store() {
        let app = router(AppState::new(config()));
        let response = app
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "degraded" }));
    }

    #[tokio::test]
    async fn listing_is_unavailable_while_degraded() {
        let app = router(AppState::new(config()));
        let response = app
            .oneshot(Request::get("/matches").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let store = Arc::new(MemoryStore::new());
        let app = router(AppState::with_store(config(), store));
        let response = app
            .oneshot(Request::get("/matches/my").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_path_id_is_a_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let app = router(AppState::with_store(config(), store));
        let response = app
            .oneshot(
                Request::get("/matches/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn match_is_created_then_accepted_over_http() {
        let store = Arc::new(MemoryStore::new());
        let home = academy(&store, "North FC").await;
        let away = academy(&store, "South FC").await;
        let state = AppState::with_store(config(), store);

        let create = Request::post("/matches")
            .header(header::AUTHORIZATION, bearer(home))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "ageGroup": "2012, 2010",
                    "dateTime": "2026-05-01T18:30:00Z",
                    "homeAway": "home",
                    "locationDescription": "Main pitch",
                    "phone": "+100"
                })
                .to_string(),
            ))
            .unwrap();
        let response = router(state.clone()).oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "requested");
        assert_eq!(created["ageGroup"], "2010, 2012");
        assert_eq!(created["academy"]["name"], "North FC");
        let id = created["id"].as_str().unwrap().to_owned();

        let own_accept = Request::post(format!("/matches/{id}/accept"))
            .header(header::AUTHORIZATION, bearer(home))
            .body(Body::empty())
            .unwrap();
        let response = router(state.clone()).oneshot(own_accept).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let accept = Request::post(format!("/matches/{id}/accept"))
            .header(header::AUTHORIZATION, bearer(away))
            .body(Body::empty())
            .unwrap();
        let response = router(state.clone()).oneshot(accept).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let accepted = body_json(response).await;
        assert_eq!(accepted["status"], "confirmed");
        assert_eq!(accepted["opponent"]["name"], "South FC");
    }

    #[tokio::test]
    async fn player_request_for_unknown_academy_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(config(), store);
        let player = Principal {
            id: Uuid::new_v4(),
            role: Role::User,
            academy_id: None,
        };

        let request = Request::post(format!("/playerRequests/{}", Uuid::new_v4()))
            .header(header::AUTHORIZATION, bearer(player))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "message": "hi" }).to_string()))
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = router(AppState::new(config()));
        let response = app
            .oneshot(
                Request::get("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["paths"]["/matches"].is_object());
    }
}
