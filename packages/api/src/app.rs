use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::routes;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // ToDo: Restrict origins once the web client has a fixed domain
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::rooms::routes())
        .merge(routes::matches::routes())
        .merge(routes::sabotage::routes())
        .merge(routes::queue::routes())
        .merge(routes::leaderboard::routes())
        .merge(routes::session::routes())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use super::*;
    use crate::middleware::auth::SESSION_TOKEN_HEADER;
    use shared::models::case::{CaseContent, GenerationParams};
    use shared::models::views::{JoinOutcome, MatchView, QueueView, RoomView};
    use shared::repositories::memory_repository::RecordingEventPublisher;
    use shared::repositories::Repositories;
    use shared::services::auth_service::AuthService;
    use shared::services::case_generator::CaseGenerator;
    use shared::services::clock::SystemClock;
    use shared::services::errors::GenerationError;
    use shared::services::Services;

    const SECRET: &str = "router-test-secret";

    struct FixedCaseGenerator;

    #[async_trait]
    impl CaseGenerator for FixedCaseGenerator {
        async fn generate(&self, _params: &GenerationParams) -> Result<CaseContent, GenerationError> {
            let content = json!({
                "public": {
                    "title": "Short of breath after a long flight",
                    "layers": [
                        { "title": "Presentation", "content": "Sudden dyspnoea" },
                        { "title": "Vitals", "content": "HR 118, SpO2 89%" }
                    ]
                },
                "private": {
                    "diagnosis": "Pulmonary Embolism",
                    "aliases": ["PE"],
                    "mechanism_questions": {
                        "step_chain": [
                            { "id": "q1", "prompt": "Source?", "options": ["DVT", "MI"], "correct_index": 0 },
                            { "id": "q2", "prompt": "Gas exchange?", "options": ["Shunt", "V/Q mismatch"], "correct_index": 1 }
                        ]
                    }
                }
            });
            serde_json::from_value(content).map_err(|e| GenerationError::InvalidContent(e.to_string()))
        }
    }

    fn server(pair_inline: bool) -> TestServer {
        let services = Services::new(
            Repositories::in_memory(),
            Arc::new(FixedCaseGenerator),
            Arc::new(RecordingEventPublisher::new()),
            Arc::new(SystemClock),
        );
        let state = AppState {
            auth_service: Arc::new(AuthService::new(SECRET)),
            services,
            pair_inline,
        };
        TestServer::new(router(state)).unwrap()
    }

    fn bearer(identity: &str) -> String {
        AuthService::new(SECRET)
            .generate_token(identity, &identity.to_uppercase())
            .unwrap()
    }

    fn session(token: &str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(SESSION_TOKEN_HEADER),
            HeaderValue::from_str(token).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let response = server(false).get("/health").await;
        response.assert_status_ok();
        response.assert_text("Healthy!");
    }

    #[tokio::test]
    async fn test_requests_need_a_bearer_token() {
        let server = server(false);
        let missing = server.post("/rooms").json(&json!({})).await;
        missing.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(missing.json::<Value>()["kind"], "unauthorized");

        let forged = server
            .post("/rooms")
            .authorization_bearer("not-a-jwt")
            .json(&json!({}))
            .await;
        forged.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_room_flow_up_to_countdown() {
        let server = server(false);
        let alice = bearer("alice");
        let bob = bearer("bob");

        let created = server
            .post("/rooms")
            .authorization_bearer(&alice)
            .json(&json!({}))
            .await;
        created.assert_status(StatusCode::CREATED);
        let host: JoinOutcome = created.json();

        let joined: JoinOutcome = server
            .post("/rooms/join")
            .authorization_bearer(&bob)
            .json(&json!({ "room_key": host.room_key.to_lowercase() }))
            .await
            .json();
        assert_eq!(joined.room_id, host.room_id);

        for (user, token) in [(&alice, &host.session_token), (&bob, &joined.session_token)] {
            let (name, value) = session(token);
            server
                .post(&format!("/rooms/{}/ready", host.room_id))
                .authorization_bearer(user)
                .add_header(name, value)
                .await
                .assert_status_ok();
        }

        let started = server
            .post(&format!("/rooms/{}/start", host.room_id))
            .authorization_bearer(&alice)
            .await;
        started.assert_status(StatusCode::CREATED);
        let view: MatchView = started.json();
        assert!(view.layers.is_empty());

        let room: RoomView = server
            .get(&format!("/rooms/{}", host.room_id))
            .authorization_bearer(&bob)
            .await
            .json();
        assert_eq!(room.current_match_id.as_deref(), Some(view.match_id.as_str()));
        assert_eq!(room.participants[1].display_name, "BOB");

        let early = server
            .post(&format!("/matches/{}/guess", view.match_id))
            .authorization_bearer(&bob)
            .json(&json!({ "guess": "PE" }))
            .await;
        early.assert_status(StatusCode::CONFLICT);
        assert_eq!(early.json::<Value>()["kind"], "invalid_state");
    }

    #[tokio::test]
    async fn test_error_kinds_reach_the_client() {
        let server = server(false);
        let alice = bearer("alice");

        let missing = server
            .post("/rooms/join")
            .authorization_bearer(&alice)
            .json(&json!({ "room_key": "ZZZZZZ" }))
            .await;
        missing.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(missing.json::<Value>()["kind"], "not_found");

        let host: JoinOutcome = server
            .post("/rooms")
            .authorization_bearer(&alice)
            .json(&json!({}))
            .await
            .json();
        let (name, value) = session("someone-elses-token");
        let mismatch = server
            .post("/rooms/join")
            .authorization_bearer(&alice)
            .add_header(name, value)
            .json(&json!({ "room_key": host.room_key }))
            .await;
        mismatch.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(mismatch.json::<Value>()["kind"], "session_mismatch");

        let invalid = server
            .post("/rooms")
            .authorization_bearer(&alice)
            .json(&json!({ "settings": { "team_size": 0 } }))
            .await;
        invalid.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(invalid.json::<Value>()["kind"], "validation_error");
    }

    #[tokio::test]
    async fn test_queue_pairs_inline_and_leaderboard_is_public() {
        let server = server(true);
        let alice = bearer("alice");
        let bob = bearer("bob");

        let waiting: QueueView = server
            .post("/queue/join")
            .authorization_bearer(&alice)
            .await
            .json();
        assert!(waiting.match_id.is_none());

        let matched: QueueView = server
            .post("/queue/join")
            .authorization_bearer(&bob)
            .await
            .json();
        let match_id = matched.match_id.clone().unwrap();
        assert!(matched.session_token.is_some());

        let status: QueueView = server
            .get("/queue/status")
            .authorization_bearer(&alice)
            .await
            .json();
        assert_eq!(status.match_id.as_deref(), Some(match_id.as_str()));

        server
            .post("/queue/leave")
            .authorization_bearer(&alice)
            .await
            .assert_status(StatusCode::CONFLICT);

        let board: Value = server.get("/leaderboard?limit=10").await.json();
        let entries = board.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.get("identity").is_none()));
    }

    #[tokio::test]
    async fn test_session_snapshot() {
        let server = server(false);
        let alice = bearer("alice");

        let empty: Value = server
            .get("/session")
            .authorization_bearer(&alice)
            .await
            .json();
        assert_eq!(empty["kind"], "no_active_session");

        let host: JoinOutcome = server
            .post("/rooms")
            .authorization_bearer(&alice)
            .json(&json!({}))
            .await
            .json();
        let (name, value) = session(&host.session_token);
        let snapshot: Value = server
            .get("/session")
            .authorization_bearer(&alice)
            .add_header(name, value)
            .await
            .json();
        assert_eq!(snapshot["kind"], "room");
        assert_eq!(snapshot["room"]["room_id"], host.room_id.as_str());

        server
            .post("/session/disconnect")
            .authorization_bearer(&alice)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
