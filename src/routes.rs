//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod proposals;
mod votes;

use crate::auth::require_member;
use crate::config::Settings;
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderName, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    extract::State,
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack; dropping a timed-out request cancels its storage calls
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(TimeoutLayer::new(settings.server.request_timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Routes acting on behalf of a member
    let member_routes = Router::new()
        .route("/api/proposals", post(proposals::create_proposal))
        .route("/api/proposals/{id}/close", post(proposals::close_proposal))
        .route(
            "/api/proposals/{proposal_id}/votes",
            post(votes::create_vote).put(votes::update_vote),
        )
        .route("/api/proposals/{proposal_id}/votes/me", get(votes::my_vote))
        .route_layer(from_fn_with_state(state.clone(), require_member));

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Read-only governance routes
        .route("/api/proposals", get(proposals::list_proposals))
        .route("/api/proposals/{id}", get(proposals::get_proposal))
        .route("/api/proposals/{proposal_id}/votes", get(votes::list_votes))
        .route("/api/proposals/{proposal_id}/votes/tally", get(votes::get_tally))

        .merge(member_routes)

        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    let headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::ACCEPT,
        HeaderName::from_static(crate::auth::USER_ID_HEADER),
    ];

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };
    cors.allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(300))
}

/// Health check endpoint
async fn health_check(State(state): State<SharedState>) -> ApiResult<axum::Json<serde_json::Value>> {
    state.store.ping().await?;

    Ok(axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.store.backend()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::governance::FixedRoster;
    use crate::state::AppState;
    use crate::storage::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let settings = Settings {
            auth: AuthConfig {
                jwt_secret: None,
                trust_user_header: true,
            },
            ..Settings::default()
        };
        let state = Arc::new(AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FixedRoster(10)),
            &settings,
        ));
        create_router(state, &settings)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        member: Option<i32>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(member) = member {
            builder = builder.header(crate::auth::USER_ID_HEADER, member.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_proposal(app: &Router, title: &str) -> i64 {
        let (status, body) = send(app, "POST", "/api/proposals", Some(1), Some(json!({ "title": title }))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_proposal_wire_shape() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/proposals",
            Some(1),
            Some(json!({ "title": "Solar panels", "body": "Roof of unit B" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "Solar panels");
        assert_eq!(body["body"], "Roof of unit B");
        assert_eq!(body["status"], "open");
        assert!(body["created_at"].is_string());

        let id = body["id"].as_i64().unwrap();
        let (status, fetched) = send(&app, "GET", &format!("/api/proposals/{}", id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, body);

        let (status, listed) = send(&app, "GET", "/api/proposals", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_title_is_400() {
        let (status, body) = send(&app(), "POST", "/api/proposals", Some(1), Some(json!({ "title": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_proposal_is_404() {
        let app = app();
        let (status, _) = send(&app, "GET", "/api/proposals/77", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", "/api/proposals/77/votes/tally", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_writes_require_member() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/proposals", None, Some(json!({ "title": "x" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let id = create_proposal(&app, "Auth").await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/proposals/{}/votes", id),
            None,
            Some(json!({ "choice": "for" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_full_voting_flow() {
        let app = app();
        let id = create_proposal(&app, "Community garden").await;
        let votes_uri = format!("/api/proposals/{}/votes", id);

        for (member, choice) in [(1, "for"), (2, "against"), (3, "for")] {
            let (status, vote) = send(&app, "POST", &votes_uri, Some(member), Some(json!({ "choice": choice }))).await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(vote["member_id"], member);
            assert_eq!(vote["choice"], choice);
        }

        let (status, tally) = send(&app, "GET", &format!("{}/tally", votes_uri), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            tally,
            json!({
                "proposal_id": id,
                "status": "open",
                "total_eligible": 10,
                "votes_cast": 3,
                "quorum_met": false,
                "results": { "for": 2, "against": 1, "abstain": 0 },
                "outcome": "pending"
            })
        );

        let (status, closed) = send(&app, "POST", &format!("/api/proposals/{}/close", id), Some(1), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["status"], "closed");

        let (_, tally) = send(&app, "GET", &format!("{}/tally", votes_uri), None, None).await;
        assert_eq!(tally["status"], "closed");
        assert_eq!(tally["outcome"], "passed");

        let (status, body) = send(&app, "POST", &votes_uri, Some(4), Some(json!({ "choice": "for" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PROPOSAL_CLOSED");

        let (status, body) = send(&app, "POST", &format!("/api/proposals/{}/close", id), Some(1), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_CLOSED");
    }

    #[tokio::test]
    async fn test_double_vote_and_update() {
        let app = app();
        let id = create_proposal(&app, "New fence").await;
        let votes_uri = format!("/api/proposals/{}/votes", id);

        let (status, _) = send(&app, "POST", &votes_uri, Some(1), Some(json!({ "choice": "for" }))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, "POST", &votes_uri, Some(1), Some(json!({ "choice": "for" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_VOTED");

        let (status, vote) = send(
            &app,
            "PUT",
            &votes_uri,
            Some(1),
            Some(json!({ "choice": "against", "notes": "changed my mind" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(vote["choice"], "against");
        assert_eq!(vote["notes"], "changed my mind");

        let (status, mine) = send(&app, "GET", &format!("{}/me", votes_uri), Some(1), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine, vote);

        let (_, tally) = send(&app, "GET", &format!("{}/tally", votes_uri), None, None).await;
        assert_eq!(tally["votes_cast"], 1);
        assert_eq!(tally["results"], json!({ "for": 0, "against": 1, "abstain": 0 }));
    }

    #[tokio::test]
    async fn test_invalid_choice_is_400() {
        let app = app();
        let id = create_proposal(&app, "Choices").await;
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/proposals/{}/votes", id),
            Some(1),
            Some(json!({ "choice": "maybe" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_or_mistyped_choice_is_400() {
        let app = app();
        let id = create_proposal(&app, "Shapes").await;
        let votes_uri = format!("/api/proposals/{}/votes", id);

        for payload in [json!({}), json!({ "choice": 5 }), json!({ "choice": null })] {
            for method in ["POST", "PUT"] {
                let (status, body) = send(&app, method, &votes_uri, Some(1), Some(payload.clone())).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, payload);
                assert_eq!(body["success"], false);
                assert_eq!(body["code"], "VALIDATION_ERROR");
            }
        }

        let (_, tally) = send(&app, "GET", &format!("{}/tally", votes_uri), None, None).await;
        assert_eq!(tally["votes_cast"], 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = app();
        let id = create_proposal(&app, "Garbled").await;
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/proposals/{}/votes", id))
            .header(crate::auth::USER_ID_HEADER, "1")
            .header("content-type", "application/json")
            .body(Body::from("{\"choice\": "))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_malformed_query_and_path_are_json_400() {
        let app = app();
        let id = create_proposal(&app, "Params").await;

        let (status, body) = send(&app, "GET", &format!("/api/proposals/{}/votes?limit=abc", id), None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (status, body) = send(&app, "GET", "/api/proposals/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_long_title_is_accepted() {
        let app = app();
        let title = "t".repeat(201);
        let (status, body) = send(&app, "POST", "/api/proposals", Some(1), Some(json!({ "title": title }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"].as_str().unwrap().len(), 201);
    }

    #[tokio::test]
    async fn test_vote_listing_pagination() {
        let app = app();
        let id = create_proposal(&app, "Paging").await;
        let votes_uri = format!("/api/proposals/{}/votes", id);
        for member in 1..=5 {
            send(&app, "POST", &votes_uri, Some(member), Some(json!({ "choice": "abstain" }))).await;
        }

        let (status, page) = send(&app, "GET", &format!("{}?limit=2&offset=1", votes_uri), None, None).await;
        assert_eq!(status, StatusCode::OK);
        let members: Vec<i64> = page
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["member_id"].as_i64().unwrap())
            .collect();
        assert_eq!(members, vec![2, 3]);

        let (status, _) = send(&app, "GET", &format!("{}?limit=0", votes_uri), None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "GET", &format!("{}?offset=-1", votes_uri), None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
