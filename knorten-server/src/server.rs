//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(api::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use knorten_core::config::DispatcherConfig;
    use knorten_core::dispatcher::Dispatcher;
    use knorten_core::executors::DomainExecutors;
    use knorten_core::registry::WorkerRegistry;
    use knorten_core::store::MemoryEventStore;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// The dispatcher is returned so its trigger channel stays open.
    fn test_router() -> (Router, Dispatcher) {
        let registry = DomainExecutors::dry_run()
            .register(WorkerRegistry::builder())
            .build();
        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MemoryEventStore::new()),
            Arc::new(registry),
            DispatcherConfig::default(),
        );
        (build_router(AppState::new(handle)), dispatcher)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _dispatcher) = test_router();
        let (status, body) = send(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_register_then_list_owner_events() {
        let (router, _dispatcher) = test_router();
        let (status, body) = send(
            &router,
            "POST",
            "/events",
            Some(json!({
                "event_type": "create:team",
                "owner": "team-a-1234",
                "payload": {"id": "team-a-1234", "slug": "team-a", "owner": "a@example.com"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&router, "GET", "/owners/team-a-1234/events", None).await;
        assert_eq!(status, StatusCode::OK);
        let events = body.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["id"], id);
        assert_eq!(events[0]["status"], "new");
        assert_eq!(events[0]["deadline_secs"], 300);
        assert!(events[0]["logs"].as_array().unwrap().is_empty());

        let (status, body) = send(&router, "GET", &format!("/events/{id}/logs"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_needs_deadline() {
        let (router, _dispatcher) = test_router();
        let (status, body) = send(
            &router,
            "POST",
            "/events",
            Some(json!({"event_type": "frobnicate:widget", "owner": "team-a"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("deadline_secs"));

        let (status, _) = send(
            &router,
            "POST",
            "/events",
            Some(json!({"event_type": "frobnicate:widget", "owner": "team-a", "deadline_secs": 60})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_out_of_range_deadline_is_bad_request() {
        let (router, _dispatcher) = test_router();
        for deadline_secs in [0i64, 86_401, 1_000_000_000_000] {
            let (status, body) = send(
                &router,
                "POST",
                "/events",
                Some(json!({
                    "event_type": "update:team",
                    "owner": "team-a",
                    "deadline_secs": deadline_secs,
                    "payload": {"id": "team-a-1234", "slug": "team-a", "owner": "a@example.com"}
                })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "deadline_secs = {deadline_secs}");
            assert!(body["error"].as_str().unwrap().contains("deadline"));
        }
    }

    #[tokio::test]
    async fn test_logs_of_missing_event() {
        let (router, _dispatcher) = test_router();
        let uri = format!("/events/{}/logs", uuid::Uuid::new_v4());
        let (status, _) = send(&router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (router, _dispatcher) = test_router();
        let (status, body) = send(&router, "POST", "/maintenance/airflow/pause", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"changed": true, "paused_classes": ["airflow"]}));

        let (_, body) = send(&router, "POST", "/maintenance/airflow/pause", None).await;
        assert_eq!(body["changed"], false);

        let (_, body) = send(&router, "POST", "/maintenance/airflow/resume", None).await;
        assert_eq!(body, json!({"changed": true, "paused_classes": []}));

        let (status, _) = send(&router, "POST", "/maintenance/spaceships/pause", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_trigger_and_reset() {
        let (router, dispatcher) = test_router();
        let (status, _) = send(&router, "POST", "/dispatcher/trigger", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) = send(&router, "POST", "/events/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reset"], 0);

        drop(dispatcher);
        let (status, _) = send(&router, "POST", "/dispatcher/trigger", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
