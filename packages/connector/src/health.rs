//! Liveness endpoint.

use anyhow::{Context, Result};
use axum::{extract::Extension, http::StatusCode, routing::get, Router};
use tracing::info;

use crate::scheduler::ScheduleRegistry;

/// Health check endpoint
///
/// Returns 200 OK while at least one job is registered with the scheduler,
/// 500 otherwise. No body.
pub async fn health_handler(Extension(registry): Extension<ScheduleRegistry>) -> StatusCode {
    if registry.job_count() == 0 {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

pub fn build_health_app(registry: ScheduleRegistry) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .layer(Extension(registry))
}

/// Serve the health endpoint until the process exits.
pub async fn serve_health(port: u16, registry: ScheduleRegistry) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind health check address")?;

    info!(port, "Starting health check server");

    axum::serve(listener, build_health_app(registry))
        .await
        .context("Health check server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn status_for(registry: ScheduleRegistry) -> StatusCode {
        build_health_app(registry)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn unhealthy_without_jobs() {
        assert_eq!(status_for(ScheduleRegistry::new()).await, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn healthy_with_registered_job() {
        let registry = ScheduleRegistry::new();
        registry.register(Uuid::new_v4());

        assert_eq!(status_for(registry).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = build_health_app(ScheduleRegistry::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
