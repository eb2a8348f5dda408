//! Prometheus `/metrics` endpoint.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{info, warn};

use crate::error::AppResult;

async fn metrics_handler() -> Response {
    match sentinel_telemetry::encode_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn create_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve metrics on `0.0.0.0:port` until the task is aborted.
pub async fn run_metrics_server(port: u16) -> AppResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Metrics server listening");
    axum::serve(listener, create_router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_metrics_handler_returns_text() {
        sentinel_telemetry::Metrics::sma_ratio(0.25);
        let response = metrics_handler().await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("sentinel_sma_ratio"));
    }
}
