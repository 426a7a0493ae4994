// HTTP surface for the gateway
//
// Routes:
// - POST /api/run      raw tshark command
// - POST /api/decrypt  named decryptor with options
// - GET  /api/status   tool availability
// - GET  /health       liveness
// - GET  /metrics      Prometheus text
//
// Optionally serves the static front end for everything else.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::metrics;
use crate::reporter::report_error;

/// Front-end entry page served at `/` when static serving is enabled
pub const INDEX_PAGE: &str = "modern.html";

/// Body of `POST /api/run`
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub command: String,
}

/// Body of `POST /api/decrypt`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    #[serde(default)]
    pub tool: String,

    #[serde(default)]
    pub pcap_file: String,

    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// Build the application router
///
/// # Arguments
/// * `gateway` - Shared, immutable gateway state
/// * `static_dir` - Front-end directory to serve, if any
/// * `max_body_bytes` - Request body limit
pub fn router(gateway: Arc<Gateway>, static_dir: Option<&Path>, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/api/run", post(run_handler))
        .route("/api/decrypt", post(decrypt_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(gateway);

    let app = match static_dir {
        Some(dir) => api
            .route_service("/", ServeFile::new(dir.join(INDEX_PAGE)))
            .fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and run until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let gateway = Arc::new(Gateway::from_config(config)?);
    let app = router(
        gateway,
        config.server.static_dir.as_deref(),
        config.server.max_body_bytes,
    );

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local = listener.local_addr().context("Failed to read bound address")?;

    info!("==================================================");
    info!("  pcap-gateway local execution service");
    info!("==================================================");
    if config.server.static_dir.is_some() {
        info!("  Front end: http://{}/", local);
    }
    info!("  API:       http://{}/api/", local);
    info!("  Base dir:  {}", config.base_dir()?.display());
    info!("  Tools dir: {}", config.tools_dir()?.display());
    info!("==================================================");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Malformed bodies still get the uniform response shape
fn transport_rejection(rejection: JsonRejection) -> Response {
    let err = GatewayError::transport(rejection.body_text());
    (StatusCode::BAD_REQUEST, Json(report_error(&err))).into_response()
}

async fn run_handler(
    State(gateway): State<Arc<Gateway>>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let span = info_span!("api_run", request_id = %Uuid::new_v4());
    async move {
        let Json(request) = match body {
            Ok(body) => body,
            Err(rejection) => return transport_rejection(rejection),
        };
        Json(gateway.run_analysis(&request.command).await).into_response()
    }
    .instrument(span)
    .await
}

async fn decrypt_handler(
    State(gateway): State<Arc<Gateway>>,
    body: Result<Json<DecryptRequest>, JsonRejection>,
) -> Response {
    let span = info_span!("api_decrypt", request_id = %Uuid::new_v4());
    async move {
        let Json(request) = match body {
            Ok(body) => body,
            Err(rejection) => return transport_rejection(rejection),
        };
        let response = gateway
            .run_decryptor(&request.tool, &request.pcap_file, &request.options)
            .await;
        Json(response).into_response()
    }
    .instrument(span)
    .await
}

async fn status_handler(State(gateway): State<Arc<Gateway>>) -> Response {
    Json(gateway.availability().await).into_response()
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_request_field_names() {
        let request: DecryptRequest = serde_json::from_str(
            r#"{"tool":"godzilla","pcapFile":"a.pcap","options":{"serverIp":"1.2.3.4","key":"k"}}"#,
        )
        .unwrap();
        assert_eq!(request.tool, "godzilla");
        assert_eq!(request.pcap_file, "a.pcap");
        assert_eq!(request.options["serverIp"], "1.2.3.4");
    }

    #[test]
    fn test_decrypt_request_defaults() {
        let request: DecryptRequest = serde_json::from_str(r#"{"tool":"behinder"}"#).unwrap();
        assert!(request.pcap_file.is_empty());
        assert!(request.options.is_empty());
    }

    #[test]
    fn test_non_string_option_is_rejected() {
        let result: Result<DecryptRequest, _> =
            serde_json::from_str(r#"{"tool":"behinder","options":{"key":5}}"#);
        assert!(result.is_err());
    }
}
