// Store Revenue - Web Server
// Upload an export, get the report back as JSON

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use store_revenue::args::{init_logger, ServerArgs};
use store_revenue::{analyze, detect_source, Report, ReportError, Source};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

fn resolve_source(code: &str, body: &[u8]) -> Result<Source, ReportError> {
    if code == "auto" {
        return detect_source("upload", body);
    }
    Source::from_code(code).ok_or_else(|| ReportError::UnknownSource(code.to_string()))
}

/// POST /api/reports/:source - Analyze an uploaded export (`google`, `apple` or `auto`)
async fn create_report(Path(source): Path<String>, body: Bytes) -> impl IntoResponse {
    let result = resolve_source(&source, &body).and_then(|source| analyze(source, &body));

    match result {
        Ok(report) => {
            info!(
                "Built {} report from {} bytes",
                report.source.name(),
                body.len()
            );
            (StatusCode::OK, Json(ApiResponse::<Report>::ok(report))).into_response()
        }
        Err(e) if e.is_user_error() => {
            warn!("Rejected upload: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::<Report>::err(e.user_message())),
            )
                .into_response()
        }
        Err(e) => {
            error!("Error building report: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Report>::err(e.user_message())),
            )
                .into_response()
        }
    }
}

fn router() -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/reports/:source", post(create_report));

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_logger(args.log_level());

    let listener = tokio::net::TcpListener::bind(args.addr())
        .await
        .with_context(|| format!("Failed to bind {}", args.addr()))?;
    info!("Server running on http://{}", listener.local_addr()?);
    eprintln!("🚀 Server running on http://{}", args.addr());
    eprintln!("   POST a CSV to /api/reports/google, /api/reports/apple or /api/reports/auto");

    axum::serve(listener, router())
        .await
        .context("Server stopped unexpectedly")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const GOOGLE_CSV: &str = "Transaction Date,Amount (Merchant Currency),Amount (Buyer Currency),Buyer Currency,Product Title\n2024-03-01,1000,0.99,USD,Gems\n2024-03-02,2000,1.98,USD,Gems\n";

    async fn post(uri: &str, body: &'static str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_google_upload() {
        let (status, json) = post("/api/reports/google", GOOGLE_CSV).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["source"], "google_play");
        assert_eq!(json["data"]["totals"]["net"], 3000.0);
        assert_eq!(json["data"]["currencies"][0]["count"], 2);
    }

    #[tokio::test]
    async fn test_auto_detects_source() {
        let (status, json) = post("/api/reports/auto", GOOGLE_CSV).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["source"], "google_play");
    }

    #[tokio::test]
    async fn test_missing_columns_is_unprocessable() {
        let (status, json) = post("/api/reports/google", "a,b\n1,2\n").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("Buyer Currency"));
    }

    #[tokio::test]
    async fn test_unknown_source_code() {
        let (status, _) = post("/api/reports/amazon", GOOGLE_CSV).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
