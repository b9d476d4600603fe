//! HTTP trigger surface.
//!
//! Serves the externally scheduled reconciliation trigger plus the dispatch
//! endpoint:
//! - POST /generate              — dispatch a generation request
//! - POST /reconcile             — reconcile all eligible jobs (bearer-guarded)
//! - GET  /reconcile/{video_id}  — on-demand single-job check
//! - GET  /history/{telegram_id} — a user's generation history and credit stats
//! - GET  /quota                 — remaining provider quota
//! - GET  /health                — liveness check

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::config;
use crate::core::error::AppError;
use crate::reconcile::{self, GenerationRequest, ServiceDeps};
use crate::storage::{self, db};

/// Shared state for the web server.
#[derive(Clone)]
struct WebState {
    deps: Arc<ServiceDeps>,
}

/// Start the trigger server.
pub async fn start_web_server(
    port: u16,
    deps: Arc<ServiceDeps>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = WebState { deps };

    let app = Router::new()
        .route("/generate", post(generate_handler))
        .route("/reconcile", post(reconcile_all_handler))
        .route("/reconcile/{video_id}", get(reconcile_one_handler))
        .route("/history/{telegram_id}", get(history_handler))
        .route("/quota", get(quota_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    log::info!("Starting trigger server on http://{}", addr);
    log::info!("  POST /generate              - Dispatch a generation request");
    log::info!("  POST /reconcile             - Reconcile all eligible jobs");
    log::info!("  GET  /reconcile/{{video_id}}  - Check a single job");
    log::info!("  GET  /history/{{telegram_id}} - User generation history");
    log::info!("  GET  /quota                 - Remaining provider quota");
    log::info!("  GET  /health                - Health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// True when the caller may trigger a full pass. Open when no secret is set.
fn cron_authorized(headers: &HeaderMap) -> bool {
    match config::CRON_SECRET.as_deref() {
        None => true,
        Some(secret) => headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {secret}"))
            .unwrap_or(false),
    }
}

fn error_response(error: &AppError) -> Response {
    let status = if error.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(json!({"success": false, "error": error.to_string()})),
    )
        .into_response()
}

/// POST /generate — validate and dispatch a generation request.
async fn generate_handler(
    State(state): State<WebState>,
    Json(request): Json<GenerationRequest>,
) -> Response {
    match reconcile::dispatch_generation(&state.deps, &request).await {
        Ok(record) => Json(json!({
            "success": true,
            "data": { "videoId": record.video_id },
        }))
        .into_response(),
        Err(e) => {
            log::error!("Dispatch failed: {}", e);
            error_response(&e)
        }
    }
}

/// POST /reconcile — run a full reconciliation pass.
async fn reconcile_all_handler(State(state): State<WebState>, headers: HeaderMap) -> Response {
    if !cron_authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        )
            .into_response();
    }

    match reconcile::run_pass(&state.deps).await {
        Ok(outcomes) => Json(json!({
            "success": true,
            "processed": outcomes.len(),
            "results": outcomes,
        }))
        .into_response(),
        Err(e) => {
            log::error!("Reconcile pass failed: {}", e);
            error_response(&e)
        }
    }
}

/// GET /reconcile/{video_id} — on-demand check of one job.
async fn reconcile_one_handler(
    Path(video_id): Path<String>,
    State(state): State<WebState>,
) -> Response {
    match reconcile::reconcile_single(&state.deps, &video_id).await {
        Ok(Some(outcome)) => Json(json!({"success": true, "result": outcome})).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Video not found"})),
        )
            .into_response(),
        Err(e) => {
            log::error!("Reconcile of {} failed: {}", video_id, e);
            error_response(&e)
        }
    }
}

/// GET /history/{telegram_id} — a user's generation history with credit stats.
async fn history_handler(
    Path(telegram_id): Path<i64>,
    State(state): State<WebState>,
) -> Response {
    let result = (|| {
        let conn = storage::get_connection(&state.deps.db)?;
        let history = db::list_user_history(&conn, telegram_id, 50)?;
        let stats = db::get_user_credit_stats(&conn, telegram_id)?;
        Ok::<_, AppError>((history, stats))
    })();

    match result {
        Ok((history, stats)) => Json(json!({
            "success": true,
            "history": history,
            "stats": stats,
        }))
        .into_response(),
        Err(e) => {
            log::error!("History lookup for {} failed: {}", telegram_id, e);
            error_response(&e)
        }
    }
}

/// GET /quota — remaining provider quota in credits.
async fn quota_handler(State(state): State<WebState>) -> Response {
    match state.deps.provider.remaining_quota().await {
        Ok(Some(quota)) => Json(json!({"success": true, "quota": quota})).into_response(),
        Ok(None) => Json(json!({"success": true, "quota": null})).into_response(),
        Err(e) => {
            log::error!("Quota lookup failed: {}", e);
            error_response(&e)
        }
    }
}

/// GET /health — simple health check.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
