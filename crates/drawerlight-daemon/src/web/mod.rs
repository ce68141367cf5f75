//! JSON API and browser UI.
//!
//! Every API response carries a `success` flag; failures add an `error`
//! message and a matching HTTP status.

use askama::Template;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use drawerlight_hw::{Error as HwError, COLS, LED_ROWS, ROWS};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;
use crate::store::DrawerSet;

/// Main index page template.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    rows: u8,
    cols: u8,
    led_rows: u8,
    led_count: usize,
}

/// Creates the web router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Main page
        .route("/", get(index))
        // Drawer records
        .route("/api/drawers", get(drawers_get).post(drawers_set))
        .route("/api/export", get(export))
        .route("/api/search", get(search))
        .route("/api/highlight", post(highlight))
        // LEDs
        .route("/api/led/all/:state", post(led_all))
        .route("/api/led/test", post(led_test))
        .route("/api/led/test/stop", post(led_test_stop))
        .route("/api/led/:id/toggle", post(led_toggle))
        .route("/api/status", get(status))
        // State
        .with_state(state)
}

/// `{"success": false, "error": ...}` with the given status.
fn failure(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
        .into_response()
}

fn hw_failure(e: HwError) -> Response {
    let status = match e {
        HwError::NotAssigned(_) | HwError::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
        HwError::SequenceRunning => StatusCode::CONFLICT,
        HwError::Gpio { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(status, e)
}

/// GET / - Main page
async fn index(State(state): State<Arc<AppState>>) -> Response {
    let page = IndexTemplate {
        rows: ROWS,
        cols: COLS,
        led_rows: LED_ROWS,
        led_count: state.led_count(),
    };
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// GET /api/drawers - All drawer records
async fn drawers_get(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({ "success": true, "drawers": state.drawers() })).into_response()
}

/// POST /api/drawers - Replace all drawer records
async fn drawers_set(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DrawerSet>, JsonRejection>,
) -> Response {
    let Json(drawers) = match body {
        Ok(body) => body,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.body_text()),
    };
    match state.replace_drawers(&drawers) {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            warn!("Failed to save drawers: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /api/export - Drawer records as a download
async fn export(State(state): State<Arc<AppState>>) -> Response {
    match state.export() {
        Ok(export) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ],
            export.body,
        )
            .into_response(),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Query for search.
#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// GET /api/search?q= - Search drawer records
async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let results = state.search(&query.q);
    Json(json!({ "success": true, "results": results })).into_response()
}

/// Body for highlight.
#[derive(Deserialize)]
struct HighlightRequest {
    query: String,
}

/// POST /api/highlight - Search and toggle matching LEDs
async fn highlight(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HighlightRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let outcome = state.highlight(&request.query);
    Json(json!({
        "success": true,
        "results": outcome.results,
        "toggled": outcome.toggled,
    }))
    .into_response()
}

/// POST /api/led/:id/toggle - Toggle one LED
async fn led_toggle(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.toggle(&id) {
        Ok(on) => Json(json!({ "success": true, "state": on })).into_response(),
        Err(e) => hw_failure(e),
    }
}

/// POST /api/led/all/:state - Switch every LED on or off
async fn led_all(State(state): State<Arc<AppState>>, Path(value): Path<String>) -> Response {
    let on = value.eq_ignore_ascii_case("on");
    match state.set_all(on) {
        Ok(()) => Json(json!({ "success": true, "state": on })).into_response(),
        Err(e) => hw_failure(e),
    }
}

/// POST /api/led/test - Start the diagnostic sweep
async fn led_test(State(state): State<Arc<AppState>>) -> Response {
    match state.run_diagnostic() {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => hw_failure(e),
    }
}

/// POST /api/led/test/stop - Cancel the diagnostic sweep
async fn led_test_stop(State(state): State<Arc<AppState>>) -> Response {
    let stopped = state.stop_diagnostic();
    Json(json!({ "success": true, "stopped": stopped })).into_response()
}

/// GET /api/status - Server and LED status
async fn status(State(state): State<Arc<AppState>>) -> Response {
    Json(state.status()).into_response()
}
