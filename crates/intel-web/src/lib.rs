//! Axum + Askama web surface for the extraction session.

use std::convert::Infallible;
use std::time::Duration;

use askama::Template;
use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use intel_core::{sample_batch_text, ExtractionRecord, ResultsSummary, MAX_BATCH_SIZE, PROFILE_DOMAIN};
use intel_session::{BatchPhase, NotificationLevel, SessionController, SimulationConfig, StartError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "intel-web";

const APP_CSS: &str = include_str!("../static/app.css");

#[derive(Clone)]
pub struct AppState {
    pub controller: SessionController,
}

impl AppState {
    pub fn new(controller: SessionController) -> Self {
        Self { controller }
    }
}

#[derive(Debug, Deserialize)]
struct StartBatchForm {
    #[serde(default)]
    urls: String,
}

/// What the progress overlay renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub phase: BatchPhase,
    pub current_target: String,
    pub completed_count: usize,
    pub total_count: usize,
    pub percent: u32,
    pub is_running: bool,
    pub is_modal_visible: bool,
    pub dismiss_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub records: Vec<ExtractionRecord>,
    pub summary: ResultsSummary,
}

#[derive(Debug, Clone)]
struct NotificationRow {
    css_class: &'static str,
    title: String,
    description: String,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    domain: &'static str,
    max_batch: usize,
    is_running: bool,
    last_error: Option<String>,
    notifications: Vec<NotificationRow>,
    records: Vec<ExtractionRecord>,
    summary: ResultsSummary,
}

#[derive(Template)]
#[template(path = "results_partial.html")]
struct ResultsPartialTemplate {
    records: Vec<ExtractionRecord>,
    summary: ResultsSummary,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/sample", get(sample_handler))
        .route("/batches", post(start_batch_handler))
        .route("/progress", get(progress_handler))
        .route("/modal/close", post(close_modal_handler))
        .route("/results", get(results_handler))
        .route("/results/partial", get(results_partial_handler))
        .route("/events", get(events_handler))
        .route("/assets/static/app.css", get(app_css_handler))
        .with_state(state)
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("INTEL_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let config = SimulationConfig::from_env()?;
    serve(config, port).await
}

pub async fn serve(config: SimulationConfig, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(SessionController::new(config));
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving profile intel ui");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<AppState>) -> Response {
    let last_error = state.controller.take_last_error().await;
    let snapshot = state.controller.snapshot().await;
    render_html(IndexTemplate {
        domain: PROFILE_DOMAIN,
        max_batch: MAX_BATCH_SIZE,
        is_running: snapshot.is_running,
        last_error,
        notifications: snapshot
            .notifications
            .into_iter()
            .rev()
            .take(5)
            .map(|n| NotificationRow {
                css_class: match n.level {
                    NotificationLevel::Info => "toast-info",
                    NotificationLevel::Success => "toast-success",
                    NotificationLevel::Error => "toast-error",
                },
                title: n.title,
                description: n.description,
            })
            .collect(),
        records: snapshot.results,
        summary: snapshot.summary,
    })
}

async fn sample_handler() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        sample_batch_text(),
    )
        .into_response()
}

async fn start_batch_handler(
    State(state): State<AppState>,
    Form(form): Form<StartBatchForm>,
) -> Response {
    match state.controller.start_batch(&form.urls).await {
        Ok(ticket) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "batchId": ticket.batch_id,
                "totalCount": ticket.total_count,
            })),
        )
            .into_response(),
        Err(err @ StartError::Validation(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": err.to_string() }))).into_response()
        }
        Err(err @ StartError::AlreadyRunning) => {
            (StatusCode::CONFLICT, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

async fn progress_handler(State(state): State<AppState>) -> Json<ProgressView> {
    let view = state.controller.progress().await;
    Json(ProgressView {
        phase: view.phase,
        percent: view.progress.percent(),
        current_target: view.progress.current_target,
        completed_count: view.progress.completed_count,
        total_count: view.progress.total_count,
        is_running: view.is_running,
        is_modal_visible: view.is_modal_visible,
        dismiss_ready: view.dismiss_ready,
    })
}

async fn close_modal_handler(State(state): State<AppState>) -> Response {
    let closed = state.controller.request_close_modal().await;
    Json(json!({ "isModalVisible": !closed })).into_response()
}

async fn results_handler(State(state): State<AppState>) -> Json<ResultsView> {
    let snapshot = state.controller.snapshot().await;
    Json(ResultsView {
        records: snapshot.results,
        summary: snapshot.summary,
    })
}

async fn results_partial_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.controller.snapshot().await;
    render_html(ResultsPartialTemplate {
        records: snapshot.results,
        summary: snapshot.summary,
    })
}

async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.controller.subscribe()).filter_map(|result| async move {
        match result {
            Ok(event) => Event::default().json_data(&event).ok().map(Ok),
            Err(err) => {
                warn!(error = %err, "session event stream lagged");
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn app_css_handler() -> Response {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], APP_CSS).into_response()
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}
