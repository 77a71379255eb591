use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use twscreen_core::domain::analysis::{
    AllocationCandidates, AllocationPlan, AllocationRequest, SingleStockAnalysis,
};
use twscreen_core::domain::record::Category;
use twscreen_core::llm::gemini::GeminiClient;
use twscreen_core::llm::prompt::{screening_request, ScreenParams};
use twscreen_core::llm::GenerationClient;
use twscreen_core::screening::orchestrator::category_events;
use twscreen_core::screening::{screening_events, ScreeningEvent, ScreeningPlan};
use twscreen_core::stream::ScanMode;

mod wire;

use wire::{optional_body, AllocateBody, FollowUpBody, ScreenBody, WireEvents};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = twscreen_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let client: Option<Arc<dyn GenerationClient>> = match GeminiClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "generation client unavailable; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        client,
        scan_mode: settings.scan_mode(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/screen", post(screen))
        .route("/screen/:category", post(screen_more))
        .route("/analyze/:ticker", post(analyze))
        .route("/allocate", post(allocate))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    client: Option<Arc<dyn GenerationClient>>,
    scan_mode: ScanMode,
}

impl AppState {
    fn client(&self) -> Result<Arc<dyn GenerationClient>, StatusCode> {
        self.client.clone().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Screens both categories and streams events as NDJSON while the model is still writing.
async fn screen(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, StatusCode> {
    let client = state.client()?;
    let body: ScreenBody = optional_body(&body)?;
    if body.count == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let plan = ScreeningPlan::new(&body.criteria, body.count, state.scan_mode);
    Ok(ndjson(screening_events(client, plan)))
}

/// Single-category follow-up: "load more" or "loosen criteria".
async fn screen_more(
    State(state): State<AppState>,
    Path(category): Path<String>,
    body: Bytes,
) -> Result<Response, StatusCode> {
    let client = state.client()?;
    let category = Category::parse(&category).ok_or(StatusCode::NOT_FOUND)?;
    let body: FollowUpBody = optional_body(&body)?;
    if body.count == Some(0) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let request = screening_request(&ScreenParams {
        category,
        criteria: &body.criteria,
        exclude_tickers: &body.exclude,
        count: body.count(),
        loosen: body.loosen,
    });
    Ok(ndjson(category_events(client, category, request, state.scan_mode)))
}

async fn analyze(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<SingleStockAnalysis>, StatusCode> {
    let client = state.client()?;
    if ticker.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    twscreen_core::advice::analyze_stock(client.as_ref(), &ticker)
        .await
        .map(Json)
        .map_err(upstream_failure)
}

async fn allocate(
    State(state): State<AppState>,
    Json(body): Json<AllocateBody>,
) -> Result<Json<AllocationPlan>, StatusCode> {
    let client = state.client()?;
    let request =
        AllocationRequest::new(body.total_amount, body.ratio).map_err(|_| StatusCode::BAD_REQUEST)?;
    let candidates = AllocationCandidates {
        long_term: body.long_term,
        swing_trade: body.swing_trade,
    };
    if candidates.long_term.is_empty() && candidates.swing_trade.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    twscreen_core::advice::plan_allocation(client.as_ref(), &request, &candidates)
        .await
        .map(Json)
        .map_err(upstream_failure)
}

fn ndjson<S>(events: S) -> Response
where
    S: Stream<Item = ScreeningEvent> + Send + 'static,
{
    let lines = WireEvents::default().lines(events);
    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}

fn upstream_failure(err: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %format!("{err:#}"), "generation request failed");
    StatusCode::BAD_GATEWAY
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &twscreen_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
