//! HTTP server and API handlers for the bandwidth viewer.
//!
//! - `GET /` - chart page
//! - `GET /api/health`
//! - `GET /api/series?select=<selection>` - rate series plus chart options
//! - `GET /logs/manifest.json` - manifest generated from the logs directory
//! - `GET /logs/<file>` - raw log and header files

use crate::error::PipelineError;
use crate::fetch::{Fetcher, TextSource};
use crate::location::Location;
use crate::manifest::{Manifest, Selection};
use crate::pipeline::Pipeline;
use crate::series::RowError;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Manifest file name under `/logs/`. Generated per request, never read
/// from disk.
const MANIFEST_FILE: &str = "manifest.json";

/// Application state shared across handlers.
pub struct AppState<S = Fetcher> {
    pub logs_dir: PathBuf,
    pub pipeline: Pipeline<S>,
}

impl<S> AppState<S> {
    /// Location the generated manifest is served from; references in it
    /// resolve into `logs_dir`.
    fn manifest_location(&self) -> Location {
        Location::Path(self.logs_dir.join(MANIFEST_FILE))
    }
}

/// Server configuration.
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8050,
        }
    }
}

/// Build the router. Split out from [`run_server`] so tests can bind an
/// ephemeral port.
pub fn router<S: TextSource + 'static>(state: Arc<AppState<S>>) -> Router {
    // Everything under /logs other than the manifest is a plain file.
    let logs = Router::new()
        .route(&format!("/{MANIFEST_FILE}"), get(manifest_handler::<S>))
        .fallback_service(ServeDir::new(&state.logs_dir));

    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/series", get(series_handler::<S>))
        .nest("/logs", logs)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server; returns after Ctrl+C.
pub async fn run_server(state: AppState, config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::new(config.bind, config.port);
    tracing::info!(
        %addr,
        logs_dir = %state.logs_dir.display(),
        "Serving bandwidth viewer"
    );

    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down");
        })
        .await?;

    Ok(())
}

// --- Handlers ---

const EMBEDDED_INDEX_HTML: &str = include_str!("static/index.html");

async fn index_handler() -> Html<&'static str> {
    Html(EMBEDDED_INDEX_HTML)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    /// `first`, `last`, `name:<key>` or `prefix:<prefix>`; defaults to the
    /// configured selection.
    pub select: Option<String>,
}

/// Display options for one chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOptions {
    pub label: String,
    pub show: bool,
    pub stroke: String,
    pub width: u32,
    pub fill: String,
}

impl SeriesOptions {
    fn for_label(label: &str) -> Self {
        Self {
            label: label.to_string(),
            show: true,
            stroke: "red".to_string(),
            width: 1,
            fill: "rgba(255, 0, 0, 0.3)".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub name: String,
    /// Column 0 is Unix seconds, the rest kB/s. NaN is sent as `null`.
    pub data: Vec<Vec<f64>>,
    pub labels: Vec<String>,
    pub series: Vec<SeriesOptions>,
    pub row_errors: Vec<RowError>,
}

/// GET /api/series - run the pipeline over the local logs directory.
async fn series_handler<S: TextSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let selection = match query.select.as_deref() {
        Some(raw) => raw.parse::<Selection>().map_err(ApiError::BadRequest)?,
        None => state.pipeline.config().selection.clone(),
    };

    let manifest = Manifest::from_logs_dir(&state.logs_dir).map_err(|e| {
        ApiError::Pipeline(PipelineError::unavailable(&state.manifest_location(), e))
    })?;
    if manifest.is_empty() {
        return Err(ApiError::Pipeline(PipelineError::MalformedManifest(
            "no log files yet".to_string(),
        )));
    }
    let entry = manifest.resolve_entry(&selection, &state.manifest_location())?;
    let report = state.pipeline.run_entry(entry).await?;

    let collection = report.collection;
    let labels = collection.labels().to_vec();
    let row_errors = collection.row_errors().to_vec();
    let series = labels.iter().map(|l| SeriesOptions::for_label(l)).collect();

    Ok(Json(SeriesResponse {
        name: report.name,
        data: collection.into_columns(),
        labels,
        series,
        row_errors,
    }))
}

/// GET /logs/manifest.json - manifest for the current contents of the logs
/// directory.
async fn manifest_handler<S: TextSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    match Manifest::from_logs_dir(&state.logs_dir) {
        Ok(manifest) => (
            [(header::CONTENT_TYPE, "application/json")],
            manifest.to_json_pretty(),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(logs_dir = %state.logs_dir.display(), error = %e, "Cannot list logs");
            (StatusCode::INTERNAL_SERVER_ERROR, "Cannot list logs directory").into_response()
        }
    }
}

// --- Errors ---

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::ResourceUnavailable { location, .. }) => {
                if location.is_remote() {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::NOT_FOUND
                }
            }
            ApiError::Pipeline(PipelineError::MalformedManifest(_))
            | ApiError::Pipeline(PipelineError::MalformedRow { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Pipeline(e) => {
                tracing::warn!(error = %e, "Series request failed");
                e.to_string()
            }
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status() {
        let local = Location::parse("/logs/x.csv").unwrap();
        let remote = Location::parse("http://router.lan/logs/x.csv").unwrap();
        assert_eq!(
            ApiError::from(PipelineError::unavailable(&local, "gone")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PipelineError::unavailable(&remote, "gone")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(PipelineError::MalformedManifest("x".into())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_default_series_options() {
        let opts = SeriesOptions::for_label("aa:bb");
        assert!(opts.show);
        assert_eq!(opts.stroke, "red");
        assert_eq!(opts.width, 1);
        assert_eq!(opts.fill, "rgba(255, 0, 0, 0.3)");
    }
}
