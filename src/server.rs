use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{services::ServeFile, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::types::FleetSnapshot;

#[derive(Clone)]
pub struct AppState {
    snapshot_path: Arc<PathBuf>, // read on every request; the prober replaces it out of band
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub last_checked: String,
    pub probe_interval: u64,
    pub worlds: usize,
    pub logins_online: usize,
    pub channels_online: usize,
    pub channels_total: usize,
}

/// Build the router that exposes a published snapshot file.
///
/// - `GET /server-status.json` serves the file as written.
/// - `GET /api/health` parses it and reports totals, or 503 if it is missing or unreadable.
///
/// Responses carry `Cache-Control: no-cache` since consumers poll for fresh data.
pub fn router(snapshot_path: PathBuf) -> Router {
    let state = AppState {
        snapshot_path: Arc::new(snapshot_path.clone()),
    };

    let api = Router::new()
        .route("/health", get(get_health))
        .with_state(state);

    Router::new()
        .route_service("/server-status.json", ServeFile::new(snapshot_path))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache"),
                )),
        )
}

/// Serve `snapshot_path` on `bind` until `cancel` fires.
pub async fn spawn_server(bind: &str, snapshot_path: PathBuf, cancel: CancellationToken) -> Result<()> {
    let app = router(snapshot_path);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving snapshot on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn get_health(State(app): State<AppState>) -> impl IntoResponse {
    let snapshot = match tokio::fs::read(app.snapshot_path.as_path()).await {
        Ok(bytes) => serde_json::from_slice::<FleetSnapshot>(&bytes).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match snapshot {
        Ok(snap) => {
            let s = snap.summary();
            let out = Health {
                last_checked: snap.generated_at,
                probe_interval: snap.probe_interval_seconds,
                worlds: snap.groups.len(),
                logins_online: s.logins_online,
                channels_online: s.channels_online,
                channels_total: s.channels_total,
            };
            (StatusCode::OK, Json(out)).into_response()
        }
        Err(e) => {
            warn!(path = %app.snapshot_path.display(), error = %e, "snapshot unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, format!("snapshot unavailable: {e}")).into_response()
        }
    }
}
