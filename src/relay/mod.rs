// src/relay/mod.rs
//! Same-origin relay: forwards `/api/sheets/...` to the spreadsheet
//! service's CSV export and serves the built front-end.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info, instrument};
use url::Url;

use crate::config::RelaySettings;
use crate::fetch::INDEX_SHEET;

pub struct RelayState {
    http: reqwest::Client,
    upstream: Url,
    user_agent: String,
}

#[derive(Debug, Deserialize)]
struct SheetQuery {
    sheet: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Export URL for one sheet. The index, or no name at all, means the
/// spreadsheet's first sheet.
pub fn upstream_url(upstream: &Url, sheet_id: &str, sheet_name: Option<&str>) -> Url {
    let mut url = upstream.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(["spreadsheets", "d", sheet_id, "gviz", "tq"]);
    }
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("tqx", "out:csv");
        if let Some(name) = sheet_name.filter(|n| !n.is_empty() && *n != INDEX_SHEET) {
            query.append_pair("sheet", name);
        }
    }
    url
}

pub fn router(settings: &RelaySettings) -> Result<Router> {
    let upstream = Url::parse(&settings.upstream)
        .with_context(|| format!("invalid upstream {}", settings.upstream))?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .context("building upstream client")?;
    let state = Arc::new(RelayState {
        http,
        upstream,
        user_agent: settings.user_agent.clone(),
    });

    let index = settings.static_dir.join("index.html");
    let spa = ServeDir::new(&settings.static_dir).fallback(ServeFile::new(index));

    Ok(Router::new()
        .route("/health", get(health_check))
        .route("/api/sheets/:sheet_id", get(sheet_by_query))
        .route("/api/sheets/:sheet_id/:sheet_name", get(sheet_by_path))
        .fallback_service(spa)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind and serve until the process is stopped.
pub async fn serve(settings: &RelaySettings) -> Result<()> {
    let app = router(settings)?;
    let listener = TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("binding {}", settings.bind))?;
    info!(bind = %settings.bind, upstream = %settings.upstream, "relay listening");
    info!(static_dir = %settings.static_dir.display(), "serving static files");
    axum::serve(listener, app).await.context("relay server")?;
    Ok(())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "salesboard-relay",
    })
}

async fn sheet_by_query(
    State(state): State<Arc<RelayState>>,
    Path(sheet_id): Path<String>,
    Query(q): Query<SheetQuery>,
) -> Response {
    forward(&state, &sheet_id, q.sheet.as_deref()).await
}

async fn sheet_by_path(
    State(state): State<Arc<RelayState>>,
    Path((sheet_id, sheet_name)): Path<(String, String)>,
) -> Response {
    forward(&state, &sheet_id, Some(&sheet_name)).await
}

#[instrument(level = "info", skip(state))]
async fn forward(state: &RelayState, sheet_id: &str, sheet_name: Option<&str>) -> Response {
    let url = upstream_url(&state.upstream, sheet_id, sheet_name);
    info!(%url, "forwarding");

    let sent = state
        .http
        .get(url.clone())
        .header(reqwest::header::USER_AGENT, &state.user_agent)
        .header(reqwest::header::ACCEPT, "text/csv;charset=UTF-8")
        .send()
        .await;

    let resp = match sent {
        Ok(r) => r,
        Err(e) => {
            error!(%url, error = %e, "upstream request failed");
            return internal_error();
        }
    };

    let status = resp.status().as_u16();
    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!(status, body = %body, "upstream returned an error");
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
        return (code, format!("Erreur Google Sheets ({})", status)).into_response();
    }

    match resp.text().await {
        Ok(csv) => {
            info!(sheet = sheet_name.unwrap_or("défaut"), bytes = csv.len(), "forwarded");
            ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response()
        }
        Err(e) => {
            error!(%url, error = %e, "reading upstream body failed");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Erreur interne du serveur proxy.".to_string(),
        }),
    )
        .into_response()
}
