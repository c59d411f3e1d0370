// src/fetch/mod.rs
//! HTTP client for the relay: fetches sheet exports as CSV, maps failures to
//! [`FetchError`], and falls back to built-in fixtures where a source has one.

pub mod fixtures;

use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::{ClientSettings, SourceConfig};
use crate::periods::{looks_like_period, resolve_names, ListingOrigin};
use crate::process::blocks::{extract_report, BlockRules, MultiTableReport};
use crate::process::matrix::{parse_matrix, Matrix};
use crate::process::records::Table;

/// Sheet name of the period listing.
pub const INDEX_SHEET: &str = "index";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not retrieve {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("sheet {sheet} not found")]
    NotFound { sheet: String },
    #[error("relay answered HTTP {status} for sheet {sheet}")]
    Status { status: u16, sheet: String },
    #[error("the index sheet came back in place of {sheet}")]
    IndexReturned { sheet: String },
    #[error("invalid relay address {0}")]
    BadBase(String),
}

impl FetchError {
    /// Missing sheet, including the case where the service silently served
    /// the index instead.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::IndexReturned { .. })
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Short message suitable for an end user.
    pub fn user_message(&self) -> &'static str {
        if self.is_not_found() {
            "Données non disponibles pour cette période."
        } else {
            "Impossible de récupérer les données."
        }
    }
}

/// Whether a value came from the relay or from a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Live,
    Fixture,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub origin: DataOrigin,
}

#[derive(Debug, Clone)]
pub struct SheetClient {
    http: Client,
    base: Url,
    max_retries: u32,
    initial_backoff_ms: u64,
}

impl SheetClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, FetchError> {
        let base = Url::parse(&settings.relay_base)
            .map_err(|e| FetchError::BadBase(format!("{}: {}", settings.relay_base, e)))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::BadBase(settings.relay_base.clone()));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| FetchError::BadBase(e.to_string()))?;
        Ok(Self {
            http,
            base,
            max_retries: settings.max_retries,
            initial_backoff_ms: settings.initial_backoff_ms,
        })
    }

    /// `{base}/api/sheets/{id}?sheet={name}`
    pub fn sheet_url(&self, sheet_id: &str, sheet_name: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "sheets", sheet_id]);
        }
        url.query_pairs_mut().append_pair("sheet", sheet_name);
        url
    }

    async fn get_text_core(&self, url: &Url, sheet: &str) -> Result<String, FetchError> {
        debug!(%url, "fetching sheet");
        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = self.http.get(url.clone()).send().await.map_err(transport)?;
        match resp.status() {
            s if s.is_success() => resp.text().await.map_err(transport),
            s if s == StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                sheet: sheet.to_string(),
            }),
            s => Err(FetchError::Status {
                status: s.as_u16(),
                sheet: sheet.to_string(),
            }),
        }
    }

    async fn get_text_with_retry(&self, url: &Url, sheet: &str) -> Result<String, FetchError> {
        let mut attempts = 0;
        loop {
            match self.get_text_core(url, sheet).await {
                Ok(t) => return Ok(t),
                Err(e) if e.is_retryable() && attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = backoff_ms(self.initial_backoff_ms, attempts);
                    warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) if e.is_retryable() => {
                    error!(%url, error = %e, "Exhausted retries");
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Raw CSV text of one sheet.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_csv(&self, sheet_id: &str, sheet_name: &str) -> Result<String, FetchError> {
        let url = self.sheet_url(sheet_id, sheet_name);
        self.get_text_with_retry(&url, sheet_name).await
    }

    /// One sheet as a table, rejecting an index served in its place.
    pub async fn fetch_table(&self, sheet_id: &str, sheet_name: &str) -> Result<Table, FetchError> {
        let table = Table::from_csv(&self.fetch_csv(sheet_id, sheet_name).await?);
        if sheet_name != INDEX_SHEET && looks_like_index(&table) {
            warn!(sheet = sheet_name, "index returned instead of the requested sheet");
            return Err(FetchError::IndexReturned {
                sheet: sheet_name.to_string(),
            });
        }
        Ok(table)
    }

    /// One sheet as a raw matrix, for multi-table layouts.
    pub async fn fetch_matrix(&self, sheet_id: &str, sheet_name: &str) -> Result<Matrix, FetchError> {
        Ok(parse_matrix(&self.fetch_csv(sheet_id, sheet_name).await?))
    }

    /// Candidate period sheet names for `source`. Never fails: a source
    /// without a usable index gets the synthesized recent months.
    #[instrument(level = "info", skip(self, source), fields(source = %source.name))]
    pub async fn list_sheet_names(&self, source: &SourceConfig) -> (Vec<String>, ListingOrigin) {
        if !source.has_index {
            return resolve_names(&source.id, false, None);
        }
        match self.fetch_table(&source.id, INDEX_SHEET).await {
            Ok(table) => resolve_names(&source.id, true, Some(&table)),
            Err(e) => {
                warn!(error = %e, "index fetch failed");
                resolve_names(&source.id, true, None)
            }
        }
    }

    /// A periodic sheet with the source's hidden columns removed, or the
    /// source's fixture when the fetch fails and one is configured.
    #[instrument(level = "info", skip(self, source), fields(source = %source.name))]
    pub async fn load_table(
        &self,
        source: &SourceConfig,
        sheet_name: &str,
    ) -> Result<Loaded<Table>, FetchError> {
        let (mut table, origin) = match self.fetch_table(&source.id, sheet_name).await {
            Ok(t) => (t, DataOrigin::Live),
            Err(e) => match source.fixture.as_deref().and_then(fixtures::by_name) {
                Some(csv) => {
                    warn!(error = %e, "using fixture data");
                    (Table::from_csv(csv), DataOrigin::Fixture)
                }
                None => return Err(e),
            },
        };
        table.drop_columns(&source.hidden_columns);
        info!(rows = table.records.len(), ?origin, "sheet loaded");
        Ok(Loaded {
            value: table,
            origin,
        })
    }

    /// A multi-table store sheet, with the tab's fixture as fallback.
    #[instrument(level = "info", skip(self, source, rules), fields(source = %source.name))]
    pub async fn load_report(
        &self,
        source: &SourceConfig,
        tab: &str,
        rules: &BlockRules,
    ) -> Result<Loaded<MultiTableReport>, FetchError> {
        let (matrix, origin) = match self.fetch_matrix(&source.id, tab).await {
            Ok(m) => (m, DataOrigin::Live),
            Err(e) => {
                let fixture = source
                    .tab(tab)
                    .and_then(|t| t.fixture.as_deref())
                    .and_then(fixtures::by_name);
                match fixture {
                    Some(csv) => {
                        warn!(error = %e, "using fixture data");
                        (parse_matrix(csv), DataOrigin::Fixture)
                    }
                    None => return Err(e),
                }
            }
        };
        let report = extract_report(&matrix, rules);
        info!(groups = report.groups.len(), ?origin, "report loaded");
        Ok(Loaded {
            value: report,
            origin,
        })
    }
}

/// A single-column table whose header mentions a period, or whose first
/// value is period-shaped.
pub fn looks_like_index(table: &Table) -> bool {
    if table.headers.len() != 1 || table.records.is_empty() {
        return false;
    }
    let header = table.headers[0].to_lowercase();
    header.contains("période")
        || header.contains("period")
        || table.records[0]
            .first_value()
            .map(looks_like_period)
            .unwrap_or(false)
}

/// Delay before retry number `attempt` (1-based): doubles each time, capped
/// instead of overflowing.
fn backoff_ms(initial: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |f| initial.saturating_mul(f))
}
