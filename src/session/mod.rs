// src/session/mod.rs
//! Selection state for one data source: the period index, the selected
//! period, a per-sheet cache, and the guard that keeps late responses from
//! overwriting a newer selection.

use futures::{stream::FuturesUnordered, StreamExt};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::fetch::{DataOrigin, FetchError, Loaded, SheetClient};
use crate::periods::{Period, PeriodError, PeriodIndex};
use crate::process::records::Table;

/// Handed out when a fetch starts; must be given back to
/// [`Session::complete`] with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    /// `None` for background prefetches, which never touch the view.
    generation: Option<u64>,
    pub sheet: String,
}

/// What the caller should do after [`Session::begin_load`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStep {
    /// Served from cache; the view is already updated.
    Cached(Arc<Table>),
    /// Fetch `ticket.sheet`, then call [`Session::complete`].
    Fetch(Ticket),
}

/// What [`Session::complete`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Became the visible state.
    Applied,
    /// A newer selection exists; result only cached.
    Superseded,
    /// The source changed since the ticket was issued; dropped.
    Discarded,
}

/// What a display should show.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Loading {
        sheet: String,
    },
    Ready {
        sheet: String,
        table: Arc<Table>,
        origin: DataOrigin,
    },
    /// The sheet exists but holds no records.
    Empty {
        sheet: String,
    },
    Failed {
        sheet: Option<String>,
        message: String,
        not_found: bool,
    },
}

#[derive(Debug)]
pub struct Session {
    source: SourceConfig,
    epoch: u64,
    generation: u64,
    periods: Option<PeriodIndex>,
    selection: Option<Period>,
    cache: HashMap<String, Arc<Table>>,
    view: ViewState,
}

impl Session {
    pub fn new(source: SourceConfig) -> Self {
        Self {
            source,
            epoch: 0,
            generation: 0,
            periods: None,
            selection: None,
            cache: HashMap::new(),
            view: ViewState::Idle,
        }
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    /// Switch source: drops the cache, the index and the selection, and
    /// orphans every outstanding ticket.
    pub fn change_source(&mut self, source: SourceConfig) {
        info!(from = %self.source.name, to = %source.name, "source changed");
        self.source = source;
        self.epoch += 1;
        self.generation += 1;
        self.periods = None;
        self.selection = None;
        self.cache.clear();
        self.view = ViewState::Idle;
    }

    /// Install the candidate sheet names and select the default period.
    pub fn set_listing<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Option<Period>, PeriodError> {
        match PeriodIndex::from_names(names) {
            Ok(idx) => {
                self.selection = idx.default_selection();
                debug!(years = idx.as_map().len(), selection = ?self.selection, "period index built");
                self.periods = Some(idx);
                Ok(self.selection.clone())
            }
            Err(e) => {
                warn!(error = %e, "no usable periods");
                self.periods = None;
                self.selection = None;
                self.view = ViewState::Failed {
                    sheet: None,
                    message: e.user_message().to_string(),
                    not_found: true,
                };
                Err(e)
            }
        }
    }

    pub fn periods(&self) -> Option<&PeriodIndex> {
        self.periods.as_ref()
    }

    pub fn selection(&self) -> Option<&Period> {
        self.selection.as_ref()
    }

    /// Select `year` and its first listed month.
    pub fn select_year(&mut self, year: &str) -> Option<&Period> {
        let period = self.periods.as_ref()?.first_of_year(year)?;
        self.selection = Some(period);
        self.selection.as_ref()
    }

    /// Select `month` within the current year.
    pub fn select_month(&mut self, month: &str) -> Option<&Period> {
        let year = self.selection.as_ref()?.year.clone();
        let period = self.periods.as_ref()?.period(&year, month)?;
        self.selection = Some(period);
        self.selection.as_ref()
    }

    /// Start showing the selected period. `None` when nothing is selected.
    pub fn begin_load(&mut self) -> Option<LoadStep> {
        let sheet = self.selection.as_ref()?.sheet_name.clone();
        Some(self.begin_load_sheet(&sheet))
    }

    /// Start showing `sheet`. Every call supersedes the previous one.
    pub fn begin_load_sheet(&mut self, sheet: &str) -> LoadStep {
        self.generation += 1;
        if let Some(table) = self.cache.get(sheet) {
            debug!(sheet, "cache hit");
            self.view = ready_or_empty(sheet, table.clone(), DataOrigin::Live);
            return LoadStep::Cached(table.clone());
        }
        self.view = ViewState::Loading {
            sheet: sheet.to_string(),
        };
        LoadStep::Fetch(Ticket {
            epoch: self.epoch,
            generation: Some(self.generation),
            sheet: sheet.to_string(),
        })
    }

    /// Ticket for a background fetch that only fills the cache. `None` when
    /// the sheet is already cached.
    pub fn prefetch(&self, sheet: &str) -> Option<Ticket> {
        (!self.cache.contains_key(sheet)).then(|| Ticket {
            epoch: self.epoch,
            generation: None,
            sheet: sheet.to_string(),
        })
    }

    /// Apply a finished fetch. Live results of the current source are cached
    /// even when superseded; only the latest ticket updates the view.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<Loaded<Table>, FetchError>,
    ) -> Completion {
        if ticket.epoch != self.epoch {
            debug!(sheet = %ticket.sheet, "result for a previous source dropped");
            return Completion::Discarded;
        }

        let loaded = result.map(|l| (Arc::new(l.value), l.origin));
        if let Ok((table, DataOrigin::Live)) = &loaded {
            self.cache.insert(ticket.sheet.clone(), table.clone());
        }

        if ticket.generation != Some(self.generation) {
            debug!(sheet = %ticket.sheet, "superseded result not shown");
            return Completion::Superseded;
        }

        self.view = match loaded {
            Ok((table, origin)) => ready_or_empty(&ticket.sheet, table, origin),
            Err(e) => {
                warn!(sheet = %ticket.sheet, error = %e, "load failed");
                ViewState::Failed {
                    sheet: Some(ticket.sheet),
                    message: e.user_message().to_string(),
                    not_found: e.is_not_found(),
                }
            }
        };
        Completion::Applied
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn cached(&self, sheet: &str) -> Option<Arc<Table>> {
        self.cache.get(sheet).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Fetch `sheets` into the session cache, at most `concurrency` at a time.
/// Returns how many sheets ended up cached.
pub async fn prefetch_sheets(
    session: &mut Session,
    client: &SheetClient,
    sheets: &[String],
    concurrency: usize,
) -> usize {
    let source = session.source().clone();
    let mut tasks = FuturesUnordered::new();
    let mut cached = 0;

    for sheet in sheets {
        let Some(ticket) = session.prefetch(sheet) else {
            debug!(sheet = %sheet, "already cached");
            continue;
        };
        let source = &source;
        tasks.push(async move {
            let result = client.load_table(source, &ticket.sheet).await;
            (ticket, result)
        });

        if tasks.len() >= concurrency.max(1) {
            if let Some((ticket, result)) = tasks.next().await {
                cached += usize::from(store(session, ticket, result));
            }
        }
    }

    while let Some((ticket, result)) = tasks.next().await {
        cached += usize::from(store(session, ticket, result));
    }
    info!(cached, requested = sheets.len(), "prefetch done");
    cached
}

fn store(session: &mut Session, ticket: Ticket, result: Result<Loaded<Table>, FetchError>) -> bool {
    let sheet = ticket.sheet.clone();
    if let Err(e) = &result {
        debug!(sheet = %sheet, error = %e, "prefetch failed");
    }
    session.complete(ticket, result);
    session.cached(&sheet).is_some()
}

fn ready_or_empty(sheet: &str, table: Arc<Table>, origin: DataOrigin) -> ViewState {
    if table.is_empty() {
        ViewState::Empty {
            sheet: sheet.to_string(),
        }
    } else {
        ViewState::Ready {
            sheet: sheet.to_string(),
            table,
            origin,
        }
    }
}
