use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use salesboard::{
    columns::classify,
    config::{DashboardConfig, SourceConfig, SourceKind},
    fetch::{DataOrigin, SheetClient},
    logging,
    periods::{month_name, ListingOrigin},
    session::{prefetch_sheets, LoadStep, Session, ViewState},
    view::{filter_records, render_records, render_report, sort_records, SortDirection, SortKey},
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Sales dashboard on the command line.
#[derive(Parser, Debug)]
#[command(name = "salesboard", version)]
struct Cli {
    /// YAML config; built-in sources are used when omitted
    #[arg(long, env = "SALESBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the relay base URL from the config
    #[arg(long)]
    relay: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured sources
    Sources,
    /// List the periods a source offers
    Periods {
        /// Source id or name
        source: String,
    },
    /// Show one period of a periodic source
    Show {
        source: String,
        /// Year, defaults to the newest
        #[arg(long)]
        year: Option<String>,
        /// Month within the year, as listed by `periods`
        #[arg(long)]
        month: Option<String>,
        /// Keep rows containing this text
        #[arg(long)]
        search: Option<String>,
        /// Sort by this column
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
        /// Print JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
    /// Show the "Top 10" report of one store
    Top10 {
        source: String,
        /// Store sheet, e.g. Houdemont
        store: String,
        #[arg(long)]
        json: bool,
    },
    /// Fetch the most recent periods of a source concurrently
    Warm {
        source: String,
        /// Number of periods to fetch
        #[arg(long, default_value_t = 6)]
        limit: usize,
        #[arg(long, default_value_t = 3)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();

    let mut cfg = DashboardConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(relay) = cli.relay {
        cfg.client.relay_base = relay;
    }
    let client = SheetClient::new(&cfg.client).context("building relay client")?;

    match cli.command {
        Command::Sources => {
            for s in &cfg.sources {
                let kind = match s.kind {
                    SourceKind::Periodic => "periodic",
                    SourceKind::MultiTable => "multi_table",
                };
                println!("{:<24} {:<12} {}", s.name, kind, s.id);
            }
        }
        Command::Periods { source } => {
            let source = find_source(&cfg, &source)?;
            let mut session = Session::new(source.clone());
            let (names, origin) = client.list_sheet_names(source).await;
            if origin == ListingOrigin::Synthesized {
                info!("no index sheet; showing recent months");
            }
            session.set_listing(&names)?;
            let periods = session
                .periods()
                .ok_or_else(|| anyhow!("no periods for {}", source.name))?;
            for year in periods.years() {
                let months: Vec<String> = periods
                    .months(year)
                    .iter()
                    .map(|m| format!("{} ({})", month_name(m).unwrap_or(m), m))
                    .collect();
                println!("{}: {}", year, months.join(", "));
            }
        }
        Command::Show {
            source,
            year,
            month,
            search,
            sort,
            desc,
            json,
        } => {
            let source = find_source(&cfg, &source)?;
            if source.kind != SourceKind::Periodic {
                bail!("{} is a multi-table source; use top10", source.name);
            }
            let mut session = Session::new(source.clone());
            let (names, _) = client.list_sheet_names(source).await;
            session.set_listing(&names)?;
            if let Some(y) = &year {
                session
                    .select_year(y)
                    .ok_or_else(|| anyhow!("no period in year {}", y))?;
            }
            if let Some(m) = &month {
                session
                    .select_month(m)
                    .ok_or_else(|| anyhow!("no month {} in the selected year", m))?;
            }

            match session.begin_load() {
                Some(LoadStep::Fetch(ticket)) => {
                    let result = client.load_table(source, &ticket.sheet).await;
                    session.complete(ticket, result);
                }
                Some(LoadStep::Cached(_)) => {}
                None => bail!("nothing selected"),
            }

            match session.view() {
                ViewState::Ready {
                    sheet,
                    table,
                    origin,
                } => {
                    if *origin == DataOrigin::Fixture {
                        warn!(sheet = %sheet, "showing built-in sample data");
                    }
                    let mut rows = filter_records(&table.records, search.as_deref().unwrap_or(""));
                    if let Some(column) = sort {
                        let direction = if desc {
                            SortDirection::Descending
                        } else {
                            SortDirection::Ascending
                        };
                        sort_records(&mut rows, &SortKey { column, direction });
                    }
                    if json {
                        let out: Vec<serde_json::Map<String, serde_json::Value>> = rows
                            .iter()
                            .map(|r| r.iter().map(|(k, v)| (k.to_string(), v.into())).collect())
                            .collect();
                        println!("{}", serde_json::to_string_pretty(&out)?);
                    } else {
                        let layout = classify(
                            &table.headers,
                            &source.priority_columns,
                            &cfg.vocabulary.columns,
                        );
                        println!("{}", sheet);
                        print!("{}", render_records(&rows, &layout));
                        println!("{} / {} lignes", rows.len(), table.records.len());
                    }
                }
                ViewState::Empty { sheet } => println!("{}: aucune donnée", sheet),
                ViewState::Failed { message, .. } => bail!("{}", message),
                ViewState::Idle | ViewState::Loading { .. } => bail!("nothing loaded"),
            }
        }
        Command::Top10 {
            source,
            store,
            json,
        } => {
            let source = find_source(&cfg, &source)?;
            if source.kind != SourceKind::MultiTable {
                bail!("{} is not a multi-table source", source.name);
            }
            let rules = &cfg.vocabulary.blocks;
            let loaded = client
                .load_report(source, &store, rules)
                .await
                .map_err(|e| anyhow!("{}: {}", e.user_message(), e))?;
            if loaded.origin == DataOrigin::Fixture {
                warn!(store = %store, "showing built-in sample data");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&loaded.value)?);
            } else {
                print!("{}", render_report(&loaded.value, rules));
            }
        }
        Command::Warm {
            source,
            limit,
            concurrency,
        } => {
            let source = find_source(&cfg, &source)?;
            let mut session = Session::new(source.clone());
            let (names, _) = client.list_sheet_names(source).await;
            session.set_listing(&names)?;
            let periods = session
                .periods()
                .ok_or_else(|| anyhow!("no periods for {}", source.name))?;
            let sheets: Vec<String> = periods
                .years()
                .into_iter()
                .flat_map(|y| {
                    periods
                        .months(y)
                        .iter()
                        .filter_map(move |m| periods.period(y, m))
                })
                .map(|p| p.sheet_name)
                .take(limit)
                .collect();
            let cached = prefetch_sheets(&mut session, &client, &sheets, concurrency).await;
            println!("{} / {} périodes en cache", cached, sheets.len());
        }
    }

    Ok(())
}

fn find_source<'a>(cfg: &'a DashboardConfig, key: &str) -> Result<&'a SourceConfig> {
    cfg.source(key).ok_or_else(|| {
        let known: Vec<&str> = cfg.sources.iter().map(|s| s.name.as_str()).collect();
        anyhow!("unknown source {:?}; known: {}", key, known.join(", "))
    })
}
