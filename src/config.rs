// src/config.rs
//! Dashboard configuration: relay and client settings, the list of data
//! sources, and the header vocabulary. Loaded from YAML over built-in
//! defaults, then patched from the environment.

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::columns::ColumnRules;
use crate::fetch::fixtures;
use crate::process::blocks::BlockRules;

pub const DEFAULT_PORT: u16 = 8081;
/// Upper bound on `client.max_retries`.
pub const MAX_RETRIES: u32 = 10;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Listen address, `host:port`.
    pub bind: String,
    /// Spreadsheet service base URL.
    pub upstream: String,
    /// Built front-end served beside the API.
    pub static_dir: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{}", DEFAULT_PORT),
            upstream: "https://docs.google.com".into(),
            static_dir: PathBuf::from("dist"),
            user_agent: BROWSER_USER_AGENT.into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Where the relay listens, as seen from the client.
    pub relay_base: String,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            relay_base: format!("http://127.0.0.1:{}", DEFAULT_PORT),
            max_retries: 3,
            initial_backoff_ms: 200,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// One sheet per reporting period, flat table.
    #[default]
    Periodic,
    /// One sheet per store, stacked "Top 10" tables.
    MultiTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabConfig {
    pub name: String,
    #[serde(default)]
    pub fixture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Spreadsheet identifier.
    pub id: String,
    /// Display name, also accepted on the command line.
    pub name: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Whether the spreadsheet carries an `index` sheet listing its periods.
    #[serde(default = "default_true")]
    pub has_index: bool,
    /// Fixture served when the live sheet cannot be fetched.
    #[serde(default)]
    pub fixture: Option<String>,
    #[serde(default)]
    pub priority_columns: Vec<String>,
    #[serde(default)]
    pub hidden_columns: Vec<String>,
    /// Store sheets of a multi-table source.
    #[serde(default)]
    pub tabs: Vec<TabConfig>,
}

fn default_true() -> bool {
    true
}

impl SourceConfig {
    pub fn tab(&self, name: &str) -> Option<&TabConfig> {
        self.tabs
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub columns: ColumnRules,
    pub blocks: BlockRules,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub relay: RelaySettings,
    pub client: ClientSettings,
    pub sources: Vec<SourceConfig>,
    pub vocabulary: Vocabulary,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            relay: RelaySettings::default(),
            client: ClientSettings::default(),
            sources: default_sources(),
            vocabulary: Vocabulary::default(),
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    let periodic = |id: &str, name: &str, has_index: bool, fixture: &str| SourceConfig {
        id: id.into(),
        name: name.into(),
        kind: SourceKind::Periodic,
        has_index,
        fixture: Some(fixture.into()),
        priority_columns: Vec::new(),
        hidden_columns: Vec::new(),
        tabs: Vec::new(),
    };
    let tab = |name: &str, fixture: Option<&str>| TabConfig {
        name: name.into(),
        fixture: fixture.map(String::from),
    };

    vec![
        periodic(
            "1tFCeunQtTq-v3OTOM6EraSBLCUlgkhajSEjwdKfSQj4",
            "Analyse Famille",
            false,
            "famille",
        ),
        SourceConfig {
            priority_columns: ["CODEIN", "GTIN", "NOM", "LIBELLE1"]
                .map(String::from)
                .to_vec(),
            hidden_columns: vec!["CA Max Fournisseur".into()],
            ..periodic(
                "1BZD599SY1q3OoZWjlAPUYysMEbWgwsOH8IZrchDx374",
                "Hit Parade",
                true,
                "hit_parade",
            )
        },
        periodic(
            "1m92J7LubktT6U91gq9bFhNmuYZxY0yw9jgSFMze9lY4",
            "Analyse Fournisseurs",
            false,
            "fournisseurs",
        ),
        SourceConfig {
            id: "1s5poBaK7aWy1Wze2aMiEBWia1HWXIYVDHOYjj-nHvpU".into(),
            name: "TOP 10".into(),
            kind: SourceKind::MultiTable,
            has_index: false,
            fixture: None,
            priority_columns: Vec::new(),
            hidden_columns: Vec::new(),
            tabs: vec![
                tab("Houdemont", Some("top10_houdemont")),
                tab("Frouard", Some("top10_frouard")),
                tab("Nancy", None),
            ],
        },
    ]
}

impl DashboardConfig {
    /// Defaults, overlaid by `path` when given, then by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                info!(path = %p.display(), "loaded config file");
                Self::from_yaml_str(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env_from(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `PORT` replaces the relay's port, `RELAY_UPSTREAM` its upstream.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            let host = self
                .relay
                .bind
                .rsplit_once(':')
                .map(|(h, _)| h.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.relay.bind = format!("{}:{}", host, port);
            debug!(bind = %self.relay.bind, "relay port from environment");
        }
        if let Some(upstream) = lookup("RELAY_UPSTREAM").filter(|u| !u.trim().is_empty()) {
            self.relay.upstream = upstream.trim().to_string();
            debug!(upstream = %self.relay.upstream, "relay upstream from environment");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "client.max_retries is {}, at most {} allowed",
                self.client.max_retries, MAX_RETRIES
            )));
        }
        for (i, s) in self.sources.iter().enumerate() {
            if s.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("source #{} has an empty id", i + 1)));
            }
            if self.sources[..i].iter().any(|o| o.id == s.id) {
                return Err(ConfigError::Invalid(format!("duplicate source id {}", s.id)));
            }
            if s.kind == SourceKind::MultiTable && s.tabs.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "multi_table source {} lists no tabs",
                    s.name
                )));
            }
            let named = s
                .fixture
                .iter()
                .chain(s.tabs.iter().filter_map(|t| t.fixture.as_ref()));
            for f in named {
                if fixtures::by_name(f).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "source {} names unknown fixture {}",
                        s.name, f
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look a source up by id, or by name ignoring case.
    pub fn source(&self, key: &str) -> Option<&SourceConfig> {
        let key = key.trim();
        self.sources
            .iter()
            .find(|s| s.id == key)
            .or_else(|| self.sources.iter().find(|s| s.name.to_lowercase() == key.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let cfg = DashboardConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.sources.len(), 4);
        let hp = cfg.source("hit parade").unwrap();
        assert_eq!(hp.priority_columns[0], "CODEIN");
        assert!(hp.has_index);
        let top = cfg.source("1s5poBaK7aWy1Wze2aMiEBWia1HWXIYVDHOYjj-nHvpU").unwrap();
        assert_eq!(top.kind, SourceKind::MultiTable);
        assert_eq!(top.tab("houdemont").unwrap().fixture.as_deref(), Some("top10_houdemont"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = DashboardConfig::from_yaml_str(
            r#"
client:
  relay_base: "http://relay.local:9000"
sources:
  - id: abc
    name: Ventes
    has_index: false
vocabulary:
  columns:
    locations: [Nord, Sud]
"#,
        )
        .unwrap();
        assert_eq!(cfg.client.relay_base, "http://relay.local:9000");
        assert_eq!(cfg.client.max_retries, 3);
        assert_eq!(cfg.relay.upstream, "https://docs.google.com");
        assert_eq!(cfg.sources.len(), 1);
        assert_eq!(cfg.sources[0].kind, SourceKind::Periodic);
        assert_eq!(cfg.vocabulary.columns.locations, vec!["Nord", "Sud"]);
        assert_eq!(cfg.vocabulary.columns.global_group, "Global");
        assert_eq!(cfg.vocabulary.blocks, BlockRules::default());
    }

    #[test]
    fn rejects_bad_sources() {
        let dup = "sources:\n  - {id: a, name: A}\n  - {id: a, name: B}\n";
        assert!(matches!(
            DashboardConfig::from_yaml_str(dup),
            Err(ConfigError::Invalid(_))
        ));
        let no_tabs = "sources:\n  - {id: a, name: A, kind: multi_table}\n";
        assert!(matches!(
            DashboardConfig::from_yaml_str(no_tabs),
            Err(ConfigError::Invalid(_))
        ));
        let fixture = "sources:\n  - {id: a, name: A, fixture: missing}\n";
        assert!(matches!(
            DashboardConfig::from_yaml_str(fixture),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DashboardConfig::from_yaml_str("client:\n  max_retries: 64\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DashboardConfig::from_yaml_str("relay: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_port_and_upstream() {
        let mut cfg = DashboardConfig::default();
        cfg.apply_env_from(|k| match k {
            "PORT" => Some("9090".into()),
            "RELAY_UPSTREAM" => Some("http://127.0.0.1:1234".into()),
            _ => None,
        });
        assert_eq!(cfg.relay.bind, "0.0.0.0:9090");
        assert_eq!(cfg.relay.upstream, "http://127.0.0.1:1234");

        let mut cfg = DashboardConfig::default();
        cfg.apply_env_from(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(cfg.relay.bind, format!("0.0.0.0:{}", DEFAULT_PORT));
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "relay:\n  static_dir: web/dist\n").unwrap();
        let cfg = DashboardConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.relay.static_dir, PathBuf::from("web/dist"));
        assert_eq!(cfg.sources.len(), 4);

        let missing = DashboardConfig::load(Some(Path::new("/nonexistent/dashboard.yaml")));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn sample_config_matches_defaults() {
        let text = include_str!("../config/dashboard.yaml");
        assert_eq!(DashboardConfig::from_yaml_str(text).unwrap(), DashboardConfig::default());
    }
}
