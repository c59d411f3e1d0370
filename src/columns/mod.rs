// src/columns/mod.rs
//! Display ordering for sheet headers: location groups, a catch-all group of
//! consolidated figures, and a primary-key column pinned first.

use serde::{Deserialize, Serialize};

/// Header vocabulary driving the classifier. Every list is matched
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnRules {
    /// Location tokens in display order, e.g. `["Houdemont", "Frouard"]`.
    pub locations: Vec<String>,
    /// Label of the catch-all group.
    pub global_group: String,
    /// Whole words that mark a consolidated figure (`ca`, `qte`).
    pub global_words: Vec<String>,
    /// Word prefixes that mark a consolidated figure (`marge`, `evol`).
    pub global_prefixes: Vec<String>,
    /// Substrings that mark a consolidated figure (`%`).
    pub global_symbols: Vec<String>,
    /// Exact header names that identify a row.
    pub primary_keys: Vec<String>,
}

impl Default for ColumnRules {
    fn default() -> Self {
        Self {
            locations: vec!["Houdemont".into(), "Frouard".into()],
            global_group: "Global".into(),
            global_words: vec!["ca".into(), "qte".into()],
            global_prefixes: ["marge", "evolution", "évolution"]
                .map(String::from)
                .to_vec(),
            global_symbols: vec!["%".into()],
            primary_keys: ["nomenclature", "fournisseur", "famille", "libelle", "libellé"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnGroup {
    pub name: String,
    pub headers: Vec<String>,
}

impl ColumnGroup {
    pub fn span(&self) -> usize {
        self.headers.len()
    }
}

/// The classifier's output: one linear order plus the spanning groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    /// Final per-row column order.
    pub order: Vec<String>,
    /// Contiguous groups for a two-tier header; empty when none were found
    /// or when priority headers were given.
    pub groups: Vec<ColumnGroup>,
    /// Detected primary key, if any.
    pub primary_key: Option<String>,
    /// Priority headers actually present, in priority order.
    pub priority: Vec<String>,
}

impl Layout {
    /// Headers outside every group, in display order.
    pub fn ungrouped(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|h| !self.groups.iter().any(|g| g.headers.contains(*h)))
            .map(String::as_str)
            .collect()
    }
}

/// Classify `headers`. Pure and deterministic.
pub fn classify(headers: &[String], priority: &[String], rules: &ColumnRules) -> Layout {
    let matched: Vec<String> = priority
        .iter()
        .filter_map(|p| headers.iter().find(|h| h.eq_ignore_ascii_case(p) || lower(h) == lower(p)))
        .fold(Vec::new(), |mut acc, h| {
            if !acc.contains(h) {
                acc.push(h.clone());
            }
            acc
        });

    if !matched.is_empty() {
        let order = matched
            .iter()
            .cloned()
            .chain(headers.iter().filter(|h| !matched.contains(*h)).cloned())
            .collect();
        return Layout {
            order,
            groups: Vec::new(),
            primary_key: None,
            priority: matched,
        };
    }

    let groups = group_columns(headers, rules);
    let primary_key = detect_primary_key(headers, rules);

    let grouped: Vec<&String> = groups.iter().flat_map(|g| g.headers.iter()).collect();
    let is_grouped = |h: &str| grouped.iter().any(|g| g.as_str() == h);

    let mut order: Vec<String> = Vec::with_capacity(headers.len());
    if let Some(pk) = primary_key.as_ref().filter(|pk| !is_grouped(pk.as_str())) {
        order.push(pk.clone());
    }
    order.extend(grouped.iter().map(|h| (*h).clone()));
    let rest: Vec<String> = headers
        .iter()
        .filter(|h| !is_grouped(h.as_str()) && !order.contains(*h))
        .cloned()
        .collect();
    order.extend(rest);

    Layout {
        order,
        groups,
        primary_key,
        priority: Vec::new(),
    }
}

/// Location groups in configured order, then the catch-all group when at
/// least one location group exists.
pub fn group_columns(headers: &[String], rules: &ColumnRules) -> Vec<ColumnGroup> {
    let mut groups = Vec::new();
    let mut taken: Vec<&String> = Vec::new();

    for location in &rules.locations {
        let token = lower(location);
        let keys: Vec<String> = headers
            .iter()
            .filter(|h| !taken.contains(h) && lower(h).contains(&token))
            .cloned()
            .collect();
        if keys.is_empty() {
            continue;
        }
        taken.extend(headers.iter().filter(|h| keys.contains(*h)));
        groups.push(ColumnGroup {
            name: location.clone(),
            headers: keys,
        });
    }

    if groups.is_empty() {
        return groups;
    }

    let rest: Vec<String> = headers
        .iter()
        .filter(|h| !taken.contains(h) && is_global(h, rules))
        .cloned()
        .collect();
    if !rest.is_empty() {
        groups.push(ColumnGroup {
            name: rules.global_group.clone(),
            headers: rest,
        });
    }
    groups
}

pub fn detect_primary_key(headers: &[String], rules: &ColumnRules) -> Option<String> {
    headers
        .iter()
        .find(|h| {
            let h = lower(h.trim());
            rules.primary_keys.iter().any(|k| lower(k) == h)
        })
        .cloned()
}

fn is_global(header: &str, rules: &ColumnRules) -> bool {
    let h = lower(header);
    if rules.global_symbols.iter().any(|s| h.contains(&lower(s))) {
        return true;
    }
    h.split(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != '%'))
        .filter(|w| !w.is_empty())
        .any(|w| {
            rules.global_words.iter().any(|g| w == lower(g))
                || rules.global_prefixes.iter().any(|p| w.starts_with(&lower(p)))
        })
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}
