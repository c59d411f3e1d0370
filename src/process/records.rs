// src/process/records.rs
use std::collections::HashMap;

use super::matrix::{parse_matrix, Matrix};

/// One data row keyed by header, in header order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first column, if non-empty.
    pub fn first_value(&self) -> Option<&str> {
        self.fields
            .first()
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn remove(&mut self, key: &str) {
        self.fields.retain(|(k, _)| k != key);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Header list plus the records built under it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn from_matrix(matrix: &Matrix) -> Self {
        if matrix.len() < 2 {
            return Self::default();
        }
        let headers = unique_headers(&matrix[0]);
        let records = matrix[1..]
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| {
                        let v = row.get(i).map(|c| c.trim()).unwrap_or_default();
                        (h.clone(), v.to_string())
                    })
                    .collect::<Record>()
            })
            .collect();
        Self { headers, records }
    }

    pub fn from_csv(text: &str) -> Self {
        Self::from_matrix(&parse_matrix(text))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every column whose header matches one of `names` after whitespace
    /// normalisation, ignoring case.
    pub fn drop_columns(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let wanted: Vec<String> = names.iter().map(|n| normalize_header(n)).collect();
        let doomed: Vec<String> = self
            .headers
            .iter()
            .filter(|h| wanted.contains(&normalize_header(h)))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return;
        }
        self.headers.retain(|h| !doomed.contains(h));
        for rec in &mut self.records {
            for key in &doomed {
                rec.remove(key);
            }
        }
    }
}

/// Build records from a matrix; fewer than two rows yields nothing.
pub fn build_records(matrix: &Matrix) -> Vec<Record> {
    Table::from_matrix(matrix).records
}

/// Trim the header row and rename repeats to `"<name> (2)"`, `"<name> (3)"`, ...
fn unique_headers(row: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(row.len());
    for raw in row {
        let base = raw.trim().to_string();
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let mut name = if *count == 1 {
            base.clone()
        } else {
            format!("{} ({})", base, count)
        };
        // a literal header may already hold a generated name
        while out.contains(&name) {
            *count += 1;
            name = format!("{} ({})", base, count);
        }
        out.push(name);
    }
    out
}

fn normalize_header(h: &str) -> String {
    h.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
