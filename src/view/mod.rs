// src/view/mod.rs
//! Row filtering, sorting, cell formatting and plain-text rendering of
//! tables for the terminal.

use serde::Serialize;
use std::cmp::Ordering;

use crate::columns::Layout;
use crate::process::blocks::{BlockRules, MultiTableReport, SubTable, TableKind, TOP_N};
use crate::process::records::{Record, Table};
use crate::process::utils::{compare_cells, has_digit, locale_number_or_zero, parse_locale_number};

/// Width a CODEIN cell is left-padded to with `0`.
const CODEIN_WIDTH: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Clicking the same column again flips direction; a new column starts
    /// ascending.
    pub fn toggle(current: Option<&SortKey>, column: &str) -> Self {
        match current {
            Some(k) if k.column == column && k.direction == SortDirection::Ascending => Self {
                column: column.to_string(),
                direction: SortDirection::Descending,
            },
            _ => Self::ascending(column),
        }
    }
}

/// Records containing `term` in any value, ignoring case. An empty term keeps
/// everything.
pub fn filter_records<'a>(records: &'a [Record], term: &str) -> Vec<&'a Record> {
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|r| needle.is_empty() || r.values().any(|v| v.to_lowercase().contains(&needle)))
        .collect()
}

/// Stable sort on one column, see [`compare_cells`].
pub fn sort_records(records: &mut [&Record], key: &SortKey) {
    records.sort_by(|a, b| {
        let ord = compare_cells(
            a.get(&key.column).unwrap_or_default(),
            b.get(&key.column).unwrap_or_default(),
        );
        match key.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

/// Display text for one cell.
///
/// - empty cells show `-`
/// - `évolution` columns get a `▲`/`▼` prefix when non-zero
/// - `codein` columns are zero-padded to seven characters
/// - `%`/`part` columns holding a raw fraction in `[-1, 1]` become a
///   percentage with two decimals
pub fn format_value(value: &str, header: &str) -> String {
    if value.trim().is_empty() {
        return "-".to_string();
    }
    let h = header.to_lowercase();

    if h.contains("évolution") || h.contains("evolution") {
        if !has_digit(value) {
            return value.to_string();
        }
        let n = locale_number_or_zero(value);
        return match n.partial_cmp(&0.0) {
            Some(Ordering::Greater) => format!("▲ {}", value),
            Some(Ordering::Less) => format!("▼ {}", value),
            _ => value.to_string(),
        };
    }
    if h.contains("codein") {
        let width = value.chars().count();
        if width < CODEIN_WIDTH {
            return format!("{}{}", "0".repeat(CODEIN_WIDTH - width), value);
        }
        return value.to_string();
    }
    if (header.contains('%') || h.contains("part")) && !value.contains('%') {
        if let Some(n) = parse_locale_number(value).filter(|n| n.abs() <= 1.0) {
            return format!("{:.2} %", n * 100.0);
        }
    }
    value.to_string()
}

/// Render `records` as aligned text columns following `layout`, with a group
/// banner line when the layout has groups.
pub fn render_records(records: &[&Record], layout: &Layout) -> String {
    let headers = &layout.order;
    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            headers
                .iter()
                .map(|h| format_value(r.get(h).unwrap_or_default(), h))
                .collect()
        })
        .collect();
    let widths = column_widths(headers, &cells);

    let mut out = String::new();
    if !layout.groups.is_empty() {
        let banner: Vec<String> = headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| {
                let name = layout
                    .groups
                    .iter()
                    .find(|g| g.headers.first() == Some(h))
                    .map(|g| g.name.as_str())
                    .unwrap_or("");
                pad(name, *w)
            })
            .collect();
        push_line(&mut out, &banner);
    }
    let header_cells: Vec<String> = headers.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect();
    push_line(&mut out, &header_cells);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule);
    for row in &cells {
        let padded: Vec<String> = row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect();
        push_line(&mut out, &padded);
    }
    out
}

/// Convenience over [`render_records`] for a whole table.
pub fn render_table(table: &Table, layout: &Layout) -> String {
    let rows: Vec<&Record> = table.records.iter().collect();
    render_records(&rows, layout)
}

/// Compact rendering of a multi-table report: for every group, the top rows
/// of each sub-table reduced to its display columns.
pub fn render_report(report: &MultiTableReport, rules: &BlockRules) -> String {
    let mut out = String::new();
    if let Some(label) = &report.period_label {
        out.push_str(label);
        out.push_str("\n\n");
    }
    for group in &report.groups {
        out.push_str(&format!("== {} ==\n", group.name));
        for (kind, title) in [(TableKind::Quantity, "Quantité"), (TableKind::Amount, "Montant")] {
            match group.table(kind) {
                Some(t) => {
                    out.push_str(&format!("-- {} --\n", title));
                    out.push_str(&render_sub_table(t, kind, rules));
                }
                None => out.push_str(&format!("-- {} -- (aucune donnée)\n", title)),
            }
        }
        out.push('\n');
    }
    out
}

fn render_sub_table(table: &SubTable, kind: TableKind, rules: &BlockRules) -> String {
    let cols = table.display_columns(kind, rules);
    let headers: Vec<String> = cols
        .iter()
        .map(|&i| table.headers.get(i).cloned().unwrap_or_default())
        .collect();
    let cells: Vec<Vec<String>> = table
        .top(TOP_N)
        .iter()
        .map(|row| {
            cols.iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    let widths = column_widths(&headers, &cells);
    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect();
    push_line(&mut out, &header_cells);
    for row in &cells {
        let padded: Vec<String> = row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect();
        push_line(&mut out, &padded);
    }
    out
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    format!("{}{}", s, " ".repeat(width.saturating_sub(len)))
}

fn push_line(out: &mut String, cells: &[String]) {
    out.push_str(cells.join(" | ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{classify, ColumnRules};
    use crate::process::blocks::extract_report;
    use crate::process::matrix::parse_matrix;

    fn table() -> Table {
        Table::from_csv(
            "Famille,CA N,Évolution\n\
             Textile,45300,\"12,5 %\"\n\
             Chaussures,9 800,\"-3,45 %\"\n\
             Accessoires,120000,0\n",
        )
    }

    #[test]
    fn search_is_case_insensitive_over_all_values() {
        let t = table();
        let hits = filter_records(&t.records, "CHAUSS");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("Famille"), Some("Chaussures"));
        assert_eq!(filter_records(&t.records, "").len(), 3);
        assert!(filter_records(&t.records, "zzz").is_empty());
    }

    #[test]
    fn sorts_numerically_and_flips() {
        let t = table();
        let mut rows: Vec<&Record> = t.records.iter().collect();
        sort_records(&mut rows, &SortKey::ascending("CA N"));
        let fams: Vec<&str> = rows.iter().filter_map(|r| r.get("Famille")).collect();
        assert_eq!(fams, vec!["Chaussures", "Textile", "Accessoires"]);

        let key = SortKey::toggle(Some(&SortKey::ascending("CA N")), "CA N");
        assert_eq!(key.direction, SortDirection::Descending);
        sort_records(&mut rows, &key);
        assert_eq!(rows[0].get("Famille"), Some("Accessoires"));

        let key = SortKey::toggle(Some(&key), "CA N");
        assert_eq!(key.direction, SortDirection::Ascending);
        assert_eq!(
            SortKey::toggle(Some(&key), "Famille").direction,
            SortDirection::Ascending
        );
    }

    #[test]
    fn sorts_text_naturally() {
        let t = table();
        let mut rows: Vec<&Record> = t.records.iter().collect();
        sort_records(&mut rows, &SortKey::ascending("Famille"));
        let fams: Vec<&str> = rows.iter().filter_map(|r| r.get("Famille")).collect();
        assert_eq!(fams, vec!["Accessoires", "Chaussures", "Textile"]);
    }

    #[test]
    fn formats_cells() {
        assert_eq!(format_value("", "CA"), "-");
        assert_eq!(format_value("12,5 %", "Évolution"), "▲ 12,5 %");
        assert_eq!(format_value("-3,45 %", "évolution N-1"), "▼ -3,45 %");
        assert_eq!(format_value("0", "Évolution"), "0");
        assert_eq!(format_value("n/a", "Évolution"), "n/a");
        assert_eq!(format_value("1234", "CODEIN"), "0001234");
        assert_eq!(format_value("12345678", "codein"), "12345678");
        assert_eq!(format_value("0,1234", "Part Houdemont"), "12.34 %");
        assert_eq!(format_value("-0,5", "Marge %"), "-50.00 %");
        assert_eq!(format_value("12,5 %", "Marge %"), "12,5 %");
        assert_eq!(format_value("45", "Part"), "45");
        assert_eq!(format_value("Textile", "Famille"), "Textile");
    }

    #[test]
    fn renders_grouped_table() {
        let t = Table::from_csv("Houdemont CA,Nomenclature,Frouard CA\n10,Textile,20\n");
        let layout = classify(&t.headers, &[], &ColumnRules::default());
        let text = render_table(&t, &layout);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Houdemont") && lines[0].contains("Frouard"));
        assert!(lines[1].starts_with("Nomenclature | Houdemont CA | Frouard CA"));
        assert!(lines[3].starts_with("Textile"));
    }

    #[test]
    fn renders_report_sections() {
        let m = parse_matrix(
            "Période : 2024-03\nNomenclature 01\nQuantité\nRang,Code,Libellé,Quantité\n1,10,Short,5\n",
        );
        let rules = BlockRules::default();
        let text = render_report(&extract_report(&m, &rules), &rules);
        assert!(text.starts_with("Période : 2024-03"));
        assert!(text.contains("== Nomenclature 01 =="));
        assert!(text.contains("Rang | Libellé | Quantité"));
        assert!(text.contains("-- Montant -- (aucune donnée)"));
    }
}
