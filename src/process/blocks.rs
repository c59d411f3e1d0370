// src/process/blocks.rs
//! Splits a "Top 10" style export, where several small tables are stacked
//! under section and type marker rows, into named groups.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::matrix::{is_blank_row, Matrix};
use super::utils::is_bare_integer;

/// Number of rows shown per sub-table.
pub const TOP_N: usize = 10;

/// Marker vocabulary, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRules {
    /// First-cell prefixes opening a new group (`nomenclature`).
    pub section_keywords: Vec<String>,
    /// Substrings marking a quantity table.
    pub quantity_keywords: Vec<String>,
    /// Substrings marking an amount table.
    pub amount_keywords: Vec<String>,
    /// Substrings marking a header row (`rang`, `code`, `libell`).
    pub header_tokens: Vec<String>,
    /// Header substrings naming the label column.
    pub label_tokens: Vec<String>,
    /// Header substrings naming the quantity value column.
    pub quantity_value_tokens: Vec<String>,
    /// Header substrings naming the amount value column.
    pub amount_value_tokens: Vec<String>,
    /// Exact header names of the amount value column (`ca`).
    pub amount_value_names: Vec<String>,
}

impl Default for BlockRules {
    fn default() -> Self {
        fn v(xs: &[&str]) -> Vec<String> {
            xs.iter().map(|s| s.to_string()).collect()
        }
        Self {
            section_keywords: v(&["nomenclature"]),
            quantity_keywords: v(&["quantite", "quantité"]),
            amount_keywords: v(&["montant", "valeur", "ca "]),
            header_tokens: v(&["rang", "code", "libell"]),
            label_tokens: v(&["libell", "désignation", "designation", "produit"]),
            quantity_value_tokens: v(&["qt", "quant", "nombre"]),
            amount_value_tokens: v(&["montant", "valeur", "chiffre"]),
            amount_value_names: v(&["ca", "c.a."]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableKind {
    Quantity,
    Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SubTable {
    /// Column indices worth showing in a compact view: rank, label and the
    /// value matching `kind`, else the first three columns.
    pub fn display_columns(&self, kind: TableKind, rules: &BlockRules) -> Vec<usize> {
        let lowered: Vec<String> = self.headers.iter().map(|h| h.to_lowercase()).collect();
        let label = lowered
            .iter()
            .position(|h| rules.label_tokens.iter().any(|t| h.contains(t.as_str())));
        let value = lowered.iter().position(|h| match kind {
            TableKind::Quantity => rules
                .quantity_value_tokens
                .iter()
                .any(|t| h.contains(t.as_str())),
            TableKind::Amount => {
                rules
                    .amount_value_tokens
                    .iter()
                    .any(|t| h.contains(t.as_str()))
                    || rules.amount_value_names.iter().any(|n| h == n)
            }
        });
        match (label, value) {
            (Some(l), Some(v)) => vec![0, l, v],
            _ => (0..self.headers.len().min(3)).collect(),
        }
    }

    /// At most the first `n` rows.
    pub fn top(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..self.rows.len().min(n)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NomenclatureGroup {
    pub name: String,
    pub quantity: Option<SubTable>,
    pub amount: Option<SubTable>,
}

impl NomenclatureGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            quantity: None,
            amount: None,
        }
    }

    pub fn table(&self, kind: TableKind) -> Option<&SubTable> {
        match kind {
            TableKind::Quantity => self.quantity.as_ref(),
            TableKind::Amount => self.amount.as_ref(),
        }
    }

    fn table_mut(&mut self, kind: TableKind) -> &mut Option<SubTable> {
        match kind {
            TableKind::Quantity => &mut self.quantity,
            TableKind::Amount => &mut self.amount,
        }
    }
}

/// Extracted report: the period label from the first row plus the groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiTableReport {
    pub period_label: Option<String>,
    pub groups: Vec<NomenclatureGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No group open yet.
    Idle,
    /// Group open, no table type seen.
    InSection,
    /// Type marker seen, waiting for the header row.
    AwaitingHeader(TableKind),
    /// Header seen, taking rank-led rows.
    Collecting(TableKind),
    /// Table closed by a non-rank row; only a new marker or section reopens.
    Ended,
}

/// Scan `matrix` once, top to bottom, into [`NomenclatureGroup`]s.
///
/// A row that ends a table is not consumed: it falls through to the marker
/// rule on the same iteration, but never becomes a header for the table it
/// just closed.
pub fn extract_groups(matrix: &Matrix, rules: &BlockRules) -> Vec<NomenclatureGroup> {
    let mut groups: Vec<NomenclatureGroup> = Vec::new();
    let mut current: Option<NomenclatureGroup> = None;
    let mut state = ScanState::Idle;

    for (idx, row) in matrix.iter().enumerate() {
        if is_blank_row(row) {
            continue;
        }
        let first = row.first().map(|c| c.trim()).unwrap_or_default();
        let first_lower = first.to_lowercase();

        if rules
            .section_keywords
            .iter()
            .any(|k| first_lower.starts_with(&k.to_lowercase()))
        {
            if let Some(done) = current.take() {
                groups.push(done);
            }
            trace!(row = idx, name = first, "section start");
            current = Some(NomenclatureGroup::new(first));
            state = ScanState::InSection;
            continue;
        }

        // only reachable with a group open
        let Some(group) = current.as_mut() else {
            continue;
        };

        if let ScanState::Collecting(kind) = state {
            if is_bare_integer(first) {
                if let Some(table) = group.table_mut(kind).as_mut() {
                    table.rows.push(row.iter().map(|c| c.trim().to_string()).collect());
                }
                continue;
            }
            trace!(row = idx, ?kind, "table ended");
            state = ScanState::Ended;
        }

        if let ScanState::AwaitingHeader(kind) = state {
            if is_header_row(row, rules) {
                let headers = row
                    .iter()
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
                trace!(row = idx, ?kind, "table header");
                *group.table_mut(kind) = Some(SubTable {
                    headers,
                    rows: Vec::new(),
                });
                state = ScanState::Collecting(kind);
                continue;
            }
        }

        if let Some(kind) = marker_kind(row, rules) {
            state = ScanState::AwaitingHeader(kind);
        }
    }

    if let Some(done) = current.take() {
        groups.push(done);
    }
    debug!(groups = groups.len(), "extracted multi-table groups");
    groups
}

/// Period label from the first row, then the groups.
pub fn extract_report(matrix: &Matrix, rules: &BlockRules) -> MultiTableReport {
    let period_label = matrix
        .first()
        .and_then(|r| r.first())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    MultiTableReport {
        period_label,
        groups: extract_groups(matrix, rules),
    }
}

fn joined_lower(row: &[String]) -> String {
    row.join(" ").to_lowercase()
}

fn marker_kind(row: &[String], rules: &BlockRules) -> Option<TableKind> {
    let text = joined_lower(row);
    let hit = |words: &[String]| words.iter().any(|w| text.contains(&w.to_lowercase()));
    if hit(&rules.quantity_keywords) {
        Some(TableKind::Quantity)
    } else if hit(&rules.amount_keywords) {
        Some(TableKind::Amount)
    } else {
        None
    }
}

/// Mentions a header token and has at least two non-empty cells, which keeps
/// one-cell marker lines out.
fn is_header_row(row: &[String], rules: &BlockRules) -> bool {
    let filled = row.iter().filter(|c| !c.trim().is_empty()).count();
    if filled < 2 {
        return false;
    }
    let text = joined_lower(row);
    rules
        .header_tokens
        .iter()
        .any(|t| text.contains(&t.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::matrix::parse_matrix;

    const TWO_SECTIONS: &str = "\
Période : 2024-03
Nomenclature 01 - TEXTILE
Magasin Nord - Quantité (Top 10)
Rang,Code,Libellé,Fournisseur
1,1001,T-Shirt,Nike
2,1002,Short,Adidas
3,1003,Veste,Kipsta
Nomenclature 02 - CHAUSSURES
Magasin Nord - Quantité (Top 10)
Rang,Code,Libellé,Fournisseur
1,2001,Pegasus,Nike
2,2002,Ultraboost,Adidas
3,2003,Trail,Merrell
";

    #[test]
    fn two_sections_with_quantity_tables() {
        let groups = extract_groups(&parse_matrix(TWO_SECTIONS), &BlockRules::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Nomenclature 01 - TEXTILE");
        assert_eq!(groups[1].name, "Nomenclature 02 - CHAUSSURES");
        for g in &groups {
            let qty = g.quantity.as_ref().expect("quantity table");
            assert_eq!(qty.rows.len(), 3);
            assert_eq!(qty.headers, vec!["Rang", "Code", "Libellé", "Fournisseur"]);
            assert!(g.amount.is_none());
        }
    }

    #[test]
    fn header_row_mentioning_quantity_is_still_a_header() {
        let text = "\
Nomenclature 01
Magasin Nord - Quantité (Top 10)
Rang,Code,Libellé,Quantité,CA
1,1001,T-Shirt,150,4500
,,,,
Magasin Nord - Montant (Top 10)
Rang,Code,Libellé,CA,Marge
1,1001,T-Shirt,4500,2000
2,1002,Short,3600,1500
";
        let groups = extract_groups(&parse_matrix(text), &BlockRules::default());
        assert_eq!(groups.len(), 1);
        let qty = groups[0].quantity.as_ref().unwrap();
        assert_eq!(qty.headers[3], "Quantité");
        assert_eq!(qty.rows.len(), 1);
        let amount = groups[0].amount.as_ref().unwrap();
        assert_eq!(amount.rows.len(), 2);
        assert_eq!(amount.rows[1][2], "Short");
    }

    #[test]
    fn ending_row_never_replaces_its_table() {
        crate::logging::init_for_tests();
        let text = "\
Nomenclature A
Quantité
Rang,Code,Libellé
1,11,x
2,12,y
Sous-total code,3
Rang,Libellé,Extra
1,z
";
        let groups = extract_groups(&parse_matrix(text), &BlockRules::default());
        let qty = groups[0].quantity.as_ref().unwrap();
        assert_eq!(qty.headers, vec!["Rang", "Code", "Libellé"]);
        assert_eq!(qty.rows, vec![vec!["1", "11", "x"], vec!["2", "12", "y"]]);
    }

    #[test]
    fn ending_row_can_be_a_type_marker() {
        let text = "\
Nomenclature A
Quantité
Rang,Libellé
1,x
Valeur
Rang,Libellé
1,y
";
        let groups = extract_groups(&parse_matrix(text), &BlockRules::default());
        assert_eq!(groups[0].quantity.as_ref().unwrap().rows.len(), 1);
        assert_eq!(groups[0].amount.as_ref().unwrap().rows, vec![vec!["1", "y"]]);
    }

    #[test]
    fn repeated_kind_in_group_last_wins() {
        let text = "\
Nomenclature A
Quantité
Rang,Libellé
1,old
Quantité
Rang,Libellé
1,new
2,newer
";
        let groups = extract_groups(&parse_matrix(text), &BlockRules::default());
        let qty = groups[0].quantity.as_ref().unwrap();
        assert_eq!(qty.rows.len(), 2);
        assert_eq!(qty.rows[0][1], "new");
    }

    #[test]
    fn rows_before_first_section_are_ignored() {
        let text = "Quantité\nRang,Code\n1,2\n";
        assert!(extract_groups(&parse_matrix(text), &BlockRules::default()).is_empty());
    }

    #[test]
    fn section_without_tables_is_kept() {
        let groups = extract_groups(
            &parse_matrix("nomenclature vide\nsome note\n"),
            &BlockRules::default(),
        );
        assert_eq!(groups.len(), 1);
        assert!(groups[0].quantity.is_none() && groups[0].amount.is_none());
    }

    #[test]
    fn report_carries_period_label() {
        let report = extract_report(&parse_matrix(TWO_SECTIONS), &BlockRules::default());
        assert_eq!(report.period_label.as_deref(), Some("Période : 2024-03"));
        assert_eq!(report.groups.len(), 2);
    }

    #[test]
    fn display_columns_pick_label_and_value() {
        let rules = BlockRules::default();
        let t = SubTable {
            headers: ["Rang", "Code", "Libellé", "Fournisseur", "Quantité", "CA"]
                .map(String::from)
                .to_vec(),
            rows: Vec::new(),
        };
        assert_eq!(t.display_columns(TableKind::Quantity, &rules), vec![0, 2, 4]);
        assert_eq!(t.display_columns(TableKind::Amount, &rules), vec![0, 2, 5]);

        let bare = SubTable {
            headers: ["Rang", "Code"].map(String::from).to_vec(),
            rows: Vec::new(),
        };
        assert_eq!(bare.display_columns(TableKind::Amount, &rules), vec![0, 1]);
    }

    #[test]
    fn top_caps_rows() {
        let t = SubTable {
            headers: vec!["Rang".into()],
            rows: (1..=12).map(|i| vec![i.to_string()]).collect(),
        };
        assert_eq!(t.top(TOP_N).len(), TOP_N);
        assert_eq!(t.top(50).len(), 12);
    }
}
