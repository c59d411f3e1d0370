// src/periods/mod.rs
//! Reporting-period discovery: which `YYYY-MM` / `YYYYMM` sheets a source has,
//! grouped year → months.

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::process::records::Table;

static FORMAT_A: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}$").unwrap());
static FORMAT_B: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").unwrap());
static PERIOD_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-?\d{2}$").unwrap());

/// Number of months synthesized when a source has no usable index.
pub const FALLBACK_MONTHS: u32 = 24;

const MONTH_NAMES: [&str; 12] = [
    "Janvier",
    "Février",
    "Mars",
    "Avril",
    "Mai",
    "Juin",
    "Juillet",
    "Août",
    "Septembre",
    "Octobre",
    "Novembre",
    "Décembre",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateFormat {
    /// `YYYY-MM`
    Dashed,
    /// `YYYYMM`
    Compact,
}

impl DateFormat {
    fn detect(name: &str) -> Option<Self> {
        if FORMAT_A.is_match(name) {
            Some(Self::Dashed)
        } else if FORMAT_B.is_match(name) {
            Some(Self::Compact)
        } else {
            None
        }
    }

    /// Split `name` into (year, month) if it conforms to this format.
    fn split<'a>(&self, name: &'a str) -> Option<(&'a str, &'a str)> {
        match self {
            Self::Dashed if FORMAT_A.is_match(name) => name.split_once('-'),
            Self::Compact if FORMAT_B.is_match(name) => Some((&name[..4], &name[4..])),
            _ => None,
        }
    }

    pub fn sheet_name(&self, year: &str, month: &str) -> String {
        match self {
            Self::Dashed => format!("{}-{}", year, month),
            Self::Compact => format!("{}{}", year, month),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("no valid period (YYYY-MM or YYYYMM) was found")]
    NoValidPeriod,
    #[error("could not read the index, or no sheet is available")]
    NoPeriods,
}

impl PeriodError {
    /// Message shown to dashboard users.
    pub fn user_message(&self) -> &'static str {
        match self {
            PeriodError::NoValidPeriod => {
                "Aucune période valide (format AAAA-MM ou AAAAMM) n'a été trouvée."
            }
            PeriodError::NoPeriods => {
                "Impossible de lire l'index ou aucune feuille n'est disponible."
            }
        }
    }
}

/// A selected reporting period and the sheet holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub year: String,
    pub month: String,
    pub sheet_name: String,
}

/// Year → months available for one source, newest months first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodIndex {
    format: DateFormat,
    years: BTreeMap<String, Vec<String>>,
}

impl PeriodIndex {
    /// Build the index from candidate sheet names, in source order.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, PeriodError> {
        let format = names
            .iter()
            .find_map(|n| DateFormat::detect(n.as_ref()))
            .ok_or(if names.is_empty() {
                PeriodError::NoPeriods
            } else {
                PeriodError::NoValidPeriod
            })?;

        let mut years: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in names {
            let Some((year, month)) = format.split(name.as_ref()) else {
                debug!(name = name.as_ref(), "skipping non-period sheet name");
                continue;
            };
            let months = years.entry(year.to_string()).or_default();
            // `2024-1` and `2024-01` are one month; the first spelling names the sheet
            let value = month.parse::<u32>().ok();
            if !months.iter().any(|m| m.parse::<u32>().ok() == value) {
                months.push(month.to_string());
            }
        }
        for months in years.values_mut() {
            months.sort_by_key(|m| std::cmp::Reverse(m.parse::<u32>().unwrap_or(0)));
        }

        Ok(Self { format, years })
    }

    pub fn format(&self) -> DateFormat {
        self.format
    }

    /// Years, newest first.
    pub fn years(&self) -> Vec<&str> {
        self.years.keys().rev().map(String::as_str).collect()
    }

    pub fn months(&self, year: &str) -> &[String] {
        self.years.get(year).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.years
    }

    pub fn period(&self, year: &str, month: &str) -> Option<Period> {
        self.months(year).iter().any(|m| m == month).then(|| Period {
            year: year.to_string(),
            month: month.to_string(),
            sheet_name: self.format.sheet_name(year, month),
        })
    }

    /// First month of `year`, if the year has any.
    pub fn first_of_year(&self, year: &str) -> Option<Period> {
        let month = self.months(year).first()?;
        self.period(year, month)
    }

    /// Newest year, then the first month of its list.
    pub fn default_selection(&self) -> Option<Period> {
        let year = self.years.keys().next_back()?;
        self.first_of_year(year)
    }
}

/// The most recent `count` months ending at `today`, as `YYYY-MM` names.
pub fn recent_period_names(today: NaiveDate, count: u32) -> Vec<String> {
    let mut year = today.year();
    let mut month = today.month();
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(format!("{:04}-{:02}", year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    out
}

pub fn fallback_period_names() -> Vec<String> {
    recent_period_names(Local::now().date_naive(), FALLBACK_MONTHS)
}

/// Sheet names listed in an `index` sheet: the first column of each record.
///
/// Returns `None` when nothing in the listing looks like a period, in which
/// case callers fall back to [`fallback_period_names`].
pub fn listing_from_index(table: &Table) -> Option<Vec<String>> {
    let names: Vec<String> = table
        .records
        .iter()
        .filter_map(|r| r.first_value())
        .map(str::to_string)
        .collect();
    names
        .iter()
        .any(|n| PERIOD_LIKE.is_match(n))
        .then_some(names)
}

/// True for names shaped like `YYYY-MM` or `YYYYMM` (two-digit month).
pub fn looks_like_period(s: &str) -> bool {
    PERIOD_LIKE.is_match(s)
}

/// How a source's period names were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListingOrigin {
    Index,
    Synthesized,
}

/// Pick the names to index: a usable index listing, or the synthesized
/// recent months when the source has no index or the listing is unusable.
#[instrument(level = "debug", skip(listing))]
pub fn resolve_names(
    source_id: &str,
    has_index: bool,
    listing: Option<&Table>,
) -> (Vec<String>, ListingOrigin) {
    if !has_index {
        debug!("source has no index sheet; using recent months");
        return (fallback_period_names(), ListingOrigin::Synthesized);
    }
    match listing.and_then(listing_from_index) {
        Some(names) => (names, ListingOrigin::Index),
        None => {
            warn!("index missing or without periods; using recent months");
            (fallback_period_names(), ListingOrigin::Synthesized)
        }
    }
}

/// French month name for `"01"`..`"12"` (or `"1"`..`"12"`).
pub fn month_name(month: &str) -> Option<&'static str> {
    let n: usize = month.parse().ok()?;
    MONTH_NAMES.get(n.checked_sub(1)?).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashed_names_detected_and_sorted() {
        let idx = PeriodIndex::from_names(&["2024-01", "2024-03", "index"]).unwrap();
        assert_eq!(idx.format(), DateFormat::Dashed);
        assert_eq!(idx.as_map().len(), 1);
        assert_eq!(idx.months("2024"), &["03".to_string(), "01".to_string()]);
    }

    #[test]
    fn compact_names_detected() {
        let idx = PeriodIndex::from_names(&["202401", "202403"]).unwrap();
        assert_eq!(idx.format(), DateFormat::Compact);
        assert_eq!(idx.months("2024"), &["03".to_string(), "01".to_string()]);
        assert_eq!(idx.default_selection().unwrap().sheet_name, "202403");
    }

    #[test]
    fn first_valid_name_decides_format() {
        let idx = PeriodIndex::from_names(&["notes", "202312", "2024-02", "202401"]).unwrap();
        assert_eq!(idx.format(), DateFormat::Compact);
        assert_eq!(idx.years(), vec!["2024", "2023"]);
        assert_eq!(idx.months("2024"), &["01".to_string()]);
    }

    #[test]
    fn padded_and_bare_months_are_one_month() {
        let idx = PeriodIndex::from_names(&["2024-1", "2024-01", "2024-02"]).unwrap();
        assert_eq!(idx.months("2024"), &["02".to_string(), "1".to_string()]);
        assert_eq!(idx.period("2024", "1").unwrap().sheet_name, "2024-1");
    }

    #[test]
    fn months_deduplicated_and_numeric_descending() {
        let idx = PeriodIndex::from_names(&["2023-9", "2023-10", "2023-9", "2023-02"]).unwrap();
        assert_eq!(
            idx.months("2023"),
            &["10".to_string(), "9".to_string(), "02".to_string()]
        );
        assert_eq!(idx.period("2023", "9").unwrap().sheet_name, "2023-9");
    }

    #[test]
    fn errors_are_distinct() {
        let empty: [&str; 0] = [];
        assert_eq!(PeriodIndex::from_names(&empty), Err(PeriodError::NoPeriods));
        assert_eq!(
            PeriodIndex::from_names(&["index", "Feuille 1"]),
            Err(PeriodError::NoValidPeriod)
        );
    }

    #[test]
    fn default_selection_is_newest_year_first_month() {
        let idx = PeriodIndex::from_names(&["2023-12", "2024-01", "2024-02"]).unwrap();
        let p = idx.default_selection().unwrap();
        assert_eq!((p.year.as_str(), p.month.as_str()), ("2024", "02"));
        assert_eq!(p.sheet_name, "2024-02");
        assert_eq!(idx.first_of_year("2023").unwrap().month, "12");
        assert!(idx.first_of_year("1999").is_none());
    }

    #[test]
    fn recent_periods_cross_year_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 17).unwrap();
        let names = recent_period_names(today, 24);
        assert_eq!(names.len(), 24);
        assert_eq!(names[0], "2024-02");
        assert_eq!(names[1], "2024-01");
        assert_eq!(names[2], "2023-12");
        assert_eq!(names[23], "2022-03");
        let idx = PeriodIndex::from_names(&names).unwrap();
        assert_eq!(idx.years(), vec!["2024", "2023", "2022"]);
        assert_eq!(idx.months("2023").len(), 12);
    }

    #[test]
    fn index_listing_requires_a_period() {
        let t = Table::from_csv("Période\n2024-03\n2024-02\n\nNotes\n");
        assert_eq!(
            listing_from_index(&t),
            Some(vec![
                "2024-03".to_string(),
                "2024-02".to_string(),
                "Notes".to_string()
            ])
        );
        let data = Table::from_csv("Famille,CA N\nTextile,45300\n");
        assert_eq!(listing_from_index(&data), None);
    }

    #[test]
    fn resolve_names_falls_back() {
        let (names, origin) = resolve_names("x", false, None);
        assert_eq!(origin, ListingOrigin::Synthesized);
        assert_eq!(names.len(), FALLBACK_MONTHS as usize);

        let (_, origin) = resolve_names("x", true, None);
        assert_eq!(origin, ListingOrigin::Synthesized);

        let t = Table::from_csv("Période\n202403\n");
        let (names, origin) = resolve_names("x", true, Some(&t));
        assert_eq!(origin, ListingOrigin::Index);
        assert_eq!(names, vec!["202403".to_string()]);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_name("03"), Some("Mars"));
        assert_eq!(month_name("12"), Some("Décembre"));
        assert_eq!(month_name("0"), None);
        assert_eq!(month_name("13"), None);
    }
}
