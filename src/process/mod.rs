// src/process/mod.rs
//! Text → structure: the CSV scanner, record building, multi-table block
//! extraction and the cell helpers they share.

pub mod blocks;
pub mod matrix;
pub mod records;
pub mod utils;

pub use blocks::{extract_groups, extract_report, BlockRules, MultiTableReport, NomenclatureGroup};
pub use matrix::{parse_matrix, Matrix};
pub use records::{build_records, Record, Table};
