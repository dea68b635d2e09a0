//! The sheet model: raw reader cells on the way in, named and typed
//! columns on the way out, plus the stages that get from one to the other.
//!
//! Each stage is a plain function over an immutable input and hands back
//! a new value or a [`Rejection`]; [`process_sheet`] chains them.

mod clean;
pub mod filter;
pub mod header;
pub mod utils;

pub use clean::clean_table;
pub use filter::{filter_sheet, has_numeric_signal};
pub use header::{locate_header, score_row};

use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument};

use crate::config::CleaningConfig;
use crate::error::Rejection;

/// A cell as decoded by the file reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
    /// An error token such as `#DIV/0!` the reader recognised as such.
    Error(String),
}

impl Cell {
    /// Blank text and NaN count as null, the same way a spreadsheet shows them.
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Number(v) => v.is_nan(),
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Error(_) => false,
        }
    }

    /// Descriptive (non-numeric) content; error tokens are text as far as
    /// header scoring is concerned.
    pub fn is_text(&self) -> bool {
        match self {
            Cell::Text(s) => !s.trim().is_empty(),
            Cell::Error(_) => true,
            _ => false,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            _ if self.is_null() => None,
            Cell::Number(v) => Some(utils::format_number(*v)),
            Cell::Text(s) | Cell::Error(s) => Some(utils::clean_str(s)),
            Cell::Null => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Text(s) => utils::parse_number(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Null, Into::into)
    }
}

/// An ungoverned grid of cells, exactly as the reader produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Sheet name inside the source workbook.
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Widest row length.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// A single cleaned value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => f.write_str(&utils::format_number(*v)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Null => Ok(()),
        }
    }
}

/// Column storage after coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnValues::Numeric(_))
    }

    pub fn get(&self, row: usize) -> CellValue {
        match self {
            ColumnValues::Numeric(v) => v
                .get(row)
                .copied()
                .flatten()
                .map_or(CellValue::Null, CellValue::Number),
            ColumnValues::Text(v) => v
                .get(row)
                .cloned()
                .flatten()
                .map_or(CellValue::Null, CellValue::Text),
        }
    }

    pub fn is_null_at(&self, row: usize) -> bool {
        match self {
            ColumnValues::Numeric(v) => v.get(row).map_or(true, Option::is_none),
            ColumnValues::Text(v) => v.get(row).map_or(true, Option::is_none),
        }
    }

    pub fn non_null_count(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.iter().flatten().count(),
            ColumnValues::Text(v) => v.iter().flatten().count(),
        }
    }

    /// Non-null numbers in row order; empty for text columns.
    pub fn numbers(&self) -> Vec<f64> {
        match self {
            ColumnValues::Numeric(v) => v.iter().flatten().copied().collect(),
            ColumnValues::Text(_) => Vec::new(),
        }
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut idx = 0;
            values.retain(|_| {
                let k = keep.get(idx).copied().unwrap_or(false);
                idx += 1;
                k
            });
        }
        match self {
            ColumnValues::Numeric(v) => filter(v, keep),
            ColumnValues::Text(v) => filter(v, keep),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Text(values.into_iter().map(|v| v.map(Into::into)).collect()),
        }
    }
}

/// A normalized sheet: unique non-empty column names, no all-null rows or
/// columns, rows in the order the sheet gave them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanTable {
    name: String,
    columns: Vec<Column>,
    rows: usize,
}

impl CleanTable {
    /// Assemble a table from finished columns. Columns must share one
    /// length and there must be at least one row and one column.
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, Rejection> {
        let rows = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
            return Err(Rejection::RaggedRows {
                row: rows.min(bad.values.len()),
                expected: rows,
                found: bad.values.len(),
            });
        }
        if columns.is_empty() || rows == 0 {
            return Err(Rejection::EmptyAfterCleaning);
        }
        Ok(Self {
            name: name.into(),
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn value(&self, column: usize, row: usize) -> CellValue {
        self.columns
            .get(column)
            .map_or(CellValue::Null, |c| c.values.get(row))
    }

    pub fn row(&self, row: usize) -> Vec<CellValue> {
        self.columns.iter().map(|c| c.values.get(row)).collect()
    }
}

/// Header location, cleaning and the numeric filter for one sheet.
#[instrument(level = "debug", skip_all, fields(sheet = %raw.name))]
pub fn process_sheet(raw: &RawTable, config: &CleaningConfig) -> Result<CleanTable, Rejection> {
    let header_row = locate_header(raw, config.header_scan_rows)?;
    debug!(header_row, "header located");
    let table = clean_table(raw, header_row, config)?;
    filter_sheet(table)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a raw sheet from string literals: `""` is null, numeric
    /// literals stay text so coercion is exercised.
    pub(crate) fn raw(name: &str, rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            name,
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|c| if c.is_empty() { Cell::Null } else { Cell::from(*c) })
                        .collect()
                })
                .collect(),
        )
    }

    #[test]
    fn cell_null_and_text_rules() {
        assert!(Cell::Null.is_null());
        assert!(Cell::from("   ").is_null());
        assert!(Cell::Number(f64::NAN).is_null());
        assert!(!Cell::Error("#REF!".into()).is_null());
        assert!(Cell::Error("#REF!".into()).is_text());
        assert!(!Cell::Number(1.0).is_text());
        assert_eq!(Cell::from(None::<f64>), Cell::Null);
    }

    #[test]
    fn from_columns_rejects_mismatched_lengths() {
        let err = CleanTable::from_columns(
            "t",
            vec![
                Column::numeric("a", vec![Some(1.0), Some(2.0)]),
                Column::numeric("b", vec![Some(1.0)]),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            Rejection::RaggedRows {
                row: 1,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            CleanTable::from_columns("t", vec![]).unwrap_err(),
            Rejection::EmptyAfterCleaning
        );
    }

    #[test]
    fn table_serializes_as_typed_columns() {
        let table = CleanTable::from_columns(
            "iFood",
            vec![
                Column::text("Mês", vec![Some("Jan"), None]),
                Column::numeric("Vendas", vec![Some(10.0), Some(12.5)]),
            ],
        )
        .unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["name"], "iFood");
        assert_eq!(json["rows"], 2);
        assert_eq!(json["columns"][0]["values"]["kind"], "text");
        assert!(json["columns"][0]["values"]["data"][1].is_null());
        assert_eq!(json["columns"][1]["values"]["data"][1], 12.5);
        assert_eq!(table.row(1), vec![CellValue::Null, CellValue::Number(12.5)]);
    }

    #[test]
    fn process_sheet_runs_all_stages() {
        let sheet = raw(
            "Vendas",
            &[
                &["Relatório mensal", "", ""],
                &["Mês", "Vendas", ""],
                &["Jan", "10", ""],
                &["Fev", "12", ""],
            ],
        );
        let table = process_sheet(&sheet, &CleaningConfig::default()).unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(1, 1), CellValue::Number(12.0));
    }

    #[test]
    fn process_sheet_rejects_text_only_and_empty() {
        let cfg = CleaningConfig::default();
        let text_only = raw("Notas", &[&["Obs"], &["fechado"], &["aberto"]]);
        assert_eq!(
            process_sheet(&text_only, &cfg).unwrap_err(),
            Rejection::NoNumericSignal
        );
        let blank = raw("Vazia", &[&["", ""], &["", ""]]);
        assert_eq!(
            process_sheet(&blank, &cfg).unwrap_err(),
            Rejection::NoHeaderFound
        );
    }
}
