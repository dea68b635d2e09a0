use std::collections::HashSet;
use tracing::{debug, instrument};

use super::{Cell, CleanTable, Column, ColumnValues, RawTable};
use crate::config::CleaningConfig;
use crate::error::Rejection;

/// Turn a raw sheet into a [`CleanTable`], using `header_row` for names.
///
/// Steps, in order:
///  1. rows below the header become data, the header becomes names
///  2. columns that are null in every data row go
///  3. columns whose name carries the unlabeled prefix go
///  4. rows that are null in every remaining column go
///  5. error sentinels become null
///  6. columns where at least `numeric_threshold` of the non-null cells
///     parse as numbers become numeric; the rest stay text
///  7. columns and rows left empty by 5–6 go
///
/// Step 7 can remove trailing rows, which changes which row the metric
/// extractor treats as the last period.
///
/// Bad cell values never fail the call; only ragged input does.
#[instrument(level = "debug", skip_all, fields(sheet = %raw.name, header_row = header_row))]
pub fn clean_table(
    raw: &RawTable,
    header_row: usize,
    config: &CleaningConfig,
) -> Result<CleanTable, Rejection> {
    check_rectangular(raw)?;
    let header = raw.rows.get(header_row).ok_or(Rejection::NoHeaderFound)?;
    let data = &raw.rows[header_row + 1..];

    // 1) names + per-column cells
    let names = column_names(header, &config.unlabeled_prefix);
    let mut columns: Vec<(String, Vec<Cell>)> = names
        .into_iter()
        .enumerate()
        .map(|(c, name)| (name, data.iter().map(|row| row[c].clone()).collect()))
        .collect();

    // 2) all-null columns
    columns.retain(|(name, cells)| {
        let keep = cells.iter().any(|c| !c.is_null());
        if !keep {
            debug!(column = %name, "dropping empty column");
        }
        keep
    });

    // 3) unlabeled columns
    columns.retain(|(name, _)| {
        let keep = !name.starts_with(config.unlabeled_prefix.as_str());
        if !keep {
            debug!(column = %name, "dropping unlabeled column");
        }
        keep
    });

    // 4) all-null rows
    let keep: Vec<bool> = (0..data.len())
        .map(|r| columns.iter().any(|(_, cells)| !cells[r].is_null()))
        .collect();
    for (_, cells) in columns.iter_mut() {
        let mut r = 0;
        cells.retain(|_| {
            let k = keep[r];
            r += 1;
            k
        });
    }

    // 5) error sentinels
    for (_, cells) in columns.iter_mut() {
        for cell in cells.iter_mut() {
            let sentinel = matches!(cell, Cell::Text(s) | Cell::Error(s) if config.is_error_sentinel(s));
            if sentinel {
                *cell = Cell::Null;
            }
        }
    }

    // 6) numeric coercion
    let mut typed: Vec<Column> = columns
        .into_iter()
        .map(|(name, cells)| {
            let values = coerce_column(&name, &cells, config.numeric_threshold);
            Column { name, values }
        })
        .collect();

    // 7) anything emptied by 5–6
    typed.retain(|c| c.values.non_null_count() > 0);
    let rows = typed.first().map_or(0, |c| c.values.len());
    let keep: Vec<bool> = (0..rows)
        .map(|r| typed.iter().any(|c| !c.values.is_null_at(r)))
        .collect();
    if keep.iter().any(|k| !k) {
        for col in typed.iter_mut() {
            col.values.retain_rows(&keep);
        }
    }

    let table = CleanTable::from_columns(raw.name.clone(), typed)?;
    debug!(
        columns = table.width(),
        rows = table.row_count(),
        "sheet cleaned"
    );
    Ok(table)
}

fn check_rectangular(raw: &RawTable) -> Result<(), Rejection> {
    let expected = raw.rows.first().map_or(0, Vec::len);
    match raw.rows.iter().position(|r| r.len() != expected) {
        Some(row) => Err(Rejection::RaggedRows {
            row,
            expected,
            found: raw.rows[row].len(),
        }),
        None => Ok(()),
    }
}

/// Header cells become names. Blank cells get `"{prefix}: {index}"` and
/// repeated names get a `.1`, `.2`, ... suffix so names stay unique.
fn column_names(header: &[Cell], unlabeled_prefix: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell
                .as_text()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("{}: {}", unlabeled_prefix, idx));
            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}.{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn coerce_column(name: &str, cells: &[Cell], threshold: f64) -> ColumnValues {
    let non_null = cells.iter().filter(|c| !c.is_null()).count();
    let parsed: Vec<Option<f64>> = cells.iter().map(Cell::as_number).collect();
    let numeric = parsed.iter().flatten().count();

    if non_null > 0 && numeric as f64 >= threshold * non_null as f64 {
        if numeric < non_null {
            debug!(
                column = %name,
                numeric,
                non_null,
                "coerced to numeric, unparseable cells nulled"
            );
        }
        ColumnValues::Numeric(parsed)
    } else {
        ColumnValues::Text(cells.iter().map(Cell::as_text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::tests::raw;
    use crate::sheet::CellValue;

    fn cfg() -> CleaningConfig {
        CleaningConfig::default()
    }

    fn single_column(values: &[&str]) -> RawTable {
        let mut rows: Vec<&[&str]> = Vec::new();
        rows.push(&["Valor"]);
        let cells: Vec<[&str; 1]> = values.iter().map(|v| [*v]).collect();
        rows.extend(cells.iter().map(|c| &c[..]));
        raw("t", &rows)
    }

    #[test]
    fn exactly_half_numeric_is_coerced() {
        let table = clean_table(&single_column(&["1", "2", "x", "y"]), 0, &cfg()).unwrap();
        assert_eq!(
            table.columns()[0].values,
            ColumnValues::Numeric(vec![Some(1.0), Some(2.0)])
        );
        // rows whose only cell failed to parse are gone
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn unparseable_trailing_row_moves_the_last_period() {
        let table = clean_table(&single_column(&["10", "20", "n/d"]), 0, &cfg()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(0, table.row_count() - 1), CellValue::Number(20.0));
    }

    #[test]
    fn below_half_numeric_stays_text() {
        let table = clean_table(&single_column(&["1", "x", "y", "z"]), 0, &cfg()).unwrap();
        assert_eq!(
            table.columns()[0].values,
            ColumnValues::Text(vec![
                Some("1".into()),
                Some("x".into()),
                Some("y".into()),
                Some("z".into())
            ])
        );
    }

    #[test]
    fn threshold_boundary_with_mixed_neighbours() {
        // 49 of 100 numeric → text; 50 of 100 → numeric
        let sheet = |numeric: usize| {
            let mut rows = vec![vec![Cell::from("Mês"), Cell::from("Qtd")]];
            for i in 0..100 {
                let v = if i < numeric {
                    Cell::from(i.to_string().as_str())
                } else {
                    Cell::from("n/d")
                };
                rows.push(vec![Cell::from(format!("d{i}").as_str()), v]);
            }
            RawTable::new("t", rows)
        };
        let below = clean_table(&sheet(49), 0, &cfg()).unwrap();
        assert!(!below.columns()[1].values.is_numeric());
        let at = clean_table(&sheet(50), 0, &cfg()).unwrap();
        assert!(at.columns()[1].values.is_numeric());
        assert_eq!(at.row_count(), 100);
    }

    #[test]
    fn sentinels_are_nulled_before_coercion() {
        let table = clean_table(&single_column(&["10", "#DIV/0!", "20", "30"]), 0, &cfg()).unwrap();
        let col = &table.columns()[0];
        assert!(col.values.is_numeric());
        assert_eq!(col.values.numbers(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn mostly_sentinel_column_still_numeric() {
        // 2 numbers, 3 sentinels, 1 text: without nulling first this would be 2/6
        let sheet = raw(
            "t",
            &[
                &["Mês", "Ticket"],
                &["Jan", "10"],
                &["Fev", "#DIV/0!"],
                &["Mar", "#REF!"],
                &["Abr", "#N/A"],
                &["Mai", "20"],
                &["Jun", "?"],
            ],
        );
        let table = clean_table(&sheet, 0, &cfg()).unwrap();
        let ticket = table.column("Ticket").unwrap();
        assert!(ticket.values.is_numeric());
        assert_eq!(table.row_count(), 6);
        assert_eq!(table.value(1, 5), CellValue::Null);
    }

    #[test]
    fn reader_error_cells_count_as_sentinels() {
        let sheet = RawTable::new(
            "t",
            vec![
                vec!["Valor".into()],
                vec![Cell::Number(1.0)],
                vec![Cell::Error("#VALUE!".into())],
            ],
        );
        let table = clean_table(&sheet, 0, &cfg()).unwrap();
        assert_eq!(table.columns()[0].values, ColumnValues::Numeric(vec![Some(1.0)]));
    }

    #[test]
    fn unlabeled_columns_are_dropped_even_with_content() {
        let sheet = raw(
            "t",
            &[
                &["Mês", "", "Unnamed: 7", "Vendas"],
                &["Jan", "x", "5", "10"],
                &["Fev", "y", "6", "12"],
            ],
        );
        let table = clean_table(&sheet, 0, &cfg()).unwrap();
        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Mês", "Vendas"]);
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        let sheet = raw("t", &[&["unnamed col", "Vendas"], &["a", "1"]]);
        let table = clean_table(&sheet, 0, &cfg()).unwrap();
        assert!(table.column("unnamed col").is_some());
    }

    #[test]
    fn separator_columns_and_blank_rows_are_removed() {
        let sheet = raw(
            "t",
            &[
                &["Mês", "", "Vendas", "Total"],
                &["Jan", "", "10", ""],
                &["", "", "", ""],
                &["Fev", "", "12", ""],
            ],
        );
        let table = clean_table(&sheet, 0, &cfg()).unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(0, 1), CellValue::Text("Fev".into()));
    }

    #[test]
    fn rows_above_header_are_discarded() {
        let sheet = raw(
            "t",
            &[&["Relatório", ""], &["Mês", "Vendas"], &["Jan", "3"]],
        );
        let table = clean_table(&sheet, 1, &cfg()).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.columns()[0].name, "Mês");
    }

    #[test]
    fn duplicate_and_numeric_header_names_are_made_unique() {
        let sheet = RawTable::new(
            "t",
            vec![
                vec!["Vendas".into(), "Vendas".into(), Cell::Number(2024.0)],
                vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Number(3.0)],
            ],
        );
        let table = clean_table(&sheet, 0, &cfg()).unwrap();
        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Vendas", "Vendas.1", "2024"]);
    }

    #[test]
    fn raw_table_is_left_untouched() {
        let sheet = single_column(&["10", "#DIV/0!"]);
        let before = sheet.clone();
        let _ = clean_table(&sheet, 0, &cfg()).unwrap();
        assert_eq!(sheet, before);
    }

    #[test]
    fn header_only_sheet_is_empty_after_cleaning() {
        let sheet = raw("t", &[&["Mês", "Vendas"]]);
        assert_eq!(
            clean_table(&sheet, 0, &cfg()).unwrap_err(),
            Rejection::EmptyAfterCleaning
        );
        let all_sentinels = single_column(&["#DIV/0!", "#N/A"]);
        assert_eq!(
            clean_table(&all_sentinels, 0, &cfg()).unwrap_err(),
            Rejection::EmptyAfterCleaning
        );
    }

    #[test]
    fn ragged_input_fails_the_table() {
        let sheet = RawTable::new(
            "t",
            vec![vec!["a".into(), "b".into()], vec![Cell::Number(1.0)]],
        );
        assert_eq!(
            clean_table(&sheet, 0, &cfg()).unwrap_err(),
            Rejection::RaggedRows {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }
}
