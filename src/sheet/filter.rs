use tracing::debug;

use super::CleanTable;
use crate::error::Rejection;

/// True when at least one column came out of coercion numeric with data in it.
pub fn has_numeric_signal(table: &CleanTable) -> bool {
    table
        .columns()
        .iter()
        .any(|c| c.values.is_numeric() && c.values.non_null_count() > 0)
}

/// Pass the table through, or reject it when there is nothing to chart.
pub fn filter_sheet(table: CleanTable) -> Result<CleanTable, Rejection> {
    if has_numeric_signal(&table) {
        Ok(table)
    } else {
        debug!(sheet = %table.name(), "no numeric column");
        Err(Rejection::NoNumericSignal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Column;

    #[test]
    fn text_only_tables_are_rejected() {
        let table = CleanTable::from_columns(
            "Observações",
            vec![Column::text("Obs", vec![Some("loja fechada")])],
        )
        .unwrap();
        assert!(!has_numeric_signal(&table));
        assert_eq!(filter_sheet(table).unwrap_err(), Rejection::NoNumericSignal);
    }

    #[test]
    fn one_numeric_column_is_enough() {
        let table = CleanTable::from_columns(
            "iFood",
            vec![
                Column::text("Obs", vec![Some("a"), Some("b")]),
                Column::numeric("Qtd", vec![None, Some(3.0)]),
            ],
        )
        .unwrap();
        assert!(filter_sheet(table).is_ok());
    }
}
