//! Current-period values and period-over-period trends.

pub mod chart;
pub mod highlights;

pub use chart::{ChartDataset, ChartSeries};
pub use highlights::{highlights, Highlight, ValueFormat};

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::debug;

use crate::classify::{Classification, Vocabulary};
use crate::sheet::{CellValue, CleanTable};

/// Percentage change between two periods. `Undefined` when the earlier
/// value is missing or zero; it serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Trend {
    Defined(f64),
    #[default]
    Undefined,
}

impl Trend {
    pub fn between(previous: Option<f64>, current: Option<f64>) -> Self {
        match (previous, current) {
            (Some(prev), Some(curr)) if prev != 0.0 => {
                let pct = (curr - prev) / prev * 100.0;
                if pct.is_finite() {
                    Trend::Defined(pct)
                } else {
                    Trend::Undefined
                }
            }
            _ => Trend::Undefined,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Trend::Defined(v) => Some(v),
            Trend::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Trend::Defined(_))
    }
}

impl Serialize for Trend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

/// One resolved summary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReading {
    /// Column the key resolved to.
    pub column: String,
    pub current: Option<f64>,
    pub previous: Option<f64>,
    pub trend: Trend,
}

/// Summary of one sheet at its latest period. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MetricSnapshot {
    pub sheet: String,
    /// Label value on the last row.
    pub current_period: Option<CellValue>,
    /// Keys that resolved to a metric column. Unresolved keys are absent.
    pub readings: BTreeMap<String, MetricReading>,
}

impl MetricSnapshot {
    pub fn current(&self, key: &str) -> Option<f64> {
        self.readings.get(key).and_then(|r| r.current)
    }

    pub fn previous(&self, key: &str) -> Option<f64> {
        self.readings.get(key).and_then(|r| r.previous)
    }

    pub fn trend(&self, key: &str) -> Trend {
        self.readings.get(key).map_or(Trend::Undefined, |r| r.trend)
    }
}

/// Read the last two rows of `table` for every configured summary key.
///
/// Each key resolves to the leftmost metric column whose name contains
/// one of that key's keywords. With fewer than two rows, values are
/// filled from the last row and every trend is undefined.
pub fn extract(
    table: &CleanTable,
    classification: &Classification,
    vocabulary: &Vocabulary,
) -> MetricSnapshot {
    let rows = table.row_count();
    let last = rows.checked_sub(1);
    let prev = rows.checked_sub(2);

    let current_period = match (classification.label(), last) {
        (Some(col), Some(row)) => Some(table.value(col, row)).filter(|v| !v.is_null()),
        _ => None,
    };

    let mut readings = BTreeMap::new();
    for spec in &vocabulary.metric_keys {
        let resolved = classification
            .metrics()
            .find(|&idx| spec.matches(&table.columns()[idx].name));
        let Some(idx) = resolved else {
            debug!(sheet = %table.name(), key = %spec.key, "metric key unresolved");
            continue;
        };
        let current = last.and_then(|r| table.value(idx, r).as_f64());
        let previous = prev.and_then(|r| table.value(idx, r).as_f64());
        readings.insert(
            spec.key.clone(),
            MetricReading {
                column: table.columns()[idx].name.clone(),
                current,
                previous,
                trend: Trend::between(previous, current),
            },
        );
    }

    MetricSnapshot {
        sheet: table.name().to_string(),
        current_period,
        readings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::classify::vocabulary::{GROSS_KEY, NET_KEY, SALES_KEY, TICKET_KEY};
    use crate::sheet::Column;

    fn snapshot(columns: Vec<Column>) -> MetricSnapshot {
        let table = CleanTable::from_columns("iFood", columns).unwrap();
        let vocab = Vocabulary::default();
        let c = classify(&table, &vocab);
        extract(&table, &c, &vocab)
    }

    #[test]
    fn trend_from_last_two_rows() {
        let s = snapshot(vec![
            Column::text("Mês", vec![Some("Jan"), Some("Fev"), Some("Mar")]),
            Column::numeric("Vendas", vec![Some(80.0), Some(100.0), Some(120.0)]),
        ]);
        assert_eq!(s.current_period, Some(CellValue::Text("Mar".into())));
        assert_eq!(s.current(SALES_KEY), Some(120.0));
        assert_eq!(s.previous(SALES_KEY), Some(100.0));
        assert_eq!(s.trend(SALES_KEY), Trend::Defined(20.0));
    }

    #[test]
    fn zero_previous_value_has_no_trend() {
        let s = snapshot(vec![
            Column::text("Mês", vec![Some("Jan"), Some("Fev")]),
            Column::numeric("Vendas", vec![Some(0.0), Some(50.0)]),
        ]);
        assert_eq!(s.current(SALES_KEY), Some(50.0));
        assert_eq!(s.trend(SALES_KEY), Trend::Undefined);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["readings"]["vendas"]["trend"].is_null());
    }

    #[test]
    fn null_previous_value_has_no_trend() {
        let s = snapshot(vec![
            Column::text("Mês", vec![Some("Jan"), Some("Fev"), Some("Mar")]),
            Column::numeric("Vendas", vec![Some(10.0), None, Some(50.0)]),
        ]);
        assert_eq!(s.trend(SALES_KEY), Trend::Undefined);
    }

    #[test]
    fn single_row_fills_values_without_trends() {
        let s = snapshot(vec![
            Column::text("Mês", vec![Some("Jan")]),
            Column::numeric("Vendas", vec![Some(7.0)]),
        ]);
        assert_eq!(s.current(SALES_KEY), Some(7.0));
        assert_eq!(s.previous(SALES_KEY), None);
        assert!(!s.trend(SALES_KEY).is_defined());
    }

    #[test]
    fn english_and_portuguese_columns_resolve_keys() {
        let s = snapshot(vec![
            Column::text("Month", vec![Some("Jan"), Some("Feb")]),
            Column::numeric("Sales", vec![Some(10.0), Some(15.0)]),
            Column::numeric("Ticket Médio", vec![Some(40.0), Some(30.0)]),
            Column::numeric("Valor Bruto", vec![Some(400.0), Some(450.0)]),
        ]);
        assert_eq!(s.trend(SALES_KEY), Trend::Defined(50.0));
        assert_eq!(s.trend(TICKET_KEY), Trend::Defined(-25.0));
        assert_eq!(s.readings[GROSS_KEY].column, "Valor Bruto");
        // no net column: key is simply absent
        assert!(!s.readings.contains_key(NET_KEY));
    }

    #[test]
    fn keys_only_resolve_to_metric_columns() {
        // "Vendas" here is text, so the sales key has nothing to bind to
        let s = snapshot(vec![
            Column::text("Mês", vec![Some("Jan"), Some("Fev")]),
            Column::text("Vendas", vec![Some("alta"), Some("baixa")]),
            Column::numeric("Valor bruto", vec![Some(1.0), Some(2.0)]),
        ]);
        assert!(!s.readings.contains_key(SALES_KEY));
        assert_eq!(s.current(GROSS_KEY), Some(2.0));
    }

    #[test]
    fn trend_is_never_infinite() {
        assert_eq!(Trend::between(Some(f64::MIN_POSITIVE), Some(f64::MAX)), Trend::Undefined);
        assert_eq!(Trend::between(None, Some(1.0)), Trend::Undefined);
        assert_eq!(Trend::between(Some(-50.0), Some(-25.0)), Trend::Defined(-50.0));
    }
}
