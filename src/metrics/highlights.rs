use serde::Serialize;

use super::Trend;
use crate::classify::{normalize, Classification};
use crate::sheet::CleanTable;

/// Columns named with these come first, in this order.
const PRIORITY: &[&str] = &[
    "vendas",
    "concluídos",
    "novos clientes",
    "valor bruto",
    "líquido",
    "ticket médio",
    "visitas",
    "visualizações",
];
/// Rates and averages are averaged, everything else summed.
const AVERAGED: &[&str] = &["médio", "media", "average", "taxa", "rate", "%"];
const CURRENCY: &[&str] = &["valor", "bruto", "líquido", "receita", "faturamento"];
const PERCENT: &[&str] = &["%", "taxa", "rate"];

pub const DEFAULT_HIGHLIGHTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    Currency,
    Percent,
    Number,
}

/// A headline card for one metric column over the whole sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub name: String,
    pub value: f64,
    /// Second half of the series against the first half.
    pub trend: Trend,
    pub format: ValueFormat,
}

/// Up to `limit` headline cards, priority columns first.
pub fn highlights(table: &CleanTable, classification: &Classification, limit: usize) -> Vec<Highlight> {
    let mut metric_cols: Vec<usize> = classification.metrics().collect();
    metric_cols.sort_by_key(|&idx| priority(&normalize(&table.columns()[idx].name)));

    metric_cols
        .into_iter()
        .filter_map(|idx| {
            let col = &table.columns()[idx];
            let values = col.values.numbers();
            if values.is_empty() {
                return None;
            }
            let name = normalize(&col.name);
            let value = if contains_any(&name, AVERAGED) {
                mean(&values)
            } else {
                values.iter().sum()
            };
            Some(Highlight {
                name: col.name.clone(),
                value,
                trend: half_split_trend(&values),
                format: value_format(&name),
            })
        })
        .take(limit)
        .collect()
}

fn priority(name: &str) -> usize {
    PRIORITY
        .iter()
        .position(|k| name.contains(k))
        .unwrap_or(PRIORITY.len())
}

fn value_format(name: &str) -> ValueFormat {
    if contains_any(name, CURRENCY) {
        ValueFormat::Currency
    } else if contains_any(name, PERCENT) {
        ValueFormat::Percent
    } else {
        ValueFormat::Number
    }
}

fn half_split_trend(values: &[f64]) -> Trend {
    let mid = values.len() / 2;
    if mid == 0 {
        return Trend::Undefined;
    }
    Trend::between(Some(mean(&values[..mid])), Some(mean(&values[mid..])))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn contains_any(name: &str, words: &[&str]) -> bool {
    words.iter().any(|w| name.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, Vocabulary};
    use crate::sheet::Column;

    fn cards(columns: Vec<Column>, limit: usize) -> Vec<Highlight> {
        let table = CleanTable::from_columns("t", columns).unwrap();
        let c = classify(&table, &Vocabulary::default());
        highlights(&table, &c, limit)
    }

    #[test]
    fn priority_order_and_aggregation() {
        let h = cards(
            vec![
                Column::text("Mês", vec![Some("Jan"), Some("Fev"), Some("Mar"), Some("Abr")]),
                Column::numeric("Ticket médio", vec![Some(30.0), Some(40.0), Some(50.0), Some(60.0)]),
                Column::numeric("Valor bruto", vec![Some(100.0), Some(100.0), Some(150.0), Some(150.0)]),
                Column::numeric("Vendas", vec![Some(1.0), Some(2.0), Some(3.0), None]),
            ],
            DEFAULT_HIGHLIGHTS,
        );
        let names: Vec<&str> = h.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Vendas", "Valor bruto", "Ticket médio"]);

        assert_eq!(h[0].value, 6.0);
        assert_eq!(h[0].format, ValueFormat::Number);
        assert_eq!(h[1].value, 500.0);
        assert_eq!(h[1].format, ValueFormat::Currency);
        assert_eq!(h[1].trend, Trend::Defined(50.0));
        assert_eq!(h[2].value, 45.0);
    }

    #[test]
    fn limit_and_percent_format() {
        let h = cards(
            vec![
                Column::text("Mês", vec![Some("Jan"), Some("Fev")]),
                Column::numeric("Taxa de cancelamento %", vec![Some(2.0), Some(4.0)]),
                Column::numeric("Pedidos", vec![Some(5.0), Some(5.0)]),
            ],
            1,
        );
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].name, "Taxa de cancelamento %");
        assert_eq!(h[0].value, 3.0);
        assert_eq!(h[0].format, ValueFormat::Percent);
    }

    #[test]
    fn short_series_has_no_trend() {
        let h = cards(
            vec![
                Column::text("Mês", vec![Some("Jan")]),
                Column::numeric("Vendas", vec![Some(9.0)]),
            ],
            DEFAULT_HIGHLIGHTS,
        );
        assert_eq!(h[0].trend, Trend::Undefined);
    }
}
