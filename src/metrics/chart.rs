use serde::Serialize;

use crate::classify::Classification;
use crate::sheet::{CellValue, CleanTable};

/// Line colours, handed out left to right and reused when exhausted.
pub const PALETTE: [&str; 10] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#6366f1", "#a855f7",
    "#ec4899", "#64748b",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataset {
    pub label: String,
    /// Missing values are plotted as zero.
    pub values: Vec<f64>,
    pub color: String,
}

/// What a line chart of one sheet needs: x-axis labels and one dataset
/// per metric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartSeries {
    pub fn from_classified(table: &CleanTable, classification: &Classification) -> Self {
        let rows = table.row_count();
        let labels = match classification.label() {
            Some(col) => (0..rows)
                .map(|r| match table.value(col, r) {
                    CellValue::Null => String::new(),
                    v => v.to_string(),
                })
                .collect(),
            None => (1..=rows).map(|i| format!("Item {i}")).collect(),
        };

        let datasets = classification
            .metrics()
            .enumerate()
            .map(|(n, col)| ChartDataset {
                label: table.columns()[col].name.clone(),
                values: (0..rows)
                    .map(|r| table.value(col, r).as_f64().unwrap_or(0.0))
                    .collect(),
                color: PALETTE[n % PALETTE.len()].to_string(),
            })
            .collect();

        Self { labels, datasets }
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
