//! Semantic roles for the columns of a cleaned sheet.

pub mod vocabulary;

pub use vocabulary::{normalize, MetricKeySpec, Vocabulary};

use serde::Serialize;
use tracing::debug;

use crate::sheet::CleanTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    /// The x-axis / period key. At most one per table.
    Label,
    /// A numeric series.
    Metric,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedColumn {
    pub name: String,
    pub role: ColumnRole,
}

/// One role per column, in table column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub columns: Vec<ClassifiedColumn>,
}

impl Classification {
    pub fn role(&self, idx: usize) -> Option<ColumnRole> {
        self.columns.get(idx).map(|c| c.role)
    }

    /// Index of the label column.
    pub fn label(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.role == ColumnRole::Label)
    }

    /// Indices of metric columns, left to right.
    pub fn metrics(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.role == ColumnRole::Metric)
            .map(|(i, _)| i)
    }
}

/// Tag every column of `table`.
///
/// Names decide first: the leftmost label-vocabulary column is the label,
/// numeric metric-vocabulary columns are metrics. When names say nothing,
/// the first text column becomes the label and every numeric column a
/// metric, so any table with a number in it stays chartable.
pub fn classify(table: &CleanTable, vocabulary: &Vocabulary) -> Classification {
    let columns = table.columns();
    let mut roles = vec![ColumnRole::Ignored; columns.len()];

    let label = columns.iter().position(|c| vocabulary.is_label(&c.name));
    if let Some(idx) = label {
        roles[idx] = ColumnRole::Label;
    }

    let mut metric_matched = false;
    for (idx, col) in columns.iter().enumerate() {
        if Some(idx) == label {
            continue;
        }
        if col.values.is_numeric() && vocabulary.is_metric(&col.name) {
            roles[idx] = ColumnRole::Metric;
            metric_matched = true;
        }
    }

    if label.is_none() {
        if let Some(idx) = columns.iter().position(|c| !c.values.is_numeric()) {
            debug!(sheet = %table.name(), column = %columns[idx].name, "label by fallback");
            roles[idx] = ColumnRole::Label;
        }
    }

    if !metric_matched {
        for (idx, col) in columns.iter().enumerate() {
            if col.values.is_numeric() && roles[idx] == ColumnRole::Ignored {
                roles[idx] = ColumnRole::Metric;
            }
        }
    }

    Classification {
        columns: columns
            .iter()
            .zip(roles)
            .map(|(c, role)| ClassifiedColumn {
                name: c.name.clone(),
                role,
            })
            .collect(),
    }
}
