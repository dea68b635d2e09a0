use tracing::trace;

use super::{Cell, RawTable};
use crate::error::Rejection;

/// Non-null cells plus text cells, so a row of descriptive labels beats a
/// row of numbers of the same width.
pub fn score_row(row: &[Cell]) -> usize {
    let non_null = row.iter().filter(|c| !c.is_null()).count();
    let text = row.iter().filter(|c| c.is_text()).count();
    non_null + text
}

/// Index of the best-scoring row among the first `scan_rows` rows.
/// Ties go to the earliest row.
pub fn locate_header(raw: &RawTable, scan_rows: usize) -> Result<usize, Rejection> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, row) in raw.rows.iter().take(scan_rows).enumerate() {
        let score = score_row(row);
        trace!(sheet = %raw.name, row = idx, score, "header candidate");
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx).ok_or(Rejection::NoHeaderFound)
}
