use serde::Serialize;
use thiserror::Error;

/// Why a single sheet was dropped from the working set.
///
/// None of these abort a batch: the aggregator records them as
/// [`Diagnostic`]s and carries on with the sibling sheets.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Every header candidate row scored zero.
    #[error("no header row found among the candidate rows")]
    NoHeaderFound,

    /// Cleaning removed every row or every column.
    #[error("nothing left after cleaning")]
    EmptyAfterCleaning,

    /// No numeric column survived coercion.
    #[error("no numeric column to chart")]
    NoNumericSignal,

    /// The reader handed over rows of different widths.
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// A rejection tied to the sheet it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub sheet: String,
    pub rejection: Rejection,
    /// `rejection` rendered for display, so renderers need not map
    /// reason tags to text themselves.
    pub message: String,
}

impl Diagnostic {
    pub fn new(sheet: impl Into<String>, rejection: Rejection) -> Self {
        let message = rejection.to_string();
        Self {
            sheet: sheet.into(),
            rejection,
            message,
        }
    }
}
