use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::classify::Vocabulary;
use crate::entity::CanonicalTable;

/// Rows examined when looking for the header.
pub const HEADER_SCAN_ROWS: usize = 5;
/// Share of non-null cells that must parse as numbers before a column turns numeric.
pub const NUMERIC_THRESHOLD: f64 = 0.5;
/// Name prefix the reader gives to columns without a header cell.
pub const UNLABELED_PREFIX: &str = "Unnamed";

/// Everything the pipeline can be tuned with. Every field has a default,
/// so an empty YAML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cleaning: CleaningConfig,
    pub vocabulary: Vocabulary,
    /// Cap on auto-detected platform names per entity. `None` keeps all.
    pub max_platforms: Option<usize>,
    /// Which of an entity's sheets feeds its summary metrics.
    pub canonical_table: CanonicalTable,
    /// Bucket for entities registered without a manager.
    pub unassigned_manager: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cleaning: CleaningConfig::default(),
            vocabulary: Vocabulary::default(),
            max_platforms: None,
            canonical_table: CanonicalTable::First,
            unassigned_manager: "Sem Gestor".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing pipeline config")
    }

    /// Read a YAML config file; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// Knobs for header location and table cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub header_scan_rows: usize,
    pub numeric_threshold: f64,
    pub unlabeled_prefix: String,
    /// Spreadsheet error tokens replaced by null before numeric coercion.
    pub error_sentinels: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: HEADER_SCAN_ROWS,
            numeric_threshold: NUMERIC_THRESHOLD,
            unlabeled_prefix: UNLABELED_PREFIX.to_string(),
            error_sentinels: ["#DIV/0!", "#REF!", "#NAME?", "#VALUE!", "#N/A", "#NULL!", "#NUM!"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CleaningConfig {
    pub fn is_error_sentinel(&self, text: &str) -> bool {
        let t = text.trim();
        self.error_sentinels.iter().any(|s| s == t)
    }
}
