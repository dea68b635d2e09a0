pub mod classify;
pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod metrics;
pub mod read;
pub mod sheet;

pub use classify::{classify, Classification, ColumnRole, Vocabulary};
pub use config::{CleaningConfig, PipelineConfig};
pub use entity::{
    CanonicalTable, DashboardPayload, EntityAggregator, EntityDashboard, EntityId, EntityRecord,
    Registration,
};
pub use error::{Diagnostic, Rejection};
pub use metrics::{extract, MetricSnapshot, Trend};
pub use sheet::{process_sheet, Cell, CellValue, CleanTable, RawTable};
