//! Parquet export of cleaned sheets.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::sheet::{CleanTable, ColumnValues};

/// Numeric columns become nullable `Float64`, text columns nullable `Utf8`.
pub fn to_record_batch(table: &CleanTable) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.width());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.width());

    for col in table.columns() {
        match &col.values {
            ColumnValues::Numeric(v) => {
                fields.push(Field::new(&col.name, DataType::Float64, true));
                arrays.push(Arc::new(Float64Array::from(v.clone())));
            }
            ColumnValues::Text(v) => {
                fields.push(Field::new(&col.name, DataType::Utf8, true));
                arrays.push(Arc::new(StringArray::from(
                    v.iter().map(|s| s.as_deref()).collect::<Vec<_>>(),
                )));
            }
        }
    }

    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), arrays)
        .with_context(|| format!("building record batch for {}", table.name()))
}

/// Write `table` to `path`, going through a `.tmp` sibling so readers
/// never see a partial file.
pub fn write_parquet<P: AsRef<Path>>(table: &CleanTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let batch = to_record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .set_dictionary_enabled(true)
        .build();

    let temp_path = path.with_extension("tmp");
    let file = File::create(&temp_path)
        .with_context(|| format!("creating {}", temp_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("opening parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;

    fs::rename(&temp_path, path).with_context(|| {
        format!("renaming {} to {}", temp_path.display(), path.display())
    })?;
    debug!(sheet = %table.name(), rows = batch.num_rows(), out = %path.display(), "wrote parquet");
    Ok(())
}
