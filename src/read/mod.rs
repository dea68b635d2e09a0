//! File readers producing [`RawTable`]s.
//!
//! A workbook is either a single CSV (one sheet), a ZIP archive whose
//! `.csv` entries are the sheets, or a directory of CSVs.
//!
//! Fields that are not valid UTF-8 are decoded as Windows-1252, the
//! encoding Excel uses for CSV exports on pt-BR and most Western locales.
//! Inside a ZIP or a directory, a sheet that cannot be read is logged and
//! skipped; its siblings are still returned.

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::config::CleaningConfig;
use crate::sheet::utils::{parse_number, title_case};
use crate::sheet::{Cell, RawTable};

/// Read one CSV file as one sheet named after the file stem.
pub fn load_csv<P: AsRef<Path>>(path: P, cleaning: &CleaningConfig) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_sheet(file, &name, cleaning).with_context(|| format!("reading {}", path.display()))
}

/// Read every `.csv` entry of a ZIP archive, in archive order.
pub fn load_workbook_zip<P: AsRef<Path>>(path: P, cleaning: &CleaningConfig) -> Result<Vec<RawTable>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("reading ZIP archive {}", path.display()))?;

    let mut sheets = Vec::new();
    for idx in 0..archive.len() {
        let entry = archive.by_index(idx)?;
        let entry_name = entry.name().to_string();
        if entry.is_dir() || !entry_name.to_lowercase().ends_with(".csv") {
            continue;
        }
        let sheet_name = Path::new(&entry_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry_name.clone());

        debug!(entry = %entry_name, "reading sheet");
        match read_sheet(entry, &sheet_name, cleaning) {
            Ok(sheet) => sheets.push(sheet),
            Err(e) => warn!(
                workbook = %path.display(),
                entry = %entry_name,
                "skipping unreadable sheet: {:#}",
                e
            ),
        }
    }
    info!(path = %path.display(), sheets = sheets.len(), "loaded workbook");
    Ok(sheets)
}

/// Load a workbook from a `.zip`, a `.csv`, or a directory of CSVs
/// (sorted by file name).
pub fn load_source<P: AsRef<Path>>(path: P, cleaning: &CleaningConfig) -> Result<Vec<RawTable>> {
    let path = path.as_ref();
    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .with_context(|| format!("listing {}", path.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_extension(p, "csv"))
            .collect();
        files.sort();
        let sheets = files
            .iter()
            .filter_map(|p| match load_csv(p, cleaning) {
                Ok(sheet) => Some(sheet),
                Err(e) => {
                    warn!(file = %p.display(), "skipping unreadable sheet: {:#}", e);
                    None
                }
            })
            .collect();
        return Ok(sheets);
    }
    if has_extension(path, "zip") {
        load_workbook_zip(path, cleaning)
    } else if has_extension(path, "csv") {
        Ok(vec![load_csv(path, cleaning)?])
    } else {
        bail!("unsupported source {}: expected .zip, .csv or a directory", path.display())
    }
}

/// `loja_centro-sul.csv` → `Loja Centro Sul`.
pub fn display_name_from_path<P: AsRef<Path>>(path: P) -> String {
    let stem = path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    title_case(&stem)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn read_sheet<R: Read>(reader: R, name: &str, cleaning: &CleaningConfig) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, record) in rdr.byte_records().enumerate() {
        let record = record.with_context(|| format!("parsing record {}", idx + 1))?;
        rows.push(
            record
                .iter()
                .map(|f| to_cell(&decode_field(f), cleaning))
                .collect::<Vec<_>>(),
        );
    }

    let mut table = RawTable::new(name, rows);
    let width = table.width();
    for row in &mut table.rows {
        row.resize(width, Cell::Null);
    }
    debug!(sheet = %name, rows = table.rows.len(), width, "sheet read");
    Ok(table)
}

fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

fn to_cell(field: &str, cleaning: &CleaningConfig) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        Cell::Null
    } else if cleaning.is_error_sentinel(trimmed) {
        Cell::Error(trimmed.to_string())
    } else if let Some(v) = parse_number(trimmed) {
        Cell::Number(v)
    } else {
        Cell::Text(field.to_string())
    }
}
