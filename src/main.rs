use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use sheetpulse::{
    config::{CleaningConfig, PipelineConfig},
    entity::{EntityAggregator, Metadata, Registration},
    export, read,
};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Clean spreadsheet exports and build per-entity dashboard data"
)]
struct Args {
    /// YAML file listing the entities and their workbooks
    #[arg(short, long)]
    manifest: PathBuf,
    /// Pipeline config (YAML); defaults apply when absent
    #[arg(short, long, default_value = "sheetpulse.yaml")]
    config: PathBuf,
    /// Where to write the JSON payload; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write every cleaned sheet as parquet into this directory
    #[arg(long)]
    parquet_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    entities: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: Option<String>,
    /// `.zip`, `.csv` or a directory of CSVs, relative to the manifest.
    source: PathBuf,
    manager: Option<String>,
    platforms: Option<Vec<String>>,
    #[serde(default)]
    metadata: Metadata,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // ─── 2) config + manifest ────────────────────────────────────────
    let config = PipelineConfig::load(&args.config)?;
    let manifest_text = fs::read_to_string(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;
    let manifest: Manifest = serde_yaml::from_str(&manifest_text)
        .with_context(|| format!("parsing manifest {}", args.manifest.display()))?;
    let base = args.manifest.parent().unwrap_or_else(|| Path::new("."));
    info!("{} entities in manifest", manifest.entities.len());

    // ─── 3) read workbooks ───────────────────────────────────────────
    let registrations = read_registrations(manifest, base, &config.cleaning);

    // ─── 4) clean + aggregate ────────────────────────────────────────
    let mut aggregator = EntityAggregator::new(config);
    aggregator.register_all(registrations);
    let payload = aggregator.payload();

    for dash in &payload.entities {
        for d in &dash.diagnostics {
            warn!(entity = %dash.record.name, sheet = %d.sheet, "{}", d.message);
        }
    }

    // ─── 5) optional parquet export ──────────────────────────────────
    if let Some(dir) = &args.parquet_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        for dash in &payload.entities {
            for view in &dash.platforms {
                let out = dir.join(format!(
                    "{}--{}.parquet",
                    dash.record.short_id,
                    file_safe(&view.name)
                ));
                export::write_parquet(&view.table, &out)?;
            }
        }
        info!("parquet written to {}", dir.display());
    }

    // ─── 6) emit payload ─────────────────────────────────────────────
    let json = serde_json::to_string_pretty(&payload).context("serializing payload")?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("payload written to {}", path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            out.write_all(json.as_bytes())?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// One registration per manifest entry whose source could be read. An
/// entry that fails to load is logged and left out; the rest carry on.
fn read_registrations(manifest: Manifest, base: &Path, cleaning: &CleaningConfig) -> Vec<Registration> {
    let mut registrations = Vec::with_capacity(manifest.entities.len());
    for entry in manifest.entities {
        let source = base.join(&entry.source);
        let name = entry
            .name
            .unwrap_or_else(|| read::display_name_from_path(&source));
        let tables = match read::load_source(&source, cleaning) {
            Ok(tables) => tables,
            Err(e) => {
                warn!(entity = %name, source = %source.display(), "skipping entity: {:#}", e);
                continue;
            }
        };

        let mut reg = Registration::new(name, tables).with_source(source.display().to_string());
        reg.metadata.extend(entry.metadata);
        if let Some(manager) = entry.manager {
            reg = reg.with_manager(manager);
        }
        if let Some(platforms) = entry.platforms {
            reg = reg.with_platforms(platforms);
        }
        registrations.push(reg);
    }
    registrations
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_source_skips_only_that_entity() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("centro.csv"), "Mês,Vendas\nJan,10\nFev,12\n")?;
        let manifest: Manifest = serde_yaml::from_str(
            "entities:\n  - source: sumiu.zip\n  - source: centro.csv\n    manager: Ana\n  - name: Loja Norte\n    source: nada.csv\n",
        )?;

        let regs = read_registrations(manifest, dir.path(), &CleaningConfig::default());
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].name, "Centro");
        assert_eq!(regs[0].tables.len(), 1);

        let mut aggregator = EntityAggregator::new(PipelineConfig::default());
        aggregator.register_all(regs);
        let payload = aggregator.payload();
        assert_eq!(payload.index.len(), 1);
        assert_eq!(payload.managers[0].manager, "Ana");
        Ok(())
    }
}
