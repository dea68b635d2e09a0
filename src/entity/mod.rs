//! Tracked entities (restaurants, locations) and the views built from
//! their sheets.
//!
//! Sheets are cleaned once, at registration. Classification and metric
//! extraction run on every request and nothing derived from them is
//! cached here.

pub mod portfolio;

pub use portfolio::{detect_service, EntityRef, ManagerRollup, PortfolioSummary};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt};
use tracing::{debug, info, instrument, warn};

use crate::classify::{classify, Classification};
use crate::config::PipelineConfig;
use crate::error::{Diagnostic, Rejection};
use crate::metrics::{self, highlights, ChartSeries, Highlight, MetricSnapshot};
use crate::sheet::{process_sheet, CleanTable, RawTable};

/// Metadata key holding the entity's manager.
pub const MANAGER_KEY: &str = "manager";
/// Length of the display form of an [`EntityId`].
pub const SHORT_ID_LEN: usize = 8;

/// Opaque per-entity metadata, stored and passed through untouched.
pub type Metadata = BTreeMap<String, String>;

/// SHA-256 of the display name, as lowercase hex. Registering the same
/// name twice yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn from_name(name: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(name.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display prefix. Not unique; never use it as a key on its own.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_ID_LEN]
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which sheet feeds an entity's summary metrics.
///
/// `First` takes the first sheet that survived cleaning, in the order the
/// sheets were supplied, so reordering the input changes the summary.
/// `Named` picks a sheet by name and falls back to `First` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum CanonicalTable {
    #[default]
    First,
    Named(String),
}

impl From<Option<String>> for CanonicalTable {
    fn from(v: Option<String>) -> Self {
        v.map_or(CanonicalTable::First, CanonicalTable::Named)
    }
}

impl From<CanonicalTable> for Option<String> {
    fn from(v: CanonicalTable) -> Self {
        match v {
            CanonicalTable::First => None,
            CanonicalTable::Named(name) => Some(name),
        }
    }
}

/// The index-view row for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub short_id: String,
    pub name: String,
    /// Backing file, when the entity came from one.
    pub source: Option<String>,
    pub metadata: Metadata,
    /// Sheet names that passed the numeric filter, or the caller's override.
    pub platforms: Vec<String>,
}

impl EntityRecord {
    pub fn manager(&self) -> Option<&str> {
        self.metadata
            .get(MANAGER_KEY)
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
    }
}

/// Input for [`EntityAggregator::register`].
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub source: Option<String>,
    pub tables: Vec<RawTable>,
    pub metadata: Metadata,
    /// Skips platform detection when set.
    pub platforms: Option<Vec<String>>,
}

impl Registration {
    pub fn new(name: impl Into<String>, tables: Vec<RawTable>) -> Self {
        Self {
            name: name.into(),
            tables,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_manager(self, manager: impl Into<String>) -> Self {
        self.with_metadata(MANAGER_KEY, manager)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = Some(platforms);
        self
    }
}

/// One platform sheet ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformView {
    pub name: String,
    pub table: CleanTable,
    pub classification: Classification,
    pub chart: ChartSeries,
}

/// Everything the detail page of one entity shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDashboard {
    pub record: EntityRecord,
    pub platforms: Vec<PlatformView>,
    pub snapshot: Option<MetricSnapshot>,
    pub highlights: Vec<Highlight>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The full structure handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub index: Vec<EntityRecord>,
    pub entities: Vec<EntityDashboard>,
    pub portfolio: PortfolioSummary,
    pub managers: Vec<ManagerRollup>,
}

#[derive(Debug, Clone)]
struct Entity {
    record: EntityRecord,
    tables: Vec<CleanTable>,
    diagnostics: Vec<Diagnostic>,
}

impl Entity {
    fn canonical(&self, choice: &CanonicalTable) -> Option<&CleanTable> {
        match choice {
            CanonicalTable::First => self.tables.first(),
            CanonicalTable::Named(name) => self
                .tables
                .iter()
                .find(|t| t.name() == name)
                .or_else(|| self.tables.first()),
        }
    }
}

/// Owns the registered entities and their cleaned sheets.
#[derive(Debug, Clone, Default)]
pub struct EntityAggregator {
    config: PipelineConfig,
    entities: Vec<Entity>,
}

impl EntityAggregator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            entities: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_canonical_table(&mut self, choice: CanonicalTable) {
        self.config.canonical_table = choice;
    }

    /// Clean the entity's sheets and store it. Re-registering a name
    /// replaces the earlier entry under the same id.
    #[instrument(level = "info", skip_all, fields(entity = %registration.name))]
    pub fn register(&mut self, registration: Registration) -> EntityId {
        let entity = prepare(registration, &self.config);
        self.insert(entity)
    }

    /// Register several entities, cleaning them in parallel. Ids come
    /// back in input order.
    pub fn register_all(&mut self, registrations: Vec<Registration>) -> Vec<EntityId> {
        let config = &self.config;
        let prepared: Vec<Entity> = registrations
            .into_par_iter()
            .map(|r| prepare(r, config))
            .collect();
        prepared.into_iter().map(|e| self.insert(e)).collect()
    }

    pub fn remove(&mut self, key: &str) -> Option<EntityRecord> {
        let pos = self.position(key)?;
        let entity = self.entities.remove(pos);
        info!(entity = %entity.record.name, "entity removed");
        Some(entity.record)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Records in registration order.
    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> + '_ {
        self.entities.iter().map(|e| &e.record)
    }

    /// `key` is a full id or an unambiguous prefix of at least
    /// [`SHORT_ID_LEN`] characters.
    pub fn record(&self, key: &str) -> Option<&EntityRecord> {
        self.find(key).map(|e| &e.record)
    }

    pub fn tables(&self, key: &str) -> Option<&[CleanTable]> {
        self.find(key).map(|e| e.tables.as_slice())
    }

    pub fn diagnostics(&self, key: &str) -> Option<&[Diagnostic]> {
        self.find(key).map(|e| e.diagnostics.as_slice())
    }

    pub fn canonical_table(&self, key: &str) -> Option<&CleanTable> {
        self.find(key)?.canonical(&self.config.canonical_table)
    }

    /// Classify and extract the canonical sheet. `None` when the entity is
    /// unknown or has no usable sheet.
    pub fn summary_for(&self, key: &str) -> Option<MetricSnapshot> {
        summarize(self.find(key)?, &self.config)
    }

    pub fn dashboard(&self, key: &str) -> Option<EntityDashboard> {
        self.find(key).map(|e| build_dashboard(e, &self.config))
    }

    /// Per-entity dashboards plus the cross-entity views, built in parallel.
    #[instrument(level = "info", skip_all, fields(entities = self.entities.len()))]
    pub fn payload(&self) -> DashboardPayload {
        let entities: Vec<EntityDashboard> = self
            .entities
            .par_iter()
            .map(|e| build_dashboard(e, &self.config))
            .collect();

        let pairs: Vec<(&EntityRecord, Option<&MetricSnapshot>)> = entities
            .iter()
            .map(|d| (&d.record, d.snapshot.as_ref()))
            .collect();
        let portfolio = PortfolioSummary::from_snapshots(pairs.iter().map(|(_, s)| *s));
        let managers = ManagerRollup::group(pairs.iter().copied(), &self.config.unassigned_manager);

        DashboardPayload {
            index: self.records().cloned().collect(),
            entities,
            portfolio,
            managers,
        }
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.record.id.clone();
        match self.entities.iter_mut().find(|e| e.record.id == id) {
            Some(existing) => {
                debug!(entity = %entity.record.name, "replacing existing registration");
                *existing = entity;
            }
            None => self.entities.push(entity),
        }
        id
    }

    fn position(&self, key: &str) -> Option<usize> {
        if let Some(pos) = self.entities.iter().position(|e| e.record.id.as_str() == key) {
            return Some(pos);
        }
        if key.len() < SHORT_ID_LEN {
            return None;
        }
        let mut hits = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.record.id.as_str().starts_with(key));
        match (hits.next(), hits.next()) {
            (Some((pos, _)), None) => Some(pos),
            (Some(_), Some(_)) => {
                warn!(key, "ambiguous entity id prefix");
                None
            }
            _ => None,
        }
    }

    fn find(&self, key: &str) -> Option<&Entity> {
        self.position(key).map(|pos| &self.entities[pos])
    }
}

/// Run every sheet through the pipeline. A rejected sheet becomes a
/// diagnostic; the others carry on.
fn prepare(registration: Registration, config: &PipelineConfig) -> Entity {
    let Registration {
        name,
        source,
        tables: raw_tables,
        metadata,
        platforms,
    } = registration;
    let id = EntityId::from_name(&name);

    let mut tables = Vec::with_capacity(raw_tables.len());
    let mut diagnostics = Vec::new();
    for raw in &raw_tables {
        match process_sheet(raw, &config.cleaning) {
            Ok(table) => tables.push(table),
            Err(rejection) => {
                match rejection {
                    Rejection::NoNumericSignal => {
                        info!(entity = %name, sheet = %raw.name, "sheet skipped: {}", rejection)
                    }
                    _ => warn!(entity = %name, sheet = %raw.name, "sheet rejected: {}", rejection),
                }
                diagnostics.push(Diagnostic::new(raw.name.clone(), rejection));
            }
        }
    }

    let platforms = platforms.unwrap_or_else(|| {
        let mut names: Vec<String> = tables.iter().map(|t| t.name().to_string()).collect();
        if let Some(max) = config.max_platforms {
            names.truncate(max);
        }
        names
    });
    info!(
        entity = %name,
        sheets = raw_tables.len(),
        usable = tables.len(),
        "entity prepared"
    );

    Entity {
        record: EntityRecord {
            short_id: id.short().to_string(),
            id,
            name,
            source,
            metadata,
            platforms,
        },
        tables,
        diagnostics,
    }
}

fn summarize(entity: &Entity, config: &PipelineConfig) -> Option<MetricSnapshot> {
    let table = entity.canonical(&config.canonical_table)?;
    let classification = classify(table, &config.vocabulary);
    Some(metrics::extract(table, &classification, &config.vocabulary))
}

fn build_dashboard(entity: &Entity, config: &PipelineConfig) -> EntityDashboard {
    let platforms = entity
        .tables
        .iter()
        .map(|table| {
            let classification = classify(table, &config.vocabulary);
            PlatformView {
                name: table.name().to_string(),
                chart: ChartSeries::from_classified(table, &classification),
                table: table.clone(),
                classification,
            }
        })
        .collect();

    let canonical = entity.canonical(&config.canonical_table);
    let highlights = canonical
        .map(|t| {
            let c = classify(t, &config.vocabulary);
            highlights(t, &c, metrics::highlights::DEFAULT_HIGHLIGHTS)
        })
        .unwrap_or_default();

    EntityDashboard {
        record: entity.record.clone(),
        platforms,
        snapshot: summarize(entity, config),
        highlights,
        diagnostics: entity.diagnostics.clone(),
    }
}
