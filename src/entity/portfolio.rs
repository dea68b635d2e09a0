use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{EntityId, EntityRecord};
use crate::classify::vocabulary::{GROSS_KEY, SALES_KEY};
use crate::metrics::{MetricSnapshot, Trend};

/// Totals across every registered entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PortfolioSummary {
    pub total_entities: usize,
    /// Entities whose latest sales figure is above zero.
    pub entities_with_history: usize,
    pub total_gross: f64,
    pub previous_gross: f64,
    pub gross_trend: Trend,
    pub positive_count: usize,
    pub negative_count: usize,
}

impl PortfolioSummary {
    /// One item per entity; `None` for entities without a usable sheet.
    ///
    /// An entity with a current gross value but no previous one counts as
    /// flat, so it does not skew the portfolio trend.
    pub fn from_snapshots<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a MetricSnapshot>>,
    {
        let mut summary = Self::default();
        let mut saw_gross = false;

        for snapshot in snapshots {
            summary.total_entities += 1;
            let Some(s) = snapshot else { continue };

            if s.current(SALES_KEY).is_some_and(|v| v > 0.0) {
                summary.entities_with_history += 1;
            }
            if let Some(gross) = s.current(GROSS_KEY) {
                saw_gross = true;
                summary.total_gross += gross;
                summary.previous_gross += s.previous(GROSS_KEY).unwrap_or(gross);
            }
            match s.trend(SALES_KEY).value() {
                Some(t) if t > 0.0 => summary.positive_count += 1,
                Some(t) if t < 0.0 => summary.negative_count += 1,
                _ => {}
            }
        }

        if saw_gross {
            summary.gross_trend =
                Trend::between(Some(summary.previous_gross), Some(summary.total_gross));
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub short_id: String,
    pub name: String,
}

/// Entities grouped under one manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerRollup {
    pub manager: String,
    pub entities: Vec<EntityRef>,
    pub total_gross: f64,
    pub total_sales: f64,
    pub positive_count: usize,
    pub negative_count: usize,
    /// Delivery services seen across the group's platforms, sorted.
    pub services: Vec<String>,
}

impl ManagerRollup {
    /// Group by the `manager` metadata value. Entities without one land in
    /// `unassigned`. Output is sorted by total gross, highest first, then
    /// by manager name.
    pub fn group<'a, I>(items: I, unassigned: &str) -> Vec<Self>
    where
        I: IntoIterator<Item = (&'a EntityRecord, Option<&'a MetricSnapshot>)>,
    {
        let mut groups: BTreeMap<String, (ManagerRollup, BTreeSet<&'static str>)> =
            BTreeMap::new();

        for (record, snapshot) in items {
            let manager = record.manager().unwrap_or(unassigned).to_string();
            let (rollup, services) = groups.entry(manager.clone()).or_insert_with(|| {
                (
                    ManagerRollup {
                        manager,
                        entities: Vec::new(),
                        total_gross: 0.0,
                        total_sales: 0.0,
                        positive_count: 0,
                        negative_count: 0,
                        services: Vec::new(),
                    },
                    BTreeSet::new(),
                )
            });

            rollup.entities.push(EntityRef {
                id: record.id.clone(),
                short_id: record.short_id.clone(),
                name: record.name.clone(),
            });
            services.extend(record.platforms.iter().filter_map(|p| detect_service(p)));

            if let Some(s) = snapshot {
                rollup.total_gross += s.current(GROSS_KEY).unwrap_or(0.0);
                rollup.total_sales += s.current(SALES_KEY).unwrap_or(0.0);
                match s.trend(SALES_KEY).value() {
                    Some(t) if t > 0.0 => rollup.positive_count += 1,
                    Some(t) if t < 0.0 => rollup.negative_count += 1,
                    _ => {}
                }
            }
        }

        let mut rollups: Vec<ManagerRollup> = groups
            .into_values()
            .map(|(mut rollup, services)| {
                rollup.services = services.into_iter().map(String::from).collect();
                rollup
            })
            .collect();
        rollups.sort_by(|a, b| {
            b.total_gross
                .total_cmp(&a.total_gross)
                .then_with(|| a.manager.cmp(&b.manager))
        });
        rollups
    }
}

/// Map a platform (sheet) name to the delivery service it belongs to.
pub fn detect_service(platform: &str) -> Option<&'static str> {
    let p = platform.to_lowercase();
    if p.contains("ifood") {
        Some("ifood")
    } else if p.contains("99") {
        Some("99food")
    } else if p.contains("keeta") {
        Some("keeta")
    } else {
        None
    }
}
