//! Sampling effort and detection summaries per site
//!
//! Effort arrives as one row per camera-day and detections as one row per tagged
//! event. Both are collapsed to sets of calendar days so that a day counts once
//! no matter how many events or duplicate rows it has.

use crate::io::table::{DetectionRow, EffortRow};
use std::collections::{BTreeMap, BTreeSet};

/// Active recording days per site
#[derive(Debug, Clone, Default)]
pub struct EffortSummary {
    active_days: BTreeMap<String, BTreeSet<String>>,
}

impl EffortSummary {
    /// Collapse daily effort rows; inactive days are ignored
    pub fn from_daily(rows: &[EffortRow]) -> Self {
        let mut active_days: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in rows {
            let days = active_days.entry(row.site_id.clone()).or_default();
            if row.active {
                days.insert(row.date.clone());
            }
        }
        Self { active_days }
    }

    /// Number of distinct active days at `site_id`
    pub fn days_sampled(&self, site_id: &str) -> u32 {
        self.active_days
            .get(site_id)
            .map_or(0, |days| days.len() as u32)
    }

    /// Whether the camera at `site_id` was recording on `date`
    pub fn is_active(&self, site_id: &str, date: &str) -> bool {
        self.active_days
            .get(site_id)
            .is_some_and(|days| days.contains(date))
    }

    /// Sites mentioned in the effort table, active or not
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.active_days.keys().map(String::as_str)
    }
}

/// Detection days and image counts per site and species
#[derive(Debug, Clone, Default)]
pub struct DetectionSummaryTable {
    // (site, species) -> date -> images
    events: BTreeMap<(String, String), BTreeMap<String, u64>>,
}

impl DetectionSummaryTable {
    /// Collapse tagged events into per-day image counts
    pub fn from_events(rows: &[DetectionRow]) -> Self {
        let mut events: BTreeMap<(String, String), BTreeMap<String, u64>> = BTreeMap::new();
        for row in rows {
            *events
                .entry((row.site_id.clone(), row.species.clone()))
                .or_default()
                .entry(row.date.clone())
                .or_insert(0) += row.images;
        }
        Self { events }
    }

    /// Days and images recorded for a species at a site
    pub fn days(&self, site_id: &str, species: &str) -> Option<&BTreeMap<String, u64>> {
        self.events.get(&(site_id.to_string(), species.to_string()))
    }

    /// Sites mentioned in the detection table
    pub fn sites(&self) -> BTreeSet<&str> {
        self.events.keys().map(|(site, _)| site.as_str()).collect()
    }

    /// Species tags present in the detection table
    pub fn species(&self) -> BTreeSet<&str> {
        self.events.keys().map(|(_, sp)| sp.as_str()).collect()
    }

    /// Days on which any of `species` was detected at `site_id`
    pub fn days_with_any<'a>(
        &'a self,
        site_id: &str,
        species: &[String],
    ) -> BTreeSet<&'a str> {
        species
            .iter()
            .filter_map(|sp| self.days(site_id, sp))
            .flat_map(|days| days.keys().map(String::as_str))
            .collect()
    }
}

/// Proportion of sampled days on which any livestock species was detected
///
/// Detection days outside the site's active days don't count. `None` for sites
/// with no sampled days.
pub fn livestock_pressure(
    effort: &EffortSummary,
    detections: &DetectionSummaryTable,
    site_id: &str,
    livestock_species: &[String],
) -> Option<f64> {
    let sampled = effort.days_sampled(site_id);
    if sampled == 0 {
        return None;
    }
    let days = detections
        .days_with_any(site_id, livestock_species)
        .into_iter()
        .filter(|date| effort.is_active(site_id, date))
        .count();
    Some(days as f64 / f64::from(sampled))
}
