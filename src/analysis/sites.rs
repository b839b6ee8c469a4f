//! Per-site records built up by successive left joins
//!
//! The table starts from the site metadata and every later table is joined onto
//! it by `site_id`. Sites absent from a joined table are zero-filled, meaning
//! "sampled nothing" or "detected nothing", never "unknown". Rows of a joined
//! table naming a site the metadata doesn't know are rejected.

use crate::analysis::effort::{DetectionSummaryTable, EffortSummary, livestock_pressure};
use crate::io::error::{CamtrapError, Result, invalid_data};
use crate::io::table::SiteMetadataRow;
use crate::spatial::boundary::BoundarySet;
use crate::spatial::crs::{Crs, GeoPoint, ProjectedPoint};
use polars::prelude::{Column, DataFrame};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Detection totals for one species at one site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    /// Distinct sampled days with at least one detection
    pub days_detected: u32,
    /// Images across those days
    pub images: u64,
}

/// Everything known about one camera site
#[derive(Debug, Clone)]
pub struct SiteRecord {
    /// Site identifier
    pub site_id: String,
    /// Geographic location
    pub location: GeoPoint,
    /// Location in the study reference system
    pub position: ProjectedPoint,
    /// Conservancy grouping
    pub conservancy: Option<String>,
    /// Distinct active recording days
    pub days_sampled: u32,
    /// Detection totals keyed by species
    pub detections: BTreeMap<String, DetectionSummary>,
    /// Extracted and derived covariates keyed by name
    pub covariates: BTreeMap<String, f64>,
}

impl SiteRecord {
    /// Detection totals for `species`, zero when never detected
    pub fn detection(&self, species: &str) -> DetectionSummary {
        self.detections.get(species).copied().unwrap_or_default()
    }

    /// Days detected over days sampled; `None` for unsampled sites
    pub fn occupancy_proportion(&self, species: &str) -> Option<f64> {
        (self.days_sampled > 0).then(|| {
            f64::from(self.detection(species).days_detected) / f64::from(self.days_sampled)
        })
    }
}

/// Outcome of one left join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Sites that had a matching row
    pub matched: usize,
    /// Sites filled with zero
    pub zero_filled: usize,
    /// Detection days dropped because the camera wasn't active
    pub dropped_days: usize,
}

/// All sites of a study keyed by identifier
#[derive(Debug, Clone)]
pub struct SiteTable {
    crs: Crs,
    sites: BTreeMap<String, SiteRecord>,
}

impl SiteTable {
    /// Build site points from metadata and project them into `crs`
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate site identifiers or out-of-range coordinates
    pub fn from_metadata(rows: &[SiteMetadataRow], crs: Crs) -> Result<Self> {
        let mut sites = BTreeMap::new();
        for row in rows {
            if !(-90.0..=90.0).contains(&row.latitude) || !(-180.0..=180.0).contains(&row.longitude) {
                return Err(invalid_data(&format!(
                    "site '{}' has invalid coordinates ({}, {})",
                    row.site_id, row.latitude, row.longitude
                )));
            }
            let location = GeoPoint {
                lon: row.longitude,
                lat: row.latitude,
            };
            let record = SiteRecord {
                site_id: row.site_id.clone(),
                location,
                position: crs.project(location),
                conservancy: row.conservancy.clone(),
                days_sampled: 0,
                detections: BTreeMap::new(),
                covariates: BTreeMap::new(),
            };
            if sites.insert(row.site_id.clone(), record).is_some() {
                return Err(invalid_data(&format!("duplicate site '{}'", row.site_id)));
            }
        }
        Ok(Self { crs, sites })
    }

    /// Reference system of every site position
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the table has no sites
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Sites in identifier order
    pub fn iter(&self) -> impl Iterator<Item = &SiteRecord> {
        self.sites.values()
    }

    /// Look up a site
    pub fn get(&self, site_id: &str) -> Option<&SiteRecord> {
        self.sites.get(site_id)
    }

    /// Site positions in identifier order
    pub fn positions(&self) -> Vec<ProjectedPoint> {
        self.iter().map(|s| s.position).collect()
    }

    fn check_known<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for key in keys {
            if !self.sites.contains_key(key) {
                return Err(CamtrapError::UnknownSite {
                    site_id: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Left-join days sampled, zero-filling sites without effort rows
    ///
    /// # Errors
    ///
    /// Returns `UnknownSite` if the effort table names a site missing from the table
    pub fn join_effort(&mut self, effort: &EffortSummary) -> Result<JoinReport> {
        self.check_known(effort.sites())?;
        let mut report = JoinReport::default();
        for record in self.sites.values_mut() {
            record.days_sampled = effort.days_sampled(&record.site_id);
            if record.days_sampled > 0 {
                report.matched += 1;
            } else {
                report.zero_filled += 1;
            }
        }
        debug!(
            matched = report.matched,
            zero_filled = report.zero_filled,
            "joined sampling effort"
        );
        Ok(report)
    }

    /// Left-join detection totals for each species, zero-filling missing pairs
    ///
    /// Detection days on which the camera wasn't active are dropped so that days
    /// detected never exceed days sampled. Must run after [`Self::join_effort`].
    ///
    /// # Errors
    ///
    /// Returns `UnknownSite` if the detection table names a site missing from the table
    pub fn join_detections(
        &mut self,
        detections: &DetectionSummaryTable,
        effort: &EffortSummary,
        species: &[String],
    ) -> Result<JoinReport> {
        self.check_known(detections.sites())?;
        let mut report = JoinReport::default();

        for record in self.sites.values_mut() {
            for sp in species {
                let summary = detections.days(&record.site_id, sp).map_or_else(
                    DetectionSummary::default,
                    |days| {
                        let mut summary = DetectionSummary::default();
                        for (date, images) in days {
                            if effort.is_active(&record.site_id, date) {
                                summary.days_detected += 1;
                                summary.images += images;
                            } else {
                                report.dropped_days += 1;
                            }
                        }
                        summary
                    },
                );
                if summary.days_detected > 0 {
                    report.matched += 1;
                } else {
                    report.zero_filled += 1;
                }
                record.detections.insert(sp.clone(), summary);
            }
        }

        if report.dropped_days > 0 {
            warn!(
                dropped = report.dropped_days,
                "detection days outside active effort were dropped"
            );
        }
        debug!(
            matched = report.matched,
            zero_filled = report.zero_filled,
            "joined detections"
        );
        Ok(report)
    }

    /// Add the livestock-pressure covariate for every sampled site
    pub fn derive_livestock_pressure(
        &mut self,
        effort: &EffortSummary,
        detections: &DetectionSummaryTable,
        livestock_species: &[String],
        name: &str,
    ) {
        for record in self.sites.values_mut() {
            if let Some(p) = livestock_pressure(effort, detections, &record.site_id, livestock_species)
            {
                record.covariates.insert(name.to_string(), p);
            }
        }
    }

    /// Fill missing conservancies from the enclosing boundary polygon
    ///
    /// Returns the number of sites assigned.
    ///
    /// # Errors
    ///
    /// Returns `CrsMismatch` if the boundaries aren't in the table's reference system
    pub fn assign_conservancies(&mut self, boundaries: &BoundarySet) -> Result<usize> {
        self.crs.ensure_same(&boundaries.crs)?;
        let mut assigned = 0;
        for record in self.sites.values_mut() {
            if record.conservancy.is_none() {
                if let Some(name) = boundaries.containing(record.position) {
                    record.conservancy = Some(name.to_string());
                    assigned += 1;
                }
            }
        }
        Ok(assigned)
    }

    /// Set one covariate of one site
    ///
    /// # Errors
    ///
    /// Returns `UnknownSite` if the site doesn't exist
    pub fn set_covariate(&mut self, site_id: &str, name: &str, value: f64) -> Result<()> {
        let record = self
            .sites
            .get_mut(site_id)
            .ok_or_else(|| CamtrapError::UnknownSite {
                site_id: site_id.to_string(),
            })?;
        record.covariates.insert(name.to_string(), value);
        Ok(())
    }

    /// Names of every covariate present at any site
    pub fn covariate_names(&self) -> BTreeSet<String> {
        self.iter()
            .flat_map(|s| s.covariates.keys().cloned())
            .collect()
    }

    /// Check that every detection proportion is a valid probability
    ///
    /// # Errors
    ///
    /// Returns an error naming the first site where days detected exceed days sampled
    pub fn validate(&self) -> Result<()> {
        for record in self.iter() {
            for (species, summary) in &record.detections {
                if summary.days_detected > record.days_sampled {
                    return Err(invalid_data(&format!(
                        "site '{}': {} detected on {} days but sampled {}",
                        record.site_id, species, summary.days_detected, record.days_sampled
                    )));
                }
            }
        }
        Ok(())
    }

    /// Flat table of every site with detections and covariates
    ///
    /// Covariates a site lacks are written as missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame can't be assembled
    pub fn to_frame(&self, species: &[String]) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new("site_id".into(), self.iter().map(|s| s.site_id.clone()).collect::<Vec<_>>()),
            Column::new("longitude".into(), self.iter().map(|s| s.location.lon).collect::<Vec<_>>()),
            Column::new("latitude".into(), self.iter().map(|s| s.location.lat).collect::<Vec<_>>()),
            Column::new("x".into(), self.iter().map(|s| s.position.x).collect::<Vec<_>>()),
            Column::new("y".into(), self.iter().map(|s| s.position.y).collect::<Vec<_>>()),
            Column::new(
                "conservancy".into(),
                self.iter().map(|s| s.conservancy.clone()).collect::<Vec<_>>(),
            ),
            Column::new("days_sampled".into(), self.iter().map(|s| s.days_sampled).collect::<Vec<_>>()),
        ];

        for sp in species {
            columns.push(Column::new(
                format!("{sp}_days").into(),
                self.iter().map(|s| s.detection(sp).days_detected).collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                format!("{sp}_images").into(),
                self.iter().map(|s| s.detection(sp).images).collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                format!("{sp}_proportion").into(),
                self.iter().map(|s| s.occupancy_proportion(sp)).collect::<Vec<_>>(),
            ));
        }

        for name in self.covariate_names() {
            let values: Vec<Option<f64>> = self
                .iter()
                .map(|s| s.covariates.get(&name).copied())
                .collect();
            columns.push(Column::new(name.into(), values));
        }

        Ok(DataFrame::new(columns)?)
    }
}
