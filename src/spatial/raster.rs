//! Raster layers: georeferenced cell grids and per-cell algebra
//!
//! Missing cells (nodata in the source file) are stored as `NaN` so that every
//! derived layer propagates them without extra bookkeeping.

use crate::io::error::{Result, computation_error, invalid_data};
use crate::spatial::crs::{Crs, ProjectedPoint};
use ndarray::Array2;
use std::collections::BTreeSet;

// Authalic sphere radius used for geographic cell areas
const EARTH_RADIUS_KM: f64 = 6_371.007_2;

/// Affine georeference of a north-up raster
///
/// Row 0 is the northern edge; `pixel_height` is stored positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell width in native units
    pub pixel_width: f64,
    /// Cell height in native units
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a transform from the upper-left corner and cell size
    pub const fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Centre of cell (`row`, `col`)
    pub fn cell_center(&self, row: usize, col: usize) -> ProjectedPoint {
        ProjectedPoint {
            x: self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            y: self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        }
    }

    /// Fractional (row, col) position of a coordinate
    pub fn fractional_cell(&self, point: ProjectedPoint) -> (f64, f64) {
        (
            (self.origin_y - point.y) / self.pixel_height,
            (point.x - self.origin_x) / self.pixel_width,
        )
    }
}

/// How cell values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Measured quantity (density, temperature)
    Continuous,
    /// Integer class codes (land cover)
    Categorical,
}

/// Georeferenced grid of cell values
#[derive(Debug, Clone)]
pub struct Raster {
    /// Cell values indexed by (row, col); `NaN` marks missing cells
    pub data: Array2<f64>,
    /// Georeference
    pub transform: GeoTransform,
    /// Reference system of the georeference
    pub crs: Crs,
    /// Interpretation of the values
    pub kind: LayerKind,
}

impl Raster {
    /// Create a raster from its parts
    pub const fn new(data: Array2<f64>, transform: GeoTransform, crs: Crs, kind: LayerKind) -> Self {
        Self {
            data,
            transform,
            crs,
            kind,
        }
    }

    /// Create a raster from row-major values
    ///
    /// # Errors
    ///
    /// Returns an error if `values.len() != rows * cols`
    pub fn from_vec(
        values: Vec<f64>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        crs: Crs,
        kind: LayerKind,
    ) -> Result<Self> {
        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| computation_error("raster shape", &e))?;
        Ok(Self::new(data, transform, crs, kind))
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Valid value of a cell
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied().filter(|v| !v.is_nan())
    }

    /// Centre of cell (`row`, `col`)
    pub fn cell_center(&self, row: usize, col: usize) -> ProjectedPoint {
        self.transform.cell_center(row, col)
    }

    /// Cell enclosing `point`, if inside the grid
    pub fn cell_at(&self, point: ProjectedPoint) -> Option<(usize, usize)> {
        let (row, col) = self.transform.fractional_cell(point);
        if !(row.is_finite() && col.is_finite()) || row < 0.0 || col < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows() && col < self.cols()).then_some((row, col))
    }

    /// Valid value of the cell enclosing `point`
    pub fn value_at(&self, point: ProjectedPoint) -> Option<f64> {
        self.cell_at(point).and_then(|(r, c)| self.get(r, c))
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)`
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let t = &self.transform;
        (
            t.origin_x,
            t.origin_y - self.rows() as f64 * t.pixel_height,
            t.origin_x + self.cols() as f64 * t.pixel_width,
            t.origin_y,
        )
    }

    /// Area of a cell in row `row` in square kilometres
    ///
    /// Constant for projected rasters; shrinks towards the poles for geographic ones.
    pub fn cell_area_km2(&self, row: usize) -> f64 {
        let t = &self.transform;
        if self.crs.is_projected() {
            return t.pixel_width * t.pixel_height / 1.0e6;
        }
        let north = (t.origin_y - row as f64 * t.pixel_height).to_radians();
        let south = (t.origin_y - (row as f64 + 1.0) * t.pixel_height).to_radians();
        EARTH_RADIUS_KM
            * EARTH_RADIUS_KM
            * t.pixel_width.to_radians()
            * (north.sin() - south.sin()).abs()
    }

    /// Whether `other` shares this raster's grid and reference system
    pub fn same_grid(&self, other: &Self) -> bool {
        self.data.dim() == other.data.dim()
            && self.transform == other.transform
            && self.crs == other.crs
    }

    /// Apply `f` to every valid cell, keeping missing cells missing
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            data: self.data.mapv(|v| if v.is_nan() { v } else { f(v) }),
            transform: self.transform,
            crs: self.crs,
            kind: LayerKind::Continuous,
        }
    }

    /// Combine two aligned rasters cell by cell
    ///
    /// # Errors
    ///
    /// Returns an error if the grids or reference systems differ
    pub fn zip_with<F>(&self, other: &Self, f: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.crs.ensure_same(&other.crs)?;
        if !self.same_grid(other) {
            return Err(invalid_data(&format!(
                "rasters are not aligned: {:?} vs {:?}",
                self.data.dim(),
                other.data.dim()
            )));
        }
        let mut data = self.data.clone();
        ndarray::Zip::from(&mut data)
            .and(&other.data)
            .for_each(|a, &b| {
                *a = if a.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    f(*a, b)
                };
            });
        Ok(Self {
            data,
            transform: self.transform,
            crs: self.crs,
            kind: LayerKind::Continuous,
        })
    }

    /// Convert per-cell counts into counts per square kilometre
    pub fn density(&self) -> Self {
        let mut data = self.data.clone();
        for ((row, _), value) in data.indexed_iter_mut() {
            if !value.is_nan() {
                *value /= self.cell_area_km2(row);
            }
        }
        Self {
            data,
            transform: self.transform,
            crs: self.crs,
            kind: LayerKind::Continuous,
        }
    }

    /// Convert per-cell counts into `ln(1 + count / km²)`
    pub fn log_density(&self) -> Self {
        self.density().map(f64::ln_1p)
    }

    /// 0/1 indicator layer for a categorical class
    pub fn class_indicator(&self, code: u32) -> Self {
        let target = f64::from(code);
        self.map(|v| if (v - target).abs() < 0.5 { 1.0 } else { 0.0 })
    }

    /// Distinct class codes present in a categorical raster
    pub fn classes(&self) -> Vec<i64> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| v.round() as i64)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Minimum and maximum valid values
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
