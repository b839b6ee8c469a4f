//! Raster statistics at site locations
//!
//! Buffers follow the usual cell-centre rule: a cell contributes when its centre
//! lies within the radius. When the radius is smaller than a cell and no centre
//! qualifies, the enclosing cell stands in for the buffer.

use crate::io::error::{Result, invalid_data, invalid_parameter};
use crate::spatial::crs::ProjectedPoint;
use crate::spatial::raster::{LayerKind, Raster};
use std::collections::BTreeMap;

/// Value of the cell enclosing `point`
///
/// # Errors
///
/// Returns an error if the point lies outside the raster
pub fn extract_point(raster: &Raster, point: ProjectedPoint) -> Result<Option<f64>> {
    let (row, col) = raster.cell_at(point).ok_or_else(|| outside(raster, point))?;
    Ok(raster.get(row, col))
}

/// Cells whose centres lie within `radius` of `point`
///
/// # Errors
///
/// Returns an error if the raster isn't projected, the radius isn't positive,
/// or the point lies outside the raster
pub fn buffer_cells(
    raster: &Raster,
    point: ProjectedPoint,
    radius: f64,
) -> Result<Vec<(usize, usize)>> {
    if !raster.crs.is_projected() {
        return Err(invalid_data(&format!(
            "buffer extraction needs a projected raster, found {}",
            raster.crs
        )));
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(invalid_parameter("radius", &radius, &"radius must be positive"));
    }
    let enclosing = raster.cell_at(point).ok_or_else(|| outside(raster, point))?;

    let t = &raster.transform;
    let (row, col) = t.fractional_cell(point);
    let row_span = (radius / t.pixel_height).ceil() + 1.0;
    let col_span = (radius / t.pixel_width).ceil() + 1.0;
    let row_range = clamp_span(row - row_span, row + row_span, raster.rows());
    let col_range = clamp_span(col - col_span, col + col_span, raster.cols());

    let mut cells = Vec::new();
    for r in row_range {
        for c in col_range.clone() {
            if raster.cell_center(r, c).distance(&point) <= radius {
                cells.push((r, c));
            }
        }
    }

    if cells.is_empty() {
        cells.push(enclosing);
    }
    Ok(cells)
}

/// Mean of valid cells within `radius` of `point`
///
/// Returns `None` when every cell in the buffer is missing.
///
/// # Errors
///
/// Same conditions as [`buffer_cells`]
pub fn extract_buffer_mean(
    raster: &Raster,
    point: ProjectedPoint,
    radius: f64,
) -> Result<Option<f64>> {
    let (sum, count) = buffer_cells(raster, point, radius)?
        .into_iter()
        .filter_map(|(r, c)| raster.get(r, c))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    Ok((count > 0).then(|| sum / count as f64))
}

/// Proportion of the buffer covered by each class
///
/// Each class becomes a 0/1 indicator before averaging over the valid cells, so
/// the proportions of all classes present sum to one.
///
/// # Errors
///
/// Returns an error if the raster isn't categorical or [`buffer_cells`] fails
pub fn extract_class_proportions(
    raster: &Raster,
    point: ProjectedPoint,
    radius: f64,
    classes: &[u32],
) -> Result<BTreeMap<u32, f64>> {
    if raster.kind != LayerKind::Categorical {
        return Err(invalid_data(&"class proportions need a categorical raster"));
    }
    let values: Vec<f64> = buffer_cells(raster, point, radius)?
        .into_iter()
        .filter_map(|(r, c)| raster.get(r, c))
        .collect();

    Ok(classes
        .iter()
        .map(|&code| {
            let proportion = if values.is_empty() {
                0.0
            } else {
                let target = f64::from(code);
                values.iter().filter(|v| (*v - target).abs() < 0.5).count() as f64
                    / values.len() as f64
            };
            (code, proportion)
        })
        .collect())
}

/// Distance from `point` to the nearest cell centre of any of `classes`
///
/// Returns `None` when the raster contains none of the classes.
///
/// # Errors
///
/// Returns an error if the raster isn't projected
pub fn distance_to_class(
    raster: &Raster,
    point: ProjectedPoint,
    classes: &[u32],
) -> Result<Option<f64>> {
    if !raster.crs.is_projected() {
        return Err(invalid_data(&format!(
            "distances need a projected raster, found {}",
            raster.crs
        )));
    }
    let targets: Vec<f64> = classes.iter().map(|&c| f64::from(c)).collect();

    let nearest = raster
        .data
        .indexed_iter()
        .filter(|(_, v)| targets.iter().any(|t| (*v - t).abs() < 0.5))
        .map(|((r, c), _)| raster.cell_center(r, c).distance(&point))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))));
    Ok(nearest)
}

fn clamp_span(lo: f64, hi: f64, len: usize) -> std::ops::Range<usize> {
    let start = lo.floor().max(0.0) as usize;
    let end = (hi.ceil().max(0.0) as usize).min(len);
    start.min(end)..end
}

fn outside(raster: &Raster, point: ProjectedPoint) -> crate::io::error::CamtrapError {
    let (min_x, min_y, max_x, max_y) = raster.extent();
    invalid_data(&format!(
        "point ({:.1}, {:.1}) lies outside raster extent [{min_x:.1}, {min_y:.1}, {max_x:.1}, {max_y:.1}]",
        point.x, point.y
    ))
}
