//! Raster aggregation and reprojection onto new grids

use crate::io::error::{Result, invalid_parameter};
use crate::spatial::crs::{Crs, ProjectedPoint, transform};
use crate::spatial::raster::{GeoTransform, LayerKind, Raster};
use ndarray::Array2;
use std::collections::BTreeMap;

// Points sampled along each edge when projecting an extent
const EDGE_SAMPLES: usize = 16;

/// Coarsen a raster by an integer factor
///
/// Continuous layers take the mean of valid cells in each block; categorical
/// layers take the most frequent class, ties resolved towards the lower code.
/// Partial blocks along the right and bottom edges are kept.
///
/// # Errors
///
/// Returns an error if `factor` is zero
pub fn aggregate(raster: &Raster, factor: usize) -> Result<Raster> {
    if factor == 0 {
        return Err(invalid_parameter(
            "factor",
            &factor,
            &"aggregation factor must be at least 1",
        ));
    }
    if factor == 1 {
        return Ok(raster.clone());
    }

    let rows = raster.rows().div_ceil(factor);
    let cols = raster.cols().div_ceil(factor);
    let mut data = Array2::from_elem((rows, cols), f64::NAN);

    for ((row, col), cell) in data.indexed_iter_mut() {
        let block = (row * factor..((row + 1) * factor).min(raster.rows()))
            .flat_map(|r| (col * factor..((col + 1) * factor).min(raster.cols())).map(move |c| (r, c)))
            .filter_map(|(r, c)| raster.get(r, c));

        *cell = match raster.kind {
            LayerKind::Continuous => {
                let (sum, count) = block.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if count == 0 { f64::NAN } else { sum / count as f64 }
            }
            LayerKind::Categorical => modal_class(block),
        };
    }

    let t = raster.transform;
    Ok(Raster::new(
        data,
        GeoTransform::new(
            t.origin_x,
            t.origin_y,
            t.pixel_width * factor as f64,
            t.pixel_height * factor as f64,
        ),
        raster.crs,
        raster.kind,
    ))
}

fn modal_class(values: impl Iterator<Item = f64>) -> f64 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    // max_by_key keeps the last maximum, so iterate codes in descending order
    counts
        .iter()
        .rev()
        .max_by_key(|(_, n)| **n)
        .map_or(f64::NAN, |(code, _)| *code as f64)
}

/// Reproject a raster into `target` with square cells of `resolution` units
///
/// The output grid covers the projected extent of the source. Categorical layers
/// are sampled by nearest neighbour, continuous layers bilinearly.
///
/// # Errors
///
/// Returns an error if `resolution` isn't positive or the projected extent is empty
pub fn reproject(raster: &Raster, target: Crs, resolution: f64) -> Result<Raster> {
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(invalid_parameter(
            "resolution",
            &resolution,
            &"resolution must be positive",
        ));
    }

    let (min_x, min_y, max_x, max_y) = projected_extent(raster, target);
    let cols = ((max_x - min_x) / resolution).ceil() as usize;
    let rows = ((max_y - min_y) / resolution).ceil() as usize;
    if rows == 0 || cols == 0 {
        return Err(invalid_parameter(
            "resolution",
            &resolution,
            &"projected extent is smaller than one cell",
        ));
    }

    let grid = GeoTransform::new(min_x, max_y, resolution, resolution);
    Ok(resample_onto(raster, grid, rows, cols, target))
}

/// Resample a raster onto an explicit grid
pub fn resample_onto(
    raster: &Raster,
    grid: GeoTransform,
    rows: usize,
    cols: usize,
    crs: Crs,
) -> Raster {
    let mut data = Array2::from_elem((rows, cols), f64::NAN);
    for ((row, col), cell) in data.indexed_iter_mut() {
        let source_point = transform(grid.cell_center(row, col), &crs, &raster.crs);
        let value = match raster.kind {
            LayerKind::Categorical => raster.value_at(source_point),
            LayerKind::Continuous => {
                bilinear(raster, source_point).or_else(|| raster.value_at(source_point))
            }
        };
        *cell = value.unwrap_or(f64::NAN);
    }
    Raster::new(data, grid, crs, raster.kind)
}

/// Resample `raster` onto the grid of `template`
pub fn align_to(raster: &Raster, template: &Raster) -> Raster {
    resample_onto(
        raster,
        template.transform,
        template.rows(),
        template.cols(),
        template.crs,
    )
}

fn bilinear(raster: &Raster, point: ProjectedPoint) -> Option<f64> {
    let (row, col) = raster.transform.fractional_cell(point);
    let (row, col) = (row - 0.5, col - 0.5);
    if row < 0.0 || col < 0.0 {
        return None;
    }
    let (r0, c0) = (row.floor() as usize, col.floor() as usize);
    let (fr, fc) = (row - row.floor(), col - col.floor());

    let v00 = raster.get(r0, c0)?;
    let v01 = raster.get(r0, c0 + 1)?;
    let v10 = raster.get(r0 + 1, c0)?;
    let v11 = raster.get(r0 + 1, c0 + 1)?;

    let top = v00 * (1.0 - fc) + v01 * fc;
    let bottom = v10 * (1.0 - fc) + v11 * fc;
    Some(top * (1.0 - fr) + bottom * fr)
}

fn projected_extent(raster: &Raster, target: Crs) -> (f64, f64, f64, f64) {
    let (min_x, min_y, max_x, max_y) = raster.extent();
    let mut bounds = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);

    for i in 0..=EDGE_SAMPLES {
        let f = i as f64 / EDGE_SAMPLES as f64;
        let x = min_x + f * (max_x - min_x);
        let y = min_y + f * (max_y - min_y);
        for point in [
            ProjectedPoint { x, y: min_y },
            ProjectedPoint { x, y: max_y },
            ProjectedPoint { x: min_x, y },
            ProjectedPoint { x: max_x, y },
        ] {
            let p = transform(point, &raster.crs, &target);
            bounds.0 = bounds.0.min(p.x);
            bounds.1 = bounds.1.min(p.y);
            bounds.2 = bounds.2.max(p.x);
            bounds.3 = bounds.3.max(p.y);
        }
    }

    bounds
}
