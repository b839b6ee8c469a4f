//! PNG maps of raster layers with site and boundary overlays

use crate::io::configuration::{MAP_MAX_DIMENSION, SITE_MARKER_RADIUS};
use crate::io::error::{CamtrapError, Result, invalid_data};
use crate::spatial::boundary::BoundarySet;
use crate::spatial::crs::ProjectedPoint;
use crate::spatial::raster::{LayerKind, Raster};
use image::{ImageBuffer, Rgba, RgbaImage};
use std::path::Path;

// Viridis control points, low to high
const RAMP: [[u8; 3]; 5] = [
    [68, 1, 84],
    [59, 82, 139],
    [33, 145, 140],
    [94, 201, 98],
    [253, 231, 37],
];

const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

const SITE_COLOR: Rgba<u8> = Rgba([220, 20, 60, 255]);
const BOUNDARY_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Colour of `value` on the continuous ramp between `lo` and `hi`
pub fn ramp_color(value: f64, lo: f64, hi: f64) -> Rgba<u8> {
    let t = if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let scaled = t * (RAMP.len() - 1) as f64;
    let index = (scaled.floor() as usize).min(RAMP.len() - 2);
    let frac = scaled - index as f64;
    let (Some(a), Some(b)) = (RAMP.get(index), RAMP.get(index + 1)) else {
        return TRANSPARENT;
    };
    let channel = |i: usize| {
        let x = f64::from(a.get(i).copied().unwrap_or(0));
        let y = f64::from(b.get(i).copied().unwrap_or(0));
        (x + (y - x) * frac).round() as u8
    };
    Rgba([channel(0), channel(1), channel(2), 255])
}

/// Palette colour for the class at position `index` among the layer's classes
pub fn class_color(index: usize) -> Rgba<u8> {
    let [r, g, b] = PALETTE.get(index % PALETTE.len()).copied().unwrap_or([0, 0, 0]);
    Rgba([r, g, b, 255])
}

/// Draw a raster as an image, one pixel per `step` x `step` block of cells
///
/// Missing cells are transparent.
///
/// # Errors
///
/// Returns an error if the raster has no cells
pub fn raster_to_image(raster: &Raster) -> Result<(RgbaImage, usize)> {
    if raster.rows() == 0 || raster.cols() == 0 {
        return Err(invalid_data(&"cannot render an empty raster"));
    }
    let largest = raster.rows().max(raster.cols());
    let step = largest.div_ceil(MAP_MAX_DIMENSION as usize).max(1);
    let width = raster.cols().div_ceil(step) as u32;
    let height = raster.rows().div_ceil(step) as u32;

    let classes = raster.classes();
    let (lo, hi) = raster.value_range().unwrap_or((0.0, 1.0));
    let mut img = ImageBuffer::from_pixel(width, height, TRANSPARENT);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let value = raster.get(y as usize * step, x as usize * step);
        *pixel = match (value, raster.kind) {
            (None, _) => TRANSPARENT,
            (Some(v), LayerKind::Continuous) => ramp_color(v, lo, hi),
            (Some(v), LayerKind::Categorical) => {
                let code = v.round() as i64;
                classes
                    .binary_search(&code)
                    .map_or(TRANSPARENT, class_color)
            }
        };
    }
    Ok((img, step))
}

fn to_pixel(raster: &Raster, step: usize, point: ProjectedPoint) -> (i64, i64) {
    let (row, col) = raster.transform.fractional_cell(point);
    let s = step as f64;
    ((col / s).floor() as i64, (row / s).floor() as i64)
}

fn put(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(img.width()) && y < i64::from(img.height()) {
        img.put_pixel(x as u32, y as u32, color);
    }
}

// Bresenham line between two pixel positions
fn draw_line(img: &mut RgbaImage, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x, y, color);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_marker(img: &mut RgbaImage, center: (i64, i64), color: Rgba<u8>) {
    let r = SITE_MARKER_RADIUS;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                put(img, center.0 + dx, center.1 + dy, color);
            }
        }
    }
}

/// Render a raster layer with site markers and boundary outlines to a PNG
///
/// Sites and boundaries must be in the raster's reference system.
///
/// # Errors
///
/// Returns an error if the boundaries are in another reference system, the
/// raster is empty, or the image can't be written
pub fn render_raster_png(
    raster: &Raster,
    sites: &[ProjectedPoint],
    boundaries: Option<&BoundarySet>,
    output_path: &Path,
) -> Result<()> {
    let (mut img, step) = raster_to_image(raster)?;

    if let Some(set) = boundaries {
        raster.crs.ensure_same(&set.crs)?;
        let rings = set
            .boundaries
            .iter()
            .flat_map(|b| b.polygons.iter())
            .flat_map(|p| std::iter::once(&p.exterior).chain(p.holes.iter()));
        for ring in rings {
            let pixels: Vec<_> = ring.iter().map(|&p| to_pixel(raster, step, p)).collect();
            for pair in pixels.windows(2) {
                if let [a, b] = pair {
                    draw_line(&mut img, *a, *b, BOUNDARY_COLOR);
                }
            }
        }
    }

    for &site in sites {
        draw_marker(&mut img, to_pixel(raster, step, site), SITE_COLOR);
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CamtrapError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }

    img.save(output_path)
        .map_err(|e| CamtrapError::ImageExport {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}
