//! Named boundary polygons used for grouping sites and drawing maps

use crate::spatial::crs::{Crs, GeoPoint, ProjectedPoint};

/// Polygon with an outer ring and optional holes
#[derive(Debug, Clone)]
pub struct Polygon {
    /// Outer ring
    pub exterior: Vec<ProjectedPoint>,
    /// Inner rings
    pub holes: Vec<Vec<ProjectedPoint>>,
}

impl Polygon {
    /// Whether `point` lies inside the outer ring and outside every hole
    pub fn contains(&self, point: ProjectedPoint) -> bool {
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|h| ring_contains(h, point))
    }
}

/// A named region made of one or more polygons
#[derive(Debug, Clone)]
pub struct Boundary {
    /// Region name (conservancy, study area)
    pub name: String,
    /// Member polygons
    pub polygons: Vec<Polygon>,
}

impl Boundary {
    /// Whether any member polygon contains `point`
    pub fn contains(&self, point: ProjectedPoint) -> bool {
        self.polygons.iter().any(|p| p.contains(point))
    }
}

/// Rings of a polygon given in geographic coordinates, outer ring first
pub type GeoRings = Vec<Vec<GeoPoint>>;

/// Collection of named regions in one reference system
#[derive(Debug, Clone)]
pub struct BoundarySet {
    /// Regions in input order
    pub boundaries: Vec<Boundary>,
    /// Reference system of every vertex
    pub crs: Crs,
}

impl BoundarySet {
    /// Project geographic regions into `crs`
    pub fn from_geographic(regions: Vec<(String, Vec<GeoRings>)>, crs: Crs) -> Self {
        let boundaries = regions
            .into_iter()
            .map(|(name, polygons)| Boundary {
                name,
                polygons: polygons
                    .into_iter()
                    .filter_map(|rings| {
                        let mut projected = rings
                            .into_iter()
                            .map(|ring| ring.into_iter().map(|p| crs.project(p)).collect::<Vec<_>>());
                        let exterior = projected.next()?;
                        Some(Polygon {
                            exterior,
                            holes: projected.collect(),
                        })
                    })
                    .collect(),
            })
            .collect();
        Self { boundaries, crs }
    }

    /// Name of the first region containing `point`
    pub fn containing(&self, point: ProjectedPoint) -> Option<&str> {
        self.boundaries
            .iter()
            .find(|b| b.contains(point))
            .map(|b| b.name.as_str())
    }

    /// Region names in input order
    pub fn names(&self) -> Vec<&str> {
        self.boundaries.iter().map(|b| b.name.as_str()).collect()
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of all vertices
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.boundaries
            .iter()
            .flat_map(|b| b.polygons.iter())
            .flat_map(|p| p.exterior.iter())
            .fold(None, |acc, p| {
                Some(match acc {
                    None => (p.x, p.y, p.x, p.y),
                    Some((a, b, c, d)) => (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
                })
            })
    }
}

// Even-odd ray casting; the closing vertex may or may not repeat the first
fn ring_contains(ring: &[ProjectedPoint], point: ProjectedPoint) -> bool {
    let mut inside = false;
    let mut previous = match ring.last() {
        Some(p) => *p,
        None => return false,
    };
    for current in ring {
        if (current.y > point.y) != (previous.y > point.y) {
            let crossing_x = (previous.x - current.x) * (point.y - current.y)
                / (previous.y - current.y)
                + current.x;
            if point.x < crossing_x {
                inside = !inside;
            }
        }
        previous = *current;
    }
    inside
}
