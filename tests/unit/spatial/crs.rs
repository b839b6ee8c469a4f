//! Tests for reference system parsing and UTM projection

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use camtrap::CamtrapError;
    use camtrap::spatial::crs::{Crs, GeoPoint, ProjectedPoint, transform};

    const UTM_36S: Crs = Crs::Utm {
        zone: 36,
        south: true,
    };

    // Tests EPSG strings in the accepted spellings
    // Verified by requiring the uppercase prefix
    #[test]
    fn test_parse_epsg() {
        assert_eq!(Crs::parse("EPSG:32736").unwrap(), UTM_36S);
        assert_eq!(Crs::parse("epsg:4326").unwrap(), Crs::Geographic);
        assert_eq!(
            Crs::parse("32637").unwrap(),
            Crs::Utm {
                zone: 37,
                south: false
            }
        );
    }

    // Tests unsupported codes and junk are rejected
    // Verified by mapping unknown codes to WGS84
    #[test]
    fn test_parse_rejects_unsupported() {
        assert!(Crs::parse("EPSG:3857").is_err());
        assert!(Crs::parse("UTM36S").is_err());
        assert!(Crs::from_epsg(32761).is_err());
    }

    // Tests EPSG codes and display strings
    // Verified by swapping the north and south offsets
    #[test]
    fn test_epsg_and_display() {
        assert_eq!(UTM_36S.epsg(), 32736);
        assert_eq!(UTM_36S.to_string(), "EPSG:32736");
        assert_eq!(Crs::Geographic.to_string(), "EPSG:4326");
        assert!(UTM_36S.is_projected());
        assert!(!Crs::Geographic.is_projected());
    }

    // Tests zone selection for a point in southern Kenya
    // Verified by using the zone's western edge
    #[test]
    fn test_utm_for() {
        let zone = Crs::utm_for(GeoPoint {
            lon: 35.1,
            lat: -1.4,
        });
        assert_eq!(zone, UTM_36S);
    }

    // Tests the central meridian and equator map to the false origin
    // Verified by dropping the southern false northing
    #[test]
    fn test_false_origin() {
        let p = UTM_36S.project(GeoPoint { lon: 33.0, lat: 0.0 });
        assert_abs_diff_eq!(p.x, 500_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 10_000_000.0, epsilon = 1e-6);
    }

    // Tests the northing one degree south of the equator
    // Verified by omitting the scale factor
    #[test]
    fn test_northing_on_central_meridian() {
        let p = UTM_36S.project(GeoPoint {
            lon: 33.0,
            lat: -1.0,
        });
        assert_abs_diff_eq!(p.x, 500_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 9_889_469.841, epsilon = 0.01);
    }

    // Tests eastings are symmetric about the central meridian
    // Verified by offsetting the central meridian
    #[test]
    fn test_easting_symmetry() {
        let east = UTM_36S.project(GeoPoint {
            lon: 35.0,
            lat: -1.5,
        });
        let west = UTM_36S.project(GeoPoint {
            lon: 31.0,
            lat: -1.5,
        });
        assert_abs_diff_eq!(east.x - 500_000.0, 500_000.0 - west.x, epsilon = 1e-6);
        assert_abs_diff_eq!(east.y, west.y, epsilon = 1e-6);
    }

    // Tests projecting and unprojecting returns the original point
    // Verified by truncating the inverse series
    #[test]
    fn test_project_unproject() {
        let original = GeoPoint {
            lon: 35.21,
            lat: -1.47,
        };
        let back = UTM_36S.unproject(UTM_36S.project(original));
        assert_abs_diff_eq!(back.lon, original.lon, epsilon = 1e-7);
        assert_abs_diff_eq!(back.lat, original.lat, epsilon = 1e-7);
    }

    // Tests transform between systems and the identity shortcut
    // Verified by returning the point unchanged for every pair
    #[test]
    fn test_transform() {
        let geo = ProjectedPoint { x: 35.0, y: -1.5 };
        let projected = transform(geo, &Crs::Geographic, &UTM_36S);
        let direct = UTM_36S.project(GeoPoint {
            lon: 35.0,
            lat: -1.5,
        });
        assert_abs_diff_eq!(projected.x, direct.x, epsilon = 1e-9);
        assert_eq!(transform(geo, &UTM_36S, &UTM_36S), geo);
    }

    // Tests mismatched systems raise CrsMismatch
    // Verified by treating all projected systems as equal
    #[test]
    fn test_ensure_same() {
        assert!(UTM_36S.ensure_same(&UTM_36S).is_ok());
        let error = UTM_36S
            .ensure_same(&Crs::Utm {
                zone: 37,
                south: true,
            })
            .unwrap_err();
        assert!(matches!(error, CamtrapError::CrsMismatch { .. }));
    }

    // Tests planar distance
    // Verified by returning squared distance
    #[test]
    fn test_distance() {
        let a = ProjectedPoint { x: 0.0, y: 0.0 };
        let b = ProjectedPoint { x: 3.0, y: 4.0 };
        assert_abs_diff_eq!(a.distance(&b), 5.0);
    }
}
