//! Tests for raster georeferencing and per-cell algebra

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use camtrap::spatial::crs::{Crs, ProjectedPoint};
    use camtrap::spatial::raster::{GeoTransform, LayerKind, Raster};

    const UTM_36S: Crs = Crs::Utm {
        zone: 36,
        south: true,
    };

    // 3 x 2 grid of 100 m cells with its upper-left corner at (1000, 2000)
    fn grid(values: Vec<f64>, kind: LayerKind) -> Raster {
        Raster::from_vec(
            values,
            3,
            2,
            GeoTransform::new(1000.0, 2000.0, 100.0, 100.0),
            UTM_36S,
            kind,
        )
        .unwrap()
    }

    // Tests cell centres and the inverse lookup
    // Verified by measuring rows from the bottom edge
    #[test]
    fn test_cell_center_and_lookup() {
        let raster = grid(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], LayerKind::Continuous);

        let centre = raster.cell_center(2, 1);
        assert_relative_eq!(centre.x, 1150.0);
        assert_relative_eq!(centre.y, 1750.0);
        assert_eq!(raster.cell_at(centre), Some((2, 1)));
        assert_eq!(raster.value_at(centre), Some(6.0));
        assert_eq!(raster.cell_at(ProjectedPoint { x: 999.0, y: 1900.0 }), None);
        assert_eq!(raster.cell_at(ProjectedPoint { x: 1050.0, y: 1699.0 }), None);
    }

    // Tests the shape check on construction
    // Verified by truncating extra values
    #[test]
    fn test_from_vec_shape_mismatch() {
        let result = Raster::from_vec(
            vec![1.0; 5],
            3,
            2,
            GeoTransform::new(0.0, 0.0, 1.0, 1.0),
            UTM_36S,
            LayerKind::Continuous,
        );
        assert!(result.is_err());
    }

    // Tests extent covers every cell
    // Verified by using cell centres as the extent
    #[test]
    fn test_extent() {
        let raster = grid(vec![0.0; 6], LayerKind::Continuous);
        assert_eq!(raster.extent(), (1000.0, 1700.0, 1200.0, 2000.0));
    }

    // Tests projected cell areas in square kilometres
    // Verified by returning square metres
    #[test]
    fn test_projected_cell_area() {
        let raster = grid(vec![0.0; 6], LayerKind::Continuous);
        assert_relative_eq!(raster.cell_area_km2(0), 0.01);
    }

    // Tests geographic cell areas at the equator and their shrinkage poleward
    // Verified by ignoring latitude
    #[test]
    fn test_geographic_cell_area() {
        let equator = Raster::from_vec(
            vec![0.0; 2],
            2,
            1,
            GeoTransform::new(35.0, 0.5, 0.5, 0.5),
            Crs::Geographic,
            LayerKind::Continuous,
        )
        .unwrap();
        // half-degree cell at the equator is roughly 55.6 km square
        assert_relative_eq!(equator.cell_area_km2(0), 3_091.0, max_relative = 0.01);

        let north = Raster::from_vec(
            vec![0.0],
            1,
            1,
            GeoTransform::new(35.0, 60.5, 0.5, 0.5),
            Crs::Geographic,
            LayerKind::Continuous,
        )
        .unwrap();
        assert!(north.cell_area_km2(0) < equator.cell_area_km2(0) * 0.55);
    }

    // Tests unary maps keep missing cells missing
    // Verified by applying the function to NaN
    #[test]
    fn test_map_preserves_missing() {
        let raster = grid(vec![1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0], LayerKind::Continuous);
        let doubled = raster.map(|v| v * 2.0);
        assert_eq!(doubled.get(0, 0), Some(2.0));
        assert_eq!(doubled.get(0, 1), None);
    }

    // Tests binary algebra on aligned grids and rejection of misaligned ones
    // Verified by skipping the alignment check
    #[test]
    fn test_zip_with() {
        let a = grid(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], LayerKind::Continuous);
        let b = grid(vec![6.0, 5.0, 4.0, 3.0, f64::NAN, 1.0], LayerKind::Continuous);

        let sum = a.zip_with(&b, |x, y| x + y).unwrap();
        assert_eq!(sum.get(0, 0), Some(7.0));
        assert_eq!(sum.get(2, 0), None);

        let mut shifted = b.clone();
        shifted.transform.origin_x += 50.0;
        assert!(a.zip_with(&shifted, |x, y| x + y).is_err());

        let mut other_crs = b;
        other_crs.crs = Crs::Geographic;
        assert!(a.zip_with(&other_crs, |x, y| x + y).is_err());
    }

    // Tests counts become ln(1 + count per km²)
    // Verified by taking the log of the raw count
    #[test]
    fn test_log_density() {
        let counts = grid(vec![0.0, 1.0, 2.0, 3.0, 4.0, f64::NAN], LayerKind::Continuous);
        let log = counts.log_density();
        assert_relative_eq!(log.get(0, 0).unwrap(), 0.0);
        // one person in 0.01 km² is 100 per km²
        assert_relative_eq!(log.get(0, 1).unwrap(), 101.0_f64.ln());
        assert_eq!(log.get(2, 1), None);
        assert_eq!(log.kind, LayerKind::Continuous);
    }

    // Tests class indicators and the distinct class list
    // Verified by matching on floor instead of rounding
    #[test]
    fn test_class_indicator_and_classes() {
        let landcover = grid(vec![1.0, 2.0, 2.0, 5.0, f64::NAN, 1.0], LayerKind::Categorical);
        assert_eq!(landcover.classes(), vec![1, 2, 5]);

        let grass = landcover.class_indicator(2);
        assert_eq!(grass.get(0, 1), Some(1.0));
        assert_eq!(grass.get(0, 0), Some(0.0));
        assert_eq!(grass.get(2, 0), None);
    }

    // Tests the valid value range ignores missing cells
    // Verified by folding NaN into the range
    #[test]
    fn test_value_range() {
        let raster = grid(vec![3.0, f64::NAN, -1.0, 4.0, 2.0, 0.0], LayerKind::Continuous);
        assert_eq!(raster.value_range(), Some((-1.0, 4.0)));

        let empty = grid(vec![f64::NAN; 6], LayerKind::Continuous);
        assert_eq!(empty.value_range(), None);
    }
}
