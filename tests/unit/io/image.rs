//! Tests for raster map rendering and overlays

#[cfg(test)]
mod tests {
    use camtrap::io::image::{class_color, ramp_color, raster_to_image, render_raster_png};
    use camtrap::spatial::boundary::BoundarySet;
    use camtrap::spatial::crs::{Crs, ProjectedPoint};
    use camtrap::spatial::raster::{GeoTransform, LayerKind, Raster};
    use image::Rgba;

    fn raster(kind: LayerKind, rows: usize, cols: usize) -> Raster {
        let values = (0..rows * cols).map(|i| (i % 3) as f64).collect();
        Raster::from_vec(
            values,
            rows,
            cols,
            GeoTransform::new(0.0, 100.0, 10.0, 10.0),
            Crs::Utm {
                zone: 36,
                south: true,
            },
            kind,
        )
        .unwrap()
    }

    // Tests the ramp runs from its first to its last colour
    // Verified by reversing the ramp
    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(ramp_color(0.0, 0.0, 1.0), Rgba([68, 1, 84, 255]));
        assert_eq!(ramp_color(1.0, 0.0, 1.0), Rgba([253, 231, 37, 255]));
        assert_eq!(ramp_color(5.0, 0.0, 1.0), ramp_color(1.0, 0.0, 1.0));
    }

    // Tests a constant layer still gets an opaque colour
    // Verified by dividing by a zero range
    #[test]
    fn test_ramp_constant_range() {
        assert_eq!(ramp_color(3.0, 3.0, 3.0)[3], 255);
    }

    // Tests the class palette cycles
    // Verified by clamping indices past the palette
    #[test]
    fn test_class_palette_cycles() {
        assert_eq!(class_color(0), class_color(10));
        assert_ne!(class_color(0), class_color(1));
    }

    // Tests missing cells render transparent
    // Verified by drawing missing cells black
    #[test]
    fn test_missing_cells_transparent() {
        let mut layer = raster(LayerKind::Continuous, 4, 4);
        layer.data[[0, 0]] = f64::NAN;

        let (img, step) = raster_to_image(&layer).unwrap();
        assert_eq!(step, 1);
        assert_eq!((img.width(), img.height()), (4, 4));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(1, 0)[3], 255);
    }

    // Tests large rasters are downsampled to the maximum map size
    // Verified by rendering one pixel per cell
    #[test]
    fn test_large_raster_downsampled() {
        let layer = raster(LayerKind::Categorical, 3000, 10);
        let (img, step) = raster_to_image(&layer).unwrap();
        assert_eq!(step, 3);
        assert_eq!(img.height(), 1000);
        assert_eq!(img.width(), 4);
    }

    // Tests a map with sites and boundaries is written to a new directory
    // Verified by skipping directory creation
    #[test]
    fn test_render_png_with_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps").join("habitat.png");
        let layer = raster(LayerKind::Categorical, 10, 10);
        let boundaries = BoundarySet {
            boundaries: Vec::new(),
            crs: layer.crs,
        };
        let sites = [ProjectedPoint { x: 45.0, y: 55.0 }];

        render_raster_png(&layer, &sites, Some(&boundaries), &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!((img.width(), img.height()), (10, 10));
        assert_eq!(img.get_pixel(4, 4), &Rgba([220, 20, 60, 255]));
    }

    // Tests boundaries in another reference system are rejected
    // Verified by drawing them unprojected
    #[test]
    fn test_render_rejects_crs_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let layer = raster(LayerKind::Continuous, 5, 5);
        let boundaries = BoundarySet {
            boundaries: Vec::new(),
            crs: Crs::Geographic,
        };
        let result = render_raster_png(&layer, &[], Some(&boundaries), &dir.path().join("x.png"));
        assert!(result.is_err());
    }
}
