//! Tests for covariate assembly, standardisation and design matrices

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use camtrap::CamtrapError;
    use camtrap::analysis::covariates::CovariateTable;
    use camtrap::analysis::effort::{DetectionSummaryTable, EffortSummary};
    use camtrap::analysis::sites::SiteTable;
    use camtrap::io::table::{DetectionRow, EffortRow, SiteMetadataRow};
    use camtrap::spatial::crs::Crs;

    // Four sampled sites with grass cover and conservancy, one unsampled site
    fn sites() -> SiteTable {
        let metadata: Vec<SiteMetadataRow> = [
            ("A01", "Naboisho"),
            ("B02", "Naboisho"),
            ("C03", "Olare Motorogi"),
            ("D04", "Mara North"),
            ("E05", "Mara North"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (id, conservancy))| SiteMetadataRow {
            site_id: (*id).to_string(),
            latitude: -1.5,
            longitude: 35.0 + 0.01 * i as f64,
            conservancy: Some((*conservancy).to_string()),
        })
        .collect();
        let mut table = SiteTable::from_metadata(
            &metadata,
            Crs::Utm {
                zone: 36,
                south: true,
            },
        )
        .unwrap();

        let mut effort = Vec::new();
        for (site, days) in [("A01", 10), ("B02", 8), ("C03", 5), ("D04", 4)] {
            for day in 1..=days {
                effort.push(EffortRow {
                    site_id: site.to_string(),
                    date: format!("2018-10-{day:02}"),
                    active: true,
                });
            }
        }
        let effort = EffortSummary::from_daily(&effort);
        table.join_effort(&effort).unwrap();

        let events: Vec<DetectionRow> = [("A01", 1), ("A01", 2), ("C03", 3), ("D04", 1)]
            .iter()
            .map(|(site, day)| DetectionRow {
                site_id: (*site).to_string(),
                date: format!("2018-10-{day:02}"),
                species: "zebra".to_string(),
                images: 1,
            })
            .collect();
        table
            .join_detections(
                &DetectionSummaryTable::from_events(&events),
                &effort,
                &["zebra".to_string()],
            )
            .unwrap();

        for (site, grass) in [("A01", 0.2), ("B02", 0.4), ("C03", 0.6), ("D04", 0.8), ("E05", 0.5)] {
            table.set_covariate(site, "grass_500", grass).unwrap();
        }
        table
    }

    fn terms(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    // Tests unsampled sites are left out and the response matches the joins
    // Verified by modelling zero-trial sites
    #[test]
    fn test_assemble_response() {
        let table = CovariateTable::assemble(&sites(), "zebra", &terms(&["grass_500"])).unwrap();

        assert_eq!(table.site_ids, vec!["A01", "B02", "C03", "D04"]);
        assert_eq!(table.successes, vec![2, 0, 1, 1]);
        assert_eq!(table.trials, vec![10, 8, 5, 4]);
        assert_relative_eq!(table.proportions()[0], 0.2);
        assert_eq!(table.len(), 4);
        assert!(!table.is_empty());
    }

    // Tests the conservancy term becomes a factor and duplicate terms collapse
    // Verified by treating every term as numeric
    #[test]
    fn test_assemble_factor_and_duplicates() {
        let table = CovariateTable::assemble(
            &sites(),
            "zebra",
            &terms(&["grass_500", "conservancy", "grass_500"]),
        )
        .unwrap();
        assert_eq!(table.continuous.len(), 1);
        assert_eq!(table.factors.len(), 1);
        assert_eq!(table.factors[0].1[2], "Olare Motorogi");
    }

    // Tests a missing covariate names the site and term
    // Verified by filling missing values with zero
    #[test]
    fn test_assemble_missing_covariate() {
        let error = CovariateTable::assemble(&sites(), "zebra", &terms(&["dist_water"])).unwrap_err();
        assert!(matches!(
            error,
            CamtrapError::MissingCovariate { ref site_id, ref covariate }
                if site_id == "A01" && covariate == "dist_water"
        ));
    }

    // Tests covariates are z-scored with the sample standard deviation
    // Verified by dividing by the population standard deviation
    #[test]
    fn test_standardize() {
        let mut table = CovariateTable::assemble(&sites(), "zebra", &terms(&["grass_500"])).unwrap();
        table.standardize().unwrap();

        let values = &table.continuous[0].1;
        let mean = values.iter().sum::<f64>() / 4.0;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(variance.sqrt(), 1.0, epsilon = 1e-12);

        let scaling = table.scaling["grass_500"];
        assert_relative_eq!(scaling.mean, 0.5, epsilon = 1e-12);
        assert_relative_eq!(scaling.sd, (0.2_f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    // Tests a constant covariate cannot be standardised
    // Verified by dividing by a zero deviation
    #[test]
    fn test_standardize_constant() {
        let mut base = sites();
        for site in ["A01", "B02", "C03", "D04"] {
            base.set_covariate(site, "grass_500", 0.3).unwrap();
        }
        let mut table = CovariateTable::assemble(&base, "zebra", &terms(&["grass_500"])).unwrap();
        assert!(table.standardize().is_err());
    }

    // Tests the design matrix has an intercept, the covariate and treatment dummies
    // Verified by including a dummy for the reference level
    #[test]
    fn test_design_matrix() {
        let table =
            CovariateTable::assemble(&sites(), "zebra", &terms(&["grass_500", "conservancy"]))
                .unwrap();
        let design = table
            .design_matrix(&terms(&["grass_500", "conservancy"]))
            .unwrap();

        assert_eq!(
            design.columns,
            vec![
                "(Intercept)",
                "grass_500",
                "conservancyNaboisho",
                "conservancyOlare Motorogi"
            ]
        );
        assert_eq!(design.n_rows(), 4);
        assert_relative_eq!(design.matrix[[0, 0]], 1.0);
        assert_relative_eq!(design.matrix[[2, 1]], 0.6);
        // D04 is in the reference level
        assert_relative_eq!(design.matrix[[3, 2]], 0.0);
        assert_relative_eq!(design.matrix[[3, 3]], 0.0);
        assert_relative_eq!(design.matrix[[0, 2]], 1.0);
        assert_relative_eq!(design.matrix[[2, 3]], 1.0);
    }

    // Tests the intercept-only design and unknown terms
    // Verified by ignoring unknown terms
    #[test]
    fn test_design_matrix_intercept_and_unknown() {
        let table = CovariateTable::assemble(&sites(), "zebra", &terms(&["grass_500"])).unwrap();
        let null = table.design_matrix(&[]).unwrap();
        assert_eq!(null.n_columns(), 1);
        assert!(table.design_matrix(&terms(&["livestock"])).is_err());
    }

    // Tests the model data frame and its CSV output
    // Verified by omitting the proportion column
    #[test]
    fn test_write_csv() {
        let table =
            CovariateTable::assemble(&sites(), "zebra", &terms(&["grass_500", "conservancy"]))
                .unwrap();
        let frame = table.to_frame().unwrap();
        assert_eq!(frame.height(), 4);
        assert_eq!(
            frame
                .get_column_names()
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
            vec![
                "site_id",
                "detected_days",
                "sampled_days",
                "proportion",
                "grass_500",
                "conservancy"
            ]
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zebra_model_data.csv");
        table.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("site_id,detected_days,sampled_days,proportion"));
        assert_eq!(text.lines().count(), 5);
    }
}
