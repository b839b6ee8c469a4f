//! Tests for command-line parsing and option mapping

#[cfg(test)]
mod tests {
    use camtrap::io::cli::{Cli, run};
    use clap::Parser;
    use std::path::PathBuf;

    // Tests parsing with only the manifest argument
    // Verified by changing flag defaults
    #[test]
    fn test_cli_parse_minimal_args() {
        let cli = Cli::parse_from(["camtrap", "study.json"]);

        assert_eq!(cli.manifest, PathBuf::from("study.json"));
        assert_eq!(cli.output, None);
        assert!(cli.species.is_empty());
        assert!(!cli.no_plots);
        assert!(cli.should_show_progress());
        assert_eq!(cli.default_log_level(), "info");
    }

    // Tests every flag and repeated species
    // Verified by keeping only the last species
    #[test]
    fn test_cli_parse_all_args() {
        let cli = Cli::parse_from([
            "camtrap", "study.json", "-o", "results", "-s", "Impala", "--species", "zebra",
            "--no-plots", "-q",
        ]);

        assert_eq!(cli.output, Some(PathBuf::from("results")));
        assert_eq!(cli.species, vec!["Impala", "zebra"]);
        assert!(!cli.should_show_progress());
        assert_eq!(cli.default_log_level(), "warn");

        let options = cli.pipeline_options();
        assert_eq!(options.species, vec!["impala", "zebra"]);
        assert_eq!(options.output_dir, Some(PathBuf::from("results")));
        assert!(!options.render_maps);
        assert!(!options.show_progress);
    }

    // Tests verbose raises the default log level
    // Verified by ignoring the verbose flag
    #[test]
    fn test_verbose_log_level() {
        let cli = Cli::parse_from(["camtrap", "study.json", "-v"]);
        assert_eq!(cli.default_log_level(), "debug");
    }

    // Tests quiet and verbose together are rejected
    // Verified by removing the conflict
    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["camtrap", "study.json", "-q", "-v"]).is_err());
    }

    // Tests a missing manifest fails before any stage runs
    // Verified by creating an empty default manifest
    #[test]
    fn test_run_missing_manifest() {
        let cli = Cli::parse_from(["camtrap", "does/not/exist.json", "-q"]);
        let error = run(&cli).unwrap_err();
        assert!(error.to_string().contains("exist.json"));
    }
}
