use std::path::Path;

use adfatigue_core::config::PipelineConfig;
use adfatigue_core::PipelineError;
use anyhow::Result;

#[test]
fn defaults_match_documented_values() {
    let config = PipelineConfig::default();
    assert_eq!(config.cleaning.rolling_window, 7);
    assert_eq!(config.cleaning.fatigue_lag, 7);
    assert_eq!(config.cleaning.clip_sigma, 3.0);
    assert_eq!(config.cleaning.test_fraction, 0.2);
    assert_eq!(config.training.n_trees, 100);
    assert_eq!(config.training.max_depth, 5);
    assert_eq!(config.detection.threshold, -70.0);
    assert!(!config.run.skip_completed);
    assert_eq!(
        config.paths.model,
        Path::new("data/models/ad_fatigue_model.json")
    );
    assert!(config.validate().is_ok());
}

#[test]
fn partial_toml_keeps_defaults() -> Result<()> {
    let config = PipelineConfig::from_toml(
        r#"
        [detection]
        threshold = -40.0

        [training]
        n_trees = 12

        [paths]
        raw_data = "/tmp/raw.csv"
        "#,
    )?;
    assert_eq!(config.detection.threshold, -40.0);
    assert_eq!(config.training.n_trees, 12);
    assert_eq!(config.training.max_depth, 5);
    assert_eq!(config.paths.raw_data, Path::new("/tmp/raw.csv"));
    assert_eq!(
        config.paths.train_table,
        Path::new("data/processed/train_campaign_performance.csv")
    );
    Ok(())
}

#[test]
fn invalid_values_are_all_reported() {
    let err = PipelineConfig::from_toml(
        r#"
        [cleaning]
        test_fraction = 1.5
        rolling_window = 0
        "#,
    )
    .unwrap_err();
    let PipelineError::Config(message) = err else {
        panic!("expected config error, got {err:?}");
    };
    assert!(message.contains("cleaning.test_fraction"));
    assert!(message.contains("cleaning.rolling_window"));
}

#[test]
fn malformed_toml_is_an_error() {
    assert!(matches!(
        PipelineConfig::from_toml("[detection\nthreshold = "),
        Err(PipelineError::Toml(_))
    ));
}

#[test]
fn explicit_config_path_must_exist() {
    let err = PipelineConfig::load(Some(Path::new("/nonexistent/adfatigue.toml"))).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn data_dir_roots_every_path() {
    let config = PipelineConfig::with_data_dir(Path::new("/srv/ads"));
    assert!(config.paths.raw_data.starts_with("/srv/ads"));
    assert!(config.paths.export_dir.starts_with("/srv/ads"));
    assert!(config.paths.manifest_dir.starts_with("/srv/ads"));
}
