//! TOML pipeline configuration.
//!
//! Every field has a default, so an empty file (or no file at all) describes
//! the stock pipeline: seven emotions, a shuffled 75/25 split, 22.05 kHz
//! features and the 370-epoch training schedule.

mod defaults;
mod io;
mod types;

pub use io::{CONFIG_FILE_NAME, config_path, load_from, load_or_default, save_to};
pub use types::{
    ConfigError, DEFAULT_MODEL_NAME, DatasetSettings, FeatureSettings, OutputSettings,
    PipelineConfig, ResolvedOutput,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FailurePolicy;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.dataset.shuffle);
        assert_eq!(config.dataset.split_ratio, 0.75);
        assert_eq!(config.features.sample_rate, 22_050);
        assert_eq!(config.training.epochs, 370);
        assert_eq!(config.vocabulary().unwrap().len(), 7);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[dataset]
root = "/data/emotions"
split_ratio = 0.8

[features]
failure_policy = "skip_and_log"
workers = 500

[training]
epochs = 12
"#,
        )
        .unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.dataset.root, PathBuf::from("/data/emotions"));
        assert_eq!(config.dataset.seed, 42);
        assert_eq!(config.features.failure_policy, FailurePolicy::SkipAndLog);
        assert_eq!(config.features.workers, Some(64));
        assert_eq!(config.training.epochs, 12);
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(
            config.index_path(),
            PathBuf::from("/data/emotions").join("index.csv")
        );
        assert_eq!(config.split_options().split_ratio, Some(0.8));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = PipelineConfig::default();
        config.dataset.emotions = vec!["calm".into(), "angry".into()];
        config.output.model_dir = Some(PathBuf::from("models/run1"));
        save_to(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = PipelineConfig::default();
        config.dataset.split_ratio = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfiguration(_))
        ));

        let mut config = PipelineConfig::default();
        config.dataset.emotions = vec!["sad".into(), "Sad".into()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfiguration(_))
        ));

        let mut config = PipelineConfig::default();
        config.training.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.features.sample_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dataset\nroot = 3").unwrap();
        match load_from(&path) {
            Err(ConfigError::ParseToml { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn explicit_output_paths_are_kept() {
        let mut config = PipelineConfig::default();
        config.output.model_dir = Some(PathBuf::from("out/model"));
        config.output.history_path = Some(PathBuf::from("out/h.json"));
        let resolved = config.resolve_output().unwrap();
        assert_eq!(resolved.model_dir, PathBuf::from("out/model"));
        assert_eq!(
            resolved.predictions_path,
            PathBuf::from("out/model").join("predictions.csv")
        );
        assert_eq!(resolved.history_path, PathBuf::from("out/h.json"));
    }
}
