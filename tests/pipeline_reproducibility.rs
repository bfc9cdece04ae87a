mod support;

use std::path::Path;

use monster_svc::config::{self, ServiceConfig};
use monster_svc::dataset::{ColumnSelector, DatasetSpec, load_dataset};
use monster_svc::model::{ModelWrapper, parse_request};
use monster_svc::registry::{FolderRegistry, ModelRegistry};
use monster_svc::startup;
use support::env::AppHomeGuard;
use support::monsters::{write_monsters_arrow, write_monsters_csv};
use tempfile::tempdir;

fn config_for(dataset: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.dataset.path = dataset.to_path_buf();
    config
}

#[test]
fn hundred_rows_train_on_eighty_and_predict_known_labels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scooby-do.arrow");
    write_monsters_arrow(&path, 100);

    let trained = startup::train_from_config(&config_for(&path)).unwrap();
    let summary = trained.wrapper.metadata().training.clone().unwrap();
    assert_eq!(summary.rows, 100);
    assert_eq!(summary.train_rows, 80);
    assert_eq!(summary.test_rows, 20);
    assert_eq!(summary.seed, 500);
    assert_eq!(trained.wrapper.pipeline().classes(), ["fake", "real"]);

    let dataset = load_dataset(&path, &config_for(&path).dataset_spec()).unwrap();
    for index in [0, 17, 42, 99] {
        let row = dataset.row(index).unwrap();
        let body = serde_json::json!([row.features[0], row.features[1]]);
        let labels = trained.wrapper.predict(&parse_request(body).unwrap()).unwrap();
        assert!(labels[0] == "real" || labels[0] == "fake");
    }
}

#[test]
fn restart_reproduces_the_same_model() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scooby-do.arrow");
    write_monsters_arrow(&path, 100);
    let config = config_for(&path);

    let first = startup::train_from_config(&config).unwrap().wrapper;
    let second = startup::train_from_config(&config).unwrap().wrapper;
    assert_eq!(first.pipeline(), second.pipeline());
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(
        first.pipeline().scaler().mean(),
        second.pipeline().scaler().mean()
    );
}

#[test]
fn csv_and_arrow_copies_train_identically() {
    let dir = tempdir().unwrap();
    let arrow_path = dir.path().join("monsters.arrow");
    let csv_path = dir.path().join("monsters.csv");
    write_monsters_arrow(&arrow_path, 60);
    write_monsters_csv(&csv_path, 60);

    let from_arrow = startup::train_from_config(&config_for(&arrow_path)).unwrap();
    let from_csv = startup::train_from_config(&config_for(&csv_path)).unwrap();
    assert_eq!(from_arrow.wrapper.pipeline(), from_csv.wrapper.pipeline());
}

#[test]
fn registry_round_trip_serves_the_saved_model() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scooby-do.arrow");
    write_monsters_arrow(&path, 100);
    let registry = FolderRegistry::new(dir.path().join("models"));

    let mut config = config_for(&path);
    config.registry.folder = Some(registry.root().to_path_buf());
    config.registry.save_on_startup = true;
    let saved = startup::prepare_model(&config, Some(&registry)).unwrap();
    let version = saved.version().unwrap().to_string();

    std::fs::remove_file(&path).unwrap();
    config.registry.save_on_startup = false;
    config.registry.load_existing = true;
    let loaded = startup::prepare_model(&config, Some(&registry)).unwrap();
    assert_eq!(loaded.version(), Some(version.as_str()));
    assert_eq!(loaded.fingerprint(), saved.fingerprint());
    assert_eq!(loaded.prototype(), saved.prototype());
    assert_eq!(registry.versions(saved.name()).unwrap(), vec![version]);

    let exported = saved.to_json_pretty().unwrap();
    let restored = ModelWrapper::from_json_slice(exported.as_bytes()).unwrap();
    assert_eq!(restored.pipeline(), loaded.pipeline());
}

#[test]
fn config_in_app_dir_selects_columns_by_name() {
    let home = tempdir().unwrap();
    let _guard = AppHomeGuard::set(home.path().to_path_buf());
    let app_dir = home.path().join(".monster-svc");
    std::fs::create_dir_all(&app_dir).unwrap();
    write_monsters_csv(&app_dir.join("episodes.csv"), 40);
    std::fs::write(
        app_dir.join(config::CONFIG_FILE_NAME),
        r#"
        [dataset]
        path = "episodes.csv"
        feature_columns = ["engagement", "imdb"]
        label_column = "monster_real"

        [training]
        test_fraction = 0.25
        "#,
    )
    .unwrap();

    let config = config::load_or_default().unwrap();
    assert_eq!(config.dataset.path, app_dir.join("episodes.csv"));
    assert_eq!(
        config.dataset_spec(),
        DatasetSpec {
            feature_columns: vec![
                ColumnSelector::Name("engagement".into()),
                ColumnSelector::Name("imdb".into())
            ],
            label_column: ColumnSelector::Name("monster_real".into()),
        }
    );
    let trained = startup::train_from_config(&config).unwrap();
    assert_eq!(
        trained.wrapper.prototype().feature_names(),
        ["engagement", "imdb"]
    );
    assert_eq!(trained.evaluation.rows, 10);
}
