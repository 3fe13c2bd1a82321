//! Data-file load behaviour and error-message tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use swatch_core::{ConfigStore, Locations, SettingValue, StoreError, DATA_FILE_NAME};

fn store_in(dir: &assert_fs::TempDir) -> ConfigStore {
    ConfigStore::new(dir.path().join(DATA_FILE_NAME))
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn missing_data_file_is_not_found_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = store_in(&dir).load().unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("data file not found"));
    assert!(err.to_string().contains(DATA_FILE_NAME));
}

#[test]
fn corrupt_yaml_is_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child(DATA_FILE_NAME)
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = store_in(&dir).load().unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains(DATA_FILE_NAME), "must contain file path, got: {err}");
}

#[rstest]
#[case("sequence_root", "- gruvbox\n- nord\n")]
#[case("nested_mapping", "current_theme:\n  name: gruvbox\n")]
#[case("list_value", "current_theme: [gruvbox, nord]\n")]
#[case("null_value", "current_theme: ~\n")]
fn non_scalar_documents_are_rejected(#[case] label: &str, #[case] body: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child(DATA_FILE_NAME).write_str(body).expect("write");
    let err = store_in(&dir).load().unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "[{label}] got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Successful loads
// ---------------------------------------------------------------------------

#[rstest]
#[case("current_theme: gruvbox\n", "current_theme", SettingValue::from("gruvbox"))]
#[case("font_size: \"14\"\n", "font_size", SettingValue::from("14"))]
#[case("font_size: 14\n", "font_size", SettingValue::Integer(14))]
#[case("transparent: true\n", "transparent", SettingValue::Bool(true))]
fn scalar_values_load(#[case] body: &str, #[case] key: &str, #[case] expected: SettingValue) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child(DATA_FILE_NAME).write_str(body).expect("write");
    let settings = store_in(&dir).load().expect("load");
    assert_eq!(settings.get(key), Some(&expected));
}

#[test]
fn store_at_locations_reads_config_dir() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let locations = Locations::at(home.path());
    let store = ConfigStore::at(&locations);

    let rel = std::path::Path::new(".config").join("swatch").join(DATA_FILE_NAME);
    home.child(&rel).write_str("current_theme: catppuccin\n").expect("write");
    home.child(&rel).assert(predicate::path::exists());

    let settings = store.load().expect("load");
    assert_eq!(
        settings.get("current_theme").and_then(SettingValue::as_str),
        Some("catppuccin")
    );
}

#[test]
fn load_does_not_modify_the_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let body = "current_theme: gruvbox\n# trailing comment\n";
    dir.child(DATA_FILE_NAME).write_str(body).expect("write");
    store_in(&dir).load().expect("load");
    dir.child(DATA_FILE_NAME).assert(body);
}
