//! Tests for the alert loader.

use std::fs;

use tempfile::TempDir;

use super::*;

const VALID_ALERT_YAML: &str = r#"
id: test-alert
name: Test Alert
metric: email_volume
kind:
  type: anomaly
  algorithm:
    type: ewma
    span: 5
"#;

fn temp_loader() -> (TempDir, AlertLoader) {
    let dir = TempDir::new().expect("create tempdir");
    let loader = AlertLoader::new(dir.path().to_path_buf());
    (dir, loader)
}

fn loaded_ids(report: &LoadReport) -> Vec<&str> {
    report
        .results
        .iter()
        .filter_map(|r| match &r.status {
            LoadStatus::Loaded { alert_id } => Some(alert_id.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn load_alert_from_file() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("test-alert.yml");
    fs::write(&path, VALID_ALERT_YAML).unwrap();

    let def = loader.load_file(&path).unwrap();
    assert_eq!(def.id, "test-alert");
    assert_eq!(def.name, "Test Alert");
    assert_eq!(def.kind.label(), "anomaly");
}

#[test]
fn load_all_skips_dotfiles_and_non_yaml() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("alert1.yml"), VALID_ALERT_YAML).unwrap();
    fs::write(dir.path().join(".hidden.yml"), VALID_ALERT_YAML).unwrap();
    fs::write(dir.path().join("readme.txt"), "not an alert").unwrap();

    let report = loader.load_all().unwrap();
    let skipped = report
        .results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .count();

    assert_eq!(loaded_ids(&report), vec!["test-alert"]);
    assert_eq!(skipped, 2);
    assert_eq!(report.definitions.len(), 1);
}

#[test]
fn load_all_recursive_subdirectories() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("alert1.yaml"), VALID_ALERT_YAML).unwrap();

    let sub = dir.path().join("desk");
    fs::create_dir(&sub).unwrap();
    fs::write(
        sub.join("sub-alert.yml"),
        VALID_ALERT_YAML.replace("test-alert", "sub-alert"),
    )
    .unwrap();

    let report = loader.load_all().unwrap();
    assert_eq!(report.definitions.len(), 2);
    let ids = loaded_ids(&report);
    assert!(ids.contains(&"test-alert"));
    assert!(ids.contains(&"sub-alert"));
}

#[test]
fn parse_errors_do_not_abort_scan() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("a-good.yml"), VALID_ALERT_YAML).unwrap();
    fs::write(dir.path().join("b-broken.yml"), "id: [unclosed").unwrap();
    fs::write(
        dir.path().join("c-unknown-algo.yml"),
        VALID_ALERT_YAML
            .replace("test-alert", "other")
            .replace("type: ewma", "type: prophet"),
    )
    .unwrap();

    let report = loader.load_all().unwrap();
    assert_eq!(report.definitions.len(), 1);
    assert_eq!(report.failed(), 2);
}

#[test]
fn invalid_values_fail_validation() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("bad.yml");
    fs::write(&path, VALID_ALERT_YAML.replace("span: 5", "span: 0")).unwrap();

    match loader.load_file(&path) {
        Err(LoadError::Validation(msg)) => {
            assert!(msg.contains("test-alert"));
            assert!(msg.contains("kind.algorithm.span"));
        }
        other => panic!("expected Validation error, got {other:?}"),
    }
}

#[test]
fn duplicate_ids_first_file_wins() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("a.yml"), VALID_ALERT_YAML).unwrap();
    fs::write(
        dir.path().join("b.yml"),
        VALID_ALERT_YAML.replace("Test Alert", "Shadow"),
    )
    .unwrap();

    let report = loader.load_all().unwrap();
    assert_eq!(report.definitions.len(), 1);
    assert_eq!(report.definitions[0].name, "Test Alert");
    match &report.results[1].status {
        LoadStatus::Failed { error } => assert!(error.contains("duplicate alert id")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn missing_directory_is_empty() {
    let loader = AlertLoader::new("/nonexistent/mailpulse/alerts".into());
    let report = loader.load_all().unwrap();
    assert!(report.definitions.is_empty());
    assert!(report.results.is_empty());
}
