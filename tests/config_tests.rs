use cropledger::config::types::StorageBackend;
use cropledger::config::{generate::generate_starter_config, load_config, ConfigError};
use cropledger::ledger::PauseScope;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.ledger.owner, "farm-admin");
    assert!(config.ledger.operators.is_empty());
    assert_eq!(config.ledger.pause_scope, PauseScope::BatchCreation);
    assert_eq!(config.storage.backend, StorageBackend::Duckdb);
    assert!(config.notifications.log_events);
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = load_config(&temp_dir.path().join("absent.yml"));

    match result {
        Err(ConfigError::Io(e)) => assert!(e.to_string().contains("absent.yml")),
        other => panic!("expected io error, got {:?}", other),
    }
}

#[test]
fn test_missing_owner_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, "storage:\n  backend: memory\n").unwrap();

    let err = load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("config.yml"));
}

#[test]
fn test_duckdb_backend_requires_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        "ledger:\n  owner: alice\nstorage:\n  backend: duckdb\n",
    )
    .unwrap();

    match load_config(&config_path) {
        Err(ConfigError::ValidationList(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("storage.path"));
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}
