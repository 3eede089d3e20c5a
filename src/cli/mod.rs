pub mod apply;
pub mod config;
pub mod history;

use crate::config::parse::{load_config, ConfigError};
use crate::config::types::{Config, StorageBackend};
use crate::ledger::events::{ChannelSink, EventSink, FanoutSink, LedgerEvent, NullSink, TracingSink};
use crate::ledger::{Ledger, LedgerError, LedgerSettings};
use crate::storage::duckdb::DuckDbStorage;
use crate::storage::memory::MemoryStorage;
use crate::storage::traits::{Storage, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse script: {0}")]
    Script(#[from] serde_yaml::Error),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("no config file found (searched ~/.config/cropledger/config.yml and /etc/cropledger/config.yml); use --config or run 'cropledger config init'")]
    ConfigNotFound,

    #[error("invalid key '{0}': log keys are numeric ids")]
    InvalidKey(String),

    #[error("{failed} of {total} steps failed")]
    StepsFailed { failed: usize, total: usize },
}

/// A ledger opened from config, plus the event stream when one was requested.
pub struct OpenedLedger {
    pub ledger: Ledger,
    pub events: Option<mpsc::Receiver<LedgerEvent>>,
}

pub fn require_config(path: Option<&Path>) -> Result<Config, CliError> {
    let path = path.ok_or(CliError::ConfigNotFound)?;
    info!(config_path = %path.display(), "Loading configuration");
    Ok(load_config(path)?)
}

pub fn open_storage(config: &Config) -> Result<Arc<dyn Storage>, CliError> {
    match (config.storage.backend, config.storage.path.as_ref()) {
        (StorageBackend::Duckdb, Some(path)) => {
            info!(path = %path.display(), "Opening DuckDB storage");
            Ok(Arc::new(DuckDbStorage::new(path)?))
        }
        (StorageBackend::Duckdb, None) => Err(ConfigError::Validation(
            "storage.path is required when storage.backend is 'duckdb'".to_string(),
        )
        .into()),
        (StorageBackend::Memory, _) => {
            info!("Using in-memory storage; state is discarded on exit");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

/// Open the configured ledger. With `capture_events` set to a capacity, the
/// caller receives every event through a bounded channel of that size.
pub async fn open_ledger(
    config: &Config,
    capture_events: Option<usize>,
) -> Result<OpenedLedger, CliError> {
    let storage = open_storage(config)?;

    let mut fanout = FanoutSink::new();
    if config.notifications.log_events {
        fanout = fanout.with(Arc::new(TracingSink));
    }
    let events = if let Some(capacity) = capture_events {
        let (sink, rx) = ChannelSink::new(capacity.max(1));
        fanout = fanout.with(Arc::new(sink));
        Some(rx)
    } else {
        None
    };

    let sink: Arc<dyn EventSink> = if fanout.is_empty() {
        Arc::new(NullSink)
    } else {
        Arc::new(fanout)
    };

    let ledger = Ledger::open(storage, LedgerSettings::from_config(&config.ledger), sink).await?;
    Ok(OpenedLedger { ledger, events })
}
