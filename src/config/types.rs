use crate::ledger::access::PauseScope;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Owner identity used when the ledger is first created
    pub owner: String,
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default = "default_strict_existence")]
    pub strict_existence: bool,
    #[serde(default)]
    pub pause_scope: PauseScope,
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,
}

fn default_strict_existence() -> bool {
    true
}

fn default_max_string_length() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Duckdb,
    #[default]
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_log_events")]
    pub log_events: bool,
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            log_events: default_log_events(),
            buffer_limit: default_buffer_limit(),
        }
    }
}

fn default_log_events() -> bool {
    true
}

fn default_buffer_limit() -> usize {
    1024
}
