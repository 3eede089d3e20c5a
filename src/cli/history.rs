use super::{open_ledger, require_config, CliError};
use crate::ledger::history::HistoryEntry;
use crate::ledger::Ledger;
use clap::ValueEnum;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Batch,
    Activity,
    Sustainability,
}

fn parse_log_id(key: &str) -> Result<u64, CliError> {
    key.trim()
        .parse()
        .map_err(|_| CliError::InvalidKey(key.to_string()))
}

pub async fn record_history(
    ledger: &Ledger,
    kind: RecordKind,
    key: &str,
) -> Result<Vec<HistoryEntry>, CliError> {
    let entries = match kind {
        RecordKind::Batch => ledger.get_batch_history(key).await?,
        RecordKind::Activity => ledger.get_activity_log_history(parse_log_id(key)?).await?,
        RecordKind::Sustainability => {
            ledger
                .get_sustainability_log_history(parse_log_id(key)?)
                .await?
        }
    };
    Ok(entries)
}

/// The stored record as JSON, or `None` when nothing is stored under `key`.
pub async fn record_json(
    ledger: &Ledger,
    kind: RecordKind,
    key: &str,
) -> Result<Option<Value>, CliError> {
    let value = match kind {
        RecordKind::Batch => ledger
            .get_batch(key)
            .await?
            .map(serde_json::to_value)
            .transpose()?,
        RecordKind::Activity => ledger
            .get_activity_log(parse_log_id(key)?)
            .await?
            .map(serde_json::to_value)
            .transpose()?,
        RecordKind::Sustainability => ledger
            .get_sustainability_log(parse_log_id(key)?)
            .await?
            .map(serde_json::to_value)
            .transpose()?,
    };
    Ok(value)
}

/// Print one history line per entry, oldest first.
pub async fn history(
    config_path: Option<&Path>,
    kind: RecordKind,
    key: &str,
) -> Result<(), CliError> {
    let config = require_config(config_path)?;
    let opened = open_ledger(&config, None).await?;

    for entry in record_history(&opened.ledger, kind, key).await? {
        println!("{}", entry);
    }
    Ok(())
}

pub async fn show(config_path: Option<&Path>, kind: RecordKind, key: &str) -> Result<(), CliError> {
    let config = require_config(config_path)?;
    let opened = open_ledger(&config, None).await?;

    match record_json(&opened.ledger, kind, key).await? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => eprintln!("No record found for '{}'", key),
    }
    Ok(())
}
