use super::{open_ledger, require_config, CliError};
use crate::ledger::access::Operation;
use crate::ledger::model::{
    ActivityLogEditInput, ActivityLogInput, BatchInput, Identity, SustainabilityLogEditInput,
    SustainabilityLogInput,
};
use crate::config::types::Config;
use crate::ledger::events::LedgerEvent;
use crate::ledger::{Ledger, LedgerError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// A batch of ledger commands read from YAML.
///
/// ```yaml
/// caller: alice
/// steps:
///   - op: create_batch
///     batch_id: B1
///     crop_name: Rice
///     ...
///   - op: pause
///     caller: bob
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Caller for steps that do not name their own
    #[serde(default)]
    pub caller: Option<Identity>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub caller: Option<Identity>,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateBatch(BatchInput),
    EditBatch(BatchInput),
    DeactivateBatch { batch_id: String },
    CreateActivityLog(ActivityLogInput),
    EditActivityLog(ActivityLogEditInput),
    CreateSustainabilityLog(SustainabilityLogInput),
    EditSustainabilityLog(SustainabilityLogEditInput),
    SetOperator { operator: Identity, enabled: bool },
    Pause,
    Unpause,
    TransferOwnership { new_owner: Identity },
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::CreateBatch(_) => Operation::CreateBatch,
            Command::EditBatch(_) => Operation::EditBatch,
            Command::DeactivateBatch { .. } => Operation::DeactivateBatch,
            Command::CreateActivityLog(_) => Operation::CreateActivityLog,
            Command::EditActivityLog(_) => Operation::EditActivityLog,
            Command::CreateSustainabilityLog(_) => Operation::CreateSustainabilityLog,
            Command::EditSustainabilityLog(_) => Operation::EditSustainabilityLog,
            Command::SetOperator { .. } => Operation::SetOperator,
            Command::Pause => Operation::Pause,
            Command::Unpause => Operation::Unpause,
            Command::TransferOwnership { .. } => Operation::TransferOwnership,
        }
    }
}

/// Result of one script step, printed as a JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: Operation,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    fn success(step: usize, op: Operation, result: Value) -> Self {
        Self {
            step,
            op,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(step: usize, op: Operation, error: String) -> Self {
        Self {
            step,
            op,
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

pub fn parse_script(yaml: &str) -> Result<Script, CliError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub async fn execute(
    ledger: &Ledger,
    caller: &Identity,
    command: Command,
) -> Result<Value, LedgerError> {
    let result = match command {
        Command::CreateBatch(input) => {
            json!({ "batch_id": ledger.create_batch(caller, input).await? })
        }
        Command::EditBatch(input) => {
            ledger.edit_batch(caller, input).await?;
            Value::Null
        }
        Command::DeactivateBatch { batch_id } => {
            ledger.deactivate_batch(caller, &batch_id).await?;
            Value::Null
        }
        Command::CreateActivityLog(input) => {
            json!({ "id": ledger.create_activity_log(caller, input).await? })
        }
        Command::EditActivityLog(input) => {
            ledger.edit_activity_log(caller, input).await?;
            Value::Null
        }
        Command::CreateSustainabilityLog(input) => {
            json!({ "id": ledger.create_sustainability_log(caller, input).await? })
        }
        Command::EditSustainabilityLog(input) => {
            ledger.edit_sustainability_log(caller, input).await?;
            Value::Null
        }
        Command::SetOperator { operator, enabled } => {
            ledger.set_operator(caller, operator, enabled).await?;
            Value::Null
        }
        Command::Pause => {
            ledger.pause(caller).await?;
            Value::Null
        }
        Command::Unpause => {
            ledger.unpause(caller).await?;
            Value::Null
        }
        Command::TransferOwnership { new_owner } => {
            ledger.transfer_ownership(caller, new_owner).await?;
            Value::Null
        }
    };
    Ok(result)
}

/// Run every step in order. A failed step is recorded and, unless
/// `stop_on_error` is set, the remaining steps still run.
pub async fn run_script(
    ledger: &Ledger,
    script: Script,
    default_caller: Option<&Identity>,
    stop_on_error: bool,
) -> Vec<StepOutcome> {
    let script_caller = script.caller;
    let mut outcomes = Vec::with_capacity(script.steps.len());

    for (i, step) in script.steps.into_iter().enumerate() {
        let op = step.command.operation();
        let caller = step
            .caller
            .or_else(|| script_caller.clone())
            .or_else(|| default_caller.cloned());

        let outcome = match caller {
            Some(caller) => match execute(ledger, &caller, step.command).await {
                Ok(result) => StepOutcome::success(i, op, result),
                Err(e) => StepOutcome::failure(i, op, e.to_string()),
            },
            None => StepOutcome::failure(i, op, "no caller given for step".to_string()),
        };

        let failed = !outcome.ok;
        outcomes.push(outcome);
        if failed && stop_on_error {
            warn!(step = i, op = %op, "Stopping script after failed step");
            break;
        }
    }

    outcomes
}

/// Step outcomes plus the events captured while the script ran.
#[derive(Debug, Default)]
pub struct ScriptReport {
    pub outcomes: Vec<StepOutcome>,
    pub events: Vec<LedgerEvent>,
}

impl ScriptReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.ok).count()
    }
}

/// Open the configured ledger and run `script` against it.
///
/// Each step emits at most one event, so the capture channel holds at least
/// one slot per step and nothing is dropped before it is drained.
pub async fn apply_script(
    config: &Config,
    script: Script,
    caller: Option<&Identity>,
    stop_on_error: bool,
    capture_events: bool,
) -> Result<ScriptReport, CliError> {
    let steps = script.steps.len();
    let capacity = capture_events.then(|| config.notifications.buffer_limit.max(steps));
    let mut opened = open_ledger(config, capacity).await?;

    let outcomes = run_script(&opened.ledger, script, caller, stop_on_error).await;

    let mut events = Vec::new();
    if let Some(rx) = opened.events.as_mut() {
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
    }

    Ok(ScriptReport { outcomes, events })
}

pub async fn apply(
    config_path: Option<&Path>,
    script_path: &Path,
    caller: Option<Identity>,
    stop_on_error: bool,
    show_events: bool,
) -> Result<(), CliError> {
    let config = require_config(config_path)?;
    let yaml = fs::read_to_string(script_path).map_err(|source| CliError::Read {
        path: script_path.to_path_buf(),
        source,
    })?;
    let script = parse_script(&yaml)?;
    let total = script.steps.len();
    info!(script = %script_path.display(), steps = total, "Applying script");

    let report = apply_script(&config, script, caller.as_ref(), stop_on_error, show_events).await?;
    for outcome in &report.outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }
    for event in &report.events {
        println!("{}", serde_json::to_string(event)?);
    }

    let failed = report.failed();
    if failed > 0 {
        return Err(CliError::StepsFailed { failed, total });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let yaml = r#"
caller: alice
steps:
  - op: create_batch
    batch_id: B1
    crop_name: Rice
    start: 2024-03-01T00:00:00Z
    end: 2024-06-01T00:00:00Z
    farmer: A
    expected_yield: 1000
  - op: create_activity_log
    batch_id: B1
    activity_name: Plowing
    start:
      date: 2024-03-02T00:00:00Z
      hour: 8
      minute: 0
    end:
      date: 2024-03-02T00:00:00Z
      hour: 10
      minute: 30
    area_covered: 5
  - op: pause
    caller: bob
  - op: set_operator
    operator: carol
    enabled: true
"#;
        let script = parse_script(yaml).unwrap();

        assert_eq!(script.caller, Some(Identity::from("alice")));
        assert_eq!(script.steps.len(), 4);
        match &script.steps[0].command {
            Command::CreateBatch(input) => {
                assert_eq!(input.batch_id, "B1");
                assert_eq!(input.expected_yield, 1000);
                assert_eq!(input.status, "");
            }
            other => panic!("unexpected command {:?}", other),
        }
        match &script.steps[1].command {
            Command::CreateActivityLog(input) => {
                assert_eq!(input.end.hour, 10);
                assert_eq!(input.end.minute, 30);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(script.steps[2].caller, Some(Identity::from("bob")));
        assert_eq!(script.steps[2].command.operation(), Operation::Pause);
        assert_eq!(script.steps[3].command.operation(), Operation::SetOperator);
    }

    #[test]
    fn test_unknown_op_rejected() {
        let yaml = "steps:\n  - op: delete_everything\n";
        assert!(parse_script(yaml).is_err());
    }

    #[test]
    fn test_outcome_json() {
        let outcome = StepOutcome::failure(2, Operation::EditBatch, "nope".to_string());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["op"], "edit_batch");
        assert_eq!(json["ok"], false);
        assert!(json.get("result").is_none());
    }
}
