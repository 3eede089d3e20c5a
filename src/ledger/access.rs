use super::model::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("caller '{caller}' is not authorized to {operation}")]
    Unauthorized { caller: Identity, operation: Operation },

    #[error("ledger is paused, cannot {0}")]
    Paused(Operation),

    #[error("identity must not be empty")]
    EmptyIdentity,
}

/// Who may invoke an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    OwnerOrOperator,
}

/// Every state-changing entry point of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateBatch,
    EditBatch,
    DeactivateBatch,
    CreateActivityLog,
    EditActivityLog,
    CreateSustainabilityLog,
    EditSustainabilityLog,
    SetOperator,
    Pause,
    Unpause,
    TransferOwnership,
}

impl Operation {
    pub fn required_role(self) -> Role {
        match self {
            Operation::Pause | Operation::Unpause => Role::OwnerOrOperator,
            _ => Role::Owner,
        }
    }

    /// Operations that write batch or log records.
    pub fn is_record_mutation(self) -> bool {
        matches!(
            self,
            Operation::CreateBatch
                | Operation::EditBatch
                | Operation::DeactivateBatch
                | Operation::CreateActivityLog
                | Operation::EditActivityLog
                | Operation::CreateSustainabilityLog
                | Operation::EditSustainabilityLog
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreateBatch => "create_batch",
            Operation::EditBatch => "edit_batch",
            Operation::DeactivateBatch => "deactivate_batch",
            Operation::CreateActivityLog => "create_activity_log",
            Operation::EditActivityLog => "edit_activity_log",
            Operation::CreateSustainabilityLog => "create_sustainability_log",
            Operation::EditSustainabilityLog => "edit_sustainability_log",
            Operation::SetOperator => "set_operator",
            Operation::Pause => "pause",
            Operation::Unpause => "unpause",
            Operation::TransferOwnership => "transfer_ownership",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which operations the pause switch blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseScope {
    /// Only batch creation is blocked while paused.
    #[default]
    BatchCreation,
    /// Every record mutation is blocked while paused.
    AllMutations,
}

impl PauseScope {
    pub fn gates(self, operation: Operation) -> bool {
        match self {
            PauseScope::BatchCreation => operation == Operation::CreateBatch,
            PauseScope::AllMutations => operation.is_record_mutation(),
        }
    }
}

/// Owner, operator set and pause switch.
///
/// Every mutating entry point asks [`AccessControl::authorize`] before doing
/// anything else, so role checks live in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControl {
    owner: Identity,
    operators: BTreeSet<Identity>,
    paused: bool,
}

impl AccessControl {
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            operators: BTreeSet::new(),
            paused: false,
        }
    }

    pub fn restore(owner: Identity, operators: BTreeSet<Identity>, paused: bool) -> Self {
        Self {
            owner,
            operators,
            paused,
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn operators(&self) -> &BTreeSet<Identity> {
        &self.operators
    }

    pub fn is_operator(&self, identity: &Identity) -> bool {
        self.operators.contains(identity)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_role(&self, caller: &Identity, role: Role) -> bool {
        match role {
            Role::Owner => caller == &self.owner,
            Role::OwnerOrOperator => caller == &self.owner || self.is_operator(caller),
        }
    }

    /// Role check first, then the pause switch.
    pub fn authorize(
        &self,
        caller: &Identity,
        operation: Operation,
        scope: PauseScope,
    ) -> Result<(), AccessError> {
        if !self.has_role(caller, operation.required_role()) {
            return Err(AccessError::Unauthorized {
                caller: caller.clone(),
                operation,
            });
        }
        if self.paused && scope.gates(operation) {
            return Err(AccessError::Paused(operation));
        }
        Ok(())
    }

    pub fn set_operator(&mut self, operator: Identity, enabled: bool) -> Result<(), AccessError> {
        if operator.is_empty() {
            return Err(AccessError::EmptyIdentity);
        }
        if enabled {
            self.operators.insert(operator);
        } else {
            self.operators.remove(&operator);
        }
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Hand ownership to `new_owner`. Returns the previous owner.
    pub fn transfer_ownership(&mut self, new_owner: Identity) -> Result<Identity, AccessError> {
        if new_owner.is_empty() {
            return Err(AccessError::EmptyIdentity);
        }
        Ok(std::mem::replace(&mut self.owner, new_owner))
    }
}
