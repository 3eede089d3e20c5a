pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CROPLEDGER CONFIGURATION
# =============================================================================
# This file configures the traceability ledger, its storage backend and how
# change notifications are delivered.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/cropledger/config.yml
#   3. /etc/cropledger/config.yml
#
# Values may reference environment variables with $env{VAR_NAME}.

# =============================================================================
# LEDGER
# =============================================================================
# owner and operators seed access control the first time a store is opened.
# Afterwards the persisted roles win; change them with set_operator and
# transfer_ownership commands instead of editing this file.

ledger:
  owner: farm-admin
  operators: []
  # Reject reuse of a batch id and edits of log ids that were never issued.
  # When false, a reused batch id overwrites the old batch and an unknown log
  # id edits an empty record.
  strict_existence: true
  # Which operations the pause switch blocks:
  #   batch_creation  - only create_batch
  #   all_mutations   - every record create/edit/deactivate
  pause_scope: batch_creation
  # Maximum length of free-text fields (0 disables the check)
  max_string_length: 256

# =============================================================================
# STORAGE
# =============================================================================

storage:
  # 'duckdb' persists to a database file, 'memory' keeps state in-process
  backend: duckdb
  path: ~/.local/share/cropledger/ledger.duckdb

# =============================================================================
# NOTIFICATIONS
# =============================================================================

notifications:
  # Write every ledger event to the log at info level
  log_events: true
  # Capacity of the in-process event channel; events beyond it are dropped
  buffer_limit: 1024
"#
    .to_string()
}
