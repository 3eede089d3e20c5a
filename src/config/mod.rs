pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{Config, LedgerConfig, NotificationConfig, StorageBackend, StorageConfig};

const ENV_VAR_PATTERN: &str = r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}";

pub(crate) fn env_var_regex() -> Regex {
    Regex::new(ENV_VAR_PATTERN).expect("env var pattern is a valid regex")
}

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax; unset variables are left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    env_var_regex()
        .replace_all(text, |caps: &regex::Captures| {
            let whole = &caps[0];
            std::env::var(&caps[1]).unwrap_or_else(|_| whole.to_string())
        })
        .to_string()
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path. Returns the first existing path from:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ~/.config/cropledger/config.yml
/// 3. /etc/cropledger/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/cropledger/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/cropledger/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_expand_env_vars_single() {
        std::env::set_var("CROPLEDGER_TEST_VAR", "test_value");
        let result = expand_env_vars("path/$env{CROPLEDGER_TEST_VAR}/file");
        assert_eq!(result, "path/test_value/file");
        std::env::remove_var("CROPLEDGER_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_unset() {
        let result = expand_env_vars("path/$env{CROPLEDGER_NONEXISTENT_VAR}/file");
        assert_eq!(result, "path/$env{CROPLEDGER_NONEXISTENT_VAR}/file");
    }

    #[test]
    fn test_expand_env_vars_no_expansion() {
        assert_eq!(expand_env_vars("plain/path"), "plain/path");
    }

    #[test]
    fn test_expand_tilde_with_path() {
        let expanded = expand_tilde(Path::new("~/ledger/data.duckdb"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("ledger/data.duckdb"));
        }
    }

    #[test]
    fn test_expand_tilde_no_expansion() {
        assert_eq!(
            expand_tilde(Path::new("/absolute/path")),
            Path::new("/absolute/path")
        );
        assert_eq!(
            expand_tilde(Path::new("relative/path")),
            Path::new("relative/path")
        );
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let resolved = resolve_config_path(Some(Path::new("/tmp/custom.yml")));
        assert_eq!(resolved, Some(PathBuf::from("/tmp/custom.yml")));
    }
}
