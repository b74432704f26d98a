//! Interpreter configuration
//!
//! ## Configuration (Environment Variables)
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STATEVM_MAX_LOOP` | `2500` | Passes a loop block may make before it is aborted |
//! | `STATEVM_MAX_CALL_DEPTH` | `128` | Nested function calls allowed per tick |
//! | `STATEVM_STACK_CAPACITY` | `64` | Initial operand stack capacity |
//! | `STATEVM_ARENA_CAPACITY` | `256` | Initial variable arena size |
//!
//! The same keys (lowercase, without the prefix) can be given in a TOML file:
//!
//! ```toml
//! max_loop_iterations = 5000
//! max_call_depth = 64
//! ```
//!
//! Environment variables override file values; unparsable or zero values
//! are ignored.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use statevm_core::{DEFAULT_ARENA_CAPACITY, DEFAULT_STACK_CAPACITY};
use std::path::Path;

pub const DEFAULT_MAX_LOOP_ITERATIONS: u32 = 2500;
pub const DEFAULT_MAX_CALL_DEPTH: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    /// Passes a loop block may make before it is aborted with a diagnostic
    pub max_loop_iterations: u32,
    /// Nested function calls allowed before the tick is aborted
    pub max_call_depth: u32,
    pub stack_capacity: usize,
    pub arena_capacity: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            stack_capacity: DEFAULT_STACK_CAPACITY,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
        }
    }
}

fn env_positive<T: std::str::FromStr + PartialOrd + Default>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|v| *v > T::default())
}

impl VmConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_positive("STATEVM_MAX_LOOP") {
            self.max_loop_iterations = v;
        }
        if let Some(v) = env_positive("STATEVM_MAX_CALL_DEPTH") {
            self.max_call_depth = v;
        }
        if let Some(v) = env_positive("STATEVM_STACK_CAPACITY") {
            self.stack_capacity = v;
        }
        if let Some(v) = env_positive("STATEVM_ARENA_CAPACITY") {
            self.arena_capacity = v;
        }
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_toml_str(&source)?.with_env_overrides())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const KEYS: [&str; 4] = [
        "STATEVM_MAX_LOOP",
        "STATEVM_MAX_CALL_DEPTH",
        "STATEVM_STACK_CAPACITY",
        "STATEVM_ARENA_CAPACITY",
    ];

    fn save_env() -> Vec<(&'static str, Option<String>)> {
        KEYS.iter().map(|k| (*k, std::env::var(k).ok())).collect()
    }

    fn restore_env(saved: Vec<(&'static str, Option<String>)>) {
        // SAFETY: tests touching the environment are #[serial]
        unsafe {
            for (key, orig) in saved {
                match orig {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_loop_iterations, 2500);
        assert_eq!(config.max_call_depth, 128);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        let saved = save_env();
        // SAFETY: serialized with every other environment test
        unsafe {
            std::env::set_var("STATEVM_MAX_LOOP", "10");
            std::env::set_var("STATEVM_MAX_CALL_DEPTH", "not_a_number");
            std::env::set_var("STATEVM_STACK_CAPACITY", "0");
            std::env::remove_var("STATEVM_ARENA_CAPACITY");
        }

        let config = VmConfig::from_env();
        assert_eq!(config.max_loop_iterations, 10);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert_eq!(config.stack_capacity, DEFAULT_STACK_CAPACITY);
        assert_eq!(config.arena_capacity, DEFAULT_ARENA_CAPACITY);

        restore_env(saved);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = VmConfig::from_toml_str("max_loop_iterations = 7\n").unwrap();
        assert_eq!(config.max_loop_iterations, 7);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(VmConfig::from_toml_str("max_loops = 7\n").is_err());
    }

    #[test]
    #[serial]
    fn test_load_file_then_env() {
        let saved = save_env();
        // SAFETY: serialized with every other environment test
        unsafe {
            for key in KEYS {
                std::env::remove_var(key);
            }
            std::env::set_var("STATEVM_MAX_CALL_DEPTH", "9");
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_loop_iterations = 40").unwrap();
        writeln!(file, "max_call_depth = 3").unwrap();

        let config = VmConfig::load(file.path()).unwrap();
        assert_eq!(config.max_loop_iterations, 40);
        assert_eq!(config.max_call_depth, 9);

        restore_env(saved);
    }

    #[test]
    fn test_load_missing_file() {
        let err = VmConfig::load(Path::new("/nonexistent/statevm.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
