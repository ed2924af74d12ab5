//! Runtime configuration, loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::runtime::sysvar::Rent;

/// Top-level instruction plus four levels of nested calls.
pub const DEFAULT_MAX_INSTRUCTION_STACK_DEPTH: usize = 5;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum instruction stack height, the top-level instruction counting as 1.
    pub max_instruction_stack_depth: usize,
    pub rent: Rent,
    /// Clock value of a freshly created bank.
    pub genesis_unix_timestamp: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_instruction_stack_depth: DEFAULT_MAX_INSTRUCTION_STACK_DEPTH,
            rent: Rent::default(),
            genesis_unix_timestamp: 0,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_instruction_stack_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_instruction_stack_depth must be at least 1".to_string(),
            ));
        }
        if self.genesis_unix_timestamp < 0 {
            return Err(ConfigError::Invalid(
                "genesis_unix_timestamp must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
