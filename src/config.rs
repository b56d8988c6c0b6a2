//! Parser configuration.
//!
//! One knob matters operationally: the admitted-byte ceiling that bounds how
//! much peer payload the process will hold at once. The name cap rides along
//! for deployments that negotiate longer parameter names.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::throttle::PayloadBudget;
use crate::{PayloadError, Result, DEFAULT_BUDGET_CEILING, DEFAULT_NAME_CAP};

/// Tunables for payload admission and parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Ceiling on bytes held by all live contexts
    pub budget_ceiling: usize,
    /// Cap on a parameter name, in bytes
    pub name_cap: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            budget_ceiling: DEFAULT_BUDGET_CEILING,
            name_cap: DEFAULT_NAME_CAP,
        }
    }
}

impl ParserConfig {
    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            PayloadError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid YAML config: {}", e),
            ))
        })
    }

    /// Save configuration to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            PayloadError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("YAML serialization failed: {}", e),
            ))
        })
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.budget_ceiling == 0 {
            return Err(PayloadError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "budget_ceiling must be non-zero",
            )));
        }
        if self.name_cap == 0 {
            return Err(PayloadError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "name_cap must be non-zero",
            )));
        }
        Ok(())
    }

    /// Build the budget shared by every context this configuration governs.
    pub fn budget(&self) -> Arc<PayloadBudget> {
        Arc::new(PayloadBudget::new(self.budget_ceiling))
    }
}
