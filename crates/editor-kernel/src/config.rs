//! Tunable policy for the editing kernel.
//!
//! ```
//! use editor_kernel::CoreConfig;
//!
//! let config = CoreConfig::from_toml_str(
//!     r#"
//!     tab_width = 8
//!     [undo]
//!     checkpoint_interval = 20
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.tab_width, 8);
//! assert_eq!(config.undo.checkpoint_interval, 20);
//! assert_eq!(config.undo.checkpoint_bytes, 4096);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Document`](crate::Document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Undo history policy
    pub undo: UndoConfig,
    /// Search policy
    pub search: SearchConfig,
    /// Tab stop width used for display columns
    pub tab_width: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            undo: UndoConfig::default(),
            search: SearchConfig::default(),
            tab_width: 4,
        }
    }
}

impl CoreConfig {
    /// Parse and validate a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the kernel cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tab_width == 0 {
            return Err(ConfigError::Invalid {
                field: "tab_width",
                reason: "must be at least 1",
            });
        }
        self.undo.validate()?;
        self.search.validate()
    }
}

/// When the undo tree stores full checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UndoConfig {
    /// Edits between checkpoints
    pub checkpoint_interval: usize,
    /// Changed bytes between checkpoints
    pub checkpoint_bytes: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 50,
            checkpoint_bytes: 4096,
        }
    }
}

impl UndoConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "undo.checkpoint_interval",
                reason: "must be at least 1",
            });
        }
        if self.checkpoint_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "undo.checkpoint_bytes",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// Search behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Backtracking steps allowed per match attempt
    pub backtrack_limit: u64,
    /// Whether searches wrap around the ends of the text
    pub wrap_scan: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backtrack_limit: monster_regex::DEFAULT_BACKTRACK_LIMIT,
            wrap_scan: true,
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.backtrack_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "search.backtrack_limit",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
