//! Engine construction options and their persistence.
//!
//! Options are device tuning, not runtime policy: they are fixed at engine
//! construction and typically come from a per-device JSON file.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fps::Fps;

/// Tuning knobs fixed at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Candidates at or above this rate are never selected on behalf of
    /// content slower than half of it. `None` disables the gate.
    #[serde(default)]
    pub frame_rate_multiple_threshold: Option<Fps>,
    /// Allow per-app throttling to divisors of the display rate.
    #[serde(default)]
    pub enable_frame_rate_override: bool,
}

impl EngineOptions {
    /// Validate option values. Returns a descriptive error for a
    /// non-positive threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.frame_rate_multiple_threshold {
            if !threshold.is_valid() {
                return Err(ConfigError::ValidationError(format!(
                    "frame_rate_multiple_threshold ({threshold}) must be a positive rate"
                )));
            }
        }
        Ok(())
    }

    /// Load options from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(ConfigError::ReadFailed)?;
        let options: EngineOptions = serde_json::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Save options atomically: write to a temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
