//! Administrative refresh-rate policy and its validation.
//!
//! A policy names the default mode (whose group and resolution anchor the
//! candidate sets), the primary range preferred under normal operation, the
//! wider app range reachable through explicit app votes, and whether the
//! arbiter may leave the default mode group.

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::fps::FpsRange;
use crate::mode::{DisplayModeId, ModeCatalog};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub default_mode: DisplayModeId,
    pub allow_group_switching: bool,
    /// Admissible rates for normal in-app rendering.
    pub primary_range: FpsRange,
    /// Admissible rates for explicit app requests; a superset of primary.
    pub app_range: FpsRange,
}

impl Policy {
    pub fn new(default_mode: DisplayModeId, primary_range: FpsRange, app_range: FpsRange) -> Self {
        Policy {
            default_mode,
            allow_group_switching: false,
            primary_range,
            app_range,
        }
    }

    /// A policy constraining both ranges to the same interval.
    pub fn with_range(default_mode: DisplayModeId, range: FpsRange) -> Self {
        Policy::new(default_mode, range, range)
    }

    /// The initial policy: any rate, anchored at the given mode.
    pub fn unrestricted(default_mode: DisplayModeId) -> Self {
        Policy::with_range(default_mode, FpsRange::unbounded())
    }

    /// Checks the policy against a catalog. The default mode must exist,
    /// its rate must satisfy the primary range, and the app range must
    /// contain the primary range.
    pub fn validate(&self, catalog: &ModeCatalog) -> Result<(), PolicyError> {
        let default_mode = catalog
            .get(self.default_mode)
            .ok_or(PolicyError::UnknownDefaultMode(self.default_mode))?;

        if !self.primary_range.contains(default_mode.rate()) {
            return Err(PolicyError::DefaultModeOutsideRange {
                rate: default_mode.rate(),
                min: self.primary_range.min,
                max: self.primary_range.max,
            });
        }

        if !self.app_range.min.approx_le(self.primary_range.min)
            || !self.primary_range.max.approx_le(self.app_range.max)
        {
            return Err(PolicyError::AppRangeNotSuperset {
                app_min: self.app_range.min,
                app_max: self.app_range.max,
                min: self.primary_range.min,
                max: self.primary_range.max,
            });
        }

        Ok(())
    }
}
