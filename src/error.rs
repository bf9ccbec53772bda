//! Error types for the refresh-rate arbitration engine.
//!
//! Each component gets its own error enum with descriptive messages;
//! validation failures leave the engine state untouched.

use thiserror::Error;

use crate::fps::Fps;
use crate::mode::DisplayModeId;

/// Errors raised while validating or installing a policy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("default mode {0} is not in the display mode catalog")]
    UnknownDefaultMode(DisplayModeId),

    #[error("default mode rate {rate} is outside the primary range [{min}, {max}]")]
    DefaultModeOutsideRange { rate: Fps, min: Fps, max: Fps },

    #[error("app range [{app_min}, {app_max}] does not contain the primary range [{min}, {max}]")]
    AppRangeNotSuperset {
        app_min: Fps,
        app_max: Fps,
        min: Fps,
        max: Fps,
    },
}

/// Errors raised by engine construction and mode switching.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("display mode catalog is empty")]
    EmptyCatalog,

    #[error("duplicate display mode id {0} in catalog")]
    DuplicateModeId(DisplayModeId),

    #[error("display mode {0} is not in the catalog")]
    UnknownMode(DisplayModeId),
}

/// Errors related to engine options persistence.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read options file: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("failed to parse options: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("options validation failed: {0}")]
    ValidationError(String),

    #[error("failed to write options file: {0}")]
    WriteError(#[from] std::io::Error),
}
