//! Refresh-rate selection policy engine for display compositors.
//!
//! Given the set of modes a panel supports, an administrative policy, the
//! active layers' frame-rate votes, and transient touch/idle signals, the
//! engine deterministically picks the refresh rate the display should run
//! at, and optionally per-app frame-rate overrides. It only reports
//! decisions; driving the actual mode switch is the caller's job.
//!
//! ```
//! use refresh_arbiter::{
//!     DisplayMode, DisplayModeId, EngineOptions, Fps, GlobalSignals, LayerRequirement,
//!     LayerVote, ModeCatalog, RefreshRateEngine,
//! };
//!
//! let catalog = ModeCatalog::new(vec![
//!     DisplayMode::new(DisplayModeId(0), Fps::from_hz(60.0)),
//!     DisplayMode::new(DisplayModeId(1), Fps::from_hz(90.0)),
//! ])
//! .unwrap();
//! let engine =
//!     RefreshRateEngine::new(catalog, DisplayModeId(0), EngineOptions::default()).unwrap();
//!
//! let video = LayerRequirement::with_vote(
//!     "video",
//!     LayerVote::ExplicitExactOrMultiple,
//!     Fps::from_hz(30.0),
//! );
//! let choice = engine.best_refresh_rate(&[video], GlobalSignals::default());
//! assert!(choice.fps().approx_eq(Fps::from_hz(60.0)));
//! ```

mod config;
mod engine;
mod error;
mod fps;
mod layer;
mod logging;
mod mode;
mod policy;
mod score;

pub use config::EngineOptions;
pub use engine::{GlobalSignals, IdleTimerAction, RefreshRateEngine};
pub use error::{ConfigError, EngineError, PolicyError};
pub use fps::{frame_rate_divider, is_fractional_pair_or_multiple, Fps, FpsRange};
pub use layer::{LayerRequirement, LayerVote, Seamlessness};
pub use logging::{init_logging, LogGuard, LoggingError};
pub use mode::{DisplayMode, DisplayModeId, ModeCatalog, RefreshRate, Resolution};
pub use policy::Policy;
pub use score::find_closest_known_frame_rate;
