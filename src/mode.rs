//! Display modes, the validated mode catalog, and the `RefreshRate` handle.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::fps::{Fps, FpsRange};

/// Opaque identifier of a display mode within a catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct DisplayModeId(pub u32);

impl fmt::Display for DisplayModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode#{}", self.0)
    }
}

/// Pixel dimensions of a mode. Panels without resolution metadata report
/// zero by zero, which compares equal across such modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// One physical mode the panel can be driven in. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMode {
    id: DisplayModeId,
    rate: Fps,
    group: i32,
    resolution: Resolution,
    vsync_period_ns: i64,
}

impl DisplayMode {
    pub fn new(id: DisplayModeId, rate: Fps) -> Self {
        DisplayMode {
            id,
            rate,
            group: 0,
            resolution: Resolution::default(),
            vsync_period_ns: rate.period_ns(),
        }
    }

    pub fn with_group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Resolution::new(width, height);
        self
    }

    pub fn id(&self) -> DisplayModeId {
        self.id
    }

    pub fn rate(&self) -> Fps {
        self.rate
    }

    pub fn group(&self) -> i32 {
        self.group
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn vsync_period_ns(&self) -> i64 {
        self.vsync_period_ns
    }
}

/// The set of modes a display supports. Non-empty, ids unique.
#[derive(Debug, Clone)]
pub struct ModeCatalog {
    modes: Vec<DisplayMode>,
}

impl ModeCatalog {
    pub fn new(modes: Vec<DisplayMode>) -> Result<Self, EngineError> {
        if modes.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        for (i, mode) in modes.iter().enumerate() {
            if modes[..i].iter().any(|m| m.id() == mode.id()) {
                return Err(EngineError::DuplicateModeId(mode.id()));
            }
        }
        Ok(ModeCatalog { modes })
    }

    pub fn get(&self, id: DisplayModeId) -> Option<&DisplayMode> {
        self.modes.iter().find(|m| m.id() == id)
    }

    pub fn contains(&self, id: DisplayModeId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayMode> {
        self.modes.iter()
    }
}

/// A selectable refresh rate: a handle over one catalog mode.
///
/// Ordering is by rate, then resolution area, then id, so sorted candidate
/// lists and tie-breaks are deterministic even when two modes share a rate.
#[derive(Debug, Clone)]
pub struct RefreshRate {
    mode: DisplayMode,
}

impl RefreshRate {
    pub fn new(mode: DisplayMode) -> Self {
        RefreshRate { mode }
    }

    pub fn mode(&self) -> &DisplayMode {
        &self.mode
    }

    pub fn mode_id(&self) -> DisplayModeId {
        self.mode.id()
    }

    pub fn fps(&self) -> Fps {
        self.mode.rate()
    }

    pub fn group(&self) -> i32 {
        self.mode.group()
    }

    pub fn resolution(&self) -> Resolution {
        self.mode.resolution()
    }

    pub fn vsync_period_ns(&self) -> i64 {
        self.mode.vsync_period_ns()
    }

    pub fn in_range(&self, range: &FpsRange) -> bool {
        range.contains(self.fps())
    }

    /// A switch is seamless when it stays in the same mode group at the
    /// same resolution.
    pub fn is_seamless_switch_from(&self, other: &RefreshRate) -> bool {
        self.group() == other.group() && self.resolution() == other.resolution()
    }
}

impl PartialEq for RefreshRate {
    fn eq(&self, other: &Self) -> bool {
        self.mode_id() == other.mode_id()
    }
}

impl Eq for RefreshRate {}

impl PartialOrd for RefreshRate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RefreshRate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fps()
            .total_cmp(other.fps())
            .then_with(|| self.resolution().area().cmp(&other.resolution().area()))
            .then_with(|| self.mode_id().cmp(&other.mode_id()))
    }
}

impl fmt::Display for RefreshRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.mode_id(), self.fps())
    }
}
