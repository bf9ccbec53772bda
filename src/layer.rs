//! Layer frame-rate requirements: the unit of vote the arbiter consumes.

use serde::{Deserialize, Serialize};

use crate::fps::Fps;

/// The semantic kind of a layer's frame-rate preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayerVote {
    /// The layer has no opinion and contributes nothing.
    NoVote,
    /// Lowest rate the policy allows (e.g. a static wallpaper).
    Min,
    /// Highest rate the policy allows (e.g. an animation).
    Max,
    /// Inferred from observed present timing; snapped to the known ladder
    /// when far from every supported mode.
    #[default]
    Heuristic,
    /// App-provided default rate; the display may run faster and the layer
    /// renders on a divisor cadence.
    ExplicitDefault,
    /// App demands the exact rate or an integer multiple of it.
    ExplicitExactOrMultiple,
    /// App demands the exact rate.
    ExplicitExact,
}

impl LayerVote {
    /// Explicit votes come from an app API call rather than inference, and
    /// gate touch boost and frame-rate overrides.
    pub fn is_explicit(self) -> bool {
        matches!(
            self,
            LayerVote::ExplicitDefault
                | LayerVote::ExplicitExactOrMultiple
                | LayerVote::ExplicitExact
        )
    }
}

/// How a layer tolerates visible mode-switch glitches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Seamlessness {
    /// Seamless switches only, unless a focused seamed request is active.
    #[default]
    Default,
    /// Never participate in a seamed switch.
    OnlySeamless,
    /// Accept seamed switches (when focused).
    SeamedAndSeamless,
}

/// One rendering surface's frame-rate requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRequirement {
    /// Diagnostic name, surfaced in trace logs only.
    pub name: String,
    /// Owning app uid, the key for frame-rate overrides.
    pub owner_uid: u32,
    pub vote: LayerVote,
    /// Desired rate; meaningful for Heuristic and Explicit* votes.
    pub desired: Fps,
    pub seamlessness: Seamlessness,
    /// Aggregation weight in [0, 1].
    pub weight: f32,
    /// Whether the layer is in the focused window.
    pub focused: bool,
}

impl Default for LayerRequirement {
    fn default() -> Self {
        LayerRequirement {
            name: String::new(),
            owner_uid: 0,
            vote: LayerVote::default(),
            desired: Fps::ZERO,
            seamlessness: Seamlessness::default(),
            weight: 1.0,
            focused: false,
        }
    }
}

impl LayerRequirement {
    /// Convenience constructor for a named vote at a desired rate.
    pub fn with_vote(name: &str, vote: LayerVote, desired: Fps) -> Self {
        LayerRequirement {
            name: name.to_owned(),
            vote,
            desired,
            ..Default::default()
        }
    }
}
