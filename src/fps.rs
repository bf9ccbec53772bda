//! Refresh-rate scalar with tolerant comparisons.
//!
//! Display rates are never compared with raw floating-point equality: panels
//! report NTSC fractional rates (23.976, 29.97, 59.94) that must stay
//! distinct from their integer neighbors while tiny rounding noise from
//! period arithmetic must not. All tolerant operations live here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Absolute comparison tolerance, in Hz. Small enough to keep 59.94 and 60
/// apart, large enough to absorb period round-tripping noise.
const FPS_EPSILON: f64 = 0.001;

/// Relative tolerance when deciding whether one rate is an integer multiple
/// of another. Must stay below `FPS_EPSILON / 1 Hz` so fractional NTSC pairs
/// (ratio 1001/1000) never count as integer multiples.
const DIVIDER_THRESHOLD: f64 = 0.0009;

/// NTSC rates are the integer rate scaled by 1000/1001.
const NTSC_COEFFICIENT: f64 = 1000.0 / 1001.0;

/// A refresh rate in frames per second.
///
/// Equality derives exact bit comparison and is meant for snapshot
/// (memoization) checks only; semantic comparisons go through
/// [`Fps::approx_eq`] and friends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fps(f64);

impl Fps {
    /// Zero rate, used as an unconstrained range endpoint.
    pub const ZERO: Fps = Fps(0.0);

    pub fn from_hz(hz: f64) -> Self {
        Fps(hz)
    }

    pub fn from_period_ns(period_ns: i64) -> Self {
        if period_ns <= 0 {
            Fps(0.0)
        } else {
            Fps(1e9 / period_ns as f64)
        }
    }

    pub fn as_hz(self) -> f64 {
        self.0
    }

    /// Vsync period in integer nanoseconds; zero for an invalid rate.
    pub fn period_ns(self) -> i64 {
        if self.is_valid() {
            (1e9 / self.0) as i64
        } else {
            0
        }
    }

    /// A rate is valid when it is finite and strictly positive.
    pub fn is_valid(self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }

    pub fn approx_eq(self, other: Fps) -> bool {
        (self.0 - other.0).abs() < FPS_EPSILON
    }

    pub fn approx_le(self, other: Fps) -> bool {
        self.0 <= other.0 + FPS_EPSILON
    }

    pub fn approx_lt(self, other: Fps) -> bool {
        self.0 < other.0 - FPS_EPSILON
    }

    pub fn approx_ge(self, other: Fps) -> bool {
        other.approx_le(self)
    }

    /// Total ordering for sorting; not tolerance-aware.
    pub fn total_cmp(self, other: Fps) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Fps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}Hz", self.0)
    }
}

/// An inclusive refresh-rate range with tolerant bounds.
///
/// A zero endpoint means unconstrained on that side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FpsRange {
    pub min: Fps,
    pub max: Fps,
}

impl FpsRange {
    pub fn new(min: Fps, max: Fps) -> Self {
        FpsRange { min, max }
    }

    /// The range that admits every valid rate.
    pub fn unbounded() -> Self {
        FpsRange {
            min: Fps::ZERO,
            max: Fps::from_hz(f64::MAX),
        }
    }

    pub fn contains(&self, fps: Fps) -> bool {
        self.min.approx_le(fps) && fps.approx_le(self.max)
    }

    /// True when the range admits a single rate only.
    pub fn is_single_rate(&self) -> bool {
        self.min.approx_eq(self.max)
    }
}

/// Returns the integer `k >= 1` such that `display ~= k * content`, or 0
/// when no such integer exists. NTSC fractional pairs (e.g. 60 vs 59.94)
/// deliberately fall outside the threshold and return 0.
pub fn frame_rate_divider(display: Fps, content: Fps) -> u32 {
    if !display.is_valid() || !content.is_valid() {
        return 0;
    }
    let ratio = display.as_hz() / content.as_hz();
    let rounded = ratio.round();
    if (ratio - rounded).abs() > DIVIDER_THRESHOLD {
        return 0;
    }
    rounded as u32
}

/// True iff the two rates form an NTSC fractional pair or a cross multiple
/// of one: one rate equals the other times an integer, after optionally
/// scaling either side by 1000/1001. Symmetric, and never true for equal
/// rates.
pub fn is_fractional_pair_or_multiple(a: Fps, b: Fps) -> bool {
    if !a.is_valid() || !b.is_valid() {
        return false;
    }
    let (smaller, bigger) = if a.as_hz() <= b.as_hz() { (a, b) } else { (b, a) };
    let multiplier = (bigger.as_hz() / smaller.as_hz()).round();
    let slowed = Fps::from_hz(smaller.as_hz() * multiplier * NTSC_COEFFICIENT);
    let sped_up = Fps::from_hz(smaller.as_hz() * multiplier / NTSC_COEFFICIENT);
    bigger.approx_eq(slowed) || bigger.approx_eq(sped_up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hz(v: f64) -> Fps {
        Fps::from_hz(v)
    }

    #[test]
    fn test_approx_eq_boundaries() {
        // A mode built from a 16'666'665ns period reports 60.000004Hz.
        let mode_rate = Fps::from_period_ns(16_666_665);
        assert!(mode_rate.approx_eq(hz(60.000004)));
        assert!(!mode_rate.approx_eq(hz(60.0011)));
        assert!(!mode_rate.approx_eq(hz(59.998)));
        assert!(!hz(59.94).approx_eq(hz(60.0)));
    }

    #[test]
    fn test_range_containment() {
        let mode_rate = Fps::from_period_ns(16_666_665);
        assert!(FpsRange::new(hz(60.000004), hz(60.000004)).contains(mode_rate));
        assert!(FpsRange::new(hz(59.0), hz(60.1)).contains(mode_rate));
        assert!(!FpsRange::new(hz(75.0), hz(90.0)).contains(mode_rate));
        assert!(!FpsRange::new(hz(60.0011), hz(90.0)).contains(mode_rate));
        assert!(!FpsRange::new(hz(50.0), hz(59.998)).contains(mode_rate));
    }

    #[test]
    fn test_unbounded_range() {
        let range = FpsRange::unbounded();
        assert!(range.contains(hz(1.0)));
        assert!(range.contains(hz(1000.0)));
        assert!(!range.is_single_rate());
        assert!(FpsRange::new(hz(60.0), hz(60.0)).is_single_rate());
    }

    #[test]
    fn test_frame_rate_divider() {
        assert_eq!(frame_rate_divider(hz(30.0), hz(30.0)), 1);
        assert_eq!(frame_rate_divider(hz(60.0), hz(30.0)), 2);
        assert_eq!(frame_rate_divider(hz(72.0), hz(30.0)), 0);
        assert_eq!(frame_rate_divider(hz(90.0), hz(30.0)), 3);
        assert_eq!(frame_rate_divider(hz(120.0), hz(30.0)), 4);
        assert_eq!(frame_rate_divider(hz(90.0), hz(22.5)), 4);
        assert_eq!(frame_rate_divider(hz(24.0), hz(25.0)), 0);
    }

    #[test]
    fn test_divider_rejects_fractional_pairs() {
        assert_eq!(frame_rate_divider(hz(24.0), hz(23.976)), 0);
        assert_eq!(frame_rate_divider(hz(30.0), hz(29.97)), 0);
        assert_eq!(frame_rate_divider(hz(60.0), hz(59.94)), 0);
    }

    #[test]
    fn test_fractional_pairs() {
        let pairs = [
            (23.976, 24.0),
            (29.97, 30.0),
            (59.94, 60.0),
            (29.97, 60.0),
            (59.94, 30.0),
        ];
        for (a, b) in pairs {
            assert!(is_fractional_pair_or_multiple(hz(a), hz(b)), "{a} vs {b}");
            assert!(is_fractional_pair_or_multiple(hz(b), hz(a)), "{b} vs {a}");
        }
    }

    #[test]
    fn test_not_fractional_pairs() {
        for rate in [23.976, 24.0, 25.0, 29.97, 30.0, 50.0, 59.94, 60.0] {
            assert!(!is_fractional_pair_or_multiple(hz(rate), hz(rate)), "{rate}");
        }
        assert!(!is_fractional_pair_or_multiple(hz(24.0), hz(25.0)));
        assert!(!is_fractional_pair_or_multiple(hz(23.978), hz(25.0)));
        assert!(!is_fractional_pair_or_multiple(hz(29.97), hz(59.94)));
    }

    #[test]
    fn test_period_round_trip() {
        let rate = hz(60.0);
        assert!(Fps::from_period_ns(rate.period_ns()).approx_eq(rate));
        assert_eq!(Fps::ZERO.period_ns(), 0);
    }

    proptest! {
        #[test]
        fn prop_fractional_pair_symmetric(a in 10.0f64..240.0, b in 10.0f64..240.0) {
            prop_assert_eq!(
                is_fractional_pair_or_multiple(hz(a), hz(b)),
                is_fractional_pair_or_multiple(hz(b), hz(a))
            );
        }

        #[test]
        fn prop_equal_rates_are_not_fractional_pairs(a in 10.0f64..240.0) {
            prop_assert!(!is_fractional_pair_or_multiple(hz(a), hz(a)));
        }

        #[test]
        fn prop_divider_implies_multiple(display in 10.0f64..240.0, content in 10.0f64..240.0) {
            let k = frame_rate_divider(hz(display), hz(content));
            if k > 0 {
                let relative_error = (display / (k as f64 * content) - 1.0).abs();
                prop_assert!(relative_error < 0.0015, "k={k} err={relative_error}");
            }
        }

        #[test]
        fn prop_range_contains_its_bounds(lo in 10.0f64..240.0, hi in 10.0f64..240.0) {
            prop_assume!(lo <= hi);
            let range = FpsRange::new(hz(lo), hz(hi));
            prop_assert!(range.contains(hz(lo)));
            prop_assert!(range.contains(hz(hi)));
        }
    }
}
