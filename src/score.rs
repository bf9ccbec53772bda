//! Pure per-(vote, candidate) scoring.
//!
//! Scores live in [0, 1]; the arbiter aggregates them across layers by
//! weight. The shapes below encode, in order: exact multiples are best and
//! the smallest multiple wins, NTSC fractional pairs are nearly as good,
//! and everything else degrades by how badly the candidate's vsync cadence
//! fits the content.

use crate::fps::{frame_rate_divider, is_fractional_pair_or_multiple, Fps};
use crate::layer::LayerVote;

/// Reference ladder used to snap heuristic votes that match no mode.
pub const KNOWN_FRAME_RATES_HZ: [f64; 6] = [24.0, 30.0, 45.0, 60.0, 72.0, 90.0];

/// Cadence arithmetic ignores period mismatches below this margin.
const CADENCE_MARGIN_NS: i64 = 800_000;

/// Cadence iteration cap; scores below 1/10 are noise.
const MAX_FRAMES_TO_FIT: u32 = 10;

/// Non-exact fits are slightly penalized so an exact multiple always wins.
const NON_EXACT_PENALTY: f64 = 0.95;

/// Fractional NTSC pairs score just below an exact multiple.
const FRACTIONAL_PAIR_SCORE: f64 = 0.8;

/// Seamed candidates are slightly penalized for every scoring vote.
pub(crate) const SEAMED_SWITCH_PENALTY: f64 = 0.95;

/// Exact multiples decay minutely with the multiplier, so the content rate
/// itself beats running the panel k times faster.
const EXACT_MULTIPLE_DECAY: f64 = 0.001;

/// A display slower than the desired rate starves the layer; that distance
/// weighs heavier than an equally distant divided cadence.
const STARVED_RATE_PENALTY: f64 = 1.12;

/// Rendering above the desired rate weighs heavier still: the layer asked
/// for its minimal loop period and cannot actually go faster.
const OVERSHOOT_RATE_PENALTY: f64 = 2.2;

/// Every extra division step costs a little, separating candidates whose
/// divided rates coincide.
const DIVIDED_STEP_PENALTY: f64 = 0.01;

/// Knobs the scorer reads from the engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScoreOptions {
    pub multiple_threshold: Option<Fps>,
    pub override_enabled: bool,
}

/// Element of the known ladder closest to `fps`, clamped to the endpoints.
/// Ties break toward the lower entry.
pub fn find_closest_known_frame_rate(fps: Fps) -> Fps {
    let value = fps.as_hz();
    let mut closest = KNOWN_FRAME_RATES_HZ[0];
    for &known in &KNOWN_FRAME_RATES_HZ[1..] {
        if (known - value).abs() < (closest - value).abs() {
            closest = known;
        }
    }
    Fps::from_hz(closest)
}

pub(crate) fn exact_multiple_score(divider: u32) -> f64 {
    1.0 - (divider.saturating_sub(1)) as f64 * EXACT_MULTIPLE_DECAY
}

/// How well content at `desired` fits the vsync grid of `candidate`, on
/// integer nanosecond periods. 1.0 for a clean cadence, 1/n for a cadence
/// that repeats every n frames, and a near-zero ratio score when the
/// content is faster than the display.
pub(crate) fn cadence_score(desired: Fps, candidate: Fps) -> f64 {
    let layer_period = desired.period_ns();
    let display_period = candidate.period_ns();
    if layer_period <= 0 || display_period <= 0 {
        return 0.0;
    }

    let mut quotient = layer_period / display_period;
    let mut remainder = layer_period % display_period;
    if remainder <= CADENCE_MARGIN_NS {
        remainder = 0;
    } else if display_period - remainder <= CADENCE_MARGIN_NS {
        quotient += 1;
        remainder = 0;
    }

    if quotient == 0 {
        // Content outpaces the display; scale a floor score by how close
        // the periods are.
        return (layer_period as f64 / display_period as f64)
            / (MAX_FRAMES_TO_FIT as f64 + 1.0);
    }

    if remainder == 0 {
        return 1.0;
    }

    let mut diff = (remainder - (display_period - remainder)).abs();
    let mut iterations = 2u32;
    while diff > CADENCE_MARGIN_NS && iterations < MAX_FRAMES_TO_FIT {
        diff -= display_period - diff;
        iterations += 1;
    }
    1.0 / iterations as f64
}

/// Render-rate model for `ExplicitDefault`. A candidate at or above the
/// desired rate serves the layer every k-th vsync with `k = round(c/d)`;
/// a slower candidate starves the layer outright. The score falls with
/// the distance of that render rate from desired, where starvation and
/// overshoot weigh heavier than a clean divided cadence and each extra
/// division step costs a little. 55fps content thus lands on a 90Hz panel
/// (a 45fps cadence) rather than on an overshooting 60Hz one, while 58fps
/// content picks 60Hz over a 120Hz panel halved to the same rate.
pub(crate) fn explicit_default_score(desired: Fps, candidate: Fps) -> f64 {
    let d = desired.as_hz();
    let c = candidate.as_hz();
    if c < d {
        return (1.0 - STARVED_RATE_PENALTY * (d - c) / d).max(0.0);
    }
    let k = (c / d).round().max(1.0);
    let actual = c / k;
    let error = (actual - d).abs() / d;
    let penalty = if actual > d { OVERSHOOT_RATE_PENALTY } else { 1.0 };
    (1.0 - penalty * error - DIVIDED_STEP_PENALTY * (k - 1.0)).max(0.0)
}

/// `Max` votes prefer the peak smoothly: the score falls off with the
/// square of the distance ratio from the fastest app-range candidate.
pub(crate) fn max_vote_score(candidate: Fps, peak: Fps) -> f64 {
    if !peak.is_valid() {
        return 0.0;
    }
    let ratio = candidate.as_hz() / peak.as_hz();
    ratio * ratio
}

/// Score of one vote for one candidate rate. `desired` must already be
/// snapped for heuristic votes. `Min` and `NoVote` never score; the
/// arbiter's pre-emptive rules cover them.
pub(crate) fn layer_vote_score(
    vote: LayerVote,
    desired: Fps,
    candidate: Fps,
    peak: Fps,
    seamless: bool,
    opts: &ScoreOptions,
) -> f64 {
    let seamless_factor = if seamless { 1.0 } else { SEAMED_SWITCH_PENALTY };

    match vote {
        LayerVote::NoVote | LayerVote::Min => 0.0,
        LayerVote::Max => max_vote_score(candidate, peak),
        LayerVote::ExplicitExact => {
            let divider = frame_rate_divider(candidate, desired);
            // With override support the app is throttled to its exact rate
            // on any multiple, so all multiples are equally good.
            let exact_hit = if opts.override_enabled {
                divider >= 1
            } else {
                divider == 1
            };
            if exact_hit {
                1.0
            } else if is_fractional_pair_or_multiple(candidate, desired) {
                FRACTIONAL_PAIR_SCORE
            } else {
                0.0
            }
        }
        LayerVote::Heuristic | LayerVote::ExplicitDefault | LayerVote::ExplicitExactOrMultiple => {
            if !desired.is_valid() {
                return 0.0;
            }

            if vote != LayerVote::ExplicitDefault {
                if let Some(threshold) = opts.multiple_threshold {
                    let half = Fps::from_hz(threshold.as_hz() / 2.0);
                    if candidate.approx_ge(threshold) && desired.approx_lt(half) {
                        return 0.0;
                    }
                }
            }

            let divider = frame_rate_divider(candidate, desired);
            if divider > 0 {
                return exact_multiple_score(divider) * seamless_factor;
            }

            if vote == LayerVote::ExplicitDefault {
                explicit_default_score(desired, candidate) * NON_EXACT_PENALTY * seamless_factor
            } else if is_fractional_pair_or_multiple(candidate, desired) {
                FRACTIONAL_PAIR_SCORE * seamless_factor
            } else {
                cadence_score(desired, candidate) * NON_EXACT_PENALTY * seamless_factor
            }
        }
    }
}
