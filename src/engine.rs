//! The arbiter: selects the refresh rate a display should run at.
//!
//! One engine instance exists per display. A single mutex guards all
//! mutable state (current mode, policies, memoized last decision); every
//! public operation is synchronous and CPU-bound.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use crate::config::EngineOptions;
use crate::error::{EngineError, PolicyError};
use crate::fps::{frame_rate_divider, Fps};
use crate::layer::{LayerRequirement, LayerVote, Seamlessness};
use crate::mode::{DisplayModeId, ModeCatalog, RefreshRate};
use crate::policy::Policy;
use crate::score::{
    find_closest_known_frame_rate, layer_vote_score, ScoreOptions, KNOWN_FRAME_RATES_HZ,
};

/// Transient global inputs to arbitration, also used to report which of
/// them the decision actually depended on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalSignals {
    /// The user is interacting with the screen.
    pub touch: bool,
    /// The display has been idle past the timeout.
    pub idle: bool,
}

/// What the caller should do with the kernel idle timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTimerAction {
    TurnOn,
    TurnOff,
}

/// Snapshot of the last arbitration, for the memo fast path.
#[derive(Debug, Clone)]
struct MemoizedDecision {
    layers: Vec<LayerRequirement>,
    signals: GlobalSignals,
    considered: GlobalSignals,
    result: RefreshRate,
}

/// Mutable engine state, all behind one lock.
#[derive(Debug)]
struct EngineState {
    current_mode: DisplayModeId,
    display_manager_policy: Policy,
    override_policy: Option<Policy>,
    /// Candidates admissible for normal rendering, ascending.
    primary_candidates: Vec<RefreshRate>,
    /// Candidates reachable through explicit app votes, ascending.
    app_candidates: Vec<RefreshRate>,
    memo: Option<MemoizedDecision>,
}

/// Refresh-rate selection policy engine for one display.
pub struct RefreshRateEngine {
    catalog: ModeCatalog,
    /// Mode handed back on structurally-impossible lookups, so every path
    /// stays total without panicking.
    fallback_mode: crate::mode::DisplayMode,
    known_frame_rates: Vec<Fps>,
    options: EngineOptions,
    state: Mutex<EngineState>,
}

impl RefreshRateEngine {
    /// Builds an engine over a mode catalog, starting at `current_mode`
    /// with an unrestricted policy anchored there.
    pub fn new(
        catalog: ModeCatalog,
        current_mode: DisplayModeId,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let fallback_mode = catalog
            .get(current_mode)
            .ok_or(EngineError::UnknownMode(current_mode))?
            .clone();
        let mut state = EngineState {
            current_mode,
            display_manager_policy: Policy::unrestricted(current_mode),
            override_policy: None,
            primary_candidates: Vec::new(),
            app_candidates: Vec::new(),
            memo: None,
        };
        Self::rebuild_candidates(&catalog, &mut state);
        Ok(RefreshRateEngine {
            catalog,
            fallback_mode,
            known_frame_rates: KNOWN_FRAME_RATES_HZ.iter().map(|&v| Fps::from_hz(v)).collect(),
            options,
            state: Mutex::new(state),
        })
    }

    /// True when the catalog offers a choice at all.
    pub fn can_switch(&self) -> bool {
        self.catalog.len() >= 2
    }

    /// The fixed ladder heuristic votes snap to.
    pub fn known_frame_rates(&self) -> &[Fps] {
        &self.known_frame_rates
    }

    /// Installs the display-manager policy. On validation failure the
    /// previous policy stays in effect.
    pub fn set_display_manager_policy(&self, policy: Policy) -> Result<(), PolicyError> {
        policy.validate(&self.catalog)?;
        let mut state = self.lock_state();
        debug!(default_mode = %policy.default_mode, "installing display manager policy");
        state.display_manager_policy = policy;
        state.memo = None;
        Self::rebuild_candidates(&self.catalog, &mut state);
        Ok(())
    }

    /// Installs or clears the override policy, which outranks the
    /// display-manager policy while set.
    pub fn set_override_policy(&self, policy: Option<Policy>) -> Result<(), PolicyError> {
        if let Some(p) = &policy {
            p.validate(&self.catalog)?;
        }
        let mut state = self.lock_state();
        state.override_policy = policy;
        state.memo = None;
        Self::rebuild_candidates(&self.catalog, &mut state);
        Ok(())
    }

    /// The policy currently in effect (override wins).
    pub fn current_policy(&self) -> Policy {
        let state = self.lock_state();
        Self::effective_policy(&state).clone()
    }

    /// Records the mode the display is actually running.
    pub fn set_current_mode(&self, mode: DisplayModeId) -> Result<(), EngineError> {
        if !self.catalog.contains(mode) {
            return Err(EngineError::UnknownMode(mode));
        }
        let mut state = self.lock_state();
        state.current_mode = mode;
        state.memo = None;
        Ok(())
    }

    pub fn current_refresh_rate(&self) -> RefreshRate {
        let state = self.lock_state();
        self.handle_for(state.current_mode)
    }

    /// Slowest rate in the whole catalog.
    pub fn min_supported(&self) -> RefreshRate {
        self.catalog
            .iter()
            .map(|m| RefreshRate::new(m.clone()))
            .min()
            .unwrap_or_else(|| RefreshRate::new(self.fallback_mode.clone()))
    }

    /// Fastest rate in the whole catalog.
    pub fn max_supported(&self) -> RefreshRate {
        self.catalog
            .iter()
            .map(|m| RefreshRate::new(m.clone()))
            .max()
            .unwrap_or_else(|| RefreshRate::new(self.fallback_mode.clone()))
    }

    /// Slowest primary-range candidate, staying in the current mode's
    /// group when it has one (an idle drop must not be a seamed switch).
    pub fn min_by_policy(&self) -> RefreshRate {
        let state = self.lock_state();
        self.min_by_policy_locked(&state)
    }

    /// Fastest primary-range candidate.
    pub fn max_by_policy(&self) -> RefreshRate {
        let state = self.lock_state();
        self.max_by_policy_locked(&state)
    }

    /// Picks the best refresh rate for the given layers and signals.
    pub fn best_refresh_rate(
        &self,
        layers: &[LayerRequirement],
        signals: GlobalSignals,
    ) -> RefreshRate {
        self.best_refresh_rate_with_signals(layers, signals).0
    }

    /// Like [`Self::best_refresh_rate`], also reporting which global
    /// signals the decision considered.
    pub fn best_refresh_rate_with_signals(
        &self,
        layers: &[LayerRequirement],
        signals: GlobalSignals,
    ) -> (RefreshRate, GlobalSignals) {
        let mut state = self.lock_state();

        if let Some(memo) = &state.memo {
            if memo.layers == layers && memo.signals == signals {
                trace!("returning memoized decision {}", memo.result);
                return (memo.result.clone(), memo.considered);
            }
        }

        let (result, considered) = self.arbitrate(&state, layers, signals);
        state.memo = Some(MemoizedDecision {
            layers: layers.to_vec(),
            signals,
            considered,
            result: result.clone(),
        });
        (result, considered)
    }

    /// Per-owner frame-rate overrides: apps whose every voting layer is
    /// explicit may be throttled to a divisor of the display rate.
    pub fn frame_rate_overrides(
        &self,
        layers: &[LayerRequirement],
        display_fps: Fps,
        signals: GlobalSignals,
    ) -> HashMap<u32, Fps> {
        let mut overrides = HashMap::new();
        if !self.options.enable_frame_rate_override || !display_fps.is_valid() {
            return overrides;
        }
        let _state = self.lock_state();

        // Divisor ladder of the display rate, ascending so score ties
        // resolve to the slowest (most throttled) rate.
        let mut divisor_rates = Vec::new();
        let mut k = 1u32;
        loop {
            let rate = Fps::from_hz(display_fps.as_hz() / k as f64);
            if rate.as_hz() < MIN_OVERRIDE_RATE_HZ {
                break;
            }
            divisor_rates.push(rate);
            k += 1;
        }
        divisor_rates.reverse();

        let mut uids: Vec<u32> = layers.iter().map(|l| l.owner_uid).collect();
        uids.sort_unstable();
        uids.dedup();

        let score_opts = ScoreOptions {
            multiple_threshold: None,
            override_enabled: true,
        };

        for uid in uids {
            let owned: Vec<&LayerRequirement> =
                layers.iter().filter(|l| l.owner_uid == uid).collect();

            // A rate-voting but non-explicit layer means the app does not
            // render uniformly at one rate; no override then.
            if owned.iter().any(|l| {
                matches!(l.vote, LayerVote::Min | LayerVote::Max | LayerVote::Heuristic)
            }) {
                continue;
            }
            let explicit: Vec<&LayerRequirement> =
                owned.into_iter().filter(|l| l.vote.is_explicit()).collect();
            if explicit.is_empty() {
                continue;
            }
            // Touch boost outranks multiple-matching.
            if signals.touch
                && explicit
                    .iter()
                    .any(|l| l.vote == LayerVote::ExplicitExactOrMultiple)
            {
                trace!(uid, "dropping override, touch boost wins");
                continue;
            }

            let mut best: Option<(Fps, f64)> = None;
            for &rate in &divisor_rates {
                let mut total = 0.0f64;
                for layer in &explicit {
                    total += layer.weight as f64
                        * layer_vote_score(
                            layer.vote,
                            layer.desired,
                            rate,
                            display_fps,
                            true,
                            &score_opts,
                        );
                }
                if total > best.map_or(0.0, |(_, s)| s) {
                    best = Some((rate, total));
                }
            }
            if let Some((rate, _)) = best {
                overrides.insert(uid, rate);
            }
        }
        overrides
    }

    /// Whether the caller should arm the kernel idle timer: only useful
    /// when the display can switch and the policy spans more than one rate.
    pub fn idle_timer_action(&self) -> IdleTimerAction {
        let state = self.lock_state();
        let policy = Self::effective_policy(&state);
        if self.can_switch() && !policy.primary_range.is_single_rate() {
            IdleTimerAction::TurnOn
        } else {
            IdleTimerAction::TurnOff
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn effective_policy(state: &EngineState) -> &Policy {
        state
            .override_policy
            .as_ref()
            .unwrap_or(&state.display_manager_policy)
    }

    fn handle_for(&self, id: DisplayModeId) -> RefreshRate {
        match self.catalog.get(id) {
            Some(mode) => RefreshRate::new(mode.clone()),
            // Every stored id is validated on entry.
            None => RefreshRate::new(self.fallback_mode.clone()),
        }
    }

    /// Recomputes the sorted candidate lists from the effective policy. A
    /// candidate must share the default mode's resolution, lie in the
    /// respective range, and stay in the default group unless group
    /// switching is allowed.
    fn rebuild_candidates(catalog: &ModeCatalog, state: &mut EngineState) {
        let policy = Self::effective_policy(state).clone();
        let default_mode = match catalog.get(policy.default_mode) {
            Some(m) => m.clone(),
            None => return,
        };

        let eligible = |range: &crate::fps::FpsRange| {
            let mut list: Vec<RefreshRate> = catalog
                .iter()
                .filter(|m| {
                    m.resolution() == default_mode.resolution()
                        && (policy.allow_group_switching || m.group() == default_mode.group())
                        && range.contains(m.rate())
                })
                .map(|m| RefreshRate::new(m.clone()))
                .collect();
            list.sort();
            list
        };

        state.primary_candidates = eligible(&policy.primary_range);
        state.app_candidates = eligible(&policy.app_range);

        // Policy validation guarantees the default mode qualifies, but
        // guard the invariant anyway.
        if state.primary_candidates.is_empty() {
            state
                .primary_candidates
                .push(RefreshRate::new(default_mode.clone()));
        }
        if state.app_candidates.is_empty() {
            state.app_candidates.push(RefreshRate::new(default_mode));
        }
    }

    fn max_by_policy_locked(&self, state: &EngineState) -> RefreshRate {
        state
            .primary_candidates
            .last()
            .cloned()
            .unwrap_or_else(|| self.handle_for(state.current_mode))
    }

    fn min_by_policy_locked(&self, state: &EngineState) -> RefreshRate {
        let current = self.handle_for(state.current_mode);
        state
            .primary_candidates
            .iter()
            .find(|c| c.group() == current.group())
            .or_else(|| state.primary_candidates.first())
            .cloned()
            .unwrap_or(current)
    }

    /// Snaps a heuristic vote to the known ladder when it is far from
    /// every candidate: no candidate is an integer multiple of it and none
    /// serves it on a clean repeating cadence.
    fn effective_heuristic_rate(desired: Fps, candidates: &[RefreshRate]) -> Fps {
        if !desired.is_valid() {
            return desired;
        }
        let fits_somewhere = candidates.iter().any(|c| {
            frame_rate_divider(c.fps(), desired) > 0
                || crate::score::cadence_score(desired, c.fps()) >= 0.5
        });
        if fits_somewhere {
            desired
        } else {
            find_closest_known_frame_rate(desired)
        }
    }

    fn arbitrate(
        &self,
        state: &EngineState,
        layers: &[LayerRequirement],
        signals: GlobalSignals,
    ) -> (RefreshRate, GlobalSignals) {
        let mut considered = GlobalSignals::default();
        let policy = Self::effective_policy(state);
        let primary_single = policy.primary_range.is_single_rate();

        let mut no_vote_layers = 0usize;
        let mut min_vote_layers = 0usize;
        let mut explicit_default_layers = 0usize;
        let mut explicit_exact_layers = 0usize;
        let mut seamed_focused_layers = 0usize;
        let mut has_explicit = false;
        for layer in layers {
            match layer.vote {
                LayerVote::NoVote => no_vote_layers += 1,
                LayerVote::Min => min_vote_layers += 1,
                LayerVote::ExplicitDefault => {
                    explicit_default_layers += 1;
                    has_explicit = true;
                }
                LayerVote::ExplicitExactOrMultiple => has_explicit = true,
                LayerVote::ExplicitExact => {
                    explicit_exact_layers += 1;
                    has_explicit = true;
                }
                LayerVote::Max | LayerVote::Heuristic => {}
            }
            if layer.vote != LayerVote::NoVote
                && layer.seamlessness == Seamlessness::SeamedAndSeamless
                && layer.focused
            {
                seamed_focused_layers += 1;
            }
        }

        // Touch boost preempts scoring unless an explicit vote could be
        // overridden by it, or the policy pins a single rate anyway.
        if signals.touch && !has_explicit && !primary_single {
            considered.touch = true;
            trace!("touch boost, no explicit votes");
            return (self.max_by_policy_locked(state), considered);
        }

        // Idle is lower priority than touch; a single-rate policy with
        // explicit votes still gets scored so a focused layer can act.
        if !signals.touch && signals.idle && !(primary_single && has_explicit) {
            considered.idle = true;
            trace!("idle, dropping to policy minimum");
            return (self.min_by_policy_locked(state), considered);
        }

        if layers.is_empty() || no_vote_layers == layers.len() {
            return (self.max_by_policy_locked(state), considered);
        }

        if no_vote_layers + min_vote_layers == layers.len() {
            return (self.min_by_policy_locked(state), considered);
        }

        let current = self.handle_for(state.current_mode);
        let default_group = self
            .catalog
            .get(policy.default_mode)
            .map(|m| m.group())
            .unwrap_or_else(|| current.group());
        let peak = state
            .app_candidates
            .last()
            .map(|c| c.fps())
            .unwrap_or_else(|| current.fps());
        let score_opts = ScoreOptions {
            multiple_threshold: self.options.frame_rate_multiple_threshold,
            override_enabled: self.options.enable_frame_rate_override,
        };

        let mut scores = vec![0.0f64; state.app_candidates.len()];
        for layer in layers {
            if matches!(layer.vote, LayerVote::NoVote | LayerVote::Min) {
                continue;
            }
            let desired = if layer.vote == LayerVote::Heuristic {
                Self::effective_heuristic_rate(layer.desired, &state.app_candidates)
            } else {
                layer.desired
            };

            for (i, candidate) in state.app_candidates.iter().enumerate() {
                let seamless = candidate.is_seamless_switch_from(&current);

                match layer.seamlessness {
                    Seamlessness::OnlySeamless if !seamless => continue,
                    Seamlessness::SeamedAndSeamless if !seamless && !layer.focused => continue,
                    Seamlessness::Default => {
                        // A default layer follows the current group while a
                        // focused seamed request holds it there, and the
                        // default group otherwise.
                        let anchor_group = if seamed_focused_layers > 0 {
                            current.group()
                        } else {
                            default_group
                        };
                        if candidate.group() != anchor_group {
                            continue;
                        }
                    }
                    _ => {}
                }

                // Only focused ExplicitDefault/ExplicitExact layers may
                // score outside the primary range, or at all when the
                // primary range pins a single rate.
                let privileged = layer.focused
                    && matches!(
                        layer.vote,
                        LayerVote::ExplicitDefault | LayerVote::ExplicitExact
                    );
                if (primary_single || !candidate.in_range(&policy.primary_range)) && !privileged {
                    continue;
                }

                let score =
                    layer_vote_score(layer.vote, desired, candidate.fps(), peak, seamless, &score_opts);
                if score > 0.0 {
                    trace!(
                        layer = %layer.name,
                        candidate = %candidate,
                        score,
                        "layer vote scored"
                    );
                    scores[i] += layer.weight as f64 * score;
                }
            }
        }

        let no_layer_score = scores.iter().all(|&s| s == 0.0);
        let best = self.pick_best(&scores, &state.app_candidates, &current);

        if primary_single {
            return if no_layer_score {
                (self.max_by_policy_locked(state), considered)
            } else {
                (best, considered)
            };
        }

        // Late touch boost: explicit-default votes suppress it, and exact
        // votes do too unless overrides let the app keep its cadence.
        let touch_boostable = if self.options.enable_frame_rate_override {
            explicit_exact_layers + no_vote_layers != layers.len()
        } else {
            explicit_exact_layers == 0
        };
        if signals.touch && explicit_default_layers == 0 && touch_boostable {
            let target = self.max_by_policy_locked(state);
            if best.fps().approx_lt(target.fps()) {
                considered.touch = true;
                trace!("late touch boost to {}", target);
                return (target, considered);
            }
        }

        if no_layer_score {
            return (self.max_by_policy_locked(state), considered);
        }

        (best, considered)
    }

    /// Highest aggregate score wins; ties prefer the current mode, then
    /// the higher rate, then the smaller resolution, then the lower id.
    fn pick_best(
        &self,
        scores: &[f64],
        candidates: &[RefreshRate],
        current: &RefreshRate,
    ) -> RefreshRate {
        let max_score = scores.iter().cloned().fold(0.0f64, f64::max);
        let mut best: Option<&RefreshRate> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            if scores[i] < max_score {
                continue;
            }
            best = match best {
                None => Some(candidate),
                Some(incumbent) => {
                    if Self::prefer(candidate, incumbent, current) {
                        Some(candidate)
                    } else {
                        Some(incumbent)
                    }
                }
            };
        }
        best.cloned()
            .unwrap_or_else(|| current.clone())
    }

    fn prefer(challenger: &RefreshRate, incumbent: &RefreshRate, current: &RefreshRate) -> bool {
        let challenger_is_current = challenger.mode_id() == current.mode_id();
        let incumbent_is_current = incumbent.mode_id() == current.mode_id();
        if challenger_is_current != incumbent_is_current {
            return challenger_is_current;
        }
        if !challenger.fps().approx_eq(incumbent.fps()) {
            return challenger.fps().as_hz() > incumbent.fps().as_hz();
        }
        if challenger.resolution().area() != incumbent.resolution().area() {
            return challenger.resolution().area() < incumbent.resolution().area();
        }
        challenger.mode_id() < incumbent.mode_id()
    }
}

/// Overrides never throttle below this rate.
const MIN_OVERRIDE_RATE_HZ: f64 = 20.0;
