//! Priority resolver — deterministic arbitration between state proposals.
//!
//! Multiple producers (manual override, alerts, rule automation, schedules)
//! may simultaneously want one actuator in different states. [`resolve`]
//! picks exactly one winner; [`ResolvedStateStore`] keeps the active
//! proposal set per actuator and guarantees the invariant that the stored
//! winner always has the maximum priority among active proposals — every
//! mutation re-runs [`resolve`], direct writes are not expressible.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use edgehub_domain::actuator::{ActuatorKind, ActuatorRef};
use edgehub_domain::proposal::{ProposalSource, StateProposal};
use edgehub_domain::time::Timestamp;

/// Pick the winning proposal for one actuator.
///
/// Empty input yields the synthetic default: off, priority 0. Otherwise the
/// highest priority wins; ties at the top priority break by actuator kind:
///
/// - pump-like: prefer an off-state proposal, else the first
/// - dimmable/LED-like: prefer the numerically highest level, first wins
///   among equals
/// - heater-like: prefer a [`ProposalSource::Logic`] proposal, else the first
/// - unknown kind: the first proposal in input order (insertion-order
///   dependent; pinned by a test)
///
/// Pure function — the caller stores the result.
#[must_use]
pub fn resolve(proposals: &[StateProposal], kind: ActuatorKind, now: Timestamp) -> StateProposal {
    let Some(top) = proposals.iter().map(StateProposal::priority).max() else {
        return StateProposal::fallback_default(now);
    };
    let tied: Vec<&StateProposal> = proposals
        .iter()
        .filter(|p| p.priority() == top)
        .collect();
    if tied.len() == 1 {
        return tied[0].clone();
    }

    let winner = if kind.prefers_off() {
        tied.iter().find(|p| p.state.is_off()).unwrap_or(&tied[0])
    } else if kind.is_dimmable() {
        tied.iter()
            .fold(tied[0], |best, p| {
                if p.state.level() > best.state.level() {
                    p
                } else {
                    best
                }
            })
    } else if kind == ActuatorKind::Heater {
        tied.iter()
            .find(|p| p.source == ProposalSource::Logic)
            .unwrap_or(&tied[0])
    } else {
        tied[0]
    };
    winner.clone()
}

struct Entry {
    kind: ActuatorKind,
    proposals: HashMap<ProposalSource, StateProposal>,
    resolved: StateProposal,
    last_touched: Timestamp,
}

/// Per-engine bounded store of active proposals and resolved states.
///
/// Fixed capacity with LRU eviction by last-touched time; injected into the
/// engine rather than global so multiple engine instances can coexist.
pub struct ResolvedStateStore {
    entries: Mutex<HashMap<ActuatorRef, Entry>>,
    capacity: usize,
}

impl ResolvedStateStore {
    /// Create a store holding at most `capacity` actuators.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Submit a proposal and return the new resolved state.
    ///
    /// A proposal replaces any earlier proposal from the same source for
    /// the same actuator.
    pub fn submit(
        &self,
        actuator: &ActuatorRef,
        kind: ActuatorKind,
        proposal: StateProposal,
        now: Timestamp,
    ) -> StateProposal {
        let mut entries = self.lock();
        if !entries.contains_key(actuator) && entries.len() >= self.capacity {
            Self::evict_lru(&mut entries);
        }
        let entry = entries.entry(actuator.clone()).or_insert_with(|| Entry {
            kind,
            proposals: HashMap::new(),
            resolved: StateProposal::fallback_default(now),
            last_touched: now,
        });
        if kind != ActuatorKind::Unknown {
            entry.kind = kind;
        }
        entry.proposals.insert(proposal.source, proposal);
        entry.last_touched = now;
        Self::rerun(entry, now);
        entry.resolved.clone()
    }

    /// Withdraw the proposal from `source`, returning the new resolved
    /// state, or `None` when the actuator is unknown.
    pub fn clear(
        &self,
        actuator: &ActuatorRef,
        source: ProposalSource,
        now: Timestamp,
    ) -> Option<StateProposal> {
        let mut entries = self.lock();
        let entry = entries.get_mut(actuator)?;
        entry.proposals.remove(&source);
        entry.last_touched = now;
        Self::rerun(entry, now);
        Some(entry.resolved.clone())
    }

    /// The current resolved state, if any proposal was ever submitted.
    pub fn get(&self, actuator: &ActuatorRef) -> Option<StateProposal> {
        self.lock().get(actuator).map(|e| e.resolved.clone())
    }

    /// Number of actuators currently tracked.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store tracks no actuators.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn rerun(entry: &mut Entry, now: Timestamp) {
        let proposals: Vec<StateProposal> = entry.proposals.values().cloned().collect();
        entry.resolved = resolve(&proposals, entry.kind, now);
    }

    fn evict_lru(entries: &mut HashMap<ActuatorRef, Entry>) {
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, e)| e.last_touched)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ActuatorRef, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgehub_domain::actuator::ActuatorState;
    use edgehub_domain::time::now;

    fn proposal(state: ActuatorState, source: ProposalSource) -> StateProposal {
        StateProposal::new(state, source, source.to_string(), now())
    }

    // ── resolve ────────────────────────────────────────────────────

    #[test]
    fn should_return_synthetic_default_for_empty_input() {
        let resolved = resolve(&[], ActuatorKind::Pump, now());
        assert_eq!(resolved.state, ActuatorState::Off);
        assert_eq!(resolved.source, ProposalSource::Default);
        assert_eq!(resolved.priority(), 0);
    }

    #[test]
    fn should_pick_highest_priority_proposal() {
        let proposals = [
            proposal(ActuatorState::On, ProposalSource::Manual),
            proposal(ActuatorState::Off, ProposalSource::Logic),
        ];
        let resolved = resolve(&proposals, ActuatorKind::Pump, now());
        assert_eq!(resolved.source, ProposalSource::Manual);
        assert_eq!(resolved.state, ActuatorState::On);
    }

    #[test]
    fn should_always_return_max_priority_over_any_input() {
        let proposals = [
            proposal(ActuatorState::Off, ProposalSource::Schedule),
            proposal(ActuatorState::On, ProposalSource::Emergency),
            proposal(ActuatorState::On, ProposalSource::Timer),
            proposal(ActuatorState::Off, ProposalSource::Alert),
        ];
        let max = proposals.iter().map(StateProposal::priority).max().unwrap();
        let resolved = resolve(&proposals, ActuatorKind::Unknown, now());
        assert_eq!(resolved.priority(), max);
    }

    #[test]
    fn should_prefer_off_state_for_pump_like_ties() {
        // Same source twice is impossible through the store, but resolve()
        // itself only looks at priorities, so craft a tie via two proposals
        // of equal priority using distinct states.
        let on = proposal(ActuatorState::On, ProposalSource::Logic);
        let off = proposal(ActuatorState::Off, ProposalSource::Logic);
        for kind in [ActuatorKind::Pump, ActuatorKind::Valve, ActuatorKind::Fan] {
            let resolved = resolve(&[on.clone(), off.clone()], kind, now());
            assert!(resolved.state.is_off(), "{kind:?} must prefer off");
        }
    }

    #[test]
    fn should_prefer_highest_level_for_dimmable_ties() {
        let dim = proposal(ActuatorState::Level(40), ProposalSource::Schedule);
        let bright = proposal(ActuatorState::Level(200), ProposalSource::Schedule);
        let resolved = resolve(&[dim, bright], ActuatorKind::Led, now());
        assert_eq!(resolved.state, ActuatorState::Level(200));
    }

    #[test]
    fn should_prefer_logic_source_for_heater_ties() {
        // Ties happen when two rules drive the same heater: both proposals
        // arrive Logic-sourced and the first Logic proposal wins.
        let first = proposal(ActuatorState::Off, ProposalSource::Logic);
        let second = proposal(ActuatorState::On, ProposalSource::Logic);
        let resolved = resolve(&[first.clone(), second], ActuatorKind::Heater, now());
        assert_eq!(resolved.source, ProposalSource::Logic);
        assert_eq!(resolved.state, first.state);
    }

    #[test]
    fn should_use_input_order_for_unknown_kind_ties() {
        let first = proposal(ActuatorState::On, ProposalSource::Alert);
        let second = proposal(ActuatorState::Off, ProposalSource::Alert);
        let resolved = resolve(&[first.clone(), second], ActuatorKind::Unknown, now());
        assert_eq!(resolved.state, first.state);
    }

    #[test]
    fn should_return_single_winner_unchanged() {
        let only = proposal(ActuatorState::Level(10), ProposalSource::Timer);
        let resolved = resolve(std::slice::from_ref(&only), ActuatorKind::Heater, now());
        assert_eq!(resolved, only);
    }

    // ── store ──────────────────────────────────────────────────────

    #[test]
    fn should_resolve_manual_over_logic_then_fall_back_after_clear() {
        // Scenario from the arbitration contract: (esp1, 5) with a manual
        // "on" against a logic "off".
        let store = ResolvedStateStore::new(16);
        let actuator = ActuatorRef::new("esp1", 5);

        let resolved = store.submit(
            &actuator,
            ActuatorKind::Pump,
            proposal(ActuatorState::On, ProposalSource::Manual),
            now(),
        );
        assert_eq!(resolved.source, ProposalSource::Manual);

        let resolved = store.submit(
            &actuator,
            ActuatorKind::Pump,
            proposal(ActuatorState::Off, ProposalSource::Logic),
            now(),
        );
        assert_eq!(resolved.source, ProposalSource::Manual);
        assert_eq!(resolved.state, ActuatorState::On);

        let resolved = store
            .clear(&actuator, ProposalSource::Manual, now())
            .unwrap();
        assert_eq!(resolved.source, ProposalSource::Logic);
        assert_eq!(resolved.state, ActuatorState::Off);
    }

    #[test]
    fn should_not_demote_on_lower_priority_arrival() {
        let store = ResolvedStateStore::new(16);
        let actuator = ActuatorRef::new("esp1", 5);

        store.submit(
            &actuator,
            ActuatorKind::Heater,
            proposal(ActuatorState::On, ProposalSource::Alert),
            now(),
        );
        let resolved = store.submit(
            &actuator,
            ActuatorKind::Heater,
            proposal(ActuatorState::Off, ProposalSource::Schedule),
            now(),
        );
        // monotonic by priority, not arrival time
        assert_eq!(resolved.source, ProposalSource::Alert);
    }

    #[test]
    fn should_replace_earlier_proposal_from_same_source() {
        let store = ResolvedStateStore::new(16);
        let actuator = ActuatorRef::new("esp2", 1);

        store.submit(
            &actuator,
            ActuatorKind::Led,
            proposal(ActuatorState::Level(50), ProposalSource::Manual),
            now(),
        );
        let resolved = store.submit(
            &actuator,
            ActuatorKind::Led,
            proposal(ActuatorState::Level(200), ProposalSource::Manual),
            now(),
        );
        assert_eq!(resolved.state, ActuatorState::Level(200));
    }

    #[test]
    fn should_resolve_to_default_when_all_proposals_cleared() {
        let store = ResolvedStateStore::new(16);
        let actuator = ActuatorRef::new("esp1", 7);

        store.submit(
            &actuator,
            ActuatorKind::Fan,
            proposal(ActuatorState::On, ProposalSource::Timer),
            now(),
        );
        let resolved = store
            .clear(&actuator, ProposalSource::Timer, now())
            .unwrap();
        assert_eq!(resolved.source, ProposalSource::Default);
        assert!(resolved.state.is_off());
    }

    #[test]
    fn should_return_none_when_clearing_unknown_actuator() {
        let store = ResolvedStateStore::new(16);
        let result = store.clear(
            &ActuatorRef::new("ghost", 0),
            ProposalSource::Manual,
            now(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn should_evict_least_recently_touched_at_capacity() {
        let store = ResolvedStateStore::new(2);
        let a = ActuatorRef::new("esp1", 1);
        let b = ActuatorRef::new("esp1", 2);
        let c = ActuatorRef::new("esp1", 3);

        let t0 = now();
        store.submit(
            &a,
            ActuatorKind::Pump,
            proposal(ActuatorState::On, ProposalSource::Manual),
            t0,
        );
        store.submit(
            &b,
            ActuatorKind::Pump,
            proposal(ActuatorState::On, ProposalSource::Manual),
            t0 + chrono::Duration::seconds(1),
        );
        // touch `a` so `b` becomes the eviction candidate
        store.submit(
            &a,
            ActuatorKind::Pump,
            proposal(ActuatorState::Off, ProposalSource::Manual),
            t0 + chrono::Duration::seconds(2),
        );
        store.submit(
            &c,
            ActuatorKind::Pump,
            proposal(ActuatorState::On, ProposalSource::Manual),
            t0 + chrono::Duration::seconds(3),
        );

        assert_eq!(store.len(), 2);
        assert!(store.get(&a).is_some());
        assert!(store.get(&b).is_none());
        assert!(store.get(&c).is_some());
    }
}
