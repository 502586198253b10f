//! The event-coalescing state machine.
//!
//! A deploy emits many intermediate lifecycle events per service. Rewriting
//! the proxy config on every one would thrash the reload path, so the
//! coalescer tracks which services are mid-transition and only asks for a
//! regeneration once the whole fleet has settled. The actual timer lives in
//! the control loop; this type only decides what should happen to it.

use std::collections::VecDeque;

use crate::stream::ServiceEvent;

/// What the control loop should do with the pending regeneration timer
/// after an event has been absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Event was irrelevant or a phantom completion; touch nothing.
    Ignore,
    /// The fleet is (still) unsettled; a pending regeneration must not fire.
    CancelPending,
    /// The fleet just reached quiescence; (re)arm the settle timer.
    ScheduleRegen,
}

#[derive(Debug, Default)]
pub struct Coalescer {
    /// Services currently mid-transition, in arrival order. Duplicates are
    /// permitted: a service that emits Terminating and then Stopping is
    /// tracked twice and needs two terminal events to settle.
    in_flight: VecDeque<String>,
    /// At least one transition completed since the last regeneration.
    dirty: bool,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one event and report the timer consequence. This is the whole
    /// per-event step from the design: transitioning events suppress any
    /// pending regeneration, terminal events settle one tracked entry, and
    /// the timer is only armed when the fleet is quiescent and dirty.
    pub fn observe(&mut self, event: &ServiceEvent) -> Directive {
        if event.state.is_transitioning() {
            log::info!("Service {} is {:?}...", event.uuid, event.state);
            self.in_flight.push_back(event.uuid.clone());
            return Directive::CancelPending;
        }

        if event.state.is_terminal() {
            // First-seen-first-removed among entries for the same service.
            let Some(pos) = self.in_flight.iter().position(|id| id == &event.uuid) else {
                // A terminal event for an untracked service never marks the
                // config stale; phantom completions stay no-ops.
                return Directive::Ignore;
            };
            log::info!("Service {} is {:?}", event.uuid, event.state);
            self.in_flight.remove(pos);
            self.dirty = true;

            if self.in_flight.is_empty() {
                self.dirty = false;
                return Directive::ScheduleRegen;
            }
            return Directive::CancelPending;
        }

        Directive::Ignore
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::directory::model::State;

    fn ev(uuid: &str, state: State) -> ServiceEvent {
        ServiceEvent {
            uuid: uuid.to_string(),
            state,
        }
    }

    #[test]
    fn test_transitioning_event_cancels_and_tracks() {
        let mut c = Coalescer::new();
        assert_eq!(c.observe(&ev("a", State::Starting)), Directive::CancelPending);
        assert_eq!(c.in_flight(), 1);
        assert!(!c.is_dirty());
    }

    #[test]
    fn test_unmatched_terminal_event_is_a_noop() {
        let mut c = Coalescer::new();
        assert_eq!(c.observe(&ev("ghost", State::Running)), Directive::Ignore);
        assert_eq!(c.in_flight(), 0);
        assert!(!c.is_dirty());
    }

    #[test]
    fn test_unknown_state_is_ignored() {
        let mut c = Coalescer::new();
        assert_eq!(c.observe(&ev("a", State::Unknown)), Directive::Ignore);
        assert_eq!(c.in_flight(), 0);
    }

    #[test]
    fn test_burst_of_terminal_events_schedules_once() {
        let mut c = Coalescer::new();
        c.observe(&ev("a", State::Starting));
        c.observe(&ev("b", State::Starting));
        // First completion leaves b outstanding: no schedule yet.
        assert_eq!(c.observe(&ev("a", State::Running)), Directive::CancelPending);
        assert!(c.is_dirty());
        // Last completion reaches quiescence and arms the timer.
        assert_eq!(c.observe(&ev("b", State::Running)), Directive::ScheduleRegen);
        assert!(!c.is_dirty());
        assert_eq!(c.in_flight(), 0);
    }

    #[test]
    fn test_transition_after_schedule_cancels() {
        let mut c = Coalescer::new();
        c.observe(&ev("a", State::Starting));
        assert_eq!(c.observe(&ev("a", State::Running)), Directive::ScheduleRegen);
        // A new transition before the timer fires must suppress it.
        assert_eq!(c.observe(&ev("b", State::Redeploying)), Directive::CancelPending);
        assert_eq!(c.in_flight(), 1);
    }

    #[test]
    fn test_duplicate_tracking_needs_two_terminals() {
        // Terminating(A), Stopping(A), Terminated(A), Stopped(A):
        // the multiset holds A twice and drains one entry per terminal.
        let mut c = Coalescer::new();
        c.observe(&ev("a", State::Terminating));
        c.observe(&ev("a", State::Stopping));
        assert_eq!(c.in_flight(), 2);

        assert_eq!(c.observe(&ev("a", State::Terminated)), Directive::CancelPending);
        assert_eq!(c.in_flight(), 1);
        assert!(c.is_dirty());

        assert_eq!(c.observe(&ev("a", State::Stopped)), Directive::ScheduleRegen);
        assert_eq!(c.in_flight(), 0);
        assert!(!c.is_dirty());
    }

    #[derive(Debug, Clone)]
    struct AnyEvent(ServiceEvent);

    impl Arbitrary for AnyEvent {
        fn arbitrary(g: &mut Gen) -> Self {
            let uuid = *g.choose(&["a", "b", "c"]).expect("non-empty");
            let state = *g
                .choose(&[
                    State::Starting,
                    State::Running,
                    State::Scaling,
                    State::Redeploying,
                    State::Stopping,
                    State::Terminating,
                    State::Stopped,
                    State::NotRunning,
                    State::Terminated,
                    State::PartlyRunning,
                    State::Unknown,
                ])
                .expect("non-empty");
            AnyEvent(ev(uuid, state))
        }
    }

    #[quickcheck]
    fn prop_never_schedules_while_fleet_unsettled(events: Vec<AnyEvent>) -> bool {
        let mut c = Coalescer::new();
        events.iter().all(|AnyEvent(event)| {
            let directive = c.observe(event);
            directive != Directive::ScheduleRegen || (c.in_flight() == 0 && !c.is_dirty())
        })
    }

    #[quickcheck]
    fn prop_dirty_implies_outstanding_transition(events: Vec<AnyEvent>) -> bool {
        // dirty can only persist across events while something is in flight;
        // the moment the fleet drains, a schedule clears it.
        let mut c = Coalescer::new();
        events.iter().all(|AnyEvent(event)| {
            c.observe(event);
            !c.is_dirty() || c.in_flight() > 0
        })
    }
}
