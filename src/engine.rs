//! Generic event-scheduling core.
//!
//! The engine is generic over user-defined data `S` and event type `E`. Events
//! carry their own scheduled time, mutate the data through a restricted
//! [`State`] handle and may schedule or reschedule further events. The
//! [`Engine`] owns the state and drives the main loop.
//!
//! Pending events are ordered by `(time, id)`. Ids are handed out in creation
//! order, so two events due at the same instant fire in the order they were
//! created, even if one of them was moved there by [`State::reschedule`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::trace;

use crate::error::SimError;

/// Simulation timestamp type (continuous time).
pub type Timestamp = f64;

/// Unique, monotonically assigned event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trait for events that mutate `State` and may schedule more events.
///
/// Implementors are plain data carrying the scheduled time and any payload the
/// handler needs. The engine calls `execute` once the event reaches the head
/// of the queue and the clock has advanced to its timestamp.
pub trait Event<S>: Sized {
    /// What a handler hands back to the observer (e.g. a departed entity).
    type Outcome;

    /// Time at which this event should fire.
    fn time(&self) -> Timestamp;

    /// Move the event to a new time. Only called by [`State::reschedule`].
    fn set_time(&mut self, at: Timestamp);

    /// Execute the event logic. Consumes the event (one-shot).
    fn execute(self, state: &mut State<S, Self>) -> Result<Self::Outcome, SimError>;
}

/// Ordering key of a pending event: time first, then id.
#[derive(Debug, Clone, Copy)]
pub struct EventKey {
    pub at: Timestamp,
    pub id: EventId,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for EventKey {}
impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.total_cmp(&other.at).then(self.id.cmp(&other.id))
    }
}

/// The simulation state visible to events.
pub struct State<S, E: Event<S>> {
    now: Timestamp,
    events_created: u64,
    events_processed: u64,
    data: S,
    queue: BTreeMap<EventKey, E>,
    index: HashMap<EventId, Timestamp>,
}

impl<S, E: Event<S>> State<S, E> {
    /// Create a new simulation state at time zero with user data.
    pub fn new(data: S) -> Self {
        Self {
            now: 0.0,
            events_created: 0,
            events_processed: 0,
            data,
            queue: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Current simulation time.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn state(&self) -> &S {
        &self.data
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.data
    }

    /// Number of ids handed out so far.
    pub fn events_created(&self) -> u64 {
        self.events_created
    }

    /// Number of events dispatched so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Schedule an event at its own `Event::time()` and return its id.
    pub fn schedule(&mut self, event: E) -> EventId {
        self.events_created += 1;
        let id = EventId(self.events_created);
        let at = event.time();
        debug_assert!(at >= self.now, "event {id} scheduled in the past");
        self.index.insert(id, at);
        self.queue.insert(EventKey { at, id }, event);
        id
    }

    /// Move a pending event to `at`, keeping its id.
    pub fn reschedule(&mut self, id: EventId, at: Timestamp) -> Result<(), SimError> {
        if at < self.now {
            return Err(SimError::ScheduleInPast { at, now: self.now });
        }
        let old = *self.index.get(&id).ok_or(SimError::UnknownEvent { id })?;
        let mut event = self
            .queue
            .remove(&EventKey { at: old, id })
            .ok_or(SimError::UnknownEvent { id })?;
        event.set_time(at);
        self.index.insert(id, at);
        self.queue.insert(EventKey { at, id }, event);
        trace!(%id, from = old, to = at, "rescheduled event");
        Ok(())
    }

    /// Push a pending event back by `delay`. Returns its new time.
    pub fn postpone(&mut self, id: EventId, delay: Timestamp) -> Result<Timestamp, SimError> {
        let at = self.time_of(id).ok_or(SimError::UnknownEvent { id })? + delay;
        self.reschedule(id, at)?;
        Ok(at)
    }

    /// Scheduled time of a pending event.
    pub fn time_of(&self, id: EventId) -> Option<Timestamp> {
        self.index.get(&id).copied()
    }

    /// A pending event by id.
    pub fn pending(&self, id: EventId) -> Option<&E> {
        let at = self.time_of(id)?;
        self.queue.get(&EventKey { at, id })
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Pending events in the order they will be dispatched.
    pub fn iter_pending(&self) -> impl Iterator<Item = (EventId, &E)> + '_ {
        self.queue.iter().map(|(key, event)| (key.id, event))
    }

    fn pop_next(&mut self) -> Option<(EventKey, E)> {
        let (key, event) = self.queue.pop_first()?;
        self.index.remove(&key.id);
        Some((key, event))
    }
}

/// Hook invoked after every dispatched event.
pub trait Observer<S, E: Event<S>> {
    fn observe(&mut self, state: &State<S, E>, id: EventId, event: &E, outcome: E::Outcome);
}

impl<S, E, F> Observer<S, E> for F
where
    E: Event<S>,
    F: FnMut(&State<S, E>, EventId, &E, E::Outcome),
{
    fn observe(&mut self, state: &State<S, E>, id: EventId, event: &E, outcome: E::Outcome) {
        self(state, id, event, outcome)
    }
}

/// The engine drives the event loop and owns the `State`.
pub struct Engine<S, E: Event<S>> {
    state: State<S, E>,
}

impl<S, E: Event<S> + Clone + fmt::Debug> Engine<S, E> {
    /// Create a new engine with initial user state.
    pub fn new(data: S) -> Self {
        Self { state: State::new(data) }
    }

    pub fn now(&self) -> Timestamp {
        self.state.now()
    }
    pub fn state(&self) -> &S {
        self.state.state()
    }
    pub fn state_mut(&mut self) -> &mut S {
        self.state.state_mut()
    }
    /// The full state handle, including the pending set.
    pub fn inner(&self) -> &State<S, E> {
        &self.state
    }

    /// Allow external scheduling prior to running.
    pub fn schedule(&mut self, event: E) -> EventId {
        self.state.schedule(event)
    }

    /// Dispatch the earliest pending event. Returns `false` if nothing was pending.
    pub fn step<O: Observer<S, E>>(&mut self, observer: &mut O) -> Result<bool, SimError> {
        let Some((key, event)) = self.state.pop_next() else {
            return Ok(false);
        };
        debug_assert!(key.at >= self.state.now, "clock moved backwards");
        self.state.now = key.at;
        self.state.events_processed += 1;
        trace!(
            id = %key.id,
            at = key.at,
            event = ?event,
            pending = self.state.pending_len(),
            "dispatching event"
        );
        let record = event.clone();
        let outcome = event.execute(&mut self.state)?;
        observer.observe(&self.state, key.id, &record, outcome);
        Ok(true)
    }

    /// Run until the clock reaches `horizon` or nothing is left to do.
    ///
    /// The horizon is checked before each pop, so the first event at or past
    /// the horizon is still dispatched. Whatever it schedules is left pending.
    pub fn run_until<O: Observer<S, E>>(
        &mut self,
        horizon: Timestamp,
        observer: &mut O,
    ) -> Result<(), SimError> {
        while self.state.now < horizon {
            if !self.step(observer)? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        ticks: u32,
        seen: Vec<&'static str>,
    }

    #[derive(Clone, Debug)]
    struct Tick {
        at: Timestamp,
        label: &'static str,
        left: u32,
    }

    impl Event<Counter> for Tick {
        type Outcome = ();

        fn time(&self) -> Timestamp {
            self.at
        }
        fn set_time(&mut self, at: Timestamp) {
            self.at = at;
        }
        fn execute(self, state: &mut State<Counter, Tick>) -> Result<(), SimError> {
            state.state_mut().ticks += 1;
            state.state_mut().seen.push(self.label);
            if self.left > 0 {
                state.schedule(Tick { at: self.at + 0.5, label: self.label, left: self.left - 1 });
            }
            Ok(())
        }
    }

    fn tick(at: Timestamp, label: &'static str) -> Tick {
        Tick { at, label, left: 0 }
    }

    fn ignore(_: &State<Counter, Tick>, _: EventId, _: &Tick, _: ()) {}

    #[test]
    fn counter_advances() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        engine.schedule(Tick { at: 0.0, label: "t", left: 3 });
        engine.run_until(10.0, &mut ignore).unwrap();
        assert_eq!(engine.state().ticks, 4);
        // The clock stays at the last dispatched event.
        assert_eq!(engine.now(), 1.5);
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        assert_eq!(engine.schedule(tick(3.0, "a")), EventId(1));
        assert_eq!(engine.schedule(tick(1.0, "b")), EventId(2));
        assert_eq!(engine.inner().events_created(), 2);
    }

    #[test]
    fn ties_break_by_id() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        let first = engine.schedule(tick(5.0, "first"));
        engine.schedule(tick(10.0, "second"));
        // Moving the older event onto the newer one's time keeps it ahead.
        engine.state.postpone(first, 5.0).unwrap();
        engine.run_until(100.0, &mut ignore).unwrap();
        assert_eq!(engine.state().seen, vec!["first", "second"]);
    }

    #[test]
    fn reschedule_updates_event_time_and_order() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        let a = engine.schedule(tick(1.0, "a"));
        engine.schedule(tick(2.0, "b"));
        engine.state.reschedule(a, 3.0).unwrap();

        assert_eq!(engine.inner().time_of(a), Some(3.0));
        assert_eq!(engine.inner().pending(a).map(|t| t.at), Some(3.0));
        let order: Vec<_> = engine.inner().iter_pending().map(|(_, t)| t.label).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn reschedule_unknown_or_past_fails() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        let a = engine.schedule(tick(1.0, "a"));
        assert_eq!(
            engine.state.reschedule(EventId(99), 2.0),
            Err(SimError::UnknownEvent { id: EventId(99) })
        );
        engine.step(&mut ignore).unwrap();
        assert_eq!(
            engine.state.postpone(a, 1.0),
            Err(SimError::UnknownEvent { id: a })
        );
        let b = engine.schedule(tick(4.0, "b"));
        assert_eq!(
            engine.state.reschedule(b, 0.5),
            Err(SimError::ScheduleInPast { at: 0.5, now: 1.0 })
        );
    }

    #[test]
    fn horizon_is_checked_before_pop() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        engine.schedule(tick(4.0, "in"));
        engine.schedule(tick(12.0, "overshoot"));
        engine.schedule(tick(13.0, "abandoned"));
        engine.run_until(10.0, &mut ignore).unwrap();
        assert_eq!(engine.state().seen, vec!["in", "overshoot"]);
        assert_eq!(engine.now(), 12.0);
        assert_eq!(engine.inner().pending_len(), 1);
    }

    #[test]
    fn event_exactly_at_horizon_is_processed() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        engine.schedule(tick(10.0, "edge"));
        engine.schedule(tick(10.0, "same-instant"));
        engine.run_until(10.0, &mut ignore).unwrap();
        assert_eq!(engine.state().seen, vec!["edge"]);
    }

    #[test]
    fn observer_sees_every_dispatch() {
        let mut engine = Engine::<Counter, Tick>::new(Counter::default());
        engine.schedule(Tick { at: 0.0, label: "t", left: 2 });
        let mut times = Vec::new();
        let mut observer = |state: &State<Counter, Tick>, _: EventId, _: &Tick, _: ()| {
            times.push(state.now());
        };
        engine.run_until(5.0, &mut observer).unwrap();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        assert_eq!(engine.inner().events_processed(), 3);
    }
}
