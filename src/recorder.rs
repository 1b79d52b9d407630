//! Observation seam between the engine and whatever persists a run.
//!
//! A [`Recorder`] sees a [`Snapshot`] after every dispatched event and every
//! departed [`Order`]. Recorders are purely observational: nothing they do
//! feeds back into the run.

use crate::engine::{EventId, Timestamp};
use crate::line::{EventKind, MachineStatus};
use crate::order::Order;

/// The event that was just dispatched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    pub id: EventId,
    pub time: Timestamp,
    pub kind: EventKind,
    /// Server of a `Finish`; `None` for other kinds.
    pub server: Option<usize>,
}

/// Line state right after an event was handled.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub time: Timestamp,
    pub events_processed: u64,
    pub pending_events: usize,
    pub queue_lengths: Vec<usize>,
    /// Id of the order in each service slot.
    pub in_service: Vec<Option<u64>>,
    pub machine_status: MachineStatus,
    pub orders_created: u64,
    pub orders_departed: u64,
}

impl Snapshot {
    /// Orders currently on the line, queued or in service.
    pub fn orders_present(&self) -> u64 {
        let queued: usize = self.queue_lengths.iter().sum();
        let serving = self.in_service.iter().filter(|s| s.is_some()).count();
        (queued + serving) as u64
    }
}

pub trait Recorder {
    fn on_event(&mut self, snapshot: &Snapshot, event: &EventRecord);

    fn on_departure(&mut self, _order: &Order) {}
}

impl<R: Recorder + ?Sized> Recorder for &mut R {
    fn on_event(&mut self, snapshot: &Snapshot, event: &EventRecord) {
        (**self).on_event(snapshot, event)
    }

    fn on_departure(&mut self, order: &Order) {
        (**self).on_departure(order)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn on_event(&mut self, _snapshot: &Snapshot, _event: &EventRecord) {}
}

/// Keeps every row and departure in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecorder {
    pub rows: Vec<(EventRecord, Snapshot)>,
    pub departures: Vec<Order>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Just the `(kind, time)` sequence of the trace.
    pub fn event_sequence(&self) -> Vec<(EventKind, Timestamp)> {
        self.rows.iter().map(|(e, _)| (e.kind, e.time)).collect()
    }
}

impl Recorder for MemoryRecorder {
    fn on_event(&mut self, snapshot: &Snapshot, event: &EventRecord) {
        self.rows.push((*event, snapshot.clone()));
    }

    fn on_departure(&mut self, order: &Order) {
        self.departures.push(order.clone());
    }
}
