//! The production line: admission queues, service slots, machine health and
//! the four event handlers that move orders through them.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, warn};

use crate::engine::{Event, EventId, State, Timestamp};
use crate::error::SimError;
use crate::order::Order;
use crate::variates::VariateSource;

/// Health of the (single) machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    Operational,
    Broken,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MachineStatus::Operational => "operational",
            MachineStatus::Broken => "broken",
        })
    }
}

/// An order in service together with the id of its pending `Finish`.
#[derive(Debug, Clone)]
pub struct ServiceSlot {
    pub order: Order,
    pub finish: EventId,
}

/// Mutable model state carried by the engine.
pub struct Line<V> {
    variates: V,
    queues: Vec<VecDeque<Order>>,
    in_service: Vec<Option<ServiceSlot>>,
    status: MachineStatus,
    orders_created: u64,
    orders_departed: u64,
    breakdowns: u64,
    repairs: u64,
}

impl<V: VariateSource> Line<V> {
    /// An empty, operational line with `servers` queue/slot pairs.
    pub fn new(servers: usize, variates: V) -> Self {
        Self {
            variates,
            queues: (0..servers).map(|_| VecDeque::new()).collect(),
            in_service: (0..servers).map(|_| None).collect(),
            status: MachineStatus::Operational,
            orders_created: 0,
            orders_departed: 0,
            breakdowns: 0,
            repairs: 0,
        }
    }
}

impl<V> Line<V> {
    pub fn servers(&self) -> usize {
        self.queues.len()
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn queue(&self, server: usize) -> &VecDeque<Order> {
        &self.queues[server]
    }

    pub fn queue_lengths(&self) -> Vec<usize> {
        self.queues.iter().map(VecDeque::len).collect()
    }

    pub fn slot(&self, server: usize) -> Option<&ServiceSlot> {
        self.in_service[server].as_ref()
    }

    pub fn is_busy(&self, server: usize) -> bool {
        self.in_service[server].is_some()
    }

    /// Queue length plus one if the slot is occupied.
    pub fn load(&self, server: usize) -> usize {
        self.queues[server].len() + usize::from(self.is_busy(server))
    }

    /// Server with the smallest load, lowest index on ties.
    pub fn least_loaded(&self) -> usize {
        (0..self.servers())
            .min_by_key(|&s| (self.load(s), s))
            .unwrap_or(0)
    }

    pub fn orders_created(&self) -> u64 {
        self.orders_created
    }

    pub fn orders_departed(&self) -> u64 {
        self.orders_departed
    }

    pub fn orders_waiting(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    pub fn orders_in_service(&self) -> usize {
        self.in_service.iter().filter(|s| s.is_some()).count()
    }

    pub fn breakdowns(&self) -> u64 {
        self.breakdowns
    }

    pub fn repairs(&self) -> u64 {
        self.repairs
    }

    fn can_start(&self, server: usize) -> bool {
        self.status == MachineStatus::Operational
            && !self.is_busy(server)
            && !self.queues[server].is_empty()
    }
}

/// Kind of a [`LineEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Arrival,
    Finish,
    Breakdown,
    Repair,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Arrival => "arrival",
            EventKind::Finish => "finish",
            EventKind::Breakdown => "breakdown",
            EventKind::Repair => "repair",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can happen on the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineEvent {
    Arrival { at: Timestamp },
    Finish { at: Timestamp, server: usize },
    Breakdown { at: Timestamp },
    Repair { at: Timestamp },
}

impl LineEvent {
    /// Scheduled time.
    pub fn at(&self) -> Timestamp {
        match *self {
            LineEvent::Arrival { at }
            | LineEvent::Finish { at, .. }
            | LineEvent::Breakdown { at }
            | LineEvent::Repair { at } => at,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            LineEvent::Arrival { .. } => EventKind::Arrival,
            LineEvent::Finish { .. } => EventKind::Finish,
            LineEvent::Breakdown { .. } => EventKind::Breakdown,
            LineEvent::Repair { .. } => EventKind::Repair,
        }
    }

    pub fn server(&self) -> Option<usize> {
        match *self {
            LineEvent::Finish { server, .. } => Some(server),
            _ => None,
        }
    }
}

impl<V: VariateSource> Event<Line<V>> for LineEvent {
    /// The order that left the line, if this event was a `Finish`.
    type Outcome = Option<Order>;

    fn time(&self) -> Timestamp {
        self.at()
    }

    fn set_time(&mut self, new_at: Timestamp) {
        match self {
            LineEvent::Arrival { at }
            | LineEvent::Finish { at, .. }
            | LineEvent::Breakdown { at }
            | LineEvent::Repair { at } => *at = new_at,
        }
    }

    fn execute(self, state: &mut State<Line<V>, LineEvent>) -> Result<Option<Order>, SimError> {
        match self {
            LineEvent::Arrival { .. } => handle_arrival(state).map(|_| None),
            LineEvent::Finish { server, .. } => handle_finish(state, server).map(Some),
            LineEvent::Breakdown { .. } => handle_breakdown(state).map(|_| None),
            LineEvent::Repair { .. } => handle_repair(state).map(|_| None),
        }
    }
}

/// Engine state specialised to the line.
pub type LineState<V> = State<Line<V>, LineEvent>;

/// Admit a new order onto the least-loaded server and schedule the next arrival.
fn handle_arrival<V: VariateSource>(state: &mut LineState<V>) -> Result<(), SimError> {
    let now = state.now();
    let line = state.state_mut();
    line.orders_created += 1;
    let server = line.least_loaded();
    let order = Order::new(line.orders_created, now, server);
    debug!(order = order.id, server, at = now, "order arrived");
    line.queues[server].push_back(order);

    let next = now + line.variates.next_interarrival();
    state.schedule(LineEvent::Arrival { at: next });

    if state.state().can_start(server) {
        move_to_service(state, server)?;
    }
    Ok(())
}

/// Release the order in service on `server` and start the next one, if any.
fn handle_finish<V: VariateSource>(
    state: &mut LineState<V>,
    server: usize,
) -> Result<Order, SimError> {
    let now = state.now();
    let line = state.state_mut();
    let ServiceSlot { mut order, .. } = line.in_service[server]
        .take()
        .ok_or(SimError::IdleFinish { server })?;
    order.completion = now;
    line.orders_departed += 1;
    debug!(order = order.id, server, at = now, "order departed");

    if line.can_start(server) {
        move_to_service(state, server)?;
    }
    Ok(order)
}

/// Break the machine, schedule its repair and pause every order in service.
fn handle_breakdown<V: VariateSource>(state: &mut LineState<V>) -> Result<(), SimError> {
    let now = state.now();
    let line = state.state_mut();
    if line.status == MachineStatus::Broken {
        warn!(at = now, "breakdown while already broken; ignoring");
        return Ok(());
    }
    line.status = MachineStatus::Broken;
    line.breakdowns += 1;
    let repair = line.variates.next_repair_duration();
    let paused: Vec<(usize, EventId)> = line
        .in_service
        .iter()
        .enumerate()
        .filter_map(|(server, slot)| slot.as_ref().map(|s| (server, s.finish)))
        .collect();

    state.schedule(LineEvent::Repair { at: now + repair });
    debug!(at = now, repair, busy = paused.len(), "machine broke down");

    for (server, finish) in paused {
        let matched = matches!(
            state.pending(finish),
            Some(LineEvent::Finish { server: s, .. }) if *s == server
        );
        if !matched {
            return Err(SimError::UnresolvableReschedule { server });
        }
        let at = state
            .postpone(finish, repair)
            .map_err(|_| SimError::UnresolvableReschedule { server })?;
        debug!(server, %finish, at, "finish postponed by repair");
    }
    Ok(())
}

/// Bring the machine back, schedule the next breakdown and restart idle servers.
fn handle_repair<V: VariateSource>(state: &mut LineState<V>) -> Result<(), SimError> {
    let now = state.now();
    let line = state.state_mut();
    line.status = MachineStatus::Operational;
    line.repairs += 1;
    let next = now + line.variates.next_interbreakdown();
    state.schedule(LineEvent::Breakdown { at: next });
    debug!(at = now, next_breakdown = next, "machine repaired");

    for server in 0..state.state().servers() {
        if state.state().can_start(server) {
            move_to_service(state, server)?;
        }
    }
    Ok(())
}

/// Move the head of `server`'s queue into service and schedule its `Finish`.
///
/// Callers check that the queue is non-empty and the slot free; either
/// failing is a broken invariant and surfaces as an error.
pub fn move_to_service<V: VariateSource>(
    state: &mut LineState<V>,
    server: usize,
) -> Result<(), SimError> {
    let now = state.now();
    let line = state.state_mut();
    if line.is_busy(server) {
        return Err(SimError::ServerBusy { server });
    }
    let mut order = line.queues[server]
        .pop_front()
        .ok_or(SimError::EmptyQueuePromotion { server })?;
    order.service_start = now;
    let duration = line.variates.next_service_duration();
    let order_id = order.id;

    let finish = state.schedule(LineEvent::Finish { at: now + duration, server });
    state.state_mut().in_service[server] = Some(ServiceSlot { order, finish });
    debug!(order = order_id, server, at = now, duration, %finish, "service started");
    Ok(())
}
