//! Driver: builds the line from a config, seeds it and runs it to the horizon.

use tracing::info;

use crate::config::LineConfig;
use crate::engine::{Engine, EventId, Observer, Timestamp};
use crate::error::SimError;
use crate::line::{Line, LineEvent, LineState};
use crate::order::Order;
use crate::recorder::{EventRecord, Recorder, Snapshot};
use crate::variates::{SeededVariates, VariateSource};

/// Counters at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub end_time: Timestamp,
    pub events_processed: u64,
    pub orders_created: u64,
    pub orders_departed: u64,
    pub orders_waiting: usize,
    pub orders_in_service: usize,
    pub breakdowns: u64,
    pub repairs: u64,
    /// Events still pending when the run stopped.
    pub abandoned_events: usize,
}

/// One replication of the production line.
///
/// Each instance owns its state and its variate source; nothing is shared
/// between replications.
pub struct Simulation<V: VariateSource = SeededVariates> {
    config: LineConfig,
    engine: Engine<Line<V>, LineEvent>,
}

impl Simulation<SeededVariates> {
    /// Build a run whose draws come from `config.seed`.
    pub fn new(config: LineConfig) -> Result<Self, SimError> {
        config.validate()?;
        let variates = SeededVariates::new(&config)?;
        Self::with_variates(config, variates)
    }
}

impl<V: VariateSource> Simulation<V> {
    /// Build a run with a caller-supplied variate source.
    ///
    /// The line starts idle and operational with two events pending: an
    /// arrival at time zero and the first breakdown.
    pub fn with_variates(config: LineConfig, variates: V) -> Result<Self, SimError> {
        config.validate()?;
        let mut engine = Engine::new(Line::new(config.queues, variates));
        engine.schedule(LineEvent::Arrival { at: 0.0 });
        engine.schedule(LineEvent::Breakdown { at: config.first_breakdown_at });
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.engine.now()
    }

    pub fn line(&self) -> &Line<V> {
        self.engine.state()
    }

    /// Engine state, including the pending events.
    pub fn state(&self) -> &LineState<V> {
        self.engine.inner()
    }

    /// Dispatch a single event, ignoring the horizon.
    pub fn step<R: Recorder>(&mut self, recorder: &mut R) -> Result<bool, SimError> {
        self.engine.step(&mut Forward(recorder))
    }

    /// Run until the horizon and report the final counters.
    pub fn run<R: Recorder>(&mut self, recorder: &mut R) -> Result<RunSummary, SimError> {
        info!(
            seed = self.config.seed,
            horizon = self.config.horizon,
            queues = self.config.queues,
            "starting run"
        );
        self.engine.run_until(self.config.horizon, &mut Forward(recorder))?;
        let summary = self.summary();
        info!(
            end_time = summary.end_time,
            events = summary.events_processed,
            departed = summary.orders_departed,
            breakdowns = summary.breakdowns,
            "run finished"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        let state = self.engine.inner();
        let line = state.state();
        RunSummary {
            end_time: state.now(),
            events_processed: state.events_processed(),
            orders_created: line.orders_created(),
            orders_departed: line.orders_departed(),
            orders_waiting: line.orders_waiting(),
            orders_in_service: line.orders_in_service(),
            breakdowns: line.breakdowns(),
            repairs: line.repairs(),
            abandoned_events: state.pending_len(),
        }
    }
}

/// Capture the recorder-facing view of the line.
pub fn snapshot<V: VariateSource>(state: &LineState<V>) -> Snapshot {
    let line = state.state();
    Snapshot {
        time: state.now(),
        events_processed: state.events_processed(),
        pending_events: state.pending_len(),
        queue_lengths: line.queue_lengths(),
        in_service: (0..line.servers())
            .map(|s| line.slot(s).map(|slot| slot.order.id))
            .collect(),
        machine_status: line.status(),
        orders_created: line.orders_created(),
        orders_departed: line.orders_departed(),
    }
}

/// Adapts a [`Recorder`] to the engine's observer hook.
struct Forward<'a, R>(&'a mut R);

impl<V: VariateSource, R: Recorder> Observer<Line<V>, LineEvent> for Forward<'_, R> {
    fn observe(
        &mut self,
        state: &LineState<V>,
        id: EventId,
        event: &LineEvent,
        outcome: Option<Order>,
    ) {
        let record = EventRecord {
            id,
            time: event.at(),
            kind: event.kind(),
            server: event.server(),
        };
        self.0.on_event(&snapshot(state), &record);
        if let Some(order) = outcome {
            self.0.on_departure(&order);
        }
    }
}
