//! prodsim: discrete-event simulation of a production line that breaks down
//!
//! Orders arrive at random, join the least-loaded admission queue and are
//! served one at a time per server. The machine fails and is repaired at
//! random; a failure pauses the work in progress, pushing its completion back
//! by the repair time.
//!
//! Layers:
//! - [`engine`]: a generic event-scheduling loop. Events are ordered by
//!   `(time, id)` and can be rescheduled by id.
//! - [`line`]: the production line state and its four event handlers.
//! - [`simulation`]: seeds a line from a [`LineConfig`] and runs it to the
//!   horizon, reporting to a [`Recorder`].
//!
//! # Quick example
//!
//! ```
//! use prodsim::{LineConfig, MemoryRecorder, Simulation};
//!
//! let config = LineConfig { horizon: 500.0, ..Default::default() };
//! let mut sim = Simulation::new(config).unwrap();
//! let mut recorder = MemoryRecorder::new();
//! let summary = sim.run(&mut recorder).unwrap();
//!
//! assert_eq!(recorder.departures.len() as u64, summary.orders_departed);
//! assert_eq!(
//!     summary.orders_created,
//!     summary.orders_departed
//!         + summary.orders_waiting as u64
//!         + summary.orders_in_service as u64,
//! );
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod line;
pub mod order;
pub mod recorder;
pub mod simulation;
pub mod variates;

pub use config::{LineConfig, ServiceTimePolicy};
pub use engine::{Engine, Event, EventId, EventKey, Observer, State, Timestamp};
pub use error::SimError;
pub use line::{EventKind, Line, LineEvent, LineState, MachineStatus, ServiceSlot};
pub use order::Order;
pub use recorder::{EventRecord, MemoryRecorder, NullRecorder, Recorder, Snapshot};
pub use simulation::{RunSummary, Simulation};
pub use variates::{FixedVariates, SeededVariates, VariateSource};
