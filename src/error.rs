//! Error types for the production line simulation.

use crate::engine::{EventId, Timestamp};
use thiserror::Error;

/// Everything that can halt a run.
///
/// None of these are retried. A run that fails is replayed from its seed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("cannot start service on server {server}: its queue is empty")]
    EmptyQueuePromotion { server: usize },

    #[error("cannot start service on server {server}: an order is already in service")]
    ServerBusy { server: usize },

    #[error("finish fired for server {server} but no order is in service")]
    IdleFinish { server: usize },

    #[error("server {server} is busy but its pending finish event could not be found")]
    UnresolvableReschedule { server: usize },

    #[error("event {id} is not pending")]
    UnknownEvent { id: EventId },

    #[error("cannot schedule at {at} before current time {now}")]
    ScheduleInPast { at: Timestamp, now: Timestamp },
}
