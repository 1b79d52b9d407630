//! Orders, the units of work flowing through the line.

use crate::engine::Timestamp;

/// One customer order.
///
/// Created on arrival with its server already assigned. `service_start` and
/// `completion` stay infinite until the order enters and leaves service.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: u64,
    pub arrival_time: Timestamp,
    pub server: Option<usize>,
    pub service_start: Timestamp,
    pub completion: Timestamp,
}

impl Order {
    pub fn new(id: u64, arrival_time: Timestamp, server: usize) -> Self {
        Self {
            id,
            arrival_time,
            server: Some(server),
            service_start: Timestamp::INFINITY,
            completion: Timestamp::INFINITY,
        }
    }

    pub fn in_service(&self) -> bool {
        self.service_start.is_finite() && !self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_finite()
    }

    /// Time spent queued before service, if service has started.
    pub fn waiting_time(&self) -> Option<Timestamp> {
        self.service_start
            .is_finite()
            .then(|| self.service_start - self.arrival_time)
    }

    /// Time from arrival to completion, if completed.
    pub fn flow_time(&self) -> Option<Timestamp> {
        self.is_complete().then(|| self.completion - self.arrival_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_times() {
        let mut order = Order::new(1, 10.0, 0);
        assert_eq!(order.waiting_time(), None);
        assert!(!order.in_service());

        order.service_start = 25.0;
        assert!(order.in_service());
        assert_eq!(order.waiting_time(), Some(15.0));
        assert_eq!(order.flow_time(), None);

        order.completion = 70.0;
        assert!(order.is_complete());
        assert!(!order.in_service());
        assert_eq!(order.flow_time(), Some(60.0));
    }
}
