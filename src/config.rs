//! Run parameters.

use crate::engine::Timestamp;
use crate::error::SimError;

/// How service durations are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceTimePolicy {
    /// Every order takes exactly `mean_service`.
    #[default]
    Deterministic,
    /// Service durations are exponential with mean `mean_service`.
    Exponential,
}

/// Parameter bundle for one run. Immutable once the simulation is built.
#[derive(Debug, Clone, PartialEq)]
pub struct LineConfig {
    /// Seed for the variate stream.
    pub seed: u64,
    /// Time at which the run stops admitting new events.
    pub horizon: Timestamp,
    /// Number of admission queues, one per server slot.
    pub queues: usize,
    pub mean_interarrival: f64,
    pub mean_service: f64,
    pub mean_interbreakdown: f64,
    pub mean_repair: f64,
    /// Time of the seeded first breakdown.
    pub first_breakdown_at: Timestamp,
    pub service_policy: ServiceTimePolicy,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            horizon: 1000.0,
            queues: 1,
            mean_interarrival: 60.0,
            mean_service: 45.0,
            mean_interbreakdown: 2880.0,
            mean_repair: 180.0,
            first_breakdown_at: 150.0,
            service_policy: ServiceTimePolicy::Deterministic,
        }
    }
}

impl LineConfig {
    /// Check every field, returning the first offending one.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.queues == 0 {
            return Err(invalid("queues", "must be at least 1".to_string()));
        }
        non_negative("horizon", self.horizon)?;
        non_negative("first_breakdown_at", self.first_breakdown_at)?;
        positive("mean_interarrival", self.mean_interarrival)?;
        positive("mean_interbreakdown", self.mean_interbreakdown)?;
        positive("mean_repair", self.mean_repair)?;
        match self.service_policy {
            ServiceTimePolicy::Deterministic => non_negative("mean_service", self.mean_service),
            ServiceTimePolicy::Exponential => positive("mean_service", self.mean_service),
        }
    }
}

fn invalid(field: &'static str, reason: String) -> SimError {
    SimError::InvalidConfig { field, reason }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), SimError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite and non-negative, got {value}")))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), SimError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite and positive, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(LineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_queues() {
        let config = LineConfig { queues: 0, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfig { field: "queues", .. })
        ));
    }

    #[test]
    fn rejects_non_positive_means() {
        let config = LineConfig { mean_repair: 0.0, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfig { field: "mean_repair", .. })
        ));

        let config = LineConfig { mean_interarrival: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_service_only_allowed_when_deterministic() {
        let fixed = LineConfig { mean_service: 0.0, ..Default::default() };
        assert!(fixed.validate().is_ok());

        let sampled = LineConfig {
            mean_service: 0.0,
            service_policy: ServiceTimePolicy::Exponential,
            ..Default::default()
        };
        assert!(matches!(
            sampled.validate(),
            Err(SimError::InvalidConfig { field: "mean_service", .. })
        ));
    }

    #[test]
    fn rejects_infinite_horizon() {
        let config = LineConfig { horizon: f64::INFINITY, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
