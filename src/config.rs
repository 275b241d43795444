//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a resource pool.
///
/// All fields are fixed at construction; the one runtime-tunable knob is
/// the periodic cadence, via
/// [`Pool::set_maintenance_interval`](crate::Pool::set_maintenance_interval).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Minimum number of live resources the pool keeps warm
    pub min: usize,
    /// Maximum population: free + lent + creating + destroying
    pub max: usize,
    /// Cap on concurrent pending creations (`None` = unlimited)
    pub max_creating: Option<usize>,
    /// Cap on queued acquire requests (`None` = unlimited)
    pub max_requests: Option<usize>,
    /// Default acquire timeout; `None` makes requests ageless by default
    pub acquire_timeout: Option<Duration>,
    /// Time after which a free resource is reaped (`None` = never)
    pub idle_timeout: Option<Duration>,
    /// How often the idle sweep is allowed to run
    pub idle_check_interval: Duration,
    /// Absolute lifetime of a resource from creation (`None` = unlimited)
    pub expire_timeout: Option<Duration>,
    /// How often the expiry sweep is allowed to run
    pub expire_check_interval: Duration,
    /// Periodic maintenance cadence; `None` derives
    /// `min(idle_check_interval, expire_check_interval)`
    pub maintenance_interval: Option<Duration>,
    /// Debounce window for on-demand maintenance
    pub maintenance_latency: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 0,
            max: 1024,
            max_creating: None,
            max_requests: None,
            acquire_timeout: Some(Duration::from_secs(10)),
            idle_timeout: None,
            idle_check_interval: Duration::from_millis(1000),
            expire_timeout: None,
            expire_check_interval: Duration::from_millis(1000),
            maintenance_interval: None,
            maintenance_latency: Duration::from_millis(50),
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max == 0 {
            return Err(Error::configuration("max must be greater than 0"));
        }
        if self.min > self.max {
            return Err(Error::configuration(format!(
                "min ({}) must not exceed max ({})",
                self.min, self.max
            )));
        }
        if self.max_creating == Some(0) {
            return Err(Error::configuration(
                "max_creating must be greater than 0 when set",
            ));
        }
        if self.max_requests == Some(0) {
            return Err(Error::configuration(
                "max_requests must be greater than 0 when set",
            ));
        }
        if self.idle_check_interval.is_zero() {
            return Err(Error::configuration(
                "idle_check_interval must be greater than zero",
            ));
        }
        if self.expire_check_interval.is_zero() {
            return Err(Error::configuration(
                "expire_check_interval must be greater than zero",
            ));
        }
        if self.maintenance_interval == Some(Duration::ZERO) {
            return Err(Error::configuration(
                "maintenance_interval must be greater than zero when set",
            ));
        }
        if self.maintenance_latency.is_zero() {
            return Err(Error::configuration(
                "maintenance_latency must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Cadence the periodic maintainer starts with: the explicit setting,
    /// or the finer of the two sweep cadences.
    pub(crate) fn initial_maintenance_interval(&self) -> Duration {
        self.maintenance_interval
            .unwrap_or_else(|| self.idle_check_interval.min(self.expire_check_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.min, 0);
        assert_eq!(config.max, 1024);
        assert_eq!(config.max_creating, None);
        assert_eq!(config.max_requests, None);
        assert_eq!(config.acquire_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.maintenance_latency, Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn maintenance_interval_derives_from_sweep_cadences() {
        let config = PoolConfig {
            idle_check_interval: Duration::from_millis(400),
            expire_check_interval: Duration::from_millis(900),
            ..Default::default()
        };
        assert_eq!(
            config.initial_maintenance_interval(),
            Duration::from_millis(400)
        );

        let explicit = PoolConfig {
            maintenance_interval: Some(Duration::from_secs(5)),
            ..config
        };
        assert_eq!(
            explicit.initial_maintenance_interval(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn validation_rejects_degenerate_bounds() {
        assert!(PoolConfig {
            max: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(PoolConfig {
            min: 11,
            max: 10,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(PoolConfig {
            max_creating: Some(0),
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(PoolConfig {
            max_requests: Some(0),
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn validation_rejects_zero_cadences() {
        assert!(PoolConfig {
            idle_check_interval: Duration::ZERO,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(PoolConfig {
            expire_check_interval: Duration::ZERO,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(PoolConfig {
            maintenance_interval: Some(Duration::ZERO),
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(PoolConfig {
            maintenance_latency: Duration::ZERO,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
