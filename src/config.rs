//! Engine configuration shared by the builder and the scheduler

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::NetworkError;

/// Worker-pool parameters for both phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of concurrent workers (≥ 1).
    pub workers: usize,
    /// How long an idle worker waits before re-scanning the shared map.
    pub idle_backoff: Duration,
}

impl EngineConfig {
    /// Default wait between scans when nothing is claimable.
    pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(2);

    /// Configuration with an explicit worker count.
    pub fn with_workers(workers: usize) -> Result<Self, NetworkError> {
        if workers == 0 {
            return Err(NetworkError::invalid_input("worker count must be > 0"));
        }
        Ok(Self {
            workers,
            idle_backoff: Self::DEFAULT_IDLE_BACKOFF,
        })
    }

    /// Set the idle back-off (clamped to at least 1µs).
    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff.max(Duration::from_micros(1));
        self
    }
}

impl Default for EngineConfig {
    /// One worker per available core.
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            workers,
            idle_backoff: Self::DEFAULT_IDLE_BACKOFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            EngineConfig::with_workers(0),
            Err(NetworkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_builder_style_overrides() {
        let config = EngineConfig::with_workers(3)
            .unwrap()
            .with_idle_backoff(Duration::ZERO);
        assert_eq!(config.workers, 3);
        assert_eq!(config.idle_backoff, Duration::from_micros(1));
        assert!(EngineConfig::default().workers >= 1);
    }
}
