//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use edusync_core::ConflictPolicy;
use std::time::Duration;

/// Configuration for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub sync_interval: Duration,
    /// Retry policy for transient remote failures.
    pub retry: RetryConfig,
    /// Retry policy for local lock conflicts during a write.
    pub lock_retry: RetryConfig,
    /// Reachability probing.
    pub network: NetworkConfig,
    /// Rule applied to records that differ between the two sides.
    pub conflict_policy: ConflictPolicy,
}

impl SyncConfig {
    /// Creates a configuration probing `remote_host:remote_port`.
    pub fn new(remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            sync_interval: Duration::from_secs(300),
            retry: RetryConfig::default(),
            lock_retry: RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(50))
                .with_max_delay(Duration::from_millis(500)),
            network: NetworkConfig::new(remote_host, remote_port),
            conflict_policy: ConflictPolicy::default(),
        }
    }

    /// Sets the cycle interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the remote retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the lock-conflict retry configuration.
    pub fn with_lock_retry(mut self, retry: RetryConfig) -> Self {
        self.lock_retry = retry;
        self
    }

    /// Sets the network configuration.
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Checks that every option is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] naming the first bad option.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync_interval.is_zero() {
            return Err(SyncError::InvalidConfig(
                "sync interval must be greater than zero".into(),
            ));
        }
        if self.network.probe_timeout.is_zero() {
            return Err(SyncError::InvalidConfig(
                "probe timeout must be greater than zero".into(),
            ));
        }
        if self.network.remote_host.is_empty() {
            return Err(SyncError::InvalidConfig("remote host is empty".into()));
        }
        self.retry.validate("retry")?;
        self.lock_retry.validate("lock retry")
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("localhost", 5432)
    }
}

/// Configuration for bounded retry with exponential backoff.
///
/// `max_retries` counts retries, not attempts: an operation is tried at
/// most `max_retries + 1` times.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Multiplier applied per retry.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% jitter to each delay.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Returns the maximum number of attempts, including the first.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the delay before retry number `retry` (1-indexed).
    ///
    /// Retry 0 is the first attempt and has no delay.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let secs = if self.add_jitter {
            capped + capped * 0.25 * jitter_fraction()
        } else {
            capped
        };
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    fn validate(&self, name: &str) -> SyncResult<()> {
        if self.max_retries == 0 {
            return Err(SyncError::InvalidConfig(format!(
                "{name}: at least one retry is required"
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(format!(
                "{name}: backoff multiplier must be a finite number >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(SyncError::InvalidConfig(format!(
                "{name}: max delay is shorter than the initial delay"
            )));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Configuration for reachability probing.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Timeout applied to each probe.
    pub probe_timeout: Duration,
    /// Well-known external `host:port` checked first. `None` skips the check.
    pub reachability_host: Option<String>,
    /// Host of the remote store.
    pub remote_host: String,
    /// Port of the remote store.
    pub remote_port: u16,
}

impl NetworkConfig {
    /// Creates a network configuration for the given remote endpoint.
    pub fn new(remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            probe_timeout: Duration::from_secs(3),
            reachability_host: Some("1.1.1.1:53".into()),
            remote_host: remote_host.into(),
            remote_port,
        }
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets or clears the external reachability host.
    pub fn with_reachability_host(mut self, host: Option<String>) -> Self {
        self.reachability_host = host;
        self
    }

    /// Returns the remote endpoint as `host:port`.
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }
}

/// Pseudo-random value in `[0, 1)` taken from the clock.
fn jitter_fraction() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}
