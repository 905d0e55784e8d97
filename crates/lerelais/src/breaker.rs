// Circuit Breaker
//
// *Le Disjoncteur* (The Breaker) - Short-circuits calls while the inference
// service is presumed unhealthy.

use crate::error::{ConnectivityCause, RelaisError, Result};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default consecutive failures before the breaker opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time the breaker stays open before allowing a trial call
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Mutable breaker state, always accessed under the breaker's lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Consecutive failures since the last success or recovery
    pub failure_count: u32,

    /// When the most recent failure was recorded
    pub last_failure_time: Option<Instant>,

    /// Whether calls are currently rejected
    pub is_open: bool,
}

/// Consecutive-failure circuit breaker.
///
/// One breaker guards one downstream dependency and is shared (behind an `Arc`)
/// by every caller of that dependency. There is no half-open state: once the
/// recovery timeout has elapsed the breaker closes fully and reopens on the
/// next run of failures.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: Mutex<BreakerSnapshot>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new("default", DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT)
    }
}

impl CircuitBreaker {
    /// Create a closed breaker
    ///
    /// A zero `failure_threshold` is treated as 1.
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            state: Mutex::new(BreakerSnapshot::default()),
        }
    }

    /// Breaker name used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Failures needed to open the breaker
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Time to wait after the last failure before a trial call
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    fn lock(&self) -> MutexGuard<'_, BreakerSnapshot> {
        // State is plain data; a panic mid-update cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> BreakerSnapshot {
        *self.lock()
    }

    /// Current consecutive failure count
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Whether the breaker is currently open
    pub fn is_open(&self) -> bool {
        self.lock().is_open
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let mut state = self.lock();
        state.failure_count = 0;
        state.is_open = false;
        debug!("Circuit breaker {}: success recorded", self.name);
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&self, now: Instant) {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_time = Some(now);

        if state.failure_count >= self.failure_threshold && !state.is_open {
            state.is_open = true;
            warn!(
                "Circuit breaker {}: opened after {} failures",
                self.name, state.failure_count
            );
        }
    }

    /// Check if an operation should be attempted
    ///
    /// While open, this performs the recovery check: once more than
    /// `recovery_timeout` has elapsed since the last failure the breaker closes
    /// and the call is allowed through.
    pub fn should_attempt(&self) -> bool {
        self.should_attempt_at(Instant::now())
    }

    fn should_attempt_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        if !state.is_open {
            return true;
        }

        let Some(last_failure) = state.last_failure_time else {
            return true;
        };

        if now.saturating_duration_since(last_failure) > self.recovery_timeout {
            info!("Circuit breaker {}: attempting recovery", self.name);
            state.is_open = false;
            state.failure_count = 0;
            return true;
        }

        false
    }

    /// Execute an async operation with circuit breaker protection
    ///
    /// The operation is invoked at most once. While the breaker is open it is
    /// not invoked at all and a [`ConnectivityCause::CircuitOpen`] error is
    /// returned instead. Failures are returned unchanged.
    pub async fn call_async<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.should_attempt() {
            return Err(RelaisError::connectivity(
                format!(
                    "Circuit breaker {} is open. Service appears to be unavailable.",
                    self.name
                ),
                ConnectivityCause::CircuitOpen,
            ));
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }
}
