//! Circuit breaker - a fail-fast guard over an unhealthy downstream.
//!
//! One breaker instance is shared by every concurrent caller of the same
//! downstream dependency; transitions happen under a single mutex so
//! outcome accounting is monotonic, never last-writer-wins.
//!
//! States: CLOSED (calls pass, outcomes counted in a rolling window),
//! OPEN (calls fail immediately once the failure rate in the window
//! reaches the threshold), HALF_OPEN (after the cool-down one trial call
//! is allowed; success closes the circuit, failure reopens it).

use crate::config::BreakerConfig;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through; outcomes are counted.
    Closed,
    /// Calls fail fast without reaching the network.
    Open,
    /// One trial call is allowed through.
    HalfOpen,
}

enum State {
    Closed {
        window_start: Instant,
        successes: u32,
        failures: u32,
    },
    Open {
        since: Instant,
    },
    HalfOpen {
        trial_in_flight: bool,
    },
}

/// Shared circuit breaker state machine.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    /// Create a closed breaker with the given tuning.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed {
                window_start: Instant::now(),
                successes: 0,
                failures: 0,
            }),
        }
    }

    /// Ask permission to make a call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircuitOpen`] while the circuit is open, or while
    /// a half-open trial is already in flight.
    pub fn try_acquire(&self) -> Result<()> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { .. } => Ok(()),
            State::Open { since } => {
                if since.elapsed() >= self.config.cooldown() {
                    info!("circuit breaker: HALF_OPEN - testing downstream connectivity");
                    *state = State::HalfOpen {
                        trial_in_flight: true,
                    };
                    Ok(())
                } else {
                    Err(Error::CircuitOpen)
                }
            }
            State::HalfOpen { trial_in_flight } => {
                if *trial_in_flight {
                    Err(Error::CircuitOpen)
                } else {
                    *trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call outcome.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed {
                window_start,
                successes,
                failures,
            } => {
                Self::roll_window(self.config.window(), window_start, successes, failures);
                *successes += 1;
            }
            State::HalfOpen { .. } => {
                info!("circuit breaker: CLOSED - downstream health restored");
                *state = State::Closed {
                    window_start: Instant::now(),
                    successes: 0,
                    failures: 0,
                };
            }
            // A late result from a call admitted before the trip; the
            // open timer is authoritative.
            State::Open { .. } => {}
        }
    }

    /// Record a failed call outcome.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed {
                window_start,
                successes,
                failures,
            } => {
                Self::roll_window(self.config.window(), window_start, successes, failures);
                *failures += 1;
                let total = *successes + *failures;
                let threshold = u32::from(self.config.error_threshold_pct);
                if total >= self.config.min_calls && *failures * 100 >= threshold * total {
                    warn!(
                        failures = *failures,
                        total, "circuit breaker: OPEN - blocking downstream calls"
                    );
                    *state = State::Open {
                        since: Instant::now(),
                    };
                }
            }
            State::HalfOpen { .. } => {
                warn!("circuit breaker: OPEN - trial call failed");
                *state = State::Open {
                    since: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        match &*self.state.lock() {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    fn roll_window(
        window: std::time::Duration,
        window_start: &mut Instant,
        successes: &mut u32,
        failures: &mut u32,
    ) {
        if window_start.elapsed() > window {
            *window_start = Instant::now();
            *successes = 0;
            *failures = 0;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(min_calls: u32, cooldown_secs: u64) -> BreakerConfig {
        BreakerConfig {
            error_threshold_pct: 50,
            window_secs: 60,
            min_calls,
            cooldown_secs,
        }
    }

    #[test]
    fn trips_at_half_failures_once_volume_is_reached() {
        let breaker = CircuitBreaker::new(config(5, 30));

        breaker.record_success();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);

        // Fifth call in the window; failure rate hits 60% >= 50%.
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn below_volume_threshold_never_trips() {
        let breaker = CircuitBreaker::new(config(5, 30));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn half_open_trial_success_closes() {
        let breaker = CircuitBreaker::new(config(2, 0));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        // Zero cool-down: the next acquire is the half-open trial.
        assert!(breaker.try_acquire().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // A second caller is rejected while the trial is in flight.
        assert!(breaker.try_acquire().is_err());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_trial_failure_reopens() {
        let breaker = CircuitBreaker::new(config(2, 0));
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.try_acquire().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn open_error_is_distinguishable() {
        let breaker = CircuitBreaker::new(config(1, 30));
        breaker.record_failure();
        let err = breaker.try_acquire().unwrap_err();
        assert!(matches!(err, Error::CircuitOpen));
    }
}
