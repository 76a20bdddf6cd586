//! Retry delay service
//!
//! Computes randomized exponential backoff for the server status loop.
//! There are two independent tracks:
//!
//! | Track | Used for              | First delay | Growth factor |
//! |-------|-----------------------|-------------|---------------|
//! | fast  | 5xx other than 500    | 10 s        | [1.0, 1.5)    |
//! | slow  | 500 internal error    | 60 s        | [1.5, 2.0)    |
//!
//! Each call on a track multiplies that track's previous delay by a random
//! factor from its range, saturating at [`Duration::MAX`]. A successful
//! push resets both tracks.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chronosync_core::config::{FactorRange, RetryConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Source of backoff delays consumed by the push states
pub trait DelayProvider: Send + Sync {
    fn next_fast_delay(&self) -> Duration;
    fn next_slow_delay(&self) -> Duration;
    fn reset(&self);
}

#[derive(Debug)]
struct DelayState {
    rng: StdRng,
    last_fast: Option<Duration>,
    last_slow: Option<Duration>,
}

/// Stateful backoff streak shared by all entities of a sync run
#[derive(Debug)]
pub struct RetryDelayService {
    config: RetryConfig,
    state: Mutex<DelayState>,
}

impl RetryDelayService {
    /// Creates a service drawing factors from `rng`
    pub fn new(config: RetryConfig, rng: StdRng) -> Self {
        Self {
            config,
            state: Mutex::new(DelayState {
                rng,
                last_fast: None,
                last_slow: None,
            }),
        }
    }

    /// Creates a service seeded from OS entropy
    pub fn from_config(config: RetryConfig) -> Self {
        Self::new(config, StdRng::from_entropy())
    }

    /// Creates a reproducible service
    pub fn with_seed(config: RetryConfig, seed: u64) -> Self {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

    fn lock(&self) -> MutexGuard<'_, DelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn next_delay(
    rng: &mut StdRng,
    last: Option<Duration>,
    default: Duration,
    factor: FactorRange,
) -> Duration {
    let Some(last) = last else {
        return default;
    };

    let factor = if factor.max.is_finite() && factor.max > factor.min {
        rng.gen_range(factor.min..factor.max)
    } else {
        factor.min
    };

    Duration::try_from_secs_f64(last.as_secs_f64() * factor)
        .unwrap_or(Duration::MAX)
        .max(default)
}

impl DelayProvider for RetryDelayService {
    fn next_fast_delay(&self) -> Duration {
        let mut state = self.lock();
        let DelayState { rng, last_fast, .. } = &mut *state;
        let delay = next_delay(
            rng,
            *last_fast,
            self.config.fast_default(),
            self.config.fast_factor,
        );
        *last_fast = Some(delay);
        debug!(delay_secs = delay.as_secs_f64(), "Next fast retry delay");
        delay
    }

    fn next_slow_delay(&self) -> Duration {
        let mut state = self.lock();
        let DelayState { rng, last_slow, .. } = &mut *state;
        let delay = next_delay(
            rng,
            *last_slow,
            self.config.slow_default(),
            self.config.slow_factor,
        );
        *last_slow = Some(delay);
        debug!(delay_secs = delay.as_secs_f64(), "Next slow retry delay");
        delay
    }

    fn reset(&self) {
        let mut state = self.lock();
        state.last_fast = None;
        state.last_slow = None;
    }
}
