//! Retry and Chaos Policies
//!
//! The base schedule makes up to four attempts with fixed waits in between.
//! The chaos layer wraps it and, after a successful round, sometimes delivers
//! the same payload again, the way the real platform occasionally re-sends
//! notifications that were already acknowledged.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use super::types::DeliveryError;

/// Attempts per round before giving up.
pub const MAX_ATTEMPTS: u32 = 4;

/// Waits before attempts 2, 3 and 4.
pub const RETRY_DELAYS_SECS: [u64; 3] = [2, 5, 15];

const _: () = assert!(MAX_ATTEMPTS as usize == RETRY_DELAYS_SECS.len() + 1);

/// Fixed-schedule retry policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    /// Wait before `attempt` (1-based), or `None` once the schedule is used up.
    pub fn delay_before(self, attempt: u32) -> Option<Duration> {
        match attempt {
            1 => Some(Duration::ZERO),
            n if n <= MAX_ATTEMPTS => RETRY_DELAYS_SECS
                .get((n - 2) as usize)
                .map(|secs| Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Run `op` until it succeeds or the schedule is exhausted.
    ///
    /// `op` receives the 1-based attempt number. Returns the attempt that
    /// succeeded.
    pub async fn run<F, Fut>(self, mut op: F) -> Result<u32, DeliveryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), DeliveryError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(()) => return Ok(attempt),
                Err(e) => match self.delay_before(attempt + 1) {
                    Some(delay) => {
                        warn!(
                            attempt,
                            retry_in_secs = delay.as_secs(),
                            error = %e,
                            "Webhook attempt failed"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(DeliveryError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        })
                    }
                },
            }
        }
    }
}

// ============================================================================
// Chaos layer
// ============================================================================

/// Randomness used by [`ChaosPolicy`].
pub trait ChaosSource: Send + Sync {
    /// Uniform duration in `[0, upper)`.
    fn delay_below(&self, upper: Duration) -> Duration;

    /// Uniform roll in `[0, 100)`.
    fn roll_percent(&self) -> u32;
}

/// [`ChaosSource`] backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngChaos;

impl ChaosSource for ThreadRngChaos {
    fn delay_below(&self, upper: Duration) -> Duration {
        let upper_ms = upper.as_millis() as u64;
        if upper_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..upper_ms))
    }

    fn roll_percent(&self) -> u32 {
        rand::thread_rng().gen_range(0..100)
    }
}

/// An extra delivery round that runs only if the roll is at most
/// `max_roll`, after a random wait below `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaosRound {
    pub max_roll: u32,
    pub max_delay: Duration,
}

/// Random wait before the first round.
pub const INITIAL_JITTER: Duration = Duration::from_millis(1500);

/// Gates for the second and third rounds, each checked independently.
pub const EXTRA_ROUNDS: [ChaosRound; 2] = [
    ChaosRound {
        max_roll: 20,
        max_delay: Duration::from_secs(10),
    },
    ChaosRound {
        max_roll: 10,
        max_delay: Duration::from_secs(60),
    },
];

/// Base policy plus probability-gated re-deliveries.
#[derive(Clone)]
pub struct ChaosPolicy {
    retry: RetryPolicy,
    source: Arc<dyn ChaosSource>,
}

impl fmt::Debug for ChaosPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaosPolicy")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Default for ChaosPolicy {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRngChaos))
    }
}

impl ChaosPolicy {
    pub fn new(source: Arc<dyn ChaosSource>) -> Self {
        Self {
            retry: RetryPolicy,
            source,
        }
    }

    /// Run `op` through up to three rounds of the base schedule.
    ///
    /// Returns the number of rounds that were delivered. A failed round ends
    /// the dispatch with that round's error.
    pub async fn run<F, Fut>(&self, mut op: F) -> Result<u32, DeliveryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), DeliveryError>>,
    {
        tokio::time::sleep(self.source.delay_below(INITIAL_JITTER)).await;
        self.retry.run(&mut op).await?;

        let mut rounds = 1;
        for round in EXTRA_ROUNDS {
            let roll = self.source.roll_percent();
            if roll > round.max_roll {
                debug!(roll, rounds, "No chaos re-delivery");
                return Ok(rounds);
            }

            let delay = self.source.delay_below(round.max_delay);
            info!(
                roll,
                delay_ms = delay.as_millis() as u64,
                "Chaos re-delivery scheduled"
            );
            tokio::time::sleep(delay).await;
            self.retry.run(&mut op).await?;
            rounds += 1;
        }

        Ok(rounds)
    }
}
