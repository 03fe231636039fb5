//! Retry backoff with full jitter.

use std::time::Duration;

use rand::Rng;

/// Base delay before the exponential curve.
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Full-jitter exponential backoff: a uniform draw from zero up to
/// `min(cap, base * 2^(attempt-1))`.
///
/// `attempt` is 1-based (the first retry passes 1).
pub fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let ceiling = BACKOFF_BASE
        .saturating_mul(1u32 << exp)
        .min(cap)
        .max(Duration::from_millis(1));
    let micros = rand::thread_rng().gen_range(0..=ceiling.as_micros() as u64);
    Duration::from_micros(micros)
}
