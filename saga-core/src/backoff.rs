//! Exponential backoff for outbox retry scheduling (`spec.md` §4.2, §8).
//!
//! Grounded on the source's `common::backoff::get_backoff_iter`, generalized
//! to take a configurable base/max instead of fixed constants, since the
//! outbox publisher's backoff is an operator-tunable config value
//! (`spec.md` §6: `outbox.base_backoff`, `outbox.max_backoff`).

use std::time::Duration;

/// Caps the doubling exponent so `2^n` never overflows a `u64`, per
/// `spec.md` §8 ("Overflow cap ... no integer overflow for `attempts` up to
/// 10 doublings; values beyond use the cap").
const MAX_DOUBLINGS: u32 = 10;

/// Computes the backoff delay for the `attempts_next`-th retry (1-indexed),
/// i.e. `min(max_backoff, base_backoff * 2^min(attempts_next - 1, 10))`.
///
/// `attempts_next` is expected to be `>= 1`; `0` is treated the same as `1`
/// (no doubling yet) since there is no such thing as a "0th" retry.
pub fn next_delay(base: Duration, max: Duration, attempts_next: u32) -> Duration {
    let doublings = attempts_next.saturating_sub(1).min(MAX_DOUBLINGS);
    let factor = 2u64.saturating_pow(doublings);
    let wait_ms = (base.as_millis() as u64).saturating_mul(factor);
    let bounded_ms = wait_ms.min(max.as_millis() as u64);
    Duration::from_millis(bounded_ms)
}

/// An infinite iterator of ever-larger backoff delays, capped at `max`.
/// Used by the projector's reconnect loop (`spec.md` §4.3: "infinite
/// exponential-backoff (base 1s, cap 1min)").
pub fn iter(base: Duration, max: Duration) -> impl Iterator<Item = Duration> {
    (1u32..).map(move |attempts_next| next_delay(base, max, attempts_next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_up_to_the_cap() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(120);
        assert_eq!(next_delay(base, max, 1), Duration::from_secs(5));
        assert_eq!(next_delay(base, max, 2), Duration::from_secs(10));
        assert_eq!(next_delay(base, max, 3), Duration::from_secs(20));
        // 5 * 2^4 = 80, still under the 120s cap
        assert_eq!(next_delay(base, max, 5), Duration::from_secs(80));
        // 5 * 2^5 = 160, clamped to 120
        assert_eq!(next_delay(base, max, 6), Duration::from_secs(120));
    }

    #[test]
    fn no_overflow_far_beyond_the_doubling_cap() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(120);
        for attempts_next in [100u32, 10_000, u32::MAX] {
            assert_eq!(next_delay(base, max, attempts_next), max);
        }
    }

    #[test]
    fn reconnect_default_matches_spec() {
        let mut it = iter(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(it.next(), Some(Duration::from_secs(1)));
        assert_eq!(it.next(), Some(Duration::from_secs(2)));
        assert_eq!(it.next(), Some(Duration::from_secs(4)));
    }
}
