//! The uniform random source behind sampling decisions.
//!
//! Sampling itself (see [`crate::detector`]) only ever needs "was this the
//! 1-in-`interval` pick", so the coupling to an actual RNG implementation is
//! kept behind a narrow trait — tests inject deterministic sources instead of
//! depending on real randomness.

use rand::Rng;

/// A source of sampling decisions.
///
/// Implementations need not be cryptographically secure; this crate only
/// uses the result to decide whether to pay for a stack capture, not for
/// anything security-sensitive.
pub trait SampleSource: Send + Sync {
    /// Returns `true` with probability `1 / interval.max(1)`.
    fn sample(&self, interval: u32) -> bool;
}

/// The default [`SampleSource`], backed by [`rand::thread_rng`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl SampleSource for ThreadRngSource {
    #[inline]
    fn sample(&self, interval: u32) -> bool {
        if interval <= 1 {
            return true;
        }
        rand::thread_rng().gen_range(0..interval) == 0
    }
}

/// A [`SampleSource`] that always samples. Useful in tests that need every
/// allocation tracked regardless of the configured interval.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSample;

impl SampleSource for AlwaysSample {
    #[inline]
    fn sample(&self, _interval: u32) -> bool {
        true
    }
}

/// A [`SampleSource`] that never samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSample;

impl SampleSource for NeverSample {
    #[inline]
    fn sample(&self, _interval: u32) -> bool {
        false
    }
}
