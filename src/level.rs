//! The global detection [`Level`] and the process-wide atomic that holds it.

use core::sync::atomic::{AtomicU8, Ordering};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Level
////////////////////////////////////////////////////////////////////////////////////////////////////

/// How aggressively resources are sampled and tracked.
///
/// Ordered: `Disabled < Simple < Advanced < Paranoid`. Comparisons are by
/// ordinal, so `level >= Level::Advanced` reads naturally.
///
/// The level only gates whether a tracker is installed at all: `Disabled`
/// skips tracking entirely, `Simple`/`Advanced` apply the configured
/// sampling interval, and `Paranoid` bypasses sampling and tracks every
/// allocation. Once a tracker exists, `record`/`record_hint` are always
/// honored regardless of level — there is no separate trail-less mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Level {
    /// No tracker is ever installed and no leak is ever reported.
    Disabled = 0,
    /// Tracks a sample of allocations (per the configured interval).
    Simple = 1,
    /// Same sampling behavior as `Simple`; distinguished for callers that
    /// want to signal "detailed tracking wanted" in their own configuration.
    Advanced = 2,
    /// Tracks every allocation, bypassing the sampling interval entirely.
    Paranoid = 3,
}

/********** impl inherent *************************************************************************/

impl Level {
    /// Parses a [`Level`] from its (case-insensitive) variant name or its
    /// ordinal as a decimal digit.
    ///
    /// Anything else falls back to [`Level::Simple`], matching the relaxed
    /// parsing of the source configuration property.
    #[inline]
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "disabled" => Level::Disabled,
            "simple" => Level::Simple,
            "advanced" => Level::Advanced,
            "paranoid" => Level::Paranoid,
            _ => match trimmed.parse::<u8>() {
                Ok(0) => Level::Disabled,
                Ok(1) => Level::Simple,
                Ok(2) => Level::Advanced,
                Ok(3) => Level::Paranoid,
                _ => {
                    log::debug!(
                        target: "leaktrack",
                        "unrecognized detection level {trimmed:?}, falling back to Level::Simple"
                    );
                    Level::Simple
                }
            },
        }
    }

    #[inline]
    const fn from_u8(byte: u8) -> Self {
        match byte {
            0 => Level::Disabled,
            1 => Level::Simple,
            2 => Level::Advanced,
            _ => Level::Paranoid,
        }
    }
}

impl Default for Level {
    #[inline]
    fn default() -> Self {
        Level::Simple
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// global level
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Process-wide current [`Level`], read on every `Detector::track` call.
///
/// A plain atomic: reconfiguration racing with `track` is benign, at worst
/// one sample observes a stale level.
static LEVEL: AtomicU8 = AtomicU8::new(u8::MAX);

/// Returns the current global [`Level`], lazily resolving it from the
/// environment on first use (see [`crate::env`]).
#[inline]
pub fn get() -> Level {
    let raw = LEVEL.load(Ordering::Relaxed);
    if raw == u8::MAX {
        let resolved = crate::env::resolve_level();
        LEVEL.store(resolved as u8, Ordering::Relaxed);
        resolved
    } else {
        Level::from_u8(raw)
    }
}

/// Overrides the global [`Level`] at runtime.
#[inline]
pub fn set(level: Level) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Resets the global level back to "unresolved", so the next [`get`] call
/// re-reads the environment. Test-only entry point for resetting this
/// process-wide state between test cases.
#[cfg(any(test, feature = "test-util"))]
#[inline]
pub fn reset_for_test() {
    LEVEL.store(u8::MAX, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::Level;

    #[test]
    fn parse_variant_names_case_insensitive() {
        assert_eq!(Level::parse("DISABLED"), Level::Disabled);
        assert_eq!(Level::parse("Simple"), Level::Simple);
        assert_eq!(Level::parse("advanced"), Level::Advanced);
        assert_eq!(Level::parse("PaRaNoId"), Level::Paranoid);
    }

    #[test]
    fn parse_ordinal_digits() {
        assert_eq!(Level::parse("0"), Level::Disabled);
        assert_eq!(Level::parse("2"), Level::Advanced);
        assert_eq!(Level::parse("3"), Level::Paranoid);
    }

    #[test]
    fn parse_falls_back_to_simple() {
        assert_eq!(Level::parse("garbage"), Level::Simple);
        assert_eq!(Level::parse(""), Level::Simple);
        assert_eq!(Level::parse("99"), Level::Simple);
    }

    #[test]
    fn ordering_is_by_ordinal() {
        assert!(Level::Disabled < Level::Simple);
        assert!(Level::Simple < Level::Advanced);
        assert!(Level::Advanced < Level::Paranoid);
    }
}
