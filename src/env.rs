//! Contractual configuration inputs, consulted at Detector startup.
//!
//! The property names below are part of the external interface: a caller
//! porting an existing deployment sets the exact same environment variable
//! names. Resolution happens once, lazily, on first use, and is cached.

use core::sync::atomic::{AtomicU32, Ordering};
use std::env;

use crate::level::Level;

/// Preferred spelling of the level property.
pub const LEVEL_PROPERTY: &str = "io.netty.leakDetection.level";
/// Legacy spelling of the level property, consulted if the preferred one is unset.
pub const LEVEL_PROPERTY_LEGACY: &str = "io.netty.leakDetectionLevel";
/// Legacy boolean override: any truthy value forces [`Level::Disabled`].
pub const DISABLE_PROPERTY: &str = "io.netty.noResourceLeakDetection";
/// Process-wide default for [`crate::tracker::TARGET_RECORDS`].
pub const TARGET_RECORDS_PROPERTY: &str = "io.netty.leakDetection.targetRecords";

const DEFAULT_TARGET_RECORDS: u32 = 4;

/// Resolves the initial [`Level`] from the environment.
///
/// Order: the legacy boolean disable switch wins outright if truthy, then the
/// preferred level property, then the legacy level property, then the
/// built-in default ([`Level::Simple`]).
pub(crate) fn resolve_level() -> Level {
    if let Ok(disable) = env::var(DISABLE_PROPERTY) {
        if is_truthy(&disable) {
            log::trace!(target: "leaktrack", "{DISABLE_PROPERTY}={disable:?} disables leak detection");
            return Level::Disabled;
        }
    }

    if let Ok(value) = env::var(LEVEL_PROPERTY) {
        return Level::parse(&value);
    }

    if let Ok(value) = env::var(LEVEL_PROPERTY_LEGACY) {
        log::trace!(target: "leaktrack", "using legacy {LEVEL_PROPERTY_LEGACY} property");
        return Level::parse(&value);
    }

    log::trace!(target: "leaktrack", "no level property set, defaulting to {:?}", Level::default());
    Level::default()
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "on")
}

/// Process-wide `TARGET_RECORDS` tunable (§4.E), resolved once from
/// [`TARGET_RECORDS_PROPERTY`] and cached. `u32::MAX` is the sentinel for
/// "unresolved".
static TARGET_RECORDS: AtomicU32 = AtomicU32::new(u32::MAX);

/// Returns the current process-wide `TARGET_RECORDS` value.
pub fn target_records() -> u32 {
    let raw = TARGET_RECORDS.load(Ordering::Relaxed);
    if raw != u32::MAX {
        return raw;
    }

    let resolved = match env::var(TARGET_RECORDS_PROPERTY) {
        Ok(value) => value.trim().parse::<u32>().unwrap_or_else(|err| {
            log::debug!(
                target: "leaktrack",
                "{TARGET_RECORDS_PROPERTY}={value:?} is not a valid u32 ({err}), falling back to {DEFAULT_TARGET_RECORDS}"
            );
            DEFAULT_TARGET_RECORDS
        }),
        Err(_) => DEFAULT_TARGET_RECORDS,
    };

    log::trace!(target: "leaktrack", "resolved {TARGET_RECORDS_PROPERTY}={resolved}");
    TARGET_RECORDS.store(resolved, Ordering::Relaxed);
    resolved
}

/// Overrides `TARGET_RECORDS` at runtime, bypassing the environment.
pub fn set_target_records(value: u32) {
    TARGET_RECORDS.store(value, Ordering::Relaxed);
}

#[cfg(any(test, feature = "test-util"))]
pub fn reset_for_test() {
    TARGET_RECORDS.store(u32::MAX, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::is_truthy;

    #[test]
    fn truthy_values() {
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("yes"));
        assert!(is_truthy("1"));
        assert!(is_truthy("on"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
