//! Optional convenience API, gated behind the `global` feature: a
//! process-wide registry of [`Detector`]s keyed by resource-type label, so a
//! caller with many small call sites doesn't have to thread an
//! `Arc<Detector>` through their own types.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::config::Config;
use crate::detector::Detector;
use crate::resource::Tracked;

const DEFAULT_SAMPLING_INTERVAL: u32 = 128;

/// Label substituted for an empty `resource_type`, so this convenience API
/// never panics on caller input — it falls back the same way
/// [`crate::level::Level::parse`] falls back to [`crate::Level::Simple`]
/// on an unrecognized level string, rather than threading a `Result`
/// through a signature callers expect to just work.
const FALLBACK_RESOURCE_TYPE: &str = "unlabeled";

static REGISTRY: OnceLock<DashMap<String, Arc<Detector>>> = OnceLock::new();

fn registry() -> &'static DashMap<String, Arc<Detector>> {
    REGISTRY.get_or_init(DashMap::new)
}

/// Returns the shared [`Detector`] for `resource_type`, creating it with the
/// default sampling interval (128) on first use.
///
/// An empty `resource_type` falls back to [`FALLBACK_RESOURCE_TYPE`] instead
/// of panicking — `resource_type` is caller-supplied and `Config::with_params`
/// rejecting it is meant to be recoverable, not a reason for this convenience
/// wrapper to panic.
pub fn detector_for(resource_type: &str) -> Arc<Detector> {
    if let Some(existing) = registry().get(resource_type) {
        return Arc::clone(&existing);
    }

    let config = Config::with_params(resource_type, DEFAULT_SAMPLING_INTERVAL).unwrap_or_else(|err| {
        log::debug!(
            target: "leaktrack",
            "detector_for({resource_type:?}) failed ({err}), falling back to {FALLBACK_RESOURCE_TYPE:?}"
        );
        Config::with_params(FALLBACK_RESOURCE_TYPE, DEFAULT_SAMPLING_INTERVAL)
            .expect("FALLBACK_RESOURCE_TYPE is non-empty and the default interval is non-zero")
    });
    let detector = Detector::new(config);
    Arc::clone(registry().entry(resource_type.to_string()).or_insert(detector))
}

/// Tracks `value` under the shared detector for `resource_type`. Shorthand
/// for `detector_for(resource_type).track(value)`.
pub fn track<T: Send + Sync + 'static>(resource_type: &str, value: T) -> Tracked<T> {
    detector_for(resource_type).track(value)
}

#[cfg(any(test, feature = "test-util"))]
pub fn reset_for_test() {
    if let Some(r) = REGISTRY.get() {
        r.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{detector_for, reset_for_test, track};

    #[test]
    fn same_resource_type_shares_one_detector() {
        reset_for_test();
        let a = detector_for("default::TestBuffer");
        let b = detector_for("default::TestBuffer");
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn track_shorthand_returns_a_handle() {
        reset_for_test();
        let handle = track("default::TestHandle", 1u32);
        assert_eq!(*handle, 1);
    }

    #[test]
    fn empty_resource_type_falls_back_instead_of_panicking() {
        reset_for_test();
        let handle = track("", 1u32);
        assert_eq!(*handle, 1);
    }
}
