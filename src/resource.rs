//! [MODULE] Reclamation Bridge — the phantom-owner wrapper that turns a Rust
//! `Arc`'s last-strong-drop into the "runtime enqueues the Tracker" event
//! the design assumes a host garbage collector provides (§9).

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::detector::Detector;
use crate::env;
use crate::rng::ThreadRngSource;
use crate::tracker::Tracker;

struct Tracking {
    id: u64,
    tracker: Arc<Tracker>,
    resource_type: Arc<str>,
    detector: Arc<Detector>,
}

struct Wrapped<T> {
    value: T,
    tracking: Option<Tracking>,
}

impl<T> Drop for Wrapped<T> {
    fn drop(&mut self) {
        // fires unconditionally, leak or not — mirrors a host GC firing a
        // weak-reference queue on every deallocation (§9); `drain_reclaimed`
        // is what tells a leak apart from a clean release.
        if let Some(t) = self.tracking.take() {
            t.detector.enqueue_reclaim(t.id, t.tracker, t.resource_type);
        }
    }
}

/// A resource handle returned by [`Detector::track`](crate::detector::Detector::track).
///
/// Derefs to the wrapped value. Cloning shares the same underlying
/// allocation (and hence the same tracker) — the host is expected to place
/// a `Tracked<T>` wherever it would otherwise have held `Arc<T>` directly.
/// When the last clone is dropped, tracking is automatically retired: if it
/// was never [`close`](Self::close)d, the drop is reported as a leak.
pub struct Tracked<T> {
    inner: Arc<Wrapped<T>>,
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: Send + Sync + 'static> Tracked<T> {
    pub(crate) fn untracked(value: T) -> Self {
        Self { inner: Arc::new(Wrapped { value, tracking: None }) }
    }

    pub(crate) fn tracked(
        value: T,
        id: u64,
        tracker: Arc<Tracker>,
        detector: Arc<Detector>,
    ) -> Self {
        let resource_type: Arc<str> = Arc::from(detector.resource_type());
        Self {
            inner: Arc::new(Wrapped {
                value,
                tracking: Some(Tracking { id, tracker, resource_type, detector }),
            }),
        }
    }

    /// Whether a sampling hit actually installed a tracker for this handle.
    /// `false` means every other method on this handle is a no-op — this is
    /// this crate's translation of the source's nullable "no tracker"
    /// sentinel (§7: "callers must treat a missing tracker as a no-op").
    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.inner.tracking.is_some()
    }

    /// Records an access with no hint. No-op if [`is_tracked`](Self::is_tracked) is `false`.
    pub fn record(&self) {
        if let Some(t) = &self.inner.tracking {
            t.tracker.record(env::target_records(), &ThreadRngSource);
        }
    }

    /// Records an access, attaching `hint`'s rendered form to the trail.
    /// No-op if [`is_tracked`](Self::is_tracked) is `false`.
    pub fn record_hint(&self, hint: impl fmt::Display) {
        if let Some(t) = &self.inner.tracking {
            t.tracker.record_hint(env::target_records(), &ThreadRngSource, hint);
        }
    }

    /// Marks the resource as correctly released: removes it from the
    /// detector's active set and discards its trail. Returns `true` exactly
    /// once across every clone and every racing reclaim — see the
    /// close/dispose race in §8 invariant 5.
    pub fn close(&self) -> bool {
        match &self.inner.tracking {
            Some(t) => t.detector.close_tracked(t.id, &t.tracker),
            None => false,
        }
    }

    /// As [`close`](Self::close), but first checks that `resource` is the
    /// same tracked allocation as `self` — the Rust analogue of the
    /// source's `close(trackedObject)` two-argument form, which asserted an
    /// identity-hash match before closing. Since `Tracked<T>` already keeps
    /// the resource and its tracker in one allocation, this is a plain
    /// pointer-identity check rather than a separate hash.
    ///
    /// The identity check is diagnostic only, not a gate: `close()` is
    /// always attempted, matching/mismatching handle or not.
    pub fn close_checked(&self, resource: &Tracked<T>) -> bool {
        let same = Arc::ptr_eq(&self.inner, &resource.inner);
        debug_assert!(same, "close_checked called with a mismatched Tracked<T> allocation");
        if !same {
            log::debug!(
                target: "leaktrack",
                "close_checked called with a resource handle that doesn't match the allocation it was invoked on"
            );
        }
        self.close()
    }
}
