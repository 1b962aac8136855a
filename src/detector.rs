//! [Module D] Detector — the per-resource-type façade.
//!
//! Ties the sampling gate, the active-tracker registry, the reclaim-queue
//! drain, and deduplicated reporting together. A `Detector` is meant to be
//! constructed once per resource type and shared (`Arc<Detector>`) across
//! every allocation site for that type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use dashmap::{DashMap, DashSet};

use crate::config::Config;
use crate::level::{self, Level};
use crate::reporter;
use crate::resource::Tracked;
use crate::rng::{SampleSource, ThreadRngSource};
use crate::tracker::Tracker;

/// An entry pushed onto a [`Detector`]'s reclaim queue when a [`Tracked`]
/// value's last strong reference is dropped — the synthesized stand-in for
/// a host garbage collector firing a weak reference queue (§9).
pub(crate) struct ReclaimEntry {
    pub(crate) id: u64,
    pub(crate) tracker: Arc<Tracker>,
    pub(crate) resource_type: Arc<str>,
}

/// Per-resource-type leak detector.
///
/// Holds the sampling configuration, the set of currently-live trackers
/// (`active`), the FIFO of reclaimed-but-not-yet-drained entries
/// (`reclaim_queue`), and the set of already-emitted reports
/// (`reported_trails`) used to deduplicate identical leaks.
pub struct Detector {
    config: Config,
    sample_source: Box<dyn SampleSource>,
    active: DashMap<u64, Arc<Tracker>>,
    reclaim_queue: SegQueue<ReclaimEntry>,
    reported_trails: DashSet<String>,
    next_id: AtomicU64,
}

impl Detector {
    /// Creates a new `Detector` for the resource type and sampling interval
    /// named by `config`, using the process's thread-local RNG as the
    /// sampling source.
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_sample_source(config, Box::new(ThreadRngSource))
    }

    /// As [`new`](Self::new), but with an injected [`SampleSource`] —
    /// primarily for tests that need deterministic sampling decisions.
    pub fn with_sample_source(config: Config, sample_source: Box<dyn SampleSource>) -> Arc<Self> {
        Arc::new(Self {
            config,
            sample_source,
            active: DashMap::new(),
            reclaim_queue: SegQueue::new(),
            reported_trails: DashSet::new(),
            next_id: AtomicU64::new(0),
        })
    }

    /// The resource type label this detector was configured with.
    pub fn resource_type(&self) -> &str {
        self.config.resource_type()
    }

    /// Whether this detector would install a tracker at all right now
    /// (`false` only at [`Level::Disabled`]).
    pub fn is_enabled(&self) -> bool {
        level::get() != Level::Disabled
    }

    /// Returns the current process-wide detection [`Level`].
    ///
    /// The level (§4.E, §5) is process-wide, not per-`Detector` state — this
    /// is an instance method only because §6 lists `getLevel()` alongside
    /// `track`/`isEnabled` as part of the API surface callers reach for on
    /// a `Detector` handle; it reads the same global every `Detector` shares.
    pub fn level(&self) -> Level {
        level::get()
    }

    /// Overrides the process-wide detection [`Level`] at runtime. See
    /// [`level`](Self::level) for why this is an instance method despite
    /// mutating shared, not per-`Detector`, state.
    pub fn set_level(&self, level: Level) {
        level::set(level);
    }

    /// The sampling gate (§4.D): offers `value` for tracking and returns a
    /// handle the caller holds alongside the resource for its lifetime.
    ///
    /// At [`Level::Disabled`] or on a sampling miss, the returned handle
    /// carries no tracker — every [`Tracked`] method becomes a no-op, which
    /// is this crate's translation of the source's nullable "no tracker"
    /// sentinel into something callers don't have to branch on.
    pub fn track<T: Send + Sync + 'static>(self: &Arc<Self>, value: T) -> Tracked<T> {
        let level = level::get();
        if level == Level::Disabled {
            return Tracked::untracked(value);
        }

        let sampled = level == Level::Paranoid
            || self.sample_source.sample(self.config.sampling_interval());
        if !sampled {
            return Tracked::untracked(value);
        }

        self.drain_reclaimed();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tracker = Arc::new(Tracker::new());
        self.active.insert(id, Arc::clone(&tracker));
        log::trace!(
            target: "leaktrack",
            "{}: installed tracker #{id} ({} now active)",
            self.config.resource_type(),
            self.active.len()
        );

        Tracked::tracked(value, id, tracker, Arc::clone(self))
    }

    /// Called by a [`Tracked`] value's drop glue when its last strong
    /// reference disappears. Mirrors a host GC firing a weak-reference
    /// queue (§9) — it fires whether or not the resource was closed first;
    /// [`drain_reclaimed`](Self::drain_reclaimed) is what tells leaks apart
    /// from clean releases, via the active-set membership check.
    pub(crate) fn enqueue_reclaim(&self, id: u64, tracker: Arc<Tracker>, resource_type: Arc<str>) {
        self.reclaim_queue.push(ReclaimEntry { id, tracker, resource_type });
    }

    /// The normal-release path: atomically removes `id` from the active
    /// set and retires its tracker. Returns `true` exactly once across all
    /// racing callers (including a concurrent reclaim-queue drain for the
    /// same `id`) — the mutual exclusion invariant straight-line tests
    /// exercise as the close/dispose race (§8 invariant 5).
    pub(crate) fn close_tracked(&self, id: u64, tracker: &Tracker) -> bool {
        let removed = self.active.remove(&id).is_some();
        tracker.close();
        removed
    }

    /// Drains the reclaim queue, reporting exactly one deduplicated leak
    /// per unique rendered trail.
    ///
    /// Driven opportunistically by [`track`](Self::track) calls rather than
    /// a dedicated thread, per §4.D — there is no background draining.
    fn drain_reclaimed(&self) {
        while let Some(entry) = self.reclaim_queue.pop() {
            let was_active = self.active.remove(&entry.id).is_some();
            if !was_active {
                // already closed normally; not a leak.
                log::trace!(target: "leaktrack", "{}: drained #{} (closed, not a leak)", entry.resource_type, entry.id);
                continue;
            }

            if !reporter::enabled() {
                // reporter unavailable: still dispose, skip rendering entirely (§7).
                log::trace!(target: "leaktrack", "{}: drained #{} (leaked, reporter disabled)", entry.resource_type, entry.id);
                entry.tracker.close();
                continue;
            }

            log::trace!(target: "leaktrack", "{}: drained #{} (leaked, rendering trail)", entry.resource_type, entry.id);
            let trail = entry.tracker.render_leak_trail().unwrap_or_default();
            reporter::report(&entry.resource_type, &trail, &self.reported_trails);
        }
    }

    /// Number of trackers currently believed live. Exposed for tests
    /// exercising §8's end-to-end scenarios.
    #[cfg(any(test, feature = "test-util"))]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::Detector;
    use crate::config::Config;
    use crate::level::{self, Level};
    use crate::rng::{AlwaysSample, NeverSample};

    fn detector(interval: u32, source: impl crate::rng::SampleSource + 'static) -> std::sync::Arc<Detector> {
        let config = Config::with_params("TestResource", interval).unwrap();
        Detector::with_sample_source(config, Box::new(source))
    }

    #[test]
    fn level_accessors_read_and_write_the_global() {
        let d = detector(1, AlwaysSample);
        d.set_level(Level::Paranoid);
        assert_eq!(d.level(), Level::Paranoid);
        level::reset_for_test();
    }

    #[test]
    fn disabled_level_never_installs_a_tracker() {
        level::set(Level::Disabled);
        let d = detector(1, AlwaysSample);
        let handle = d.track(42u32);
        assert!(!handle.is_tracked());
        assert_eq!(d.active_count(), 0);
        level::reset_for_test();
    }

    #[test]
    fn sampled_hit_installs_a_tracker() {
        level::set(Level::Simple);
        let d = detector(1, AlwaysSample);
        let handle = d.track(42u32);
        assert!(handle.is_tracked());
        assert_eq!(d.active_count(), 1);
        level::reset_for_test();
    }

    #[test]
    fn sampling_miss_returns_untracked() {
        level::set(Level::Simple);
        let d = detector(1000, NeverSample);
        let handle = d.track(42u32);
        assert!(!handle.is_tracked());
        assert_eq!(d.active_count(), 0);
        level::reset_for_test();
    }

    #[test]
    fn explicit_close_removes_from_active_set_with_no_report() {
        level::set(Level::Simple);
        let d = detector(1, AlwaysSample);
        let handle = d.track(42u32);
        assert!(handle.close());
        assert_eq!(d.active_count(), 0);
        assert!(!handle.close());
        level::reset_for_test();
    }

    #[test]
    fn dropping_without_close_reports_a_leak() {
        level::set(Level::Simple);
        let d = detector(1, AlwaysSample);
        {
            let handle = d.track(42u32);
            assert!(handle.is_tracked());
        }
        // the drop already fired the reclaim queue; the next track() drains it.
        let _ = d.track(7u32);
        assert_eq!(d.active_count(), 1);
        level::reset_for_test();
    }

    #[test]
    fn closed_then_dropped_resource_is_not_reported_as_a_leak() {
        level::set(Level::Simple);
        let d = detector(1, AlwaysSample);
        {
            let handle = d.track(42u32);
            assert!(handle.close());
        }
        let _ = d.track(7u32);
        assert_eq!(d.active_count(), 1);
        level::reset_for_test();
    }
}
