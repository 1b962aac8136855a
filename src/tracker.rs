//! [Module C] Tracker — the per-resource access trail.
//!
//! A `Tracker` is a Treiber stack of [`Record`]s rooted at the shared
//! [`Record::bottom`] sentinel. Appends are lock-free CAS loops, and both
//! the back-off replace-top branch and `close`/`render_leak_trail` free
//! nodes a concurrent `record` call elsewhere might still be mid-dereference
//! of — every load of `head` that gets dereferenced is therefore protected
//! by a [`crate::hazard`] guard first, and every node this module frees goes
//! through [`hazard::retire`], which waits out any reader still announcing
//! it before reclaiming the memory.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::hazard::{self, HazardGuard};
use crate::record::Record;
use crate::rng::SampleSource;

/// The per-resource access trail.
///
/// Starts active (head pointing at the bottom sentinel) and transitions to
/// closed exactly once, either via [`close`](Self::close) (resource released
/// correctly — trail discarded) or [`render_leak_trail`](Self::render_leak_trail)
/// (resource reclaimed while still active — trail rendered into a report).
pub(crate) struct Tracker {
    head: AtomicPtr<Record>,
    dropped: AtomicU32,
}

/// A `head` load that has been announced via a hazard guard and re-verified
/// against the live `head` field, so the pointer it carries is safe to
/// dereference for as long as this value is alive.
struct ProtectedHead {
    ptr: *mut Record,
    _guard: HazardGuard,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self { head: AtomicPtr::new(Record::bottom()), dropped: AtomicU32::new(0) }
    }

    /// Whether this tracker has not yet been closed or rendered.
    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        !self.head.load(Ordering::Relaxed).is_null()
    }

    /// Loads `head`, announces it as a hazard, then re-reads `head` to
    /// confirm it hasn't already been swapped out from under us. A mismatch
    /// means a concurrent `close`/`render_leak_trail`/back-off replace may
    /// already be freeing the node we loaded, so we drop the (now useless)
    /// guard and retry rather than risk dereferencing it. Returns `None`
    /// once `head` is observed null (closed).
    fn protected_head(&self) -> Option<ProtectedHead> {
        loop {
            let candidate = self.head.load(Ordering::SeqCst);
            if candidate.is_null() {
                return None;
            }
            // Safety: `candidate` was just loaded from `head` and is
            // non-null, satisfying `protect`'s precondition.
            let guard = unsafe { hazard::protect(candidate) };
            if self.head.load(Ordering::SeqCst) == candidate {
                return Some(ProtectedHead { ptr: candidate, _guard: guard });
            }
            // `head` moved between our two loads: `candidate` may already
            // be retired. Drop the guard and try again with whatever is
            // current now.
        }
    }

    /// Records an access with no hint.
    pub(crate) fn record(&self, target: u32, rng: &dyn SampleSource) {
        self.record_with(target, rng, |next| unsafe { Record::new(next) });
    }

    /// Records an access, attaching `hint`'s rendered form to the trail.
    pub(crate) fn record_hint(&self, target: u32, rng: &dyn SampleSource, hint: impl fmt::Display) {
        self.record_with(target, rng, |next| unsafe { Record::with_hint(next, hint) });
    }

    fn record_with(
        &self,
        target: u32,
        rng: &dyn SampleSource,
        make: impl Fn(*mut Record) -> Box<Record>,
    ) {
        if target == 0 {
            // §4.C: with T == 0, `record` is a no-op except for the
            // closed-state check — no record is linked, no counter moves,
            // whether or not the tracker is still active.
            return;
        }

        loop {
            let head = match self.protected_head() {
                Some(head) => head,
                None => return, // already closed or rendered.
            };

            let pos = unsafe { (*head.ptr).pos() } + 1;
            if pos <= i64::from(target) || Self::grow(pos, target, rng) {
                // append: depth grows by one.
                let node = Box::into_raw(make(head.ptr));
                if self
                    .head
                    .compare_exchange_weak(head.ptr, node, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
                unsafe { drop(Box::from_raw(node)) };
            } else {
                // replace the top record in place: same depth, newest access
                // still preserved at the head, oldest superseded entry
                // retired (not simply freed — other readers may still be
                // announcing it).
                let predecessor = unsafe { (*head.ptr).next() };
                let node = Box::into_raw(make(predecessor));
                if self
                    .head
                    .compare_exchange_weak(head.ptr, node, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
                {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    let old = head.ptr;
                    drop(head); // release our own hazard before retiring it.
                    unsafe { hazard::retire(old) };
                    return;
                }
                unsafe { drop(Box::from_raw(node)) };
            }
        }
    }

    /// Whether a record past `target` depth should still grow the chain
    /// rather than replace its top: probability `1 / 2^k`, `k` growing with
    /// depth past `target` and capped at `30`.
    fn grow(pos: i64, target: u32, rng: &dyn SampleSource) -> bool {
        let backoff = (pos - i64::from(target)).min(30) as u32;
        rng.sample(1u32 << backoff)
    }

    /// Discards the trail without rendering it: the resource was released
    /// correctly. Returns `false` if this tracker was already closed or
    /// rendered.
    pub(crate) fn close(&self) -> bool {
        let head = self.head.swap(std::ptr::null_mut(), Ordering::SeqCst);
        if head.is_null() {
            return false;
        }
        free_chain(head);
        true
    }

    /// Takes and renders the trail: the resource was reclaimed while still
    /// in the active set, i.e. leaked. Returns `None` if this tracker was
    /// already closed or rendered by a racing call.
    pub(crate) fn render_leak_trail(&self) -> Option<String> {
        let head = self.head.swap(std::ptr::null_mut(), Ordering::SeqCst);
        if head.is_null() {
            return None;
        }

        let bottom = Record::bottom();
        let mut nodes = Vec::new();
        let mut curr = head;
        while curr != bottom {
            nodes.push(curr);
            curr = unsafe { (*curr).next() };
        }
        // the structurally-terminal record — the one whose `next` is the
        // sentinel — is always the last entry collected above.
        let terminal = nodes.last().copied();

        let mut seen = HashSet::new();
        let mut rendered = Vec::with_capacity(nodes.len());
        let mut duped = 0u32;
        let mut terminal_rendered = false;
        for &node in &nodes {
            let mut text = String::new();
            unsafe { (*node).render(&mut text) };
            if seen.insert(text.clone()) {
                if Some(node) == terminal {
                    terminal_rendered = true;
                }
                rendered.push(text);
            } else {
                duped += 1;
            }
        }
        for node in nodes {
            unsafe { hazard::retire(node) };
        }

        let dropped = self.dropped.swap(0, Ordering::Relaxed);

        let mut out = String::new();
        // "Created at:" belongs to the terminal record specifically, not to
        // whatever happens to land last in `rendered` — if the terminal
        // record's text was a duplicate of a more recent one, it was
        // dropped from `rendered` entirely and nothing should claim the
        // "Created at:" label in its place.
        let created_at_idx = if terminal_rendered { rendered.len().checked_sub(1) } else { None };
        for (i, text) in rendered.iter().enumerate() {
            if Some(i) == created_at_idx {
                out.push_str("Created at:\n");
            } else {
                out.push_str(&format!("#{}:\n", i + 1));
            }
            out.push_str(text);
        }
        if duped > 0 {
            out.push_str(&format!(
                "{duped} leak records were discarded because they were duplicates\n"
            ));
        }
        if dropped > 0 {
            out.push_str(&format!(
                "{dropped} leak records were discarded because the {} limit was reached\n",
                crate::env::TARGET_RECORDS_PROPERTY
            ));
        }
        Some(out)
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        let head = self.head.swap(std::ptr::null_mut(), Ordering::SeqCst);
        if !head.is_null() {
            free_chain(head);
        }
    }
}

fn free_chain(head: *mut Record) {
    let bottom = Record::bottom();
    let mut curr = head;
    while curr != bottom {
        let next = unsafe { (*curr).next() };
        unsafe { hazard::retire(curr) };
        curr = next;
    }
}

#[cfg(test)]
mod tests {
    use super::Tracker;
    use crate::rng::{AlwaysSample, NeverSample};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn new_tracker_is_active_with_empty_trail() {
        let t = Tracker::new();
        assert!(t.is_active());
    }

    #[test]
    fn close_deactivates_and_is_idempotent() {
        let t = Tracker::new();
        assert!(t.close());
        assert!(!t.is_active());
        assert!(!t.close());
    }

    #[test]
    fn render_after_close_returns_none() {
        let t = Tracker::new();
        t.close();
        assert!(t.render_leak_trail().is_none());
    }

    #[test]
    fn recorded_trail_renders_created_at_and_numbering() {
        let t = Tracker::new();
        t.record_hint(16, &AlwaysSample, "first");
        t.record_hint(16, &AlwaysSample, "second");
        t.record_hint(16, &AlwaysSample, "third");

        let trail = t.render_leak_trail().unwrap();
        assert!(trail.contains("Created at:\n\tHint: first\n"));
        assert!(trail.contains("#1:\n\tHint: third\n"));
        assert!(trail.contains("#2:\n\tHint: second\n"));
    }

    #[test]
    fn terminal_record_deduped_away_leaves_no_created_at_label() {
        // repeated bare `record()` calls from the very same source line
        // render to identical text (no hint, identical captured backtrace);
        // the oldest (terminal) one is a duplicate of the newest and must
        // not be mislabeled "Created at:".
        let t = Tracker::new();
        for _ in 0..3 {
            t.record(16, &AlwaysSample);
        }

        let trail = t.render_leak_trail().unwrap();
        assert!(!trail.contains("Created at:"));
        assert!(trail.contains("#1:"));
        assert!(trail.contains("2 leak records were discarded because they were duplicates"));
    }

    #[test]
    fn target_zero_is_a_pure_no_op() {
        let t = Tracker::new();
        t.record(0, &AlwaysSample);
        t.record(0, &NeverSample);
        let trail = t.render_leak_trail().unwrap();
        assert!(trail.is_empty());
    }

    #[test]
    fn empty_trail_after_close_never_allocated_any_record() {
        let t = Tracker::new();
        assert!(t.close());
    }

    #[test]
    fn concurrent_record_and_close_never_use_after_free() {
        // stresses the race the hazard-pointer protection exists for: one
        // thread repeatedly appends while another closes (freeing the whole
        // chain) underneath it. Correctness here means "doesn't crash" —
        // the assertions just confirm both sides ran to completion.
        let t = Arc::new(Tracker::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let t = Arc::clone(&t);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    t.record(4, &AlwaysSample);
                }
            })
        };

        for _ in 0..200 {
            thread::yield_now();
        }
        let closed = t.close();
        done.store(true, Ordering::Relaxed);
        writer.join().unwrap();
        // `close` is the only terminal transition exercised here, so it
        // must have won exactly once.
        assert!(closed);
    }
}
