//! Hazard-pointer protection for [`Tracker`](crate::tracker::Tracker)'s
//! lock-free access-trail stack.
//!
//! `Tracker::head` is a Treiber stack: pushes and the back-off replace-top
//! free their own displaced node, and `close`/`render_leak_trail` free an
//! entire chain in one shot. None of that freeing may ever race a concurrent
//! reader that has already loaded a node pointer and is about to dereference
//! it — that is exactly the use-after-free hazard pointers exist to close,
//! the way the teacher crate's own `Global`/`HazardList` protect loads of
//! its shared pointers before they're dereferenced.
//!
//! This is a single, process-wide, grow-only registry of hazard slots
//! (mirroring the teacher's `HazardList`, simplified: one slot per thread,
//! acquired lazily and never returned on thread exit — acceptable here
//! since announcing a hazard is a handful of instructions around a single
//! pointer dereference, not a long-lived reservation).

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use std::thread;

use crate::queue::{RawNode, RawQueue};
use crate::record::Record;

struct HazardNode {
    protected: AtomicPtr<Record>,
    next: AtomicPtr<HazardNode>,
}

impl RawNode for HazardNode {
    #[inline]
    unsafe fn next(node: *mut Self) -> *mut Self {
        (*node).next.load(Ordering::Acquire)
    }

    #[inline]
    unsafe fn set_next(node: *mut Self, next: *mut Self) {
        (*node).next.store(next, Ordering::Release);
    }
}

static HAZARDS: RawQueue<HazardNode> = RawQueue::new();

thread_local! {
    static LOCAL_SLOT: *mut HazardNode = {
        let node = Box::into_raw(Box::new(HazardNode {
            protected: AtomicPtr::new(ptr::null_mut()),
            next: AtomicPtr::new(ptr::null_mut()),
        }));
        unsafe { HAZARDS.push(node) };
        node
    };
}

/// RAII announcement that `ptr` is in use. Clears the slot on drop.
///
/// Only ever constructed via [`protect`] — the slot is published with
/// [`Ordering::SeqCst`], matched by a [`Ordering::SeqCst`] scan in
/// [`is_protected`], so that every thread agrees on a single total order
/// between "announce" and "scan for announcements" regardless of which
/// side runs first.
pub(crate) struct HazardGuard {
    slot: *mut HazardNode,
}

impl Drop for HazardGuard {
    #[inline]
    fn drop(&mut self) {
        unsafe { (*self.slot).protected.store(ptr::null_mut(), Ordering::SeqCst) };
    }
}

/// Announces that the current thread is about to dereference `ptr`.
///
/// # Safety
///
/// `ptr` must be non-null.
pub(crate) unsafe fn protect(ptr: *mut Record) -> HazardGuard {
    debug_assert!(!ptr.is_null(), "must not protect a null pointer");
    let slot = LOCAL_SLOT.with(|&slot| slot);
    (*slot).protected.store(ptr, Ordering::SeqCst);
    HazardGuard { slot }
}

/// Returns `true` if any live [`HazardGuard`] (on any thread) currently
/// announces `ptr`.
pub(crate) fn is_protected(ptr: *mut Record) -> bool {
    if ptr.is_null() {
        return false;
    }
    HAZARDS.iter().any(|node| node.protected.load(Ordering::SeqCst) == ptr)
}

/// Frees `node` once no thread announces it, per the hazard-pointer retire
/// protocol: a concurrent reader that already published `node` in its own
/// slot is waited out rather than raced with.
///
/// # Safety
///
/// `node` must be a pointer previously obtained from `Box::into_raw` of a
/// live [`Record`] that has already been unlinked from every `Tracker` it
/// could still be reached through — the caller's job is unlinking, this
/// function's job is only making sure no in-flight reader is still looking
/// at it before the memory is reclaimed.
pub(crate) unsafe fn retire(node: *mut Record) {
    let mut spins = 0u32;
    while is_protected(node) {
        if spins < 64 {
            core::hint::spin_loop();
            spins += 1;
        } else {
            thread::yield_now();
        }
    }
    drop(Box::from_raw(node));
}

#[cfg(test)]
mod tests {
    use super::{is_protected, protect, retire};
    use crate::record::Record;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn unprotected_pointer_is_not_protected() {
        let node = unsafe { Box::into_raw(Record::new(Record::bottom())) };
        assert!(!is_protected(node));
        unsafe { retire(node) };
    }

    #[test]
    fn protected_pointer_is_reported_while_guard_lives() {
        let node = unsafe { Box::into_raw(Record::new(Record::bottom())) };
        let guard = unsafe { protect(node) };
        assert!(is_protected(node));
        drop(guard);
        assert!(!is_protected(node));
        unsafe { retire(node) };
    }

    #[test]
    fn retire_waits_for_the_announcing_thread_to_release() {
        let node = unsafe { Box::into_raw(Record::new(Record::bottom())) };
        let node_addr = node as usize;
        let released = Arc::new(AtomicBool::new(false));

        let guard = unsafe { protect(node) };
        let released_clone = Arc::clone(&released);
        let retirer = thread::spawn(move || {
            unsafe { retire(node_addr as *mut Record) };
            assert!(released_clone.load(Ordering::SeqCst), "node freed before the reader released it");
        });

        thread::yield_now();
        released.store(true, Ordering::SeqCst);
        drop(guard);
        retirer.join().unwrap();
    }
}
