//! [Module A] Access Record — one immutable node of a Tracker's access trail.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::OnceLock;

use crate::callsite::CallSite;

/// One immutable node in a Tracker's singly-linked access trail.
///
/// `pos` is this record's depth from the bottom sentinel (whose `pos` is
/// `-1`); for every non-sentinel record `R`, `R.pos == R.next.pos + 1`.
#[derive(Debug)]
pub(crate) struct Record {
    hint: Option<String>,
    callsite: Option<CallSite>,
    next: AtomicPtr<Record>,
    pos: i64,
}

static BOTTOM: OnceLock<Box<Record>> = OnceLock::new();

impl Record {
    /// Returns the process-wide shared bottom sentinel: `next = null`,
    /// `pos = -1`, no hint, no captured call site.
    pub(crate) fn bottom() -> *mut Record {
        let sentinel = BOTTOM.get_or_init(|| {
            Box::new(Record {
                hint: None,
                callsite: None,
                next: AtomicPtr::new(core::ptr::null_mut()),
                pos: -1,
            })
        });
        sentinel.as_ref() as *const Record as *mut Record
    }

    /// Allocates a new record whose predecessor is `next`, with no hint.
    ///
    /// # Safety
    ///
    /// `next` must be a valid, non-null pointer to a live [`Record`] (the
    /// bottom sentinel or a previously published record).
    pub(crate) unsafe fn new(next: *mut Record) -> Box<Record> {
        Self::with_hint_raw(next, None)
    }

    /// Allocates a new record whose predecessor is `next`, carrying `hint`
    /// resolved to its rendered form immediately — per §4.A, the hint is
    /// resolved eagerly so later formatting cannot observe mutated state.
    ///
    /// A hint whose `Display` implementation panics is treated as having no
    /// hint, per §7's "render errors are swallowed" rule.
    ///
    /// # Safety
    ///
    /// Same as [`new`](Self::new).
    pub(crate) unsafe fn with_hint(
        next: *mut Record,
        hint: impl std::fmt::Display,
    ) -> Box<Record> {
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| hint.to_string())).ok();
        Self::with_hint_raw(next, rendered)
    }

    unsafe fn with_hint_raw(next: *mut Record, hint: Option<String>) -> Box<Record> {
        debug_assert!(!next.is_null(), "record's predecessor must never be null");
        let pos = (*next).pos + 1;
        Box::new(Record {
            hint,
            callsite: Some(CallSite::capture()),
            next: AtomicPtr::new(next),
            pos,
        })
    }

    /// This record's depth from the bottom sentinel.
    #[inline]
    pub(crate) fn pos(&self) -> i64 {
        self.pos
    }

    /// Raw pointer to this record's predecessor (the bottom sentinel has
    /// itself as the logical end, signalled by a null `next`).
    #[inline]
    pub(crate) fn next(&self) -> *mut Record {
        self.next.load(Ordering::Acquire)
    }

    /// Whether this is the shared bottom sentinel.
    #[inline]
    pub(crate) fn is_bottom(&self) -> bool {
        self.pos == -1
    }

    /// Renders this record's hint line (if any) followed by its captured
    /// stack trace, tab-indented, one frame per line.
    pub(crate) fn render(&self, out: &mut String) {
        if let Some(hint) = &self.hint {
            out.push_str("\tHint: ");
            out.push_str(hint);
            out.push('\n');
        }

        if let Some(callsite) = &self.callsite {
            callsite.render(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Record;

    #[test]
    fn bottom_is_shared_singleton() {
        let a = Record::bottom();
        let b = Record::bottom();
        assert_eq!(a, b);
        assert_eq!(unsafe { (*a).pos() }, -1);
        assert!(unsafe { (*a).next().is_null() });
    }

    #[test]
    fn pos_increments_from_predecessor() {
        let bottom = Record::bottom();
        let first = unsafe { Box::into_raw(Record::new(bottom)) };
        assert_eq!(unsafe { (*first).pos() }, 0);

        let second = unsafe { Box::into_raw(Record::new(first)) };
        assert_eq!(unsafe { (*second).pos() }, 1);
        assert_eq!(unsafe { (*second).next() }, first);

        unsafe {
            drop(Box::from_raw(second));
            drop(Box::from_raw(first));
        }
    }

    #[test]
    fn hint_render_survives_panicking_display() {
        struct Bomb;
        impl std::fmt::Display for Bomb {
            fn fmt(&self, _: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                panic!("boom")
            }
        }

        let bottom = Record::bottom();
        let record = unsafe { Record::with_hint(bottom, Bomb) };
        let mut out = String::new();
        record.render(&mut out);
        assert!(!out.contains("Hint:"));
    }

    #[test]
    fn hint_is_rendered() {
        let bottom = Record::bottom();
        let record = unsafe { Record::with_hint(bottom, "decode") };
        let mut out = String::new();
        record.render(&mut out);
        assert!(out.starts_with("\tHint: decode\n"));
    }
}
