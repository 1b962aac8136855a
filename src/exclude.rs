//! The process-global, lock-free, append-only registry of (owner, method)
//! pairs elided from rendered stack traces.

use crate::queue::{RawNode, RawQueue};

/// Global registry instance. Grow-only for the lifetime of the process.
static REGISTRY: RawQueue<Node> = RawQueue::new();

struct Node {
    owner: Box<str>,
    method: Box<str>,
    next: core::sync::atomic::AtomicPtr<Node>,
}

impl RawNode for Node {
    #[inline]
    unsafe fn next(node: *mut Self) -> *mut Self {
        (*node).next.load(core::sync::atomic::Ordering::Acquire)
    }

    #[inline]
    unsafe fn set_next(node: *mut Self, next: *mut Self) {
        (*node).next.store(next, core::sync::atomic::Ordering::Release);
    }
}

/// Registers `owner.method` pairs to be skipped when rendering a stack trace.
///
/// Rust has no reflection, so unlike the source implementation this cannot
/// validate that `methods` actually exist on `owner` — names are accepted
/// verbatim, per §9's relaxation for languages without reflection.
///
/// Entries are appended atomically; readers (via [`contains`]) always see a
/// consistent snapshot, and there is no operation to remove an entry.
pub fn add(owner: &str, methods: impl IntoIterator<Item = impl AsRef<str>>) {
    for method in methods {
        let method = method.as_ref();
        log::debug!(target: "leaktrack", "excluding {owner}.{method} from rendered stack traces");
        let node = Box::into_raw(Box::new(Node {
            owner: owner.into(),
            method: method.into(),
            next: core::sync::atomic::AtomicPtr::new(core::ptr::null_mut()),
        }));
        unsafe { REGISTRY.push(node) };
    }
}

/// Returns `true` if `(owner, method)` was previously registered via [`add`].
pub fn contains(owner: &str, method: &str) -> bool {
    REGISTRY.iter().any(|node| &*node.owner == owner && &*node.method == method)
}

#[cfg(test)]
mod tests {
    use super::{add, contains};

    // the registry is process-global, so tests use distinct owner names to
    // avoid cross-test interference under parallel test execution.

    #[test]
    fn unregistered_pair_is_absent() {
        assert!(!contains("exclude::NeverRegisteredOwner", "neverRegisteredMethod"));
    }

    #[test]
    fn registered_pair_is_found() {
        add("exclude::TestOwnerA", ["methodOne", "methodTwo"]);
        assert!(contains("exclude::TestOwnerA", "methodOne"));
        assert!(contains("exclude::TestOwnerA", "methodTwo"));
        assert!(!contains("exclude::TestOwnerA", "methodThree"));
    }

    #[test]
    fn distinct_owners_are_independent() {
        add("exclude::TestOwnerB", ["shared"]);
        assert!(contains("exclude::TestOwnerB", "shared"));
        assert!(!contains("exclude::TestOwnerC", "shared"));
    }
}
