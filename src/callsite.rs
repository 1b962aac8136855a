//! Stack-trace capture, abstracted so the rest of the crate never touches
//! [`backtrace`] directly.
//!
//! Capture happens eagerly (the frames themselves are not stable once the
//! call returns), resolution to symbol names/files is deferred to render
//! time, since most captured call sites are discarded by back-off and never
//! rendered at all.

use std::fmt::Write as _;

use crate::exclude;

/// The number of stack frames this crate's own plumbing introduces between a
/// host's call into [`crate::tracker::Tracker::record`] and the frame where
/// [`CallSite::capture`] itself runs. Re-derived from this crate's actual
/// call chain (`Tracker::record` → `Record::new` → `CallSite::capture`)
/// rather than copied from the "skip 3 frames" constant named in the
/// original design, per the open question in §9.
const SKIP_FRAMES: usize = 2;

/// An eagerly-captured, lazily-renderable call site.
#[derive(Debug)]
pub struct CallSite {
    backtrace: backtrace::Backtrace,
}

impl CallSite {
    /// Captures the current call stack.
    ///
    /// Cheap: frame addresses are collected immediately but symbols are not
    /// resolved until [`render`](Self::render) is called.
    #[inline(never)]
    pub fn capture() -> Self {
        Self { backtrace: backtrace::Backtrace::new_unresolved() }
    }

    /// Renders the captured stack, one frame per line prefixed with a tab,
    /// skipping this crate's own plumbing frames and any frame whose
    /// `(owner, method)` pair is registered in the [exclusion
    /// registry](crate::exclude).
    pub fn render(&self, out: &mut String) {
        let mut backtrace = self.backtrace.clone();
        backtrace.resolve();

        for frame in backtrace.frames().iter().skip(SKIP_FRAMES) {
            for symbol in frame.symbols() {
                let name = match symbol.name() {
                    Some(name) => name.to_string(),
                    None => continue,
                };
                let (owner, method) = split_owner_method(&name);

                if exclude::contains(owner, method) {
                    continue;
                }

                let _ = write!(out, "\t{}", name);
                if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    let _ = write!(out, "({}:{})", file.display(), line);
                }
                out.push('\n');
            }
        }
    }
}

/// Splits a demangled symbol name such as `leaktrack::tracker::Tracker::record`
/// into an `(owner, method)` pair approximated as `(module path, last
/// segment)`, which is what the exclusion registry matches against.
fn split_owner_method(symbol: &str) -> (&str, &str) {
    // strip a trailing hash suffix (`::h1234...`) that rustc appends to
    // symbol names; it carries no information for exclusion matching.
    let trimmed = match symbol.rfind("::h") {
        Some(idx) if symbol[idx + 3..].bytes().all(|b| b.is_ascii_hexdigit()) => &symbol[..idx],
        _ => symbol,
    };

    match trimmed.rfind("::") {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 2..]),
        None => ("", trimmed),
    }
}
