//! A sampling leak detector for reference-counted native resources.
//!
//! A [`Detector`] is created once per resource type and offers every
//! allocation of that type for tracking via [`Detector::track`]. Most
//! allocations come back [`Tracked::untracked`](Tracked) — the sampling gate
//! (§4.D) means only a fraction of allocations ever pay for a tracker at
//! all. A tracked resource should call [`Tracked::record`]/[`Tracked::record_hint`]
//! at significant accesses and [`Tracked::close`] on correct release; if the
//! last clone of a `Tracked<T>` is instead dropped without a prior `close`,
//! the detector reports a leak the next time anyone calls `track` on that
//! detector.
//!
//! ```
//! use leaktrack::{Config, Detector};
//!
//! let detector = Detector::new(Config::with_params("ExampleBuffer", 1).unwrap());
//! let handle = detector.track(vec![0u8; 16]);
//! handle.record_hint("decode");
//! assert!(handle.close());
//! ```

mod callsite;
mod config;
#[cfg(feature = "global")]
mod default;
mod detector;
mod env;
mod exclude;
mod hazard;
mod level;
mod queue;
mod record;
mod reporter;
mod resource;
mod rng;
mod tracker;

pub use crate::config::{Config, ConfigBuilder, ConfigError};
#[cfg(feature = "global")]
pub use crate::default::{detector_for, track};
pub use crate::detector::Detector;
pub use crate::level::Level;
pub use crate::resource::Tracked;
pub use crate::rng::{AlwaysSample, NeverSample, SampleSource, ThreadRngSource};

/// Registers `(owner, method)` pairs to elide from rendered stack traces —
/// useful for excluding a host's own pooling/wrapper plumbing so leak
/// reports point at the caller's code instead.
pub use crate::exclude::add as add_exclusions;

/// Returns the current process-wide detection [`Level`].
pub fn level() -> Level {
    crate::level::get()
}

/// Overrides the process-wide detection [`Level`] at runtime.
pub fn set_level(level: Level) {
    crate::level::set(level);
}
