//! The external "error reporter" collaborator (§1, §4.D, §7 of the design).
//!
//! Realized as the `log` crate's `error!` macro under a dedicated target, so
//! a consumer can route or silence leak reports independently of the rest of
//! their logging. "Reporter unavailable" is realized via `log_enabled!`: the
//! caller is expected to skip rendering entirely in that case (see
//! [`crate::detector::Detector`]'s drain), since building the trail string
//! just to throw it away would defeat the point of the check.

use dashmap::DashSet;

use crate::env::LEVEL_PROPERTY;

const TARGET: &str = "leaktrack";

/// Returns `true` if the reporter would actually emit anything at the
/// `error` level right now. Callers use this to skip expensive trail
/// rendering when nothing is listening.
#[inline]
pub(crate) fn enabled() -> bool {
    log::log_enabled!(target: TARGET, log::Level::Error)
}

/// Emits a leak report for `resource_type`, deduplicated against `reported`
/// so that two leaks with an identical rendered trail (or two untraced
/// leaks) produce exactly one emission.
///
/// `trail` empty means untraced (no access records were ever captured);
/// non-empty means the rendered access trail from [`crate::tracker::Tracker::render_leak_trail`].
pub(crate) fn report(resource_type: &str, trail: &str, reported: &DashSet<String>) {
    let message = if trail.is_empty() {
        format!(
            "LEAK: {resource_type} was not released before being reclaimed. Enable advanced \
             leak reporting to find out where the leak occurred, by setting the {LEVEL_PROPERTY} \
             environment variable to \"advanced\" or calling Detector::set_level()."
        )
    } else {
        format!(
            "LEAK: {resource_type} was not released before being reclaimed.\nRecent access \
             records: \n{trail}"
        )
    };

    if reported.insert(message.clone()) {
        log::error!(target: TARGET, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::report;
    use dashmap::DashSet;

    #[test]
    fn identical_reports_are_deduplicated() {
        let reported = DashSet::new();
        report("Buffer", "", &reported);
        report("Buffer", "", &reported);
        assert_eq!(reported.len(), 1);
    }

    #[test]
    fn distinct_trails_both_reported() {
        let reported = DashSet::new();
        report("Buffer", "", &reported);
        report("Buffer", "\t#1:\tsome::frame\n", &reported);
        assert_eq!(reported.len(), 2);
    }
}
