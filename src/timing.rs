//! Settle-delay and period constants.
//!
//! Grounded on `module_timing.rs`'s feature-gated `Duration`-returning
//! functions; this core has a single board variant rather than a family
//! of modem part numbers, so the `cfg!`-branching collapses to plain
//! constants, but the "return `embassy_time::Duration`, never a bare
//! integer" convention is kept.

use embassy_time::Duration;

/// Mains period at 50 Hz, used to derive the channel-switch settle delay.
pub const LINE_CYCLE: Duration = Duration::from_micros(20_000);

/// Number of line cycles to let settle after a channel switch before the
/// first valid meter read (§4.3).
pub const LINE_CYCLES_SAMPLE_COUNT: u32 = 16;

/// Total settle delay after switching the analog multiplexer to a new
/// channel: `line_cycles_period * line_cycles_sample_count`, ~320 ms at
/// 50 Hz.
pub fn channel_settle_time() -> Duration {
    Duration::from_micros(LINE_CYCLE.as_micros() * LINE_CYCLES_SAMPLE_COUNT as u64)
}

/// Idle sleep when the sampler has no active channel to pick (§4.8 step 5).
pub const NO_CHANNEL_IDLE: Duration = Duration::from_millis(500);

/// Settle delay after the SMS pipeline's split-and-parse sends a reply
/// (§4.6 "Split-and-parse" step 5).
pub const SMS_REPLY_SETTLE: Duration = Duration::from_secs(10);

/// Wait between notify-by-SMS registration/CSQ retry attempts (§4.6
/// "Notify-by-SMS" step 1-2).
pub const NOTIFY_RETRY_WAIT: Duration = Duration::from_secs(60);

/// Escalating modem power-cycle timeout ceiling used by the notify path:
/// 10, 20, 40 minutes, capped here.
pub fn notify_backoff_timeout(failures: u32) -> Duration {
    let minutes = 10u64 << failures.min(2);
    Duration::from_secs(minutes * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_settle_time_is_about_320ms() {
        assert_eq!(channel_settle_time(), Duration::from_micros(320_000));
    }

    #[test]
    fn notify_backoff_escalates_then_caps() {
        assert_eq!(notify_backoff_timeout(0), Duration::from_secs(600));
        assert_eq!(notify_backoff_timeout(1), Duration::from_secs(1200));
        assert_eq!(notify_backoff_timeout(2), Duration::from_secs(2400));
        assert_eq!(notify_backoff_timeout(5), Duration::from_secs(2400));
    }
}
