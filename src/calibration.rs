//! Per-channel bisection calibration (§4.4).

use crate::channel::ChannelRecord;

#[derive(Debug, Clone, Copy)]
pub struct CalibrationParams {
    pub fault_samples: u8,
    pub fault_level: u32,
    pub fl_calibration_div: u8,
}

/// Outcome of calibrating a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    /// Channel remains in `calibrating`.
    InProgress,
    /// Countdown reached zero while still uncalibrated: this channel is
    /// now calibrated.
    Done,
}

/// Apply one calibration sample to `record` (§4.4 "Algorithm").
pub fn step(record: &mut ChannelRecord, params: &CalibrationParams) -> CalibrationStep {
    if record.cal_samples_remaining == 0 {
        return CalibrationStep::Done;
    }

    let delta = record.p_max.abs_diff(record.p_rms);
    if record.p_max >= record.p_rms {
        record.p_max -= delta / 2;
    } else {
        record.p_max += delta / 2;
    }

    let noisy_threshold = params.fault_level / params.fl_calibration_div.max(1) as u32;
    if delta > noisy_threshold {
        record.cal_samples_remaining = params.fault_samples;
    } else {
        record.cal_samples_remaining = record.cal_samples_remaining.saturating_sub(1);
    }

    record.i_max = record.i_rms;
    record.v_max = record.v_rms;

    if record.cal_samples_remaining == 0 {
        CalibrationStep::Done
    } else {
        CalibrationStep::InProgress
    }
}

/// Reset a channel record to "just enabled, never calibrated" (§4.4
/// "Forced recalibration", §3 "Lifecycle").
pub fn mark_uncalibrated(record: &mut ChannelRecord, fault_samples: u8) {
    record.mark_uncalibrated(fault_samples);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CalibrationParams {
        CalibrationParams {
            fault_samples: 8,
            fault_level: 16_000,
            fl_calibration_div: 1,
        }
    }

    #[test]
    fn converges_on_constant_power() {
        let mut rec = ChannelRecord::default();
        rec.mark_uncalibrated(8);
        let p = &params();
        for _ in 0..64 {
            rec.p_rms = 100_000;
            rec.i_rms = 1_000;
            rec.v_rms = 230;
            if step(&mut rec, p) == CalibrationStep::Done {
                break;
            }
        }
        assert_eq!(rec.cal_samples_remaining, 0);
        assert!((rec.p_max as i64 - 100_000i64).abs() < 2000);
    }

    #[test]
    fn noisy_sample_reloads_countdown() {
        let mut rec = ChannelRecord::default();
        rec.mark_uncalibrated(8);
        rec.cal_samples_remaining = 1;
        rec.p_max = 0;
        rec.p_rms = 1_000_000; // huge delta, forces reload
        let out = step(&mut rec, &params());
        assert_eq!(out, CalibrationStep::InProgress);
        assert_eq!(rec.cal_samples_remaining, 8);
    }

    #[test]
    fn zero_countdown_reports_done_without_mutating() {
        let mut rec = ChannelRecord::default();
        rec.cal_samples_remaining = 0;
        rec.p_max = 42;
        let out = step(&mut rec, &params());
        assert_eq!(out, CalibrationStep::Done);
        assert_eq!(rec.p_max, 42);
    }
}
