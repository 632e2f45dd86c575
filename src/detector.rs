//! Per-channel fault-detection state machine (§4.5).
//!
//! State is not stored as an explicit enum; it is derived from
//! `ChannelRecord::flt_samples`/`flt_checks` plus the channel's
//! membership in the `faulty`/`spoiled`/`suspended` bitmaps, the same
//! way the source firmware folded its state machine into a handful of
//! counters and bitmask bits rather than a tagged state field.

use crate::channel::{ChannelMask, ChannelRecord};

#[derive(Debug, Clone, Copy)]
pub struct FaultParams {
    pub fault_level: u32,
    pub fault_samples: u8,
    pub fault_checks: u8,
}

/// What happened to a channel on this sample, for the caller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultEvent {
    /// No state transition.
    None,
    /// A below-baseline check window completed but the fault is not yet
    /// confirmed (CHECKED, cooldown armed): `spoiled`/`suspended` gained
    /// this channel.
    Checked,
    /// `fault_checks` windows confirmed the fault (CONFIRMED): `spoiled`
    /// gained this channel (so the relay trips if it is `critical`);
    /// caller must send the fault SMS, then recalibrate this channel.
    Confirmed,
}

/// Apply one sample to a calibrated, monitoring-enabled channel's fault
/// state (§4.5 table).
pub fn step(
    ch: usize,
    record: &mut ChannelRecord,
    params: &FaultParams,
    faulty: &mut ChannelMask,
    spoiled: &mut ChannelMask,
    suspended: &mut ChannelMask,
) -> FaultEvent {
    let deficit = record.p_max.saturating_sub(record.p_rms);
    let below_baseline = deficit >= params.fault_level;

    if !below_baseline {
        faulty.remove(ch);
        record.flt_samples = 0;
        record.flt_checks = 0;
        return FaultEvent::None;
    }

    if record.flt_samples == 0 {
        faulty.insert(ch);
    }
    record.flt_samples = record.flt_samples.saturating_add(1);

    if record.flt_samples < params.fault_samples {
        return FaultEvent::None;
    }

    record.flt_samples = 0;
    faulty.remove(ch);
    record.flt_checks = record.flt_checks.saturating_add(1);

    if record.flt_checks >= params.fault_checks {
        record.flt_checks = 0;
        spoiled.insert(ch);
        FaultEvent::Confirmed
    } else {
        spoiled.insert(ch);
        suspended.insert(ch);
        FaultEvent::Checked
    }
}
