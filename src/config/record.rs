//! The persisted configuration record and its fixed-byte-offset wire
//! format (§3 "Configuration record", §6 "Persisted state layout").

use crate::channel::ChannelMask;
use heapless::String;

pub const MAX_SMS_DEST: usize = 3;
pub const DEST_LEN: usize = 14;
pub const IDENT_LEN: usize = 100;

pub const DEFAULT_FAULT_SAMPLES: u8 = 64;
pub const MIN_FAULT_SAMPLES: u8 = 16;
pub const DEFAULT_FAULT_CHECKS: u8 = 3;
pub const MIN_FAULT_CHECKS: u8 = 1;
pub const DEFAULT_FAULT_LEVEL: u32 = 160_000;

/// Bit flags in `notify_flags` (§3).
pub const NOTIFY_ON_REBOOT: u8 = 0b01;
pub const NOTIFY_ON_CALIBRATION_COMPLETE: u8 = 0b10;

/// Fixed-offset on-disk record. Encoded by hand (`to_bytes`/`from_bytes`)
/// so the layout is explicit and stable across firmware versions; see
/// the teacher's `Config` builder in `config.rs` for the "typed fields,
/// explicit truncation" ergonomics this mirrors, though the wire
/// encoding itself has no teacher analogue (the teacher never persists
/// its config to NVM).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfigRecord {
    pub sms_dest: [String<DEST_LEN>; MAX_SMS_DEST],
    pub ident: String<IDENT_LEN>,
    pub enabled: ChannelMask,
    pub critical: ChannelMask,
    pub fault_samples: u8,
    pub fault_checks: u8,
    pub fault_check_time_s: u16,
    pub fault_level: u32,
    pub fl_calibration_div: u8,
    pub fl_detection_div: u8,
    pub calibration_weeks: u8,
    pub notify_flags: u8,
}

/// Total on-disk size: 3*14 + 100 + 2 + 2 + 1 + 1 + 2 + 4 + 1 + 1 + 1 + 1.
pub const RECORD_LEN: usize = MAX_SMS_DEST * DEST_LEN + IDENT_LEN + 2 + 2 + 1 + 1 + 2 + 4 + 1 + 1 + 1 + 1;

impl Default for ConfigRecord {
    fn default() -> Self {
        ConfigRecord {
            sms_dest: Default::default(),
            ident: String::new(),
            enabled: ChannelMask::EMPTY,
            critical: ChannelMask::EMPTY,
            fault_samples: DEFAULT_FAULT_SAMPLES,
            fault_checks: DEFAULT_FAULT_CHECKS,
            fault_check_time_s: 0,
            fault_level: DEFAULT_FAULT_LEVEL,
            fl_calibration_div: 1,
            fl_detection_div: 1,
            calibration_weeks: 0,
            notify_flags: 0,
        }
    }
}

impl ConfigRecord {
    /// Is `sms_dest[slot]` an active destination? An entry starting with
    /// `-`, or not starting with `+`, is disabled (§3).
    pub fn dest_enabled(&self, slot: usize) -> bool {
        self.sms_dest
            .get(slot)
            .map(|s| s.as_str().starts_with('+'))
            .unwrap_or(false)
    }

    /// All currently-enabled destination numbers.
    pub fn enabled_dests(&self) -> impl Iterator<Item = &str> {
        (0..MAX_SMS_DEST).filter_map(move |i| {
            if self.dest_enabled(i) {
                Some(self.sms_dest[i].as_str())
            } else {
                None
            }
        })
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        let mut off = 0;
        for dest in &self.sms_dest {
            let bytes = dest.as_bytes();
            buf[off..off + bytes.len()].copy_from_slice(bytes);
            off += DEST_LEN;
        }
        let ident = self.ident.as_bytes();
        buf[off..off + ident.len()].copy_from_slice(ident);
        off += IDENT_LEN;

        buf[off..off + 2].copy_from_slice(&self.enabled.0.to_le_bytes());
        off += 2;
        buf[off..off + 2].copy_from_slice(&self.critical.0.to_le_bytes());
        off += 2;
        buf[off] = self.fault_samples;
        off += 1;
        buf[off] = self.fault_checks;
        off += 1;
        buf[off..off + 2].copy_from_slice(&self.fault_check_time_s.to_le_bytes());
        off += 2;
        buf[off..off + 4].copy_from_slice(&self.fault_level.to_le_bytes());
        off += 4;
        buf[off] = self.fl_calibration_div;
        off += 1;
        buf[off] = self.fl_detection_div;
        off += 1;
        buf[off] = self.calibration_weeks;
        off += 1;
        buf[off] = self.notify_flags;
        off += 1;
        debug_assert_eq!(off, RECORD_LEN);
        buf
    }

    pub fn from_bytes(buf: &[u8; RECORD_LEN]) -> Self {
        let mut off = 0;
        let mut sms_dest: [String<DEST_LEN>; MAX_SMS_DEST] = Default::default();
        for dest in &mut sms_dest {
            let slice = &buf[off..off + DEST_LEN];
            let end = slice.iter().position(|&b| b == 0).unwrap_or(DEST_LEN);
            let _ = dest.push_str(core::str::from_utf8(&slice[..end]).unwrap_or(""));
            off += DEST_LEN;
        }

        let mut ident = String::new();
        {
            let slice = &buf[off..off + IDENT_LEN];
            let end = slice.iter().position(|&b| b == 0).unwrap_or(IDENT_LEN);
            let _ = ident.push_str(core::str::from_utf8(&slice[..end]).unwrap_or(""));
            off += IDENT_LEN;
        }

        let enabled = ChannelMask(u16::from_le_bytes([buf[off], buf[off + 1]]));
        off += 2;
        let critical = ChannelMask(u16::from_le_bytes([buf[off], buf[off + 1]]));
        off += 2;
        let fault_samples = buf[off];
        off += 1;
        let fault_checks = buf[off];
        off += 1;
        let fault_check_time_s = u16::from_le_bytes([buf[off], buf[off + 1]]);
        off += 2;
        let fault_level = u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
        off += 4;
        let fl_calibration_div = buf[off];
        off += 1;
        let fl_detection_div = buf[off];
        off += 1;
        let calibration_weeks = buf[off];
        off += 1;
        let notify_flags = buf[off];
        off += 1;
        debug_assert_eq!(off, RECORD_LEN);

        ConfigRecord {
            sms_dest,
            ident,
            enabled,
            critical,
            fault_samples,
            fault_checks,
            fault_check_time_s,
            fault_level,
            fl_calibration_div,
            fl_detection_div,
            calibration_weeks,
            notify_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dest_enabled_requires_leading_plus() {
        let mut rec = ConfigRecord::default();
        rec.sms_dest[0] = String::try_from("+391234567").unwrap();
        rec.sms_dest[1] = String::try_from("-391234567").unwrap();
        assert!(rec.dest_enabled(0));
        assert!(!rec.dest_enabled(1));
        assert!(!rec.dest_enabled(2));
    }

    #[test]
    fn byte_round_trip() {
        let mut rec = ConfigRecord::default();
        rec.sms_dest[0] = String::try_from("+391112223").unwrap();
        rec.ident = String::try_from("RFN-01").unwrap();
        rec.enabled = ChannelMask(0b1010);
        rec.critical = ChannelMask(0b0010);
        rec.fault_level = 50_000;
        let bytes = rec.to_bytes();
        let back = ConfigRecord::from_bytes(&bytes);
        assert_eq!(rec, back);
    }
}
