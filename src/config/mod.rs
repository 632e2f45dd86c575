//! Configuration store: a write-through facade over persistent storage
//! and an in-memory mirror (§4.2).

pub mod record;

use crate::channel::ChannelMask;
use crate::error::{Error, Result};
use crate::fmt::{debug, trace};
use record::{ConfigRecord, DEST_LEN, IDENT_LEN, RECORD_LEN};

/// Byte/word-addressable persistent storage. The out-of-scope NVM chip
/// or flash page the board actually carries; the core only needs
/// `read`/`write` over a flat offset space (§4.2 "Persistence model").
pub trait NvmStorage {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()>;
    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<()>;
}

/// Fixed base offset of the configuration record in NVM.
pub const CONFIG_BASE_OFFSET: usize = 0;

pub struct ConfigStore<N: NvmStorage> {
    nvm: N,
    mirror: ConfigRecord,
}

impl<N: NvmStorage> ConfigStore<N> {
    pub fn new(nvm: N) -> Self {
        ConfigStore {
            nvm,
            mirror: ConfigRecord::default(),
        }
    }

    /// Repopulate the mirror from persistence, clamping fields per the
    /// "ingest" boundary rule (§8 "Boundary behaviors"): `fault_samples`
    /// floored to `MIN_FAULT_SAMPLES`, `fault_checks` floored to 1.
    pub fn load(&mut self) -> Result<()> {
        let mut buf = [0u8; RECORD_LEN];
        self.nvm.read(CONFIG_BASE_OFFSET, &mut buf)?;
        let mut rec = ConfigRecord::from_bytes(&buf);
        rec.fault_samples = rec.fault_samples.max(record::MIN_FAULT_SAMPLES);
        rec.fault_checks = rec.fault_checks.max(record::MIN_FAULT_CHECKS);
        self.mirror = rec;
        debug!("config loaded: enabled={:?} critical={:?}", self.mirror.enabled, self.mirror.critical);
        trace!("config dump: {:?}", self.mirror);
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let bytes = self.mirror.to_bytes();
        self.nvm.write(CONFIG_BASE_OFFSET, &bytes)
    }

    pub fn mirror(&self) -> &ConfigRecord {
        &self.mirror
    }

    pub fn enabled(&self) -> ChannelMask {
        self.mirror.enabled
    }

    pub fn critical(&self) -> ChannelMask {
        self.mirror.critical
    }

    pub fn set_enabled(&mut self, mask: ChannelMask) -> Result<()> {
        self.mirror.enabled = mask;
        self.persist()
    }

    pub fn set_critical(&mut self, mask: ChannelMask) -> Result<()> {
        self.mirror.critical = mask;
        self.persist()
    }

    pub fn set_dest(&mut self, slot: usize, number: &str) -> Result<()> {
        if slot >= record::MAX_SMS_DEST {
            return Err(Error::InvalidChannel);
        }
        let mut s = heapless::String::<DEST_LEN>::new();
        let truncated = &number[..number.len().min(DEST_LEN)];
        let _ = s.push_str(truncated);
        self.mirror.sms_dest[slot] = s;
        self.persist()
    }

    pub fn clear_dest(&mut self, slot: usize) -> Result<()> {
        self.set_dest(slot, "-")
    }

    pub fn set_ident(&mut self, text: &str) -> Result<()> {
        let mut s = heapless::String::<IDENT_LEN>::new();
        let truncated = &text[..text.len().min(IDENT_LEN)];
        let _ = s.push_str(truncated);
        self.mirror.ident = s;
        self.persist()
    }

    pub fn set_fault_params(
        &mut self,
        fault_samples: u8,
        fault_checks: u8,
        fault_check_time_s: u16,
        fault_level_kw: u32,
        fl_calibration_div: u8,
        fl_detection_div: u8,
        calibration_weeks: u8,
    ) -> Result<()> {
        self.mirror.fault_samples = fault_samples.max(record::MIN_FAULT_SAMPLES);
        self.mirror.fault_checks = fault_checks.max(record::MIN_FAULT_CHECKS);
        self.mirror.fault_check_time_s = fault_check_time_s;
        // `ip` takes kilowatts and scales to the stored-unit convention (§9).
        self.mirror.fault_level = fault_level_kw.saturating_mul(1000);
        self.mirror.fl_calibration_div = fl_calibration_div;
        self.mirror.fl_detection_div = fl_detection_div;
        self.mirror.calibration_weeks = calibration_weeks;
        self.persist()
    }

    pub fn set_notify_flags(&mut self, flags: u8) -> Result<()> {
        self.mirror.notify_flags = flags;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockNvm;

    #[test]
    fn load_clamps_fault_params() {
        let mut nvm = MockNvm::new();
        let mut rec = ConfigRecord::default();
        rec.fault_samples = 1;
        rec.fault_checks = 0;
        nvm.seed(&rec);
        let mut store = ConfigStore::new(nvm);
        store.load().unwrap();
        assert_eq!(store.mirror().fault_samples, record::MIN_FAULT_SAMPLES);
        assert_eq!(store.mirror().fault_checks, record::MIN_FAULT_CHECKS);
    }

    #[test]
    fn set_and_get_round_trips() {
        let nvm = MockNvm::new();
        let mut store = ConfigStore::new(nvm);
        store.set_enabled(ChannelMask(0b101)).unwrap();
        assert_eq!(store.enabled(), ChannelMask(0b101));
        store.set_dest(0, "+391234567").unwrap();
        assert!(store.mirror().dest_enabled(0));
    }

    #[test]
    fn dest_number_longer_than_buffer_truncates_not_fails() {
        let nvm = MockNvm::new();
        let mut store = ConfigStore::new(nvm);
        let long = "+3912345678901234567890";
        store.set_dest(0, long).unwrap();
        assert_eq!(store.mirror().sms_dest[0].len(), DEST_LEN);
    }

    #[test]
    fn fault_level_scaled_from_kilowatts() {
        let nvm = MockNvm::new();
        let mut store = ConfigStore::new(nvm);
        store.set_fault_params(64, 3, 10, 50, 1, 1, 0).unwrap();
        assert_eq!(store.mirror().fault_level, 50_000);
    }
}
