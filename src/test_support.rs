//! In-memory collaborator doubles for hardware-free testing.
//!
//! Grounded on `test_helpers.rs`'s `MockAtClient`/`MockTimer` pair (a
//! fake transport plus a fake clock, enough to drive the modem client
//! under plain `cargo test`); this module supplies the analogous doubles
//! for every collaborator trait this core defines, per SPEC_FULL.md §8
//! "Test tooling".

#![allow(clippy::type_complexity)]

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use heapless::{String, Vec};

use crate::calibration::CalibrationParams;
use crate::channel::ChannelMask;
use crate::clock::Clock;
use crate::config::NvmStorage;
use crate::controller::{Expander, Watchdog};
use crate::error::{Error, Result};
use crate::modem::{Modem, SmsMessage, SMS_FROM_LEN, SMS_TEXT_LEN};
use crate::sampler::{Meter, Multiplexer};

/// Fixed-size in-memory stand-in for the NVM chip.
pub struct MockNvm {
    bytes: Vec<u8, 256>,
}

impl MockNvm {
    pub fn new() -> Self {
        let mut bytes = Vec::new();
        bytes.resize_default(256).ok();
        MockNvm { bytes }
    }

    /// Pre-load the backing store with an encoded record, for tests that
    /// want `load()` to observe specific starting values.
    pub fn seed(&mut self, record: &crate::config::record::ConfigRecord) {
        let encoded = record.to_bytes();
        self.bytes[..encoded.len()].copy_from_slice(&encoded);
    }
}

impl Default for MockNvm {
    fn default() -> Self {
        Self::new()
    }
}

impl NvmStorage for MockNvm {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() > self.bytes.len() {
            return Err(Error::Nvm);
        }
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<()> {
        if offset + buf.len() > self.bytes.len() {
            return Err(Error::Nvm);
        }
        self.bytes[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// Fake modem: records sent SMS, serves one queued inbound message, and
/// reports caller-configured registration/signal state.
pub struct MockModem {
    pub inbox: Option<SmsMessage>,
    pub sent: Vec<(String<32>, String<SMS_TEXT_LEN>), 8>,
    pub registered_value: bool,
    pub csq_value: u8,
    pub power_cycles: u32,
    pub deleted: Vec<u8, 8>,
}

impl MockModem {
    pub fn new() -> Self {
        MockModem {
            inbox: None,
            sent: Vec::new(),
            registered_value: true,
            csq_value: 20,
            power_cycles: 0,
            deleted: Vec::new(),
        }
    }
}

impl Default for MockModem {
    fn default() -> Self {
        Self::new()
    }
}

impl Modem for MockModem {
    fn read_sms(&mut self, _index: u8) -> Result<Option<SmsMessage>> {
        Ok(self.inbox.take())
    }

    fn delete_sms(&mut self, index: u8) -> Result<()> {
        let _ = self.deleted.push(index);
        Ok(())
    }

    fn send_sms(&mut self, dest: &str, text: &str) -> Result<()> {
        let mut d = String::new();
        let _ = d.push_str(dest);
        let mut t = String::new();
        let _ = t.push_str(text);
        self.sent.push((d, t)).map_err(|_| Error::BufferFull)
    }

    fn csq(&mut self) -> Result<u8> {
        Ok(self.csq_value)
    }

    fn registered(&mut self) -> Result<bool> {
        Ok(self.registered_value)
    }

    fn power_cycle(&mut self) -> Result<()> {
        self.power_cycles += 1;
        self.registered_value = true;
        Ok(())
    }
}

/// Build an inbound SMS for a `MockModem`'s `inbox`.
pub fn sms(from: &str, text: &str) -> SmsMessage {
    let mut f = String::<SMS_FROM_LEN>::new();
    let _ = f.push_str(from);
    let mut t = String::<SMS_TEXT_LEN>::new();
    let _ = t.push_str(text);
    SmsMessage { from: f, text: t }
}

/// Fake metering chip: returns caller-configured RMS values.
pub struct MockMeter {
    pub i_rms: u32,
    pub v_rms: u32,
    pub resets: u32,
}

impl MockMeter {
    pub fn new() -> Self {
        MockMeter {
            i_rms: 0,
            v_rms: 230,
            resets: 0,
        }
    }
}

impl Default for MockMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter for MockMeter {
    fn reset(&mut self) -> Result<()> {
        self.resets += 1;
        Ok(())
    }

    fn read_irms(&mut self) -> Result<u32> {
        Ok(self.i_rms)
    }

    fn read_vrms(&mut self) -> Result<u32> {
        Ok(self.v_rms)
    }
}

/// Fake analog multiplexer: records the last selected code.
pub struct MockMultiplexer {
    pub last_code: Option<u8>,
}

impl MockMultiplexer {
    pub fn new() -> Self {
        MockMultiplexer { last_code: None }
    }
}

impl Default for MockMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiplexer for MockMultiplexer {
    fn select(&mut self, permuted_code: u8) -> Result<()> {
        self.last_code = Some(permuted_code);
        Ok(())
    }
}

/// Fake I/O expander: all channels powered on unless overridden.
pub struct MockExpander {
    pub powered_on_mask: ChannelMask,
}

impl MockExpander {
    pub fn new() -> Self {
        MockExpander {
            powered_on_mask: ChannelMask::ALL,
        }
    }
}

impl Default for MockExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl Expander for MockExpander {
    fn powered_on(&mut self) -> Result<ChannelMask> {
        Ok(self.powered_on_mask)
    }
}

/// Fake watchdog: just counts kicks.
pub struct MockWatchdog {
    pub kicks: u32,
}

impl MockWatchdog {
    pub fn new() -> Self {
        MockWatchdog { kicks: 0 }
    }
}

impl Default for MockWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog for MockWatchdog {
    fn kick(&mut self) {
        self.kicks += 1;
    }
}

/// Fake monotonic clock, advanced explicitly by the test.
pub struct MockClock {
    pub now_ms: u32,
}

impl MockClock {
    pub fn new() -> Self {
        MockClock { now_ms: 0 }
    }

    pub fn advance(&mut self, ms: u32) {
        self.now_ms = self.now_ms.wrapping_add(ms);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_ms(&mut self) -> u32 {
        self.now_ms
    }
}

/// Fake digital output pin, tracking its current level.
pub struct MockOutputPin {
    pub high: bool,
}

impl MockOutputPin {
    pub fn new() -> Self {
        MockOutputPin { high: false }
    }
}

impl Default for MockOutputPin {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorType for MockOutputPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockOutputPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

/// Fake digital input pin, level set by the test.
pub struct MockInputPin {
    pub high: bool,
}

impl MockInputPin {
    pub fn new(high: bool) -> Self {
        MockInputPin { high }
    }
}

impl ErrorType for MockInputPin {
    type Error = core::convert::Infallible;
}

impl InputPin for MockInputPin {
    fn is_high(&self) -> core::result::Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&self) -> core::result::Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

/// Fake delay collaborator: records total nanoseconds requested instead
/// of actually blocking, so a test drives retry loops to completion
/// without waiting out real minutes of backoff.
pub struct MockDelay {
    pub total_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        MockDelay { total_ns: 0 }
    }
}

impl Default for MockDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

/// Calibration parameters matching a `ConfigRecord::default()`, for
/// tests that need to drive `calibration::step` directly.
pub fn default_calibration_params() -> CalibrationParams {
    CalibrationParams {
        fault_samples: crate::config::record::DEFAULT_FAULT_SAMPLES,
        fault_level: crate::config::record::DEFAULT_FAULT_LEVEL,
        fl_calibration_div: 1,
    }
}
