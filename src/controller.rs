//! The `Controller`: owns every channel record, bitmap, and
//! collaborator, and drives the main loop (§4.8) and the per-task
//! handlers it schedules (§4.6, §4.7).
//!
//! Grounded on the teacher's `GsmClient<C, RST, DTR>` /
//! `Device<'buf,'sub,AtCl,AtUrcCh,Config,N,L>`: a single struct generic
//! over every pluggable collaborator, exposing task-shaped methods
//! (`spin`, `handle_urc`) rather than an object-oriented hierarchy.
//!
//! Control/data state lives in `ControlState`, separate from the
//! hardware collaborator fields, so a scheduled task can borrow the
//! modem and the data state as two disjoint fields at once instead of
//! routing everything through one opaque `&mut self` method call.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::{String, Vec};

use crate::calibration::{self, CalibrationParams, CalibrationStep};
use crate::channel::{ChannelMask, ChannelRecord, CHANNEL_COUNT};
use crate::clock::Clock;
use crate::config::record::{NOTIFY_ON_CALIBRATION_COMPLETE, NOTIFY_ON_REBOOT};
use crate::config::{ConfigStore, NvmStorage};
use crate::console::{ConsoleContext, Outcome};
use crate::detector::{self, FaultEvent, FaultParams};
use crate::error::Result;
use crate::fmt::{debug, info, warn};
use crate::modem::Modem;
use crate::sampler::{Meter, Multiplexer, Sampled, Sampler, SamplerConfig};
use crate::scheduler::{Scheduler, TaskId};
use crate::signal::{Signal, SignalBus};
use crate::sms;

/// The 16-bit I/O expander's mirror of which channels are currently
/// powered on (§4.3 "Active = powered_on ∩ enabled ∩ ¬suspended").
pub trait Expander {
    fn powered_on(&mut self) -> Result<ChannelMask>;
}

/// Hardware watchdog: kicked once per main-loop iteration (§5).
pub trait Watchdog {
    fn kick(&mut self);
}

/// Boot-time reset cause (§3 "Reset-reason record").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    PowerOn,
    External,
    Watchdog,
    BrownOut,
}

impl ResetReason {
    /// The `W` flag referenced by scenario S6.
    pub fn is_watchdog(self) -> bool {
        matches!(self, ResetReason::Watchdog)
    }

    fn as_str(self) -> &'static str {
        match self {
            ResetReason::PowerOn => "P",
            ResetReason::External => "E",
            ResetReason::Watchdog => "W",
            ResetReason::BrownOut => "B",
        }
    }
}

const SMS_CHECK_SEC: u32 = 30;
const CMD_CHECK_SEC: u32 = 1;
const BTN_CHECK_SEC: u32 = 3;
const GSM_RESTART_ITERATIONS: u32 = 120;

/// Everything the console/SMS command layer can read or mutate: the
/// configuration mirror, per-channel records, and the runtime bitmaps.
/// Deliberately excludes the modem, meter, and GPIO collaborators so it
/// can be borrowed independently of them.
pub struct ControlState<Nv: NvmStorage> {
    config: ConfigStore<Nv>,
    channels: [ChannelRecord; CHANNEL_COUNT],
    calibrating: ChannelMask,
    faulty: ChannelMask,
    spoiled: ChannelMask,
    suspended: ChannelMask,
    monitoring_enabled: bool,
    cool_countdown: u16,
    recal_countdown_weeks: u32,
}

impl<Nv: NvmStorage> ControlState<Nv> {
    fn new(nvm: Nv) -> Self {
        ControlState {
            config: ConfigStore::new(nvm),
            channels: [ChannelRecord::default(); CHANNEL_COUNT],
            calibrating: ChannelMask::EMPTY,
            faulty: ChannelMask::EMPTY,
            spoiled: ChannelMask::EMPTY,
            suspended: ChannelMask::EMPTY,
            monitoring_enabled: true,
            cool_countdown: 0,
            recal_countdown_weeks: 0,
        }
    }

    pub fn enabled(&self) -> ChannelMask {
        self.config.enabled()
    }

    pub fn critical(&self) -> ChannelMask {
        self.config.critical()
    }

    pub fn calibrating(&self) -> ChannelMask {
        self.calibrating
    }

    pub fn faulty(&self) -> ChannelMask {
        self.faulty
    }

    pub fn spoiled(&self) -> ChannelMask {
        self.spoiled
    }

    pub fn suspended(&self) -> ChannelMask {
        self.suspended
    }

    pub fn channel(&self, idx: usize) -> &ChannelRecord {
        &self.channels[idx]
    }

    /// Relay should be high exactly when a critical channel is spoiled
    /// (§8 invariant 5); computed on demand rather than cached so every
    /// mutation site (fault confirm, `fl`, button clear) stays correct
    /// automatically.
    fn critical_spoiled(&self) -> bool {
        !(self.spoiled & self.config.critical()).is_empty()
    }
}

impl<Nv: NvmStorage> ConsoleContext for ControlState<Nv> {
    fn sleep_ms(&mut self, _ms: i32) {}

    fn request_reset(&mut self) {}

    fn set_dest(&mut self, slot: usize, number: &str) -> Outcome {
        match self.config.set_dest(slot, number) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Nak,
        }
    }

    fn clear_dest(&mut self, slot: usize) -> Outcome {
        match self.config.clear_dest(slot) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Nak,
        }
    }

    fn list_dests(&self, out: &mut String<64>) {
        for (i, dest) in self.config.mirror().sms_dest.iter().enumerate() {
            if i > 0 {
                let _ = out.push(' ');
            }
            let _ = out.push_str(dest.as_str());
        }
    }

    fn set_ident(&mut self, text: &str) -> Outcome {
        match self.config.set_ident(text) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Nak,
        }
    }

    fn ident(&self, out: &mut String<100>) {
        let _ = out.push_str(self.config.mirror().ident.as_str());
    }

    fn add_enabled(&mut self, mask: ChannelMask) -> Outcome {
        let prev = self.config.enabled();
        let next = prev | mask;
        match self.config.set_enabled(next) {
            Ok(()) => {
                let newly = next - prev;
                self.calibrating = self.calibrating | newly;
                let fault_samples = self.config.mirror().fault_samples;
                for ch in newly.iter() {
                    self.channels[ch].mark_uncalibrated(fault_samples);
                }
                Outcome::Ok
            }
            Err(_) => Outcome::Nak,
        }
    }

    fn remove_enabled(&mut self, mask: ChannelMask) -> Outcome {
        let next = self.config.enabled() - mask;
        match self.config.set_enabled(next) {
            Ok(()) => {
                self.calibrating = self.calibrating & next;
                self.faulty = self.faulty & next;
                self.spoiled = self.spoiled & next;
                Outcome::Ok
            }
            Err(_) => Outcome::Nak,
        }
    }

    fn add_critical(&mut self, mask: ChannelMask) -> Outcome {
        let next = self.config.critical() | mask;
        match self.config.set_critical(next) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Nak,
        }
    }

    fn remove_critical(&mut self, mask: ChannelMask) -> Outcome {
        let next = self.config.critical() - mask;
        match self.config.set_critical(next) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Nak,
        }
    }

    fn set_fault_params(
        &mut self,
        fault_samples: u8,
        fault_checks: u8,
        fault_check_time_s: u16,
        fault_level_kw: u32,
        fl_calibration_div: u8,
        fl_detection_div: u8,
        calibration_weeks: u8,
    ) -> Outcome {
        match self.config.set_fault_params(
            fault_samples,
            fault_checks,
            fault_check_time_s,
            fault_level_kw,
            fl_calibration_div,
            fl_detection_div,
            calibration_weeks,
        ) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Nak,
        }
    }

    fn fault_params(&self, out: &mut String<96>) {
        use core::fmt::Write;
        let m = self.config.mirror();
        // `vp` divides fault_level by 1000 for display (§9 Open Question).
        let _ = write!(
            out,
            "{} {} {} {} {} {} {}",
            m.fault_samples,
            m.fault_checks,
            m.fault_check_time_s,
            m.fault_level / 1000,
            m.fl_calibration_div,
            m.fl_detection_div,
            m.calibration_weeks
        );
    }

    fn set_notify_flags(&mut self, flags: &str) -> Outcome {
        let mut value = 0u8;
        for (i, c) in flags.chars().enumerate().take(8) {
            if c != '0' {
                value |= 1 << i;
            }
        }
        match self.config.set_notify_flags(value) {
            Ok(()) => Outcome::Ok,
            Err(_) => Outcome::Nak,
        }
    }

    fn notify_flags(&self, out: &mut String<8>) {
        use core::fmt::Write;
        let _ = write!(out, "{:08b}", self.config.mirror().notify_flags);
    }

    fn force_recalibration(&mut self) {
        let fault_samples = self.config.mirror().fault_samples;
        for ch in self.config.enabled().iter() {
            self.channels[ch].mark_uncalibrated(fault_samples);
        }
        self.calibrating = self.config.enabled();
        self.faulty = ChannelMask::EMPTY;
        self.spoiled = ChannelMask::EMPTY;
    }

    fn set_monitoring_enabled(&mut self, enabled: bool) {
        self.monitoring_enabled = enabled;
    }

    fn force_critical_spoiled(&mut self) {
        self.spoiled = self.spoiled | self.config.critical();
    }

    fn channel_status(&self, channel: &str, out: &mut String<96>) -> Outcome {
        use core::fmt::Write;
        let idx: usize = match channel.trim().parse::<usize>() {
            Ok(n) if (1..=CHANNEL_COUNT).contains(&n) => n - 1,
            _ => {
                let _ = out.push_str("non-existent");
                return Outcome::Nak;
            }
        };
        let rec = &self.channels[idx];
        let _ = write!(
            out,
            "ch{} i={} v={} p={} pmax={}",
            idx + 1,
            rec.i_rms,
            rec.v_rms,
            rec.p_rms,
            rec.p_max
        );
        Outcome::Ok
    }

    fn global_status(&self, out: &mut String<161>) {
        use crate::console::mask::print_channel_mask;

        let mode = if self.critical_spoiled() {
            "LAMP"
        } else if !self.spoiled.is_empty() {
            "GUAS"
        } else if !self.calibrating.is_empty() {
            "CAL"
        } else if self.monitoring_enabled {
            "OK"
        } else {
            "DIS"
        };
        let _ = out.push_str("STATO ");
        let _ = out.push_str(mode);

        let _ = out.push_str(" CF ");
        let cf: String<64> = print_channel_mask(self.faulty);
        let _ = out.push_str(cf.as_str());

        let _ = out.push_str(" CA ");
        let ca: String<64> = print_channel_mask(self.config.enabled());
        let _ = out.push_str(ca.as_str());

        let _ = out.push_str(" CC ");
        let cc: String<64> = print_channel_mask(self.config.critical());
        let _ = out.push_str(cc.as_str());
    }
}

#[allow(clippy::upper_case_acronyms)]
pub struct Controller<Mo, Me, Mx, Xp, Nv, Rl, Bt, Ld, Ck, Wd, Dl>
where
    Mo: Modem,
    Me: Meter,
    Mx: Multiplexer,
    Xp: Expander,
    Nv: NvmStorage,
    Rl: OutputPin,
    Bt: InputPin,
    Ld: OutputPin,
    Ck: Clock,
    Wd: Watchdog,
    Dl: DelayNs,
{
    state: ControlState<Nv>,
    sms_task_count: u32,

    modem: Mo,
    meter: Me,
    mux: Mx,
    expander: Xp,
    relay: Rl,
    button: Bt,
    led: Ld,
    clock: Ck,
    watchdog: Wd,
    delay: Dl,

    sampler: Sampler,
    scheduler: Scheduler,
    signals: SignalBus,
}

impl<Mo, Me, Mx, Xp, Nv, Rl, Bt, Ld, Ck, Wd, Dl> Controller<Mo, Me, Mx, Xp, Nv, Rl, Bt, Ld, Ck, Wd, Dl>
where
    Mo: Modem,
    Me: Meter,
    Mx: Multiplexer,
    Xp: Expander,
    Nv: NvmStorage,
    Rl: OutputPin,
    Bt: InputPin,
    Ld: OutputPin,
    Ck: Clock,
    Wd: Watchdog,
    Dl: DelayNs,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nvm: Nv,
        modem: Mo,
        meter: Me,
        mux: Mx,
        expander: Xp,
        relay: Rl,
        button: Bt,
        led: Ld,
        mut clock: Ck,
        watchdog: Wd,
        delay: Dl,
    ) -> Self {
        let now = clock.now_ms();
        let mut scheduler = Scheduler::new();
        scheduler.register(TaskId::Sms, SMS_CHECK_SEC * 1000, now);
        scheduler.register(TaskId::Console, CMD_CHECK_SEC * 1000, now);
        scheduler.register(TaskId::Button, BTN_CHECK_SEC * 1000, now);
        scheduler.set_armed(TaskId::Button, false, now);

        Controller {
            state: ControlState::new(nvm),
            sms_task_count: 0,
            modem,
            meter,
            mux,
            expander,
            relay,
            button,
            led,
            clock,
            watchdog,
            delay,
            sampler: Sampler::new(SamplerConfig::default()),
            scheduler,
            signals: SignalBus::new(),
        }
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    pub fn state(&self) -> &ControlState<Nv> {
        &self.state
    }

    pub fn modem(&self) -> &Mo {
        &self.modem
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn modem_mut(&mut self) -> &mut Mo {
        &mut self.modem
    }

    pub fn relay(&self) -> &Rl {
        &self.relay
    }

    /// Force a channel's calibrated baseline and take it out of
    /// `calibrating`, for tests that need to start from an
    /// already-calibrated state without running the bisection loop to
    /// convergence first.
    #[cfg(any(test, feature = "test-util"))]
    pub fn test_set_calibrated(&mut self, ch: usize, p_max: u32) {
        self.state.channels[ch].p_max = p_max;
        self.state.channels[ch].cal_samples_remaining = 0;
        self.state.calibrating.remove(ch);
    }

    /// Exposes the clock collaborator for tests that need to drive
    /// scheduled tasks (e.g. the fault cooldown) forward in time
    /// without a real timer.
    #[cfg(any(test, feature = "test-util"))]
    pub fn clock_mut(&mut self) -> &mut Ck {
        &mut self.clock
    }

    /// Dispatch one console command line against this controller's
    /// state, returning the reply text. Used by the local serial
    /// console; the SMS pipeline drives `ControlState` directly through
    /// `sms::drain_inbox` instead, so a sender's multi-command payload
    /// shares one reply buffer across commands (§4.6 "Split-and-parse").
    pub fn handle_console_line(&mut self, line: &str) -> String<161> {
        let mut reply = String::new();
        crate::console::dispatch(&mut self.state, line, &mut reply);
        reply
    }

    /// §4.9 "Startup Sequence": load config, zero channel state, mark
    /// every enabled channel `calibrating`, and send the boot SMS.
    pub fn startup(&mut self, reset_reason: ResetReason) -> Result<()> {
        self.state.config.load()?;
        for rec in self.state.channels.iter_mut() {
            *rec = ChannelRecord::default();
        }
        self.state.calibrating = self.state.config.enabled();
        let fault_samples = self.state.config.mirror().fault_samples;
        for ch in self.state.calibrating.iter() {
            self.state.channels[ch].mark_uncalibrated(fault_samples);
        }

        if self.state.config.mirror().notify_flags & NOTIFY_ON_REBOOT != 0 {
            let mut text: String<161> = String::new();
            let _ = text.push_str(self.state.config.mirror().ident.as_str());
            let _ = text.push_str(" REBOOT ");
            let _ = text.push_str(reset_reason.as_str());
            let dests: Vec<&str, 3> = self.state.config.mirror().enabled_dests().collect();
            let dl = &mut self.delay;
            let mut wait = |d: embassy_time::Duration| dl.delay_ms(d.as_millis() as u32);
            if sms::notify_all(&mut self.modem, dests.into_iter(), &text, &mut wait).is_err() {
                warn!("boot notification failed");
            }
        }
        info!("startup complete, reset_reason watchdog={}", reset_reason.is_watchdog());
        Ok(())
    }

    /// One iteration of the main loop (§4.8).
    pub fn run_iteration(&mut self) -> Result<()> {
        self.watchdog.kick();
        let _ = self.led.set_state(if self.state.calibrating.is_empty() {
            embedded_hal::digital::PinState::High
        } else {
            embedded_hal::digital::PinState::Low
        });

        let now = self.clock.now_ms();
        let mut due: Vec<TaskId, 4> = Vec::new();
        self.scheduler.poll(now, &mut due);
        for task in due {
            match task {
                TaskId::Sms => self.run_sms_task()?,
                TaskId::Console => self.run_console_task(),
                TaskId::Button => self.run_button_task(),
            }
        }

        if self.signals.pending(Signal::UnitFault) {
            let dests: Vec<&str, 3> = self.state.config.mirror().enabled_dests().collect();
            let dl = &mut self.delay;
            let mut wait = |d: embassy_time::Duration| dl.delay_ms(d.as_millis() as u32);
            let _ = sms::notify_all(&mut self.modem, dests.into_iter(), "unit fault", &mut wait);
        }
        if self.signals.pending(Signal::Button) {
            let now = self.clock.now_ms();
            self.scheduler.set_armed(TaskId::Button, true, now);
        }

        self.sync_relay();
        self.sample_and_classify()
    }

    /// Relay truth follows `spoiled ∩ critical` every iteration (§8
    /// invariant 5), rather than being poked at each mutation site.
    fn sync_relay(&mut self) {
        if self.state.critical_spoiled() {
            let _ = self.relay.set_high();
        } else {
            let _ = self.relay.set_low();
        }
    }

    fn sample_and_classify(&mut self) -> Result<()> {
        let powered_on = self.expander.powered_on()?;
        let sampled = self.sampler.select(
            powered_on,
            self.state.config.enabled(),
            self.state.suspended,
            self.state.faulty,
            self.state.calibrating,
        );

        let ch = match sampled {
            Sampled::NoChannel => return Ok(()),
            Sampled::Channel(ch) => ch,
        };

        let bus = &self.signals;
        let (i_rms, v_rms, p_rms) = self.sampler.sample(
            ch,
            &mut self.mux,
            &mut self.meter,
            |_d| {},
            &mut || bus.enable(Signal::MeterZeroCross),
        )?;
        self.state.channels[ch].i_rms = i_rms;
        self.state.channels[ch].v_rms = v_rms;
        self.state.channels[ch].p_rms = p_rms;

        if self.state.calibrating.contains(ch) {
            let params = CalibrationParams {
                fault_samples: self.state.config.mirror().fault_samples,
                fault_level: self.state.config.mirror().fault_level,
                fl_calibration_div: self.state.config.mirror().fl_calibration_div,
            };
            if calibration::step(&mut self.state.channels[ch], &params) == CalibrationStep::Done {
                self.state.calibrating.remove(ch);
                if self.state.calibrating.is_empty() {
                    self.on_calibration_complete();
                }
            }
        } else if self.state.monitoring_enabled {
            self.step_fault_detector(ch);
        }

        Ok(())
    }

    fn step_fault_detector(&mut self, ch: usize) {
        let params = FaultParams {
            fault_level: self.state.config.mirror().fault_level,
            fault_samples: self.state.config.mirror().fault_samples,
            fault_checks: self.state.config.mirror().fault_checks,
        };
        let event = detector::step(
            ch,
            &mut self.state.channels[ch],
            &params,
            &mut self.state.faulty,
            &mut self.state.spoiled,
            &mut self.state.suspended,
        );
        match event {
            FaultEvent::None => {}
            FaultEvent::Checked => {
                // Further CHECKED transitions while the countdown is
                // already running do not reset it: every spoiled
                // channel resumes together (§4.5 "Cooldown").
                if self.state.cool_countdown == 0 {
                    self.state.cool_countdown = self.state.config.mirror().fault_check_time_s;
                    debug!("channel entered checked state, cooldown armed");
                }
            }
            FaultEvent::Confirmed => self.on_fault_confirmed(ch),
        }
    }

    fn on_fault_confirmed(&mut self, ch: usize) {
        warn!("fault confirmed");
        let mut text: String<161> = String::new();
        let _ = text.push_str(self.state.config.mirror().ident.as_str());
        let _ = text.push_str(" GUASTO");
        let dests: Vec<&str, 3> = self.state.config.mirror().enabled_dests().collect();
        let dl = &mut self.delay;
        let mut wait = |d: embassy_time::Duration| dl.delay_ms(d.as_millis() as u32);
        let _ = sms::notify_all(&mut self.modem, dests.into_iter(), &text, &mut wait);

        let fault_samples = self.state.config.mirror().fault_samples;
        self.state.channels[ch].mark_uncalibrated(fault_samples);
        self.state.calibrating.insert(ch);
    }

    fn on_calibration_complete(&mut self) {
        info!("calibration complete");
        if self.state.config.mirror().notify_flags & NOTIFY_ON_CALIBRATION_COMPLETE != 0 {
            let mut text: String<161> = String::new();
            let _ = text.push_str(self.state.config.mirror().ident.as_str());
            let _ = text.push_str(" CALIBRAZIONE OK");
            let dests: Vec<&str, 3> = self.state.config.mirror().enabled_dests().collect();
            let dl = &mut self.delay;
            let mut wait = |d: embassy_time::Duration| dl.delay_ms(d.as_millis() as u32);
            let _ = sms::notify_all(&mut self.modem, dests.into_iter(), &text, &mut wait);
        }
    }

    fn run_sms_task(&mut self) -> Result<()> {
        self.sms_task_count += 1;
        if !self.modem.registered()? {
            self.modem.power_cycle()?;
        }
        let dl = &mut self.delay;
        let mut wait = |d: embassy_time::Duration| dl.delay_ms(d.as_millis() as u32);
        sms::drain_inbox(&mut self.modem, &mut self.state, &mut self.clock, &mut wait)?;
        if self.sms_task_count % GSM_RESTART_ITERATIONS == 0 {
            let _ = self.modem.power_cycle();
        }
        Ok(())
    }

    fn run_console_task(&mut self) {
        if self.state.cool_countdown > 0 {
            self.state.cool_countdown -= 1;
            if self.state.cool_countdown == 0 {
                self.state.suspended = ChannelMask::EMPTY;
            }
        }
        if self.state.recal_countdown_weeks > 0 {
            self.state.recal_countdown_weeks -= 1;
            if self.state.recal_countdown_weeks == 0 {
                self.state.force_recalibration();
            }
        }
    }

    fn run_button_task(&mut self) {
        if self.button.is_high().unwrap_or(false) {
            self.state.spoiled = ChannelMask::EMPTY;
        }
    }
}
