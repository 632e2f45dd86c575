//! Signal bus: a debounced/edge-detected view over the board's external
//! interrupt lines.
//!
//! Grounded on `original_source/ade/signals.h`: the same seven signal
//! lines (`SIGNAL_ADE_ZX`, `SIGNAL_ADE_IRQ`, `SIGNAL_RTC_IRQ`,
//! `SIGNAL_UNIT_IRQ`, `SIGNAL_PLAT_BUTTON`, `SIGNAL_PLAT_I2C`,
//! `SIGNAL_GSM_RI`) and the same two edge classes (sticky vs. level,
//! `signal_enable`/`signal_disable` masking the underlying interrupt).
//! The C side stores pending/status bits in a two-element byte array
//! indexed by port; this core models each signal's pending flag as its
//! own `AtomicU8` (SPEC_FULL.md §9: "ISR writes to shared scalars read
//! from the main thread" → atomic-byte primitives), which sidesteps the
//! port/bit-within-byte indirection entirely since there is no real
//! register map to share.

use core::sync::atomic::{AtomicU8, Ordering};

/// One of the board's named interrupt lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    /// Metering chip zero-crossing detect.
    MeterZeroCross,
    /// Metering chip IRQ line.
    MeterIrq,
    /// Real-time clock IRQ line.
    RtcIrq,
    /// Unit (board-level) fault IRQ line.
    UnitFault,
    /// Front-panel push button.
    Button,
    /// I/O expander IRQ line.
    ExpanderIrq,
    /// Modem ring-indicator line.
    ModemRing,
}

impl Signal {
    const COUNT: usize = 7;

    const ALL: [Signal; Self::COUNT] = [
        Signal::MeterZeroCross,
        Signal::MeterIrq,
        Signal::RtcIrq,
        Signal::UnitFault,
        Signal::Button,
        Signal::ExpanderIrq,
        Signal::ModemRing,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).expect("exhaustive")
    }

    /// Sticky signals latch pending and mask their own interrupt source
    /// until re-enabled; level signals latch pending but stay enabled.
    fn is_sticky(self) -> bool {
        !matches!(self, Signal::Button | Signal::ExpanderIrq)
    }
}

#[derive(Default)]
struct Line {
    pending: AtomicU8,
    level: AtomicU8,
    enabled: AtomicU8,
}

/// Uniform interface over the board's named pin-change signals.
///
/// The `notify_*` methods are the ISR-side half of the contract (§5:
/// "ISRs are restricted to: (a) setting a bit in a byte-sized pending
/// register; ... (c) reading pin levels into a mirror byte"); the rest
/// are the main-loop-side half.
pub struct SignalBus {
    lines: [Line; Signal::COUNT],
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        let bus = SignalBus {
            lines: Default::default(),
        };
        for sig in Signal::ALL {
            bus.enable(sig);
        }
        bus
    }

    fn line(&self, sig: Signal) -> &Line {
        &self.lines[sig.index()]
    }

    /// Consume-on-read: returns `true` exactly once per edge since the
    /// last consumption.
    pub fn pending(&self, sig: Signal) -> bool {
        self.line(sig).pending.swap(0, Ordering::Relaxed) != 0
    }

    /// Current live level, no side effect.
    pub fn level(&self, sig: Signal) -> bool {
        self.line(sig).level.load(Ordering::Relaxed) != 0
    }

    /// Unmask the underlying pin-change interrupt and clear any stale
    /// pending flag.
    pub fn enable(&self, sig: Signal) {
        let line = self.line(sig);
        line.pending.store(0, Ordering::Relaxed);
        line.enabled.store(1, Ordering::Relaxed);
    }

    /// Mask the underlying pin-change interrupt.
    pub fn disable(&self, sig: Signal) {
        self.line(sig).enabled.store(0, Ordering::Relaxed);
    }

    /// Enable, then busy-wait until pending. Intended for startup
    /// sequencing only (e.g. waiting for a zero-crossing before a meter
    /// read); the main loop never calls this from inside a scheduled
    /// task.
    pub fn wait<F: FnMut()>(&self, sig: Signal, mut idle: F) {
        self.enable(sig);
        while !self.pending(sig) {
            idle();
        }
    }

    /// ISR-side: record an edge on `sig`, updating the live level and,
    /// if the source is currently enabled, latching pending. Sticky
    /// signals additionally mask their own source once latched, so
    /// further edges are silently dropped until the main loop calls
    /// `enable` again.
    pub fn notify_edge(&self, sig: Signal, level: bool) {
        let line = self.line(sig);
        line.level.store(level as u8, Ordering::Relaxed);
        if line.enabled.load(Ordering::Relaxed) == 0 {
            return;
        }
        line.pending.store(1, Ordering::Relaxed);
        if sig.is_sticky() {
            line.enabled.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_consume_on_read() {
        let bus = SignalBus::new();
        bus.notify_edge(Signal::RtcIrq, true);
        assert!(bus.pending(Signal::RtcIrq));
        assert!(!bus.pending(Signal::RtcIrq));
    }

    #[test]
    fn sticky_signal_disables_after_edge() {
        let bus = SignalBus::new();
        bus.notify_edge(Signal::MeterZeroCross, true);
        assert!(bus.pending(Signal::MeterZeroCross));
        // The source masked itself; a second edge before re-enable is dropped.
        bus.notify_edge(Signal::MeterZeroCross, true);
        assert!(!bus.pending(Signal::MeterZeroCross));
        bus.enable(Signal::MeterZeroCross);
        bus.notify_edge(Signal::MeterZeroCross, true);
        assert!(bus.pending(Signal::MeterZeroCross));
    }

    #[test]
    fn level_signal_stays_enabled() {
        let bus = SignalBus::new();
        bus.notify_edge(Signal::Button, true);
        assert!(bus.pending(Signal::Button));
        bus.notify_edge(Signal::Button, true);
        assert!(bus.pending(Signal::Button));
    }

    #[test]
    fn level_has_no_side_effect() {
        let bus = SignalBus::new();
        bus.notify_edge(Signal::Button, true);
        assert!(bus.level(Signal::Button));
        assert!(bus.level(Signal::Button));
        assert!(bus.pending(Signal::Button));
    }

    #[test]
    fn disabled_signal_does_not_latch() {
        let bus = SignalBus::new();
        bus.disable(Signal::UnitFault);
        bus.notify_edge(Signal::UnitFault, true);
        assert!(!bus.pending(Signal::UnitFault));
    }
}
