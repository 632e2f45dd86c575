//! S6: a watchdog-reason reboot is reported with the `W` flag and
//! re-enters calibration for every previously enabled channel
//! (SPEC_FULL.md §8 scenario S6). The hardware watchdog tripping after
//! a stuck task is outside this crate's software surface; what's
//! testable here is the post-reboot behavior it causes.

use rfn_core::controller::{Controller, ResetReason};
use rfn_core::test_support::{
    MockClock, MockDelay, MockExpander, MockInputPin, MockMeter, MockModem, MockMultiplexer,
    MockNvm, MockOutputPin, MockWatchdog,
};

type TestController = Controller<
    MockModem,
    MockMeter,
    MockMultiplexer,
    MockExpander,
    MockNvm,
    MockOutputPin,
    MockInputPin,
    MockOutputPin,
    MockClock,
    MockWatchdog,
    MockDelay,
>;

fn new_controller() -> TestController {
    Controller::new(
        MockNvm::new(),
        MockModem::new(),
        MockMeter::new(),
        MockMultiplexer::new(),
        MockExpander::new(),
        MockOutputPin::new(),
        MockInputPin::new(false),
        MockOutputPin::new(),
        MockClock::new(),
        MockWatchdog::new(),
        MockDelay::new(),
    )
}

#[test]
fn watchdog_reboot_reports_w_and_recalibrates_everything_enabled() {
    let mut ctrl = new_controller();
    ctrl.handle_console_line("aa 1 3");
    ctrl.handle_console_line("ag 1 +391112223");
    ctrl.handle_console_line("in 10"); // NOTIFY_ON_REBOOT only

    ctrl.startup(ResetReason::PowerOn).unwrap();
    assert_eq!(ctrl.modem().sent.len(), 1);
    assert!(ctrl.modem().sent[0].1.contains("REBOOT P"));

    for _ in 0..512 {
        ctrl.run_iteration().unwrap();
        if ctrl.state().calibrating().is_empty() {
            break;
        }
    }
    assert!(ctrl.state().calibrating().is_empty(), "calibration should converge before the reboot");

    ctrl.startup(ResetReason::Watchdog).unwrap();

    assert_eq!(ctrl.modem().sent.len(), 2);
    assert!(ctrl.modem().sent[1].1.contains("REBOOT W"));
    assert_eq!(ctrl.state().calibrating(), ctrl.state().enabled());
    assert!(ctrl.state().calibrating().contains(0));
    assert!(ctrl.state().calibrating().contains(2));
}
