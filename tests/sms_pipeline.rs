//! S3: a multi-command SMS ("vg; rs") dispatches every command against
//! one aggregated reply and drains the inbox; S4: an "fc" SMS forces
//! recalibration of every enabled channel (SPEC_FULL.md §8 scenarios
//! S3, S4).

use rfn_core::controller::{Controller, ResetReason};
use rfn_core::test_support::{
    self, MockClock, MockDelay, MockExpander, MockInputPin, MockMeter, MockModem,
    MockMultiplexer, MockNvm, MockOutputPin, MockWatchdog,
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
fn multi_command_sms_gets_one_aggregated_reply_and_drains_the_inbox() {
    let mut ctrl = new_controller();
    ctrl.handle_console_line("ag 1 +391112223");
    ctrl.startup(ResetReason::PowerOn).unwrap();

    // Queue an inbound "vg; rs" and run iterations until the 30s SMS
    // task fires and drains it.
    *ctrl.modem_mut() = MockModem::new();
    ctrl.modem_mut().inbox = Some(test_support::sms("+391112223", "vg; rs"));

    for _ in 0..31 {
        ctrl.clock_mut().advance(1_000);
        ctrl.run_iteration().unwrap();
    }

    assert!(ctrl.modem().inbox.is_none(), "inbox should be drained");
    assert_eq!(ctrl.modem().deleted.as_slice(), &[1]);
    assert_eq!(ctrl.modem().sent.len(), 1, "one aggregated reply expected");
    let (dest, text) = &ctrl.modem().sent[0];
    assert_eq!(dest.as_str(), "+391112223");
    assert!(text.contains("+391112223"), "vg's reply should list the registered destination");
    assert!(text.contains("STATO"), "rs's reply should be appended to the same SMS");
}

#[test]
fn fc_sms_forces_recalibration_of_every_enabled_channel() {
    let mut ctrl = new_controller();
    ctrl.handle_console_line("aa 1 2");
    ctrl.handle_console_line("ag 1 +391112223");
    ctrl.startup(ResetReason::PowerOn).unwrap();

    // Converge calibration so `calibrating` is empty before the forced
    // recalibration request arrives.
    for _ in 0..512 {
        ctrl.run_iteration().unwrap();
        if ctrl.state().calibrating().is_empty() {
            break;
        }
    }
    assert!(ctrl.state().calibrating().is_empty());

    ctrl.modem_mut().inbox = Some(test_support::sms("+391112223", "fc"));
    for _ in 0..31 {
        ctrl.clock_mut().advance(1_000);
        ctrl.run_iteration().unwrap();
        if !ctrl.state().calibrating().is_empty() {
            break;
        }
    }

    assert!(ctrl.state().calibrating().contains(0));
    assert!(ctrl.state().calibrating().contains(1));
}
