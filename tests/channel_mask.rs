//! S5: channel-list parsing through the console grammar end-to-end
//! (SPEC_FULL.md §8 scenario S5).

use rfn_core::channel::ChannelMask;
use rfn_core::controller::Controller;
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
fn aa_with_explicit_list_sets_only_those_bits() {
    let mut ctrl = new_controller();
    assert_eq!(ctrl.handle_console_line("aa 1 3 5").as_str(), "OK");
    assert_eq!(ctrl.state().enabled(), ChannelMask(0b10101));
}

#[test]
fn aa_zero_means_every_channel() {
    let mut ctrl = new_controller();
    assert_eq!(ctrl.handle_console_line("aa 0").as_str(), "OK");
    assert_eq!(ctrl.state().enabled(), ChannelMask::ALL);
}

#[test]
fn aa_with_an_out_of_range_token_enables_nothing() {
    let mut ctrl = new_controller();
    assert_eq!(ctrl.handle_console_line("aa 17").as_str(), "OK");
    assert_eq!(ctrl.state().enabled(), ChannelMask::EMPTY);
}
