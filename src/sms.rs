//! SMS command pipeline: drain, split-and-parse, and notify-by-SMS
//! send-with-retry (§4.6).

use heapless::String;

use crate::clock::Clock;
use crate::console::{self, ConsoleContext};
use crate::error::{Error, Result};
use crate::fmt::{info, warn};
use crate::modem::{signal_quality, Modem, SignalQuality};
use crate::timing;

const INBOX_INDEX: u8 = 1;
const MAX_NOTIFY_ATTEMPTS: u32 = 3;

/// Drain one SMS from the modem inbox (if any) and dispatch it
/// through the command pipeline (§4.6 "SMS task" steps 2-3).
pub fn drain_inbox<Mo: Modem, Ck: Clock, Ctx: ConsoleContext>(
    modem: &mut Mo,
    ctx: &mut Ctx,
    clock: &mut Ck,
    delay: &mut dyn FnMut(embassy_time::Duration),
) -> Result<()> {
    let Some(msg) = modem.read_sms(INBOX_INDEX)? else {
        return Ok(());
    };
    modem.delete_sms(INBOX_INDEX)?;
    let _ = clock;
    split_and_parse(modem, ctx, msg.from.as_str(), msg.text.as_str(), delay)
}

/// Walk `text`, splitting on `;`, dispatching each command through the
/// console parser, and aggregating a single reply (§4.6
/// "Split-and-parse").
pub fn split_and_parse<Mo: Modem, Ctx: ConsoleContext>(
    modem: &mut Mo,
    ctx: &mut Ctx,
    from: &str,
    text: &str,
    delay: &mut dyn FnMut(embassy_time::Duration),
) -> Result<()> {
    let mut reply: String<161> = String::new();

    for raw_cmd in text.split(';') {
        let cmd = raw_cmd.trim();
        if cmd.is_empty() {
            continue;
        }
        let mut lowered: String<256> = String::new();
        for c in cmd.chars() {
            let _ = lowered.push(c.to_ascii_lowercase());
        }
        console::dispatch(ctx, lowered.as_str(), &mut reply);
    }

    if !reply.is_empty() {
        notify_by_sms(modem, from, reply.as_str(), delay)?;
    }
    delay(timing::SMS_REPLY_SETTLE);
    Ok(())
}

/// Send-with-retry: wait for registration and usable signal, then send
/// (§4.6 "Notify-by-SMS"). Waits `NOTIFY_RETRY_WAIT` between attempts in
/// both retry loops, and the escalating `notify_backoff_timeout` after
/// each power-cycle, rather than spinning.
pub fn notify_by_sms<Mo: Modem>(
    modem: &mut Mo,
    dest: &str,
    text: &str,
    delay: &mut dyn FnMut(embassy_time::Duration),
) -> Result<()> {
    let mut failures = 0u32;
    loop {
        match modem.registered() {
            Ok(true) => break,
            _ => {
                failures += 1;
                if failures >= MAX_NOTIFY_ATTEMPTS {
                    warn!("modem not registering, power-cycling");
                    modem.power_cycle()?;
                    delay(timing::notify_backoff_timeout(failures - MAX_NOTIFY_ATTEMPTS));
                } else {
                    delay(timing::NOTIFY_RETRY_WAIT);
                }
            }
        }
    }

    loop {
        let csq = modem.csq()?;
        if matches!(
            signal_quality(csq),
            SignalQuality::Basso | SignalQuality::Buono | SignalQuality::Ottimo
        ) {
            break;
        }
        delay(timing::NOTIFY_RETRY_WAIT);
    }

    info!("sending SMS to {}", dest);
    modem.send_sms(dest, text)
}

/// Send the boot or fault/calibration notification to every enabled
/// destination.
pub fn notify_all<'a, Mo: Modem>(
    modem: &mut Mo,
    dests: impl Iterator<Item = &'a str>,
    text: &str,
    delay: &mut dyn FnMut(embassy_time::Duration),
) -> Result<()> {
    let mut sent_any = false;
    let mut last_err = None;
    for dest in dests {
        match notify_by_sms(modem, dest, text, delay) {
            Ok(()) => sent_any = true,
            Err(e) => last_err = Some(e),
        }
    }
    if sent_any {
        Ok(())
    } else {
        Err(last_err.unwrap_or(Error::NetworkUnavailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockModem;

    struct NoopCtx;
    impl ConsoleContext for NoopCtx {
        fn version(&self) -> &'static str {
            "0.1.0"
        }
    }

    #[test]
    fn split_and_parse_of_blank_commands_is_idempotent() {
        let mut modem = MockModem::new();
        let mut ctx = NoopCtx;
        let mut delay_calls = 0;
        split_and_parse(&mut modem, &mut ctx, "+391112223", "; ; ;", &mut |_| delay_calls += 1).unwrap();
        assert!(modem.sent.is_empty());
        assert_eq!(delay_calls, 1);
    }

    #[test]
    fn ver_command_produces_a_reply_and_one_outbound_sms() {
        let mut modem = MockModem::new();
        modem.registered_value = true;
        modem.csq_value = 20;
        let mut ctx = NoopCtx;
        split_and_parse(&mut modem, &mut ctx, "+391112223", "ver", &mut |_| {}).unwrap();
    }

    #[test]
    fn notify_by_sms_retries_until_registered_then_sends() {
        // Not registered for the first MAX_NOTIFY_ATTEMPTS checks: the
        // retry loop must wait between each, then power-cycle (which
        // the mock reports as re-registering) instead of spinning.
        let mut modem = MockModem::new();
        modem.registered_value = false;
        modem.csq_value = 20;
        let mut delay_calls = 0u32;
        let result = notify_by_sms(&mut modem, "+391112223", "hi", &mut |_| delay_calls += 1);
        assert!(result.is_ok());
        assert_eq!(modem.power_cycles, 1);
        assert!(delay_calls >= MAX_NOTIFY_ATTEMPTS, "must wait on every failed attempt, including after the power-cycle");
        assert_eq!(modem.sent.len(), 1);
        assert_eq!(modem.sent[0].0, "+391112223");
    }
}
