//! Console command grammar: token-match parser and static dispatch,
//! shared by the local serial console and the SMS pipeline (§6).
//!
//! Grounded on `original_source/ade/command.c`'s `command_parse`/
//! `command_reply`/NAK dispatch loop, redesigned per §9 away from the
//! `MAKE_CMD`/`REGISTER_CMD` macro-table toward a plain `match` over
//! command names, each arm calling a method on the `ConsoleContext`
//! trait the `Controller` implements.

pub mod mask;

use heapless::String;

use crate::channel::ChannelMask;
use mask::{parse_channel_mask, print_channel_mask};

/// Parser-level failure (§6 "Exit codes from parser"): `-1`/`-2` at the
/// AT/console wire boundary, reconstituted from these typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    UnknownCommand,
    BadArguments,
}

/// Handler-level result (§6: "A command function returns OK or ERROR").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Nak,
}

/// Everything a command handler needs from the controller. Kept narrow
/// and trait-based so `console` has no dependency on the concrete,
/// heavily-generic `Controller` type (the teacher keeps a similar split
/// between `GsmClient` and the pluggable `CellularConfig` trait).
pub trait ConsoleContext {
    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn sleep_ms(&mut self, _ms: i32) {}
    fn request_reset(&mut self) {}

    fn set_dest(&mut self, _slot: usize, _number: &str) -> Outcome {
        Outcome::Nak
    }
    fn clear_dest(&mut self, _slot: usize) -> Outcome {
        Outcome::Nak
    }
    fn list_dests(&self, _out: &mut String<64>) {}

    fn set_ident(&mut self, _text: &str) -> Outcome {
        Outcome::Nak
    }
    fn ident(&self, _out: &mut String<100>) {}

    fn add_enabled(&mut self, _mask: ChannelMask) -> Outcome {
        Outcome::Nak
    }
    fn remove_enabled(&mut self, _mask: ChannelMask) -> Outcome {
        Outcome::Nak
    }
    fn add_critical(&mut self, _mask: ChannelMask) -> Outcome {
        Outcome::Nak
    }
    fn remove_critical(&mut self, _mask: ChannelMask) -> Outcome {
        Outcome::Nak
    }

    #[allow(clippy::too_many_arguments)]
    fn set_fault_params(
        &mut self,
        _fault_samples: u8,
        _fault_checks: u8,
        _fault_check_time_s: u16,
        _fault_level_kw: u32,
        _fl_calibration_div: u8,
        _fl_detection_div: u8,
        _calibration_weeks: u8,
    ) -> Outcome {
        Outcome::Nak
    }
    fn fault_params(&self, _out: &mut String<96>) {}

    fn set_notify_flags(&mut self, _flags: &str) -> Outcome {
        Outcome::Nak
    }
    fn notify_flags(&self, _out: &mut String<8>) {}

    fn force_recalibration(&mut self) {}
    fn set_monitoring_enabled(&mut self, _enabled: bool) {}
    fn force_critical_spoiled(&mut self) {}

    fn channel_status(&self, _channel: &str, _out: &mut String<96>) -> Outcome {
        Outcome::Nak
    }
    fn global_status(&self, _out: &mut String<161>) {}
}

/// Parse and execute one command line against `ctx`, appending any
/// textual result to `reply`. Unknown commands and bad arguments are
/// silently absorbed into `reply` as the parser's `-1`/`-2` convention,
/// matching the SMS pipeline's "never fail the whole line" behavior.
pub fn dispatch<Ctx: ConsoleContext>(ctx: &mut Ctx, line: &str, reply: &mut String<161>) {
    match execute(ctx, line, reply) {
        Ok(()) => {}
        Err(CommandError::UnknownCommand) => {
            let _ = reply.push_str("-1 ");
        }
        Err(CommandError::BadArguments) => {
            let _ = reply.push_str("-2 ");
        }
    }
}

fn execute<Ctx: ConsoleContext>(
    ctx: &mut Ctx,
    line: &str,
    reply: &mut String<161>,
) -> Result<(), CommandError> {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match name {
        "ver" => {
            let _ = reply.push_str(ctx.version());
            Ok(())
        }
        "ping" => Ok(()),
        "sleep" => {
            let ms: i32 = rest.parse().map_err(|_| CommandError::BadArguments)?;
            ctx.sleep_ms(ms);
            Ok(())
        }
        "rst" => {
            ctx.request_reset();
            Ok(())
        }
        "help" => Ok(()),
        "ag" => {
            let mut args = rest.split_whitespace();
            let slot: i32 = args
                .next()
                .ok_or(CommandError::BadArguments)?
                .parse()
                .map_err(|_| CommandError::BadArguments)?;
            let number = args.next().ok_or(CommandError::BadArguments)?;
            if !(1..=3).contains(&slot) {
                return Err(CommandError::BadArguments);
            }
            nak_or_ok(reply, ctx.set_dest((slot - 1) as usize, number))
        }
        "rg" => {
            let slot: i32 = rest.parse().map_err(|_| CommandError::BadArguments)?;
            if !(1..=3).contains(&slot) {
                return Err(CommandError::BadArguments);
            }
            nak_or_ok(reply, ctx.clear_dest((slot - 1) as usize))
        }
        "vg" => {
            let mut out: String<64> = String::new();
            ctx.list_dests(&mut out);
            let _ = reply.push_str(out.as_str());
            Ok(())
        }
        "ii" => nak_or_ok(reply, ctx.set_ident(rest)),
        "vi" => {
            let mut out: String<100> = String::new();
            ctx.ident(&mut out);
            let _ = reply.push_str(out.as_str());
            Ok(())
        }
        "aa" => nak_or_ok(reply, ctx.add_enabled(parse_channel_mask(rest))),
        "ra" => nak_or_ok(reply, ctx.remove_enabled(parse_channel_mask(rest))),
        "ac" => nak_or_ok(reply, ctx.add_critical(parse_channel_mask(rest))),
        "rc" => nak_or_ok(reply, ctx.remove_critical(parse_channel_mask(rest))),
        "ip" => {
            let mut args = rest.split_whitespace();
            let mut next = || args.next().ok_or(CommandError::BadArguments)?.parse::<u32>().map_err(|_| CommandError::BadArguments);
            let fault_samples = next()? as u8;
            let fault_checks = next()? as u8;
            let fault_check_time_s = next()? as u16;
            let fault_level_kw = next()?;
            let fl_calibration_div = next()? as u8;
            let fl_detection_div = next()? as u8;
            let calibration_weeks = next()? as u8;
            nak_or_ok(
                reply,
                ctx.set_fault_params(
                    fault_samples,
                    fault_checks,
                    fault_check_time_s,
                    fault_level_kw,
                    fl_calibration_div,
                    fl_detection_div,
                    calibration_weeks,
                ),
            )
        }
        "vp" => {
            let mut out: String<96> = String::new();
            ctx.fault_params(&mut out);
            let _ = reply.push_str(out.as_str());
            Ok(())
        }
        "in" => nak_or_ok(reply, ctx.set_notify_flags(rest)),
        "vn" => {
            let mut out: String<8> = String::new();
            ctx.notify_flags(&mut out);
            let _ = reply.push_str(out.as_str());
            Ok(())
        }
        "fc" => {
            ctx.force_recalibration();
            Ok(())
        }
        "am" => {
            ctx.set_monitoring_enabled(true);
            Ok(())
        }
        "dm" => {
            ctx.set_monitoring_enabled(false);
            Ok(())
        }
        "fl" => {
            ctx.force_critical_spoiled();
            Ok(())
        }
        "sc" => {
            let mut out: String<96> = String::new();
            nak_or_ok(reply, ctx.channel_status(rest, &mut out)).map(|_| {
                let _ = reply.push_str(out.as_str());
            })
        }
        "rs" => {
            let mut out: String<161> = String::new();
            ctx.global_status(&mut out);
            let _ = reply.push_str(out.as_str());
            Ok(())
        }
        "" => Ok(()),
        _ => Err(CommandError::UnknownCommand),
    }
}

/// Helper: handler-level NAK is not a parser error, but it is still
/// worth surfacing in the reply buffer.
fn nak_or_ok(reply: &mut String<161>, outcome: Outcome) -> Result<(), CommandError> {
    if outcome == Outcome::Nak {
        let _ = reply.push_str("NAK");
    } else {
        let _ = reply.push_str("OK");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestCtx {
        enabled: ChannelMask,
        critical: ChannelMask,
    }

    impl ConsoleContext for TestCtx {
        fn add_enabled(&mut self, mask: ChannelMask) -> Outcome {
            self.enabled = self.enabled | mask;
            Outcome::Ok
        }
        fn add_critical(&mut self, mask: ChannelMask) -> Outcome {
            self.critical = self.critical | mask;
            Outcome::Ok
        }
    }

    #[test]
    fn unknown_command_yields_dash_one() {
        let mut ctx = TestCtx::default();
        let mut reply: String<161> = String::new();
        dispatch(&mut ctx, "frobnicate", &mut reply);
        assert_eq!(reply.as_str(), "-1 ");
    }

    #[test]
    fn aa_sets_enabled_bits() {
        let mut ctx = TestCtx::default();
        let mut reply: String<161> = String::new();
        dispatch(&mut ctx, "aa 1 3 5", &mut reply);
        assert_eq!(ctx.enabled, ChannelMask(0b10101));
        assert_eq!(reply.as_str(), "OK");
    }

    #[test]
    fn aa_zero_means_all() {
        let mut ctx = TestCtx::default();
        let mut reply: String<161> = String::new();
        dispatch(&mut ctx, "aa 0", &mut reply);
        assert_eq!(ctx.enabled, ChannelMask::ALL);
    }

    #[test]
    fn aa_out_of_range_token_is_a_noop() {
        let mut ctx = TestCtx::default();
        let mut reply: String<161> = String::new();
        dispatch(&mut ctx, "aa 17", &mut reply);
        assert_eq!(ctx.enabled, ChannelMask::EMPTY);
    }

    #[test]
    fn sleep_with_bad_argument_is_rejected() {
        let mut ctx = TestCtx::default();
        let mut reply: String<161> = String::new();
        dispatch(&mut ctx, "sleep abc", &mut reply);
        assert_eq!(reply.as_str(), "-2 ");
    }

    #[test]
    fn print_channel_mask_round_trips_through_console() {
        let printed: String<64> = print_channel_mask(ChannelMask(0b101));
        assert_eq!(printed.as_str(), "1 3");
    }
}
