//! Channel-list grammar: parsing and printing `ChannelMask` values for
//! the console/SMS command boundary (§6 "Channel list grammar").

use crate::channel::ChannelMask;
use heapless::String;

/// Parse a whitespace-separated list of 1-based channel numbers.
/// `0` means "all channels". Any non-digit token yields the empty mask
/// (§6: "On any non-digit token the parse returns empty mask").
pub fn parse_channel_mask(text: &str) -> ChannelMask {
    let mut mask = ChannelMask::EMPTY;
    for token in text.split_whitespace() {
        match token.parse::<u32>() {
            Ok(0) => return ChannelMask::ALL,
            Ok(n) if (1..=16).contains(&n) => mask.insert((n - 1) as usize),
            _ => return ChannelMask::EMPTY,
        }
    }
    mask
}

/// Render a mask as space-separated 1-based channel numbers, or
/// `"Nessuno"` when empty (§6 status-SMS schema, `CF Nessuno`).
pub fn print_channel_mask<const N: usize>(mask: ChannelMask) -> String<N> {
    let mut out = String::new();
    if mask.is_empty() {
        let _ = out.push_str("Nessuno");
        return out;
    }
    let mut first = true;
    for idx in mask.iter() {
        use core::fmt::Write;
        if !first {
            let _ = out.push(' ');
        }
        first = false;
        let _ = write!(out, "{}", idx + 1);
    }
    out
}
