//! Channel sampler: selection policy, multiplexer/meter collaborators,
//! and the per-sample RMS read (§4.3).

use crate::channel::{ChannelMask, CHANNEL_COUNT};
use crate::error::Result;
use crate::timing;

/// Board wiring inverts the channel index order through this fixed
/// permutation; declared once here since it is board wiring, not
/// firmware (§4.3).
pub const MUX_PERMUTATION: [u8; CHANNEL_COUNT] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0,
];

/// Selects one of the 16 AC channels onto the metering IC.
pub trait Multiplexer {
    fn select(&mut self, permuted_code: u8) -> Result<()>;
}

/// The AC metering chip.
pub trait Meter {
    fn reset(&mut self) -> Result<()>;
    fn read_irms(&mut self) -> Result<u32>;
    fn read_vrms(&mut self) -> Result<u32>;
}

/// Result of a sampling attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampled {
    Channel(usize),
    NoChannel,
}

/// Fixed offset subtracted from every `i_rms` reading, clamped to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerConfig {
    pub i_rms_offset: u32,
    pub power_monitoring_enabled: bool,
}

pub struct Sampler {
    current: Option<usize>,
    cfg: SamplerConfig,
}

impl Sampler {
    pub fn new(cfg: SamplerConfig) -> Self {
        Sampler { current: None, cfg }
    }

    /// Active set eligible for selection: powered-on, enabled, not suspended.
    fn active(powered_on: ChannelMask, enabled: ChannelMask, suspended: ChannelMask) -> ChannelMask {
        powered_on & enabled & !suspended
    }

    /// Choose the next channel to sample per the three-tier policy
    /// (§4.3 "Selection policy"). Does not perform any I/O.
    pub fn select(
        &self,
        powered_on: ChannelMask,
        enabled: ChannelMask,
        suspended: ChannelMask,
        faulty: ChannelMask,
        calibrating: ChannelMask,
    ) -> Sampled {
        let active = Self::active(powered_on, enabled, suspended);
        if active.is_empty() {
            return Sampled::NoChannel;
        }

        let tier = {
            let t1 = active & faulty;
            if !t1.is_empty() {
                t1
            } else {
                let t2 = active & calibrating;
                if !t2.is_empty() {
                    t2
                } else {
                    active
                }
            }
        };

        let from = self.current.unwrap_or(CHANNEL_COUNT - 1);
        if let Some(cur) = self.current {
            if tier.contains(cur) {
                return Sampled::Channel(cur);
            }
        }
        match tier.next_from(from) {
            Some(idx) => Sampled::Channel(idx),
            None => Sampled::NoChannel,
        }
    }

    /// Perform one sample of `channel`, switching the multiplexer and
    /// settling if it differs from the previously sampled channel.
    /// Returns `(i_rms, v_rms, p_rms)`.
    pub fn sample<M: Multiplexer, E: Meter, D: FnMut(embassy_time::Duration)>(
        &mut self,
        channel: usize,
        mux: &mut M,
        meter: &mut E,
        mut delay: D,
        wait_zero_cross: &mut dyn FnMut(),
    ) -> Result<(u32, u32, u32)> {
        if self.current != Some(channel) {
            mux.select(MUX_PERMUTATION[channel])?;
            meter.reset()?;
            wait_zero_cross();
            delay(timing::channel_settle_time());
            self.current = Some(channel);
        }

        let mut i_rms = meter.read_irms()?;
        let v_rms = meter.read_vrms()?;
        i_rms = i_rms.saturating_sub(self.cfg.i_rms_offset);

        let p_rms = if self.cfg.power_monitoring_enabled {
            i_rms.saturating_mul(v_rms) / 100_000
        } else {
            i_rms.saturating_mul(10)
        };

        Ok((i_rms, v_rms, p_rms))
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_active_channels_yields_no_channel() {
        let sampler = Sampler::new(SamplerConfig::default());
        let sampled = sampler.select(
            ChannelMask::EMPTY,
            ChannelMask::ALL,
            ChannelMask::EMPTY,
            ChannelMask::EMPTY,
            ChannelMask::EMPTY,
        );
        assert_eq!(sampled, Sampled::NoChannel);
    }

    #[test]
    fn faulty_tier_wins_over_calibrating() {
        let sampler = Sampler::new(SamplerConfig::default());
        let sampled = sampler.select(
            ChannelMask::ALL,
            ChannelMask::ALL,
            ChannelMask::EMPTY,
            ChannelMask::single(5),
            ChannelMask::single(2),
        );
        assert_eq!(sampled, Sampled::Channel(5));
    }

    #[test]
    fn stays_on_current_channel_if_still_qualifying() {
        let mut sampler = Sampler::new(SamplerConfig::default());
        sampler.current = Some(3);
        let sampled = sampler.select(
            ChannelMask::ALL,
            ChannelMask::ALL,
            ChannelMask::EMPTY,
            ChannelMask(0b1100), // channels 2,3
            ChannelMask::EMPTY,
        );
        assert_eq!(sampled, Sampled::Channel(3));
    }

    #[test]
    fn round_robins_over_active_when_no_special_tier() {
        let mut sampler = Sampler::new(SamplerConfig::default());
        sampler.current = Some(0);
        let sampled = sampler.select(
            ChannelMask::ALL,
            ChannelMask::ALL,
            ChannelMask::EMPTY,
            ChannelMask::EMPTY,
            ChannelMask::EMPTY,
        );
        assert_eq!(sampled, Sampled::Channel(1));
    }

    #[test]
    fn suspended_channel_is_never_active() {
        let sampler = Sampler::new(SamplerConfig::default());
        let sampled = sampler.select(
            ChannelMask::single(0),
            ChannelMask::single(0),
            ChannelMask::single(0),
            ChannelMask::EMPTY,
            ChannelMask::EMPTY,
        );
        assert_eq!(sampled, Sampled::NoChannel);
    }
}
