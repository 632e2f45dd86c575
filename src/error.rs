//! Core error type.
//!
//! Grounded on `ublox-cellular/src/error.rs`: a flat enum wrapping the
//! collaborator-layer errors behind `From` impls, rather than a tree of
//! per-module error types.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The modem reported an AT command failure.
    Modem,
    /// The metering chip's SPI transport returned an anomalous read.
    Meter,
    /// The I/O expander's two-wire bus returned an anomalous read.
    Expander,
    /// Non-volatile storage read or write failed.
    Nvm,
    /// A string field did not fit in its backing buffer even after
    /// truncation (e.g. a destination number longer than the argument
    /// buffer itself).
    BufferFull,
    /// The modem could not reach network registration, or signal quality
    /// stayed unusable, after every retry the notify path allows.
    NetworkUnavailable,
    /// Referenced a channel index outside `0..16`.
    InvalidChannel,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::Modem => "modem command failed",
            Error::Meter => "meter read anomaly",
            Error::Expander => "expander read anomaly",
            Error::Nvm => "non-volatile storage access failed",
            Error::BufferFull => "buffer capacity exceeded",
            Error::NetworkUnavailable => "network unavailable",
            Error::InvalidChannel => "invalid channel index",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
