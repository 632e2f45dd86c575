//! Logging macro shim: dispatches to `defmt` or `log`, whichever backend is
//! enabled, and compiles away entirely if neither is. This module must be
//! declared first in `lib.rs` so every other module sees its macros.

#![allow(unused)]

macro_rules! trace {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            log::trace!($($arg)*);
            #[cfg(feature = "defmt")]
            defmt::trace!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($arg)*,);
        }
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            log::debug!($($arg)*);
            #[cfg(feature = "defmt")]
            defmt::debug!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($arg)*,);
        }
    };
}

macro_rules! info {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            log::info!($($arg)*);
            #[cfg(feature = "defmt")]
            defmt::info!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($arg)*,);
        }
    };
}

macro_rules! warn {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            log::warn!($($arg)*);
            #[cfg(feature = "defmt")]
            defmt::warn!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($arg)*,);
        }
    };
}

macro_rules! error {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            log::error!($($arg)*);
            #[cfg(feature = "defmt")]
            defmt::error!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($arg)*,);
        }
    };
}

pub(crate) use debug;
pub(crate) use error;
pub(crate) use info;
pub(crate) use trace;
pub(crate) use warn;
