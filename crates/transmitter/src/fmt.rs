//! Logging shim
//!
//! `defmt` on hardware, `tracing` on desktop, nothing otherwise. Format
//! strings must stay in the subset both backends accept: plain `{}` and
//! `{:?}` placeholders.
#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => { ::defmt::trace!($($arg)*) };
}
#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}
#[cfg(feature = "defmt")]
macro_rules! info {
    ($($arg:tt)*) => { ::defmt::info!($($arg)*) };
}
#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}
#[cfg(feature = "defmt")]
macro_rules! error {
    ($($arg:tt)*) => { ::defmt::error!($($arg)*) };
}

#[cfg(all(feature = "tracing", not(feature = "defmt")))]
macro_rules! trace {
    ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
}
#[cfg(all(feature = "tracing", not(feature = "defmt")))]
macro_rules! debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}
#[cfg(all(feature = "tracing", not(feature = "defmt")))]
macro_rules! info {
    ($($arg:tt)*) => { ::tracing::info!($($arg)*) };
}
#[cfg(all(feature = "tracing", not(feature = "defmt")))]
macro_rules! warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) };
}
#[cfg(all(feature = "tracing", not(feature = "defmt")))]
macro_rules! error {
    ($($arg:tt)*) => { ::tracing::error!($($arg)*) };
}

// No backend: still type-check the arguments so they count as used.
#[cfg(not(any(feature = "tracing", feature = "defmt")))]
macro_rules! trace {
    ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } };
}
#[cfg(not(any(feature = "tracing", feature = "defmt")))]
macro_rules! debug {
    ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } };
}
#[cfg(not(any(feature = "tracing", feature = "defmt")))]
macro_rules! info {
    ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } };
}
#[cfg(not(any(feature = "tracing", feature = "defmt")))]
macro_rules! warn {
    ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } };
}
#[cfg(not(any(feature = "tracing", feature = "defmt")))]
macro_rules! error {
    ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } };
}
