//! Attribute-style control surface
//!
//! Thin adapter for hosts that expose the transmitter as named text
//! attributes (a sysfs directory, a shell, a debug console):
//!
//! | attribute           | show        | store                         |
//! |---------------------|-------------|-------------------------------|
//! | `carrier_frequency` | Hz          | signed Hz, must be positive   |
//! | `sample_rate`       | Hz          | signed Hz, must be positive   |
//! | `send`              | `1` if busy | symbols to transmit           |
//!
//! A `send` store transmits the written text symbol by symbol (only `'1'` and
//! `'0'` count, so a trailing newline is harmless) and returns only after the
//! transmission completed or failed.
//! A fatal error latches the surface: every later store reports
//! [`ResourceError::Unusable`].

use core::fmt::Write as _;

use heapless::String;
use platform::{DmaEngineService, DmaMemory, RegisterBlock};

use crate::controller::{TransmissionReport, Transmitter};
use crate::error::{ConfigError, ResourceError, TransmitterError};

/// Capacity of a shown value.
pub const SHOW_CAPACITY: usize = 16;

/// A named attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attribute {
    /// `carrier_frequency`
    CarrierFrequency,
    /// `sample_rate`
    SampleRate,
    /// `send`
    Send,
}

impl Attribute {
    /// Every attribute, in listing order.
    pub const ALL: [Self; 3] = [Self::CarrierFrequency, Self::SampleRate, Self::Send];

    /// Look an attribute up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    /// Attribute name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CarrierFrequency => "carrier_frequency",
            Self::SampleRate => "sample_rate",
            Self::Send => "send",
        }
    }
}

/// Text front end of a [`Transmitter`].
pub struct ControlSurface<R, D: DmaEngineService, M> {
    transmitter: Transmitter<R, D, M>,
    unusable: bool,
}

impl<R, D, M> ControlSurface<R, D, M>
where
    R: RegisterBlock,
    D: DmaEngineService,
    M: DmaMemory,
{
    /// Wrap `transmitter`.
    pub fn new(transmitter: Transmitter<R, D, M>) -> Self {
        Self {
            transmitter,
            unusable: false,
        }
    }

    /// Write `value` to `attribute`.
    ///
    /// Returns the report when the store triggered a transmission.
    pub fn store(
        &mut self,
        attribute: Attribute,
        value: &str,
    ) -> Result<Option<TransmissionReport>, TransmitterError> {
        if self.unusable {
            return Err(ResourceError::Unusable.into());
        }
        let result = match attribute {
            Attribute::CarrierFrequency => parse_hz(value)
                .and_then(|hz| self.transmitter.set_carrier_frequency(hz))
                .map(|()| None),
            Attribute::SampleRate => parse_hz(value)
                .and_then(|hz| self.transmitter.set_sample_rate(hz))
                .map(|()| None),
            Attribute::Send => self.transmitter.send_blocking(value).map(Some),
        };
        if let Err(e) = &result {
            if e.is_fatal() {
                error!("control surface disabled: {:?}", e);
                self.unusable = true;
            }
        }
        result
    }

    /// Read `attribute`, newline terminated.
    pub fn show(&self, attribute: Attribute) -> String<SHOW_CAPACITY> {
        let mut out = String::new();
        let config = self.transmitter.config();
        // i32::MIN plus newline is 12 bytes.
        let _ = match attribute {
            Attribute::CarrierFrequency => writeln!(out, "{}", config.carrier_hz),
            Attribute::SampleRate => writeln!(out, "{}", config.sample_rate_hz),
            Attribute::Send => writeln!(out, "{}", u8::from(self.transmitter.is_busy())),
        };
        out
    }

    /// Whether a fatal error disabled the surface.
    pub fn is_unusable(&self) -> bool {
        self.unusable
    }

    /// The wrapped transmitter.
    pub fn transmitter(&self) -> &Transmitter<R, D, M> {
        &self.transmitter
    }

    /// Unwrap the transmitter.
    pub fn into_inner(self) -> Transmitter<R, D, M> {
        self.transmitter
    }
}

/// Parse a signed frequency, tolerating surrounding whitespace.
fn parse_hz(value: &str) -> Result<i32, TransmitterError> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| ConfigError::NotANumber.into())
}
