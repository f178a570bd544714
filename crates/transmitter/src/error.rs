//! Transmitter error taxonomy
//!
//! | Variant         | Raised                              | Device afterwards |
//! |-----------------|-------------------------------------|-------------------|
//! | `Configuration` | before any register write           | unchanged         |
//! | `Resource`      | acquiring channel / shared memory   | unusable          |
//! | `Discovery`     | no channel matched the probe        | unbound, reusable |
//! | `ChainFull`     | sequence longer than the chain      | stopped, reusable |
//! | `Submission`    | DMA framework refused the probe     | stopped, reusable |
//! | `Busy`          | transmission already in flight      | unchanged         |
//! | `InvalidState`  | operation not valid in this state   | unchanged         |
//!
//! No operation retries; the first error is returned to the caller.

use crate::chain::ChainFull;
use crate::clock::ClockError;
use crate::controller::TransmitterState;
use crate::discovery::DiscoveryError;
use crate::pwm::PwmError;

/// Rejected configuration. Always raised before touching hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Carrier frequency must be positive.
    #[error("carrier frequency must be positive, got {0} Hz")]
    NonPositiveCarrier(i32),
    /// Sample rate must be positive.
    #[error("sample rate must be positive, got {0} Hz")]
    NonPositiveSampleRate(i32),
    /// Pin number outside 0–53.
    #[error("GPIO {0} does not exist")]
    InvalidPin(u8),
    /// The PWM output and busy LED must be different pins.
    #[error("PWM output and busy LED share GPIO {0}")]
    PinConflict(u8),
    /// Discovery scan bound outside 1–15.
    #[error("discovery must scan 1-15 channels, got {0}")]
    ScanRange(usize),
    /// Control-surface input is not a decimal integer.
    #[error("not a decimal integer")]
    NotANumber,
    /// Clock divider cannot reach the requested frequency.
    #[error(transparent)]
    Clock(#[from] ClockError),
    /// PWM timing cannot be derived from carrier and sample rate.
    #[error(transparent)]
    Pwm(#[from] PwmError),
}

/// A resource could not be acquired. Terminal for the device instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceError {
    /// The DMA framework has no slave channel for us.
    #[error("no DMA channel available")]
    ChannelUnavailable,
    /// Shared memory cannot hold the descriptor array and sample words.
    #[error("shared memory holds {available} words, need {needed}")]
    MemoryTooSmall {
        /// Words required.
        needed: usize,
        /// Words provided.
        available: usize,
    },
    /// Shared memory bus address is not 32-byte aligned.
    #[error("shared memory at {0:#010x} is not 32-byte aligned")]
    MemoryMisaligned(u32),
    /// The device was released or failed fatally earlier.
    #[error("device unusable after an earlier resource failure")]
    Unusable,
}

/// Top-level error of every transmitter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitterError {
    /// Invalid parameters; nothing was written.
    Configuration(ConfigError),
    /// Resource acquisition failed; the device is unusable.
    Resource(ResourceError),
    /// Channel discovery failed; the device is unbound.
    Discovery(DiscoveryError),
    /// The sequence does not fit the descriptor chain.
    ChainFull(ChainFull),
    /// The DMA framework rejected the probe transfer.
    Submission,
    /// A transmission is already in flight.
    Busy,
    /// The operation is not valid in the current state.
    InvalidState(TransmitterState),
}

impl TransmitterError {
    /// Whether the device must be discarded.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Resource(_))
    }
}

impl core::fmt::Display for TransmitterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "invalid configuration: {e}"),
            Self::Resource(e) => write!(f, "resource error: {e}"),
            Self::Discovery(e) => write!(f, "channel discovery failed: {e}"),
            Self::ChainFull(e) => write!(f, "{e}"),
            Self::Submission => write!(f, "DMA framework rejected the transfer"),
            Self::Busy => write!(f, "transmission already in flight"),
            Self::InvalidState(s) => write!(f, "not allowed in state {s:?}"),
        }
    }
}

impl core::error::Error for TransmitterError {}

impl From<ConfigError> for TransmitterError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ClockError> for TransmitterError {
    fn from(e: ClockError) -> Self {
        Self::Configuration(ConfigError::Clock(e))
    }
}

impl From<PwmError> for TransmitterError {
    fn from(e: PwmError) -> Self {
        Self::Configuration(ConfigError::Pwm(e))
    }
}

impl From<ResourceError> for TransmitterError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

impl From<ChainFull> for TransmitterError {
    fn from(e: ChainFull) -> Self {
        Self::ChainFull(e)
    }
}

impl From<DiscoveryError> for TransmitterError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::Submission => Self::Submission,
            other => Self::Discovery(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resource_errors_are_fatal() {
        assert!(TransmitterError::Resource(ResourceError::ChannelUnavailable).is_fatal());
        assert!(!TransmitterError::Busy.is_fatal());
        assert!(!TransmitterError::Discovery(DiscoveryError::ChannelNotFound).is_fatal());
        assert!(!TransmitterError::ChainFull(ChainFull { capacity: 600 }).is_fatal());
    }

    #[test]
    fn probe_rejection_surfaces_as_submission_error() {
        assert_eq!(
            TransmitterError::from(DiscoveryError::Submission),
            TransmitterError::Submission
        );
        assert_eq!(
            TransmitterError::from(DiscoveryError::ChannelNotFound),
            TransmitterError::Discovery(DiscoveryError::ChannelNotFound)
        );
    }

    #[test]
    fn clock_errors_are_configuration_errors() {
        let e = TransmitterError::from(ClockError::OutOfRange(10));
        assert!(matches!(e, TransmitterError::Configuration(ConfigError::Clock(_))));
    }

    #[test]
    fn display_mentions_the_cause() {
        let e = TransmitterError::Configuration(ConfigError::NonPositiveCarrier(-5));
        assert_eq!(
            e.to_string(),
            "invalid configuration: carrier frequency must be positive, got -5 Hz"
        );
    }
}
