//! Transmitter configuration
//!
//! Defaults reproduce the remote the transmitter was built for: a 40.685 MHz
//! carrier keyed at 1250 samples per second (800 µs per symbol).

use platform::registers::dma::{DREQ_PWM, WINDOW_CHANNELS};
use platform::GpioPin;

use crate::clock::{ClockConfig, ClockError};
use crate::error::ConfigError;
use crate::pwm::PwmTiming;

/// Default carrier frequency.
pub const DEFAULT_CARRIER_HZ: i32 = 40_685_000;

/// Default sample rate.
pub const DEFAULT_SAMPLE_RATE_HZ: i32 = 1_250;

/// PWM0 output (ALT5).
pub const DEFAULT_OUTPUT_PIN: u8 = 18;

/// LED lit while a transmission is in flight.
pub const DEFAULT_BUSY_LED_PIN: u8 = 19;

/// Code word of the remote, sent when no other sequence is given.
pub const DEFAULT_CODE: &str = "111110110110010010010010010010110110010010010110111111101100100100100100100101101100100100101101111111011001001001001001001011011001001001011011111110110010010010010010010110110010010010110111111101100100100100100100101101100100100101101111110";

/// Everything a transmitter instance is parameterised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransmitterConfig {
    /// Carrier frequency in Hz.
    pub carrier_hz: i32,
    /// Symbols per second.
    pub sample_rate_hz: i32,
    /// GPIO carrying PWM0.
    pub output_pin: u8,
    /// GPIO of the busy LED.
    pub busy_led_pin: u8,
    /// DREQ line of the PWM FIFO.
    pub dreq: u8,
    /// How many DMA channels discovery scans.
    pub scan_channels: usize,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            carrier_hz: DEFAULT_CARRIER_HZ,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            output_pin: DEFAULT_OUTPUT_PIN,
            busy_led_pin: DEFAULT_BUSY_LED_PIN,
            dreq: DREQ_PWM,
            scan_channels: WINDOW_CHANNELS,
        }
    }
}

impl TransmitterConfig {
    /// Check everything that can be checked without hardware.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock_target()?;
        let output = self.output_pin()?;
        let led = self.busy_led()?;
        if output == led {
            return Err(ConfigError::PinConflict(output.number()));
        }
        if !(1..=WINDOW_CHANNELS).contains(&self.scan_channels) {
            return Err(ConfigError::ScanRange(self.scan_channels));
        }
        Ok(())
    }

    /// Carrier as an unsigned frequency.
    pub fn carrier(&self) -> Result<u32, ConfigError> {
        u32::try_from(self.carrier_hz)
            .ok()
            .filter(|&hz| hz > 0)
            .ok_or(ConfigError::NonPositiveCarrier(self.carrier_hz))
    }

    /// Sample rate as an unsigned frequency.
    pub fn sample_rate(&self) -> Result<u32, ConfigError> {
        u32::try_from(self.sample_rate_hz)
            .ok()
            .filter(|&hz| hz > 0)
            .ok_or(ConfigError::NonPositiveSampleRate(self.sample_rate_hz))
    }

    /// PWM pacing for the configured rates.
    pub fn timing(&self) -> Result<PwmTiming, ConfigError> {
        Ok(PwmTiming::new(self.carrier()?, self.sample_rate()?)?)
    }

    /// PWM clock frequency (twice the carrier), checked against the clock
    /// generator's band.
    pub fn clock_target(&self) -> Result<u32, ConfigError> {
        let timing = self.timing()?;
        let target = u32::try_from(timing.clock_hz())
            .map_err(|_| ClockError::OutOfRange(u32::MAX))?;
        ClockConfig::for_frequency(target)?;
        Ok(target)
    }

    /// PWM output pin.
    pub fn output_pin(&self) -> Result<GpioPin, ConfigError> {
        GpioPin::new(self.output_pin).ok_or(ConfigError::InvalidPin(self.output_pin))
    }

    /// Busy LED pin.
    pub fn busy_led(&self) -> Result<GpioPin, ConfigError> {
        GpioPin::new(self.busy_led_pin).ok_or(ConfigError::InvalidPin(self.busy_led_pin))
    }
}
