//! Sequence encoder
//!
//! Each symbol becomes two control blocks:
//!
//! 1. amplitude: sample word 1 (`'0'`) or 2 (`'1'`) → PWM DAT1, unpaced;
//! 2. pacing: sample word 3 → PWM FIFO, gated by the PWM DREQ, so the chain
//!    waits one sample period before the next symbol.
//!
//! A terminal block copies the busy-LED mask to GPCLR0 and is the only one
//! that raises an interrupt. Characters other than `'0'` and `'1'` are
//! skipped, so `"1 0\n1"` encodes like `"101"`.

use platform::registers::{dma as ti, gpio, pwm};
use platform::{DmaMemory, GpioPin, Peripheral};

use crate::chain::{Building, ChainFull, DescriptorChain};
use crate::samples::SampleAddresses;

/// Bytes moved by every block.
pub const TRANSFER_BYTES: u32 = 4;

/// One on-off-keyed symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    /// Carrier off for one sample.
    Zero,
    /// Carrier on for one sample.
    One,
}

impl Symbol {
    /// Parse one character; anything but `'0'`/`'1'` is not a symbol.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Zero),
            '1' => Some(Self::One),
            _ => None,
        }
    }

    /// Whether the carrier is on.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::One)
    }
}

/// Symbols of `sequence`, in order.
pub fn symbols(sequence: &str) -> impl Iterator<Item = Symbol> + '_ {
    sequence.chars().filter_map(Symbol::from_char)
}

/// Number of blocks `sequence` expands to, terminal block included.
#[must_use]
pub fn descriptors_for(sequence: &str) -> usize {
    symbols(sequence).count().saturating_mul(2).saturating_add(1)
}

/// Peripheral bus addresses the blocks write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderTargets {
    /// PWM DAT1.
    pub amplitude: u32,
    /// PWM FIFO.
    pub fifo: u32,
    /// GPIO clear register of the busy LED's bank.
    pub busy_clear: u32,
    /// DREQ line of the PWM FIFO.
    pub dreq: u8,
}

impl EncoderTargets {
    /// Targets for the PWM peripheral and `busy_led`.
    #[must_use]
    pub const fn new(busy_led: GpioPin, dreq: u8) -> Self {
        Self {
            amplitude: Peripheral::Pwm.bus_address(pwm::DAT1),
            fifo: Peripheral::Pwm.bus_address(pwm::FIF1),
            busy_clear: Peripheral::Gpio.bus_address(busy_led.clear_register()),
            dreq,
        }
    }
}

impl Default for EncoderTargets {
    fn default() -> Self {
        Self {
            amplitude: Peripheral::Pwm.bus_address(pwm::DAT1),
            fifo: Peripheral::Pwm.bus_address(pwm::FIF1),
            busy_clear: Peripheral::Gpio.bus_address(gpio::GPCLR0),
            dreq: ti::DREQ_PWM,
        }
    }
}

/// Append `sequence` and the terminal block to `chain`.
///
/// Either the whole sequence fits or nothing is appended. Returns the number
/// of blocks written.
pub fn build<M: DmaMemory>(
    chain: &mut DescriptorChain<M, Building>,
    sequence: &str,
    samples: &SampleAddresses,
    targets: &EncoderTargets,
) -> Result<usize, ChainFull> {
    let needed = descriptors_for(sequence);
    chain.reserve(needed)?;

    let paced = ti::ti_per_map(u32::from(targets.dreq)) | ti::TI_D_DREQ;
    for symbol in symbols(sequence) {
        chain.append(samples.amplitude(symbol.is_on()), targets.amplitude, TRANSFER_BYTES)?;
        chain
            .append(samples.duty, targets.fifo, TRANSFER_BYTES)?
            .or_info(paced)?;
    }
    chain
        .append(samples.busy_mask, targets.busy_clear, TRANSFER_BYTES)?
        .or_info(ti::TI_INT_EN)?;

    debug!("encoded {} blocks", needed);
    Ok(needed)
}
