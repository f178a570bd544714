//! Sample words
//!
//! Four words that sit right after the descriptor array in shared memory.
//! Descriptors never carry data inline; they copy one of these words:
//!
//! | Word | Content        | Copied to  | By                      |
//! |------|----------------|------------|-------------------------|
//! | 0    | busy LED mask  | GPCLR0     | terminal descriptor     |
//! | 1    | 0              | PWM DAT1   | `'0'` amplitude block   |
//! | 2    | 0xAAAA_AAAA    | PWM DAT1   | `'1'` amplitude block   |
//! | 3    | width / 2      | PWM FIFO   | every pacing block      |

use platform::GpioPin;

use crate::pwm::PwmTiming;

/// Number of sample words.
pub const SAMPLE_WORDS: usize = 4;

/// Serializer pattern at maximum amplitude: one carrier cycle per two clocks.
pub const MAX_AMPLITUDE_PATTERN: u32 = 0xAAAA_AAAA;

/// Serializer pattern at zero amplitude.
pub const SILENCE_PATTERN: u32 = 0;

/// Contents of the sample words for one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleWords {
    /// GPIO clear mask of the busy LED.
    pub busy_mask: u32,
    /// Zero-amplitude pattern.
    pub silence: u32,
    /// Max-amplitude pattern.
    pub carrier: u32,
    /// Pacing FIFO word.
    pub duty: u32,
}

impl SampleWords {
    /// Words for `timing`, clearing `busy_led` when the chain ends.
    #[must_use]
    pub const fn new(busy_led: GpioPin, timing: &PwmTiming) -> Self {
        Self {
            busy_mask: busy_led.mask(),
            silence: SILENCE_PATTERN,
            carrier: MAX_AMPLITUDE_PATTERN,
            duty: timing.duty_word(),
        }
    }

    /// Memory order.
    #[must_use]
    pub const fn to_words(&self) -> [u32; SAMPLE_WORDS] {
        [self.busy_mask, self.silence, self.carrier, self.duty]
    }
}

/// Bus addresses of the sample words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleAddresses {
    /// Word 0.
    pub busy_mask: u32,
    /// Word 1.
    pub silence: u32,
    /// Word 2.
    pub carrier: u32,
    /// Word 3.
    pub duty: u32,
}

impl SampleAddresses {
    /// Addresses of four consecutive words starting at `base`.
    #[must_use]
    pub const fn starting_at(base: u32) -> Self {
        Self {
            busy_mask: base,
            silence: base.wrapping_add(4),
            carrier: base.wrapping_add(8),
            duty: base.wrapping_add(12),
        }
    }

    /// Amplitude word for a symbol.
    #[must_use]
    pub const fn amplitude(&self, on: bool) -> u32 {
        if on {
            self.carrier
        } else {
            self.silence
        }
    }
}
