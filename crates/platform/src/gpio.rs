//! GPIO pin abstraction layer
//!
//! Single-register helpers over the BCM2835 GPIO window: function select,
//! output set/clear, level read. Pull resistors and edge detection are not
//! used by the transmitter and are not modelled.

use crate::mmio::RegisterBlock;
use crate::registers::gpio as regs;

/// A validated BCM GPIO line number (0–53).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct GpioPin(u8);

impl GpioPin {
    /// Validate a BCM line number.
    #[must_use]
    pub const fn new(number: u8) -> Option<Self> {
        if number < regs::PIN_COUNT {
            Some(Self(number))
        } else {
            None
        }
    }

    /// BCM line number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Bit of this pin inside its SET/CLR/LEV register.
    #[must_use]
    pub const fn mask(self) -> u32 {
        1 << (self.0 % 32)
    }

    /// Output set register for this pin's bank.
    #[must_use]
    pub const fn set_register(self) -> usize {
        if self.0 < 32 { regs::GPSET0 } else { regs::GPSET1 }
    }

    /// Output clear register for this pin's bank.
    #[must_use]
    pub const fn clear_register(self) -> usize {
        if self.0 < 32 { regs::GPCLR0 } else { regs::GPCLR1 }
    }

    /// Level register for this pin's bank.
    #[must_use]
    pub const fn level_register(self) -> usize {
        if self.0 < 32 { regs::GPLEV0 } else { regs::GPLEV1 }
    }

    /// Function-select register and bit shift for this pin.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: pin < 54, so index <= 5 and shift <= 27
    pub const fn fsel_location(self) -> (usize, u32) {
        let index = (self.0 / regs::PINS_PER_FSEL) as usize;
        let shift = (self.0 % regs::PINS_PER_FSEL) as u32 * 3;
        (regs::GPFSEL0 + index * 4, shift)
    }
}

impl TryFrom<u8> for GpioPin {
    type Error = InvalidPin;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number).ok_or(InvalidPin(number))
    }
}

impl From<GpioPin> for u8 {
    fn from(pin: GpioPin) -> Self {
        pin.0
    }
}

/// A line number outside 0–53.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("GPIO {0} does not exist (0-53)")]
pub struct InvalidPin(pub u8);

/// Pin function (3-bit GPFSEL field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionSelect {
    /// Plain input.
    Input,
    /// Plain output.
    Output,
    /// Alternate function 0.
    Alt0,
    /// Alternate function 1.
    Alt1,
    /// Alternate function 2.
    Alt2,
    /// Alternate function 3.
    Alt3,
    /// Alternate function 4.
    Alt4,
    /// Alternate function 5 (PWM0 on GPIO 18).
    Alt5,
}

impl FunctionSelect {
    /// GPFSEL field encoding. The alternate functions are not in order.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Input => 0b000,
            Self::Output => 0b001,
            Self::Alt0 => 0b100,
            Self::Alt1 => 0b101,
            Self::Alt2 => 0b110,
            Self::Alt3 => 0b111,
            Self::Alt4 => 0b011,
            Self::Alt5 => 0b010,
        }
    }

    /// Decode a GPFSEL field.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b000 => Self::Input,
            0b001 => Self::Output,
            0b100 => Self::Alt0,
            0b101 => Self::Alt1,
            0b110 => Self::Alt2,
            0b111 => Self::Alt3,
            0b011 => Self::Alt4,
            _ => Self::Alt5,
        }
    }
}

/// The GPIO controller over a register window.
pub struct Gpio<R> {
    regs: R,
}

impl<R: RegisterBlock> Gpio<R> {
    /// Wrap the GPIO register window.
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Select the function of `pin`, leaving its neighbours untouched.
    pub fn set_function(&self, pin: GpioPin, function: FunctionSelect) {
        let (register, shift) = pin.fsel_location();
        self.regs
            .modify(register, |v| (v & !(0b111 << shift)) | (function.bits() << shift));
    }

    /// Current function of `pin`.
    pub fn function(&self, pin: GpioPin) -> FunctionSelect {
        let (register, shift) = pin.fsel_location();
        FunctionSelect::from_bits(self.regs.read(register) >> shift)
    }

    /// Drive `pin` high.
    pub fn set(&self, pin: GpioPin) {
        self.regs.write(pin.set_register(), pin.mask());
    }

    /// Drive `pin` low.
    pub fn clear(&self, pin: GpioPin) {
        self.regs.write(pin.clear_register(), pin.mask());
    }

    /// Read the level of `pin`.
    pub fn is_high(&self, pin: GpioPin) -> bool {
        self.regs.read(pin.level_register()) & pin.mask() != 0
    }

    /// Borrow the underlying register window.
    pub fn registers(&self) -> &R {
        &self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockRegisters;

    #[test]
    fn pin_numbers_are_validated() {
        assert!(GpioPin::new(53).is_some());
        assert!(GpioPin::new(54).is_none());
        assert_eq!(GpioPin::try_from(60), Err(InvalidPin(60)));
    }

    #[test]
    fn bank_registers_follow_pin_number() {
        let led = GpioPin::new(19).unwrap();
        assert_eq!(led.clear_register(), 0x28);
        assert_eq!(led.mask(), 1 << 19);

        let high = GpioPin::new(40).unwrap();
        assert_eq!(high.set_register(), 0x20);
        assert_eq!(high.mask(), 1 << 8);
    }

    #[test]
    fn pwm_pin_function_lives_in_gpfsel1() {
        // GPIO 18: register 1 (offset 0x04), bits [26:24]
        assert_eq!(GpioPin::new(18).unwrap().fsel_location(), (0x04, 24));
    }

    #[test]
    fn set_function_preserves_neighbours() {
        let regs = MockRegisters::new();
        regs.preset(0x04, 0b001 << 27);
        let gpio = Gpio::new(&regs);
        let pwm = GpioPin::new(18).unwrap();

        gpio.set_function(pwm, FunctionSelect::Alt5);
        assert_eq!(gpio.function(pwm), FunctionSelect::Alt5);
        assert_eq!(regs.value(0x04), (0b001 << 27) | (0b010 << 24));

        gpio.set_function(pwm, FunctionSelect::Output);
        assert_eq!(gpio.function(pwm), FunctionSelect::Output);
    }

    #[test]
    fn set_and_clear_write_single_bit_masks() {
        let regs = MockRegisters::new();
        let gpio = Gpio::new(&regs);
        let led = GpioPin::new(19).unwrap();

        gpio.set(led);
        gpio.clear(led);
        assert_eq!(regs.writes(), [(0x1C, 1 << 19), (0x28, 1 << 19)]);
    }
}
