//! Physical and bus address map for BCM2835-family SoCs.
//!
//! ## Two views of the same peripheral
//!
//! | View     | Who uses it            | Peripheral base          |
//! |----------|------------------------|--------------------------|
//! | Physical | CPU (ioremap / mmap)   | 0x2000_0000 (Pi 1), 0x3F00_0000 (Pi 2/3) |
//! | Bus      | DMA engine descriptors | 0x7E00_0000 (every board) |
//!
//! Descriptors must carry **bus** addresses. Putting a physical address in a
//! control block makes the DMA engine write to RAM instead of the peripheral.
//!
//! ## Peripheral offsets
//!
//! | Peripheral    | Offset      | Used for |
//! |---------------|-------------|----------|
//! | DMA           | 0x0000_7000 | channel register sets (discovery, arming) |
//! | Clock manager | 0x0010_1000 | PWM clock divider |
//! | GPIO          | 0x0020_0000 | pin mux, busy LED |
//! | PWM           | 0x0020_C000 | serializer + DMA pacing |

/// Base of the peripheral range as seen by the DMA engine.
pub const BUS_PERIPHERAL_BASE: u32 = 0x7E00_0000;

/// Size of each register window the transmitter maps.
pub const WINDOW_LEN_BYTES: usize = 16 * 1024;

/// Required alignment of every DMA control block, in bytes.
pub const CONTROL_BLOCK_ALIGN: u32 = 32;

/// Peripherals the transmitter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    /// DMA controller (channels 0–14).
    Dma,
    /// Clock manager.
    ClockManager,
    /// GPIO controller.
    Gpio,
    /// PWM controller.
    Pwm,
}

impl Peripheral {
    /// All peripherals, in address order.
    pub const ALL: [Peripheral; 4] = [
        Peripheral::Dma,
        Peripheral::ClockManager,
        Peripheral::Gpio,
        Peripheral::Pwm,
    ];

    /// Offset of the peripheral from the peripheral base.
    #[must_use]
    pub const fn offset(self) -> u32 {
        match self {
            Self::Dma => 0x0000_7000,
            Self::ClockManager => 0x0010_1000,
            Self::Gpio => 0x0020_0000,
            Self::Pwm => 0x0020_C000,
        }
    }

    /// Bus address of `register` inside this peripheral, as written into a
    /// DMA control block.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // register offsets are < WINDOW_LEN_BYTES
    #[allow(clippy::arithmetic_side_effects)] // Safety: 0x7E00_0000 + 0x20_C000 + 16K < u32::MAX
    pub const fn bus_address(self, register: usize) -> u32 {
        BUS_PERIPHERAL_BASE + self.offset() + register as u32
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dma => "DMA",
            Self::ClockManager => "CM",
            Self::Gpio => "GPIO",
            Self::Pwm => "PWM",
        }
    }
}

/// Resolve a bus address to the peripheral window and register offset it
/// falls in, or `None` if it is not a peripheral address we map.
#[must_use]
pub fn peripheral_at(bus_address: u32) -> Option<(Peripheral, usize)> {
    let relative = bus_address.checked_sub(BUS_PERIPHERAL_BASE)?;
    Peripheral::ALL.iter().find_map(|&p| {
        let offset = relative.checked_sub(p.offset())? as usize;
        (offset < WINDOW_LEN_BYTES).then_some((p, offset))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{gpio, pwm};

    #[test]
    fn pwm_fifo_bus_address_matches_datasheet() {
        assert_eq!(Peripheral::Pwm.bus_address(pwm::FIF1), 0x7E20_C018);
        assert_eq!(Peripheral::Pwm.bus_address(pwm::DAT1), 0x7E20_C014);
    }

    #[test]
    fn gpio_clear_bus_address_matches_dummy_slave_target() {
        // The DMA slave profile targets GPCLR0; it must equal 0x7E20_0028.
        assert_eq!(Peripheral::Gpio.bus_address(gpio::GPCLR0), 0x7E20_0028);
    }

    #[test]
    fn peripheral_at_resolves_register_offsets() {
        assert_eq!(peripheral_at(0x7E20_C018), Some((Peripheral::Pwm, 0x18)));
        assert_eq!(peripheral_at(0x7E00_7104), Some((Peripheral::Dma, 0x104)));
        assert_eq!(peripheral_at(0x7E10_10A0), Some((Peripheral::ClockManager, 0xA0)));
        assert_eq!(peripheral_at(0x4000_0000), None, "RAM is not a peripheral");
        assert_eq!(peripheral_at(0x7E30_0000), None);
    }
}
