//! Register-map properties that the DMA descriptors depend on.
//!
//! These run against a real [`MmioWindow`] over host memory, so they need
//! no features.

use platform::memory_map::{peripheral_at, BUS_PERIPHERAL_BASE, WINDOW_LEN_BYTES};
use platform::{FunctionSelect, Gpio, GpioPin, MmioWindow, Peripheral};
use proptest::prelude::*;

const FUNCTIONS: [FunctionSelect; 8] = [
    FunctionSelect::Input,
    FunctionSelect::Output,
    FunctionSelect::Alt0,
    FunctionSelect::Alt1,
    FunctionSelect::Alt2,
    FunctionSelect::Alt3,
    FunctionSelect::Alt4,
    FunctionSelect::Alt5,
];

proptest! {
    /// Reprogramming one pin never disturbs any other pin's function.
    #[test]
    fn set_function_touches_only_its_own_field(
        pin in 0u8..54,
        other in 0u8..54,
        f in 0usize..8,
        g in 0usize..8,
    ) {
        prop_assume!(pin != other);
        let mut backing = [0u32; 0x40 / 4];
        // SAFETY: backing outlives the window and is only touched through it.
        let window = unsafe { MmioWindow::new(backing.as_mut_ptr(), 0x40) }.unwrap();
        let gpio = Gpio::new(&window);
        let pin = GpioPin::new(pin).unwrap();
        let other = GpioPin::new(other).unwrap();

        gpio.set_function(other, FUNCTIONS[g]);
        gpio.set_function(pin, FUNCTIONS[f]);

        prop_assert_eq!(gpio.function(pin), FUNCTIONS[f]);
        prop_assert_eq!(gpio.function(other), FUNCTIONS[g]);
    }

    /// Every register inside a mapped window resolves back to that window.
    #[test]
    fn bus_addresses_resolve_to_their_peripheral(p in 0usize..4, word in 0usize..(WINDOW_LEN_BYTES / 4)) {
        let peripheral = Peripheral::ALL[p];
        let offset = word * 4;
        let bus = peripheral.bus_address(offset);

        prop_assert!(bus >= BUS_PERIPHERAL_BASE);
        prop_assert_eq!(peripheral_at(bus), Some((peripheral, offset)));
    }
}

#[test]
fn busy_led_clear_mask_targets_gpclr0() {
    let led = GpioPin::new(19).unwrap();
    assert_eq!(
        Peripheral::Gpio.bus_address(led.clear_register()),
        0x7E20_0028
    );
    assert_eq!(led.mask(), 0x0008_0000);
}
