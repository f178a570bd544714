//! BCM2835-family register map
//!
//! Source: BCM2835 ARM Peripherals datasheet (§4 DMA, §6 GPIO, §6.3 general
//! purpose clocks, §9 PWM) plus the Raspberry Pi errata for the clock
//! manager PWM registers, which the datasheet does not list.
//!
//! All offsets are byte offsets inside the peripheral's window; see
//! [`crate::memory_map`] for the window base addresses.

// ---------------------------------------------------------------------------
// Clock manager
// ---------------------------------------------------------------------------

/// Clock manager: PWM clock control/divider registers.
///
/// Every write must carry [`cm::PASSWORD`] in bits \[31:24\] or the
/// hardware silently ignores it.
pub mod cm {
    /// PWM clock control register.
    pub const PWMCTL: usize = 0xA0;

    /// PWM clock divider register.
    pub const PWMDIV: usize = 0xA4;

    /// Password that must accompany every control/divider write.
    pub const PASSWORD: u32 = 0x5A00_0000;

    /// Control: enable the clock generator.
    ///
    /// Never change the divider or source while this is set.
    pub const CTL_ENAB: u32 = 1 << 4;

    /// Control: generator is running (read-only).
    pub const CTL_BUSY: u32 = 1 << 7;

    /// Control: MASH noise-shaping stage (0 = integer divide, 1–3).
    #[must_use]
    pub const fn ctl_mash(stage: u32) -> u32 {
        (stage & 0x3) << 9
    }

    /// Control: clock source selector (bits \[3:0\]).
    #[must_use]
    pub const fn ctl_src(source: u32) -> u32 {
        source & 0xF
    }

    /// Divider: integer part (bits \[23:12\]).
    #[must_use]
    pub const fn div_divi(divi: u32) -> u32 {
        (divi & 0xFFF) << 12
    }

    /// Divider: 12-bit fractional part (bits \[11:0\]).
    #[must_use]
    pub const fn div_divf(divf: u32) -> u32 {
        divf & 0xFFF
    }
}

// ---------------------------------------------------------------------------
// PWM
// ---------------------------------------------------------------------------

/// PWM controller registers.
pub mod pwm {
    /// Control register.
    pub const CTL: usize = 0x00;
    /// Status register.
    pub const STA: usize = 0x04;
    /// DMA configuration register.
    pub const DMAC: usize = 0x08;
    /// Channel 1 range.
    pub const RNG1: usize = 0x10;
    /// Channel 1 data.
    pub const DAT1: usize = 0x14;
    /// FIFO input (shared by both channels when USEF is set).
    pub const FIF1: usize = 0x18;
    /// Channel 2 range.
    pub const RNG2: usize = 0x20;
    /// Channel 2 data.
    pub const DAT2: usize = 0x24;

    /// Channel 1 enable.
    pub const CTL_PWEN1: u32 = 1 << 0;
    /// Channel 1 serializer mode.
    pub const CTL_MODE1: u32 = 1 << 1;
    /// Channel 1 repeat last data when FIFO empty.
    pub const CTL_RPTL1: u32 = 1 << 2;
    /// Clear FIFO (self-clearing).
    pub const CTL_CLRF: u32 = 1 << 6;
    /// Channel 2 enable.
    pub const CTL_PWEN2: u32 = 1 << 8;
    /// Channel 2 repeat last data.
    pub const CTL_RPTL2: u32 = 1 << 10;
    /// Channel 2 takes data from the FIFO.
    pub const CTL_USEF2: u32 = 1 << 13;
    /// Channel 2 mark/space mode.
    pub const CTL_MSEN2: u32 = 1 << 15;

    /// DMA enable: raise DREQ while the FIFO is below threshold.
    pub const DMAC_ENAB: u32 = 1 << 31;

    /// DMAC: DREQ threshold (bits \[7:0\]).
    #[must_use]
    pub const fn dmac_dreq(threshold: u32) -> u32 {
        threshold & 0xFF
    }

    /// Serializer width in bits when channel 1 is in serializer mode.
    pub const SERIALIZER_BITS: u32 = 32;
}

// ---------------------------------------------------------------------------
// GPIO
// ---------------------------------------------------------------------------

/// GPIO registers.
pub mod gpio {
    /// First function-select register; ten pins per register, 3 bits each.
    pub const GPFSEL0: usize = 0x00;
    /// Output set, pins 0–31.
    pub const GPSET0: usize = 0x1C;
    /// Output set, pins 32–53.
    pub const GPSET1: usize = 0x20;
    /// Output clear, pins 0–31.
    pub const GPCLR0: usize = 0x28;
    /// Output clear, pins 32–53.
    pub const GPCLR1: usize = 0x2C;
    /// Pin level, pins 0–31.
    pub const GPLEV0: usize = 0x34;
    /// Pin level, pins 32–53.
    pub const GPLEV1: usize = 0x38;

    /// Number of GPIO lines on the BCM2835.
    pub const PIN_COUNT: u8 = 54;
    /// Pins per function-select register.
    pub const PINS_PER_FSEL: u8 = 10;
}

// ---------------------------------------------------------------------------
// DMA controller
// ---------------------------------------------------------------------------

/// DMA controller registers (per channel) and transfer-information bits.
pub mod dma {
    /// Distance between consecutive channel register sets.
    pub const CHANNEL_STRIDE: usize = 0x100;
    /// Channels with a register set inside the main DMA window (0–14).
    pub const WINDOW_CHANNELS: usize = 15;

    /// Control and status.
    pub const CS: usize = 0x00;
    /// Control-block address: writing it (with CS.ACTIVE) starts a chain.
    pub const CONBLK_AD: usize = 0x04;
    /// Transfer information of the current control block.
    pub const TI: usize = 0x08;
    /// Source address the engine is currently reading.
    pub const SOURCE_AD: usize = 0x0C;
    /// Destination address the engine is currently writing.
    pub const DEST_AD: usize = 0x10;
    /// Remaining transfer length.
    pub const TXFR_LEN: usize = 0x14;
    /// 2D stride.
    pub const STRIDE: usize = 0x18;
    /// Next control-block address.
    pub const NEXTCONBK: usize = 0x1C;
    /// Debug register.
    pub const DEBUG: usize = 0x20;

    /// CS: channel active.
    pub const CS_ACTIVE: u32 = 1 << 0;
    /// CS: transfer complete (write 1 to clear).
    pub const CS_END: u32 = 1 << 1;
    /// CS: interrupt status (write 1 to clear).
    pub const CS_INT: u32 = 1 << 2;
    /// CS: abort the current control block.
    pub const CS_ABORT: u32 = 1 << 30;
    /// CS: reset the channel.
    pub const CS_RESET: u32 = 1 << 31;

    /// TI: raise an interrupt when this control block completes.
    pub const TI_INT_EN: u32 = 1 << 0;
    /// TI: wait for the AXI write response.
    pub const TI_WAIT_RESP: u32 = 1 << 3;
    /// TI: increment destination address.
    pub const TI_D_INC: u32 = 1 << 4;
    /// TI: destination writes are gated by the peripheral DREQ.
    pub const TI_D_DREQ: u32 = 1 << 6;
    /// TI: increment source address.
    pub const TI_S_INC: u32 = 1 << 8;
    /// TI: source reads are gated by the peripheral DREQ.
    pub const TI_S_DREQ: u32 = 1 << 10;
    /// TI: never issue wide bursts.
    pub const TI_NO_WIDE_BURSTS: u32 = 1 << 26;

    /// TI: burst length (bits \[15:12\]).
    #[must_use]
    pub const fn ti_burst(length: u32) -> u32 {
        (length & 0xF) << 12
    }

    /// TI: peripheral DREQ line used for pacing (bits \[20:16\]).
    #[must_use]
    pub const fn ti_per_map(dreq: u32) -> u32 {
        (dreq & 0x1F) << 16
    }

    /// Extract the DREQ line from a TI word.
    #[must_use]
    pub const fn ti_dreq_of(info: u32) -> u32 {
        (info >> 16) & 0x1F
    }

    /// DREQ line wired to the PWM FIFO.
    pub const DREQ_PWM: u8 = 5;
}
