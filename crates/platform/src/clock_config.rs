//! Clock sources available to the BCM2835 clock manager.
//!
//! Encodes which oscillator/PLL each source selector value feeds the PWM
//! clock generator from, so that divider maths and register writes agree on
//! the reference frequency.
//!
//! # Background
//!
//! The clock manager derives the PWM clock as `source / (DIVI + DIVF/4096)`.
//! The source selector lives in CTL bits \[3:0\]; the reference frequency of
//! each source is board firmware policy, not readable from the registers.
//! The values below are the ones the transmitter was characterised against.
//!
//! # Sources
//!
//! - BCM2835 ARM Peripherals, §6.3 "General Purpose GPIO Clocks" (source
//!   numbering, MASH behaviour)
//! - Raspberry Pi firmware forum threads on PLLD/HDMI auxiliary rates

/// Clock sources selectable in the clock manager CTL.SRC field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// 19.2 MHz crystal oscillator.
    Oscillator,

    /// PLLD per-channel output, treated as a 1 GHz reference.
    ///
    /// Used by: PWM clock during a transmission. The fractional divider is
    /// computed against this rate.
    PllD,

    /// HDMI auxiliary, treated as a 500 MHz reference.
    ///
    /// Used by: the parked PWM clock after a transmission stops (enable bit
    /// clear, MASH 0).
    HdmiAux,
}

impl ClockSource {
    /// CTL.SRC selector value.
    #[must_use]
    pub const fn selector(self) -> u32 {
        match self {
            Self::Oscillator => 0x1,
            Self::PllD => 0x5,
            Self::HdmiAux => 0x6,
        }
    }

    /// Nominal reference frequency in Hz.
    #[must_use]
    pub const fn frequency_hz(self) -> u32 {
        match self {
            Self::Oscillator => 19_200_000,
            Self::PllD => 1_000_000_000,
            Self::HdmiAux => 500_000_000,
        }
    }
}

/// A peripheral clock and the source it must run from.
///
/// Static documentation + runtime-assertion records: they do not configure
/// hardware.
pub struct ClockRequirement {
    /// Short identifier for the clock (e.g. `"PWM"`).
    pub clock: &'static str,
    /// Source selected while the clock is running.
    pub running_source: ClockSource,
    /// Source selected while the clock is parked.
    pub parked_source: ClockSource,
    /// Why this pairing exists.
    pub note: &'static str,
}

/// Clock requirements of the transmitter.
pub const TRANSMITTER_CLOCK_REQUIREMENTS: &[ClockRequirement] = &[ClockRequirement {
    clock: "PWM",
    running_source: ClockSource::PllD,
    parked_source: ClockSource::HdmiAux,
    note: "PWM clock = 2x carrier; the 1010..10 serializer pattern halves it. \
           Divider must only be rewritten while CTL.ENAB is clear",
}];

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwm_runs_from_plld() {
        let pwm = TRANSMITTER_CLOCK_REQUIREMENTS
            .iter()
            .find(|r| r.clock == "PWM")
            .expect("PWM must have a clock requirement entry");
        assert_eq!(pwm.running_source, ClockSource::PllD);
        assert_eq!(pwm.running_source.selector(), 0x5);
        assert_eq!(pwm.parked_source.selector(), 0x6);
    }

    #[test]
    fn selectors_fit_the_src_field() {
        for source in [ClockSource::Oscillator, ClockSource::PllD, ClockSource::HdmiAux] {
            assert!(source.selector() <= 0xF);
        }
    }

    #[test]
    fn plld_reference_is_one_gigahertz() {
        assert_eq!(ClockSource::PllD.frequency_hz(), 1_000_000_000);
    }
}
