//! PWM clock programming
//!
//! The clock manager divides the 1 GHz PLLD reference by `DIVI + DIVF/4096`.
//! MASH noise shaping dithers the fractional part; higher stages give finer
//! average frequency but need more headroom below the reference, so the stage
//! drops as the target rises.
//!
//! Write order matters: the divider may only change while the generator is
//! disabled, so every reprogramming is CTL (enable clear) → DIV → CTL | ENAB.

use platform::clock_config::ClockSource;
use platform::registers::cm;
use platform::RegisterBlock;

/// Reference the divider is computed against.
pub const REFERENCE: ClockSource = ClockSource::PllD;

/// Lowest programmable target frequency.
pub const MIN_FREQUENCY_HZ: u32 = 1_000_000;

/// Highest programmable target frequency.
pub const MAX_FREQUENCY_HZ: u32 = 500_000_000;

/// Fractional divider resolution (12 bits).
pub const DIVF_SCALE: u32 = 0x1000;

/// Clock target outside the supported band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// Target not within 1 MHz ..= 500 MHz.
    #[error("clock frequency {0} Hz outside 1 MHz..=500 MHz")]
    OutOfRange(u32),
}

/// MASH noise-shaping stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MashStage {
    /// First order, used above 150 MHz.
    One = 1,
    /// Second order, 100 MHz ..= 150 MHz.
    Two = 2,
    /// Third order, below 100 MHz.
    Three = 3,
}

impl MashStage {
    /// Stage suited to `frequency_hz`.
    #[must_use]
    pub const fn for_frequency(frequency_hz: u32) -> Self {
        if frequency_hz < 100_000_000 {
            Self::Three
        } else if frequency_hz <= 150_000_000 {
            Self::Two
        } else {
            Self::One
        }
    }

    /// CTL.MASH field value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// Divider settings for one target frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Requested output frequency.
    pub target_hz: u32,
    /// Noise-shaping stage.
    pub mash: MashStage,
    /// Integer divider.
    pub divi: u32,
    /// 12-bit fractional divider.
    pub divf: u32,
}

impl ClockConfig {
    /// Compute the divider for `target_hz`.
    ///
    /// `divi = PLL / f`, `divf = floor(4096 * (PLL mod f) / f)`.
    pub fn for_frequency(target_hz: u32) -> Result<Self, ClockError> {
        if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&target_hz) {
            return Err(ClockError::OutOfRange(target_hz));
        }
        let reference = REFERENCE.frequency_hz();
        let divi = reference / target_hz;
        let remainder = u64::from(reference % target_hz);
        // remainder < target, so the quotient is < 4096
        #[allow(clippy::arithmetic_side_effects)] // Safety: remainder < 5e8, times 4096 < u64::MAX; target_hz >= 1 MHz
        let divf = (u64::from(DIVF_SCALE) * remainder) / u64::from(target_hz);
        Ok(Self {
            target_hz,
            mash: MashStage::for_frequency(target_hz),
            divi,
            divf: u32::try_from(divf).unwrap_or(DIVF_SCALE - 1),
        })
    }

    /// CTL value: password, MASH and source, enable as requested.
    #[must_use]
    pub const fn control_word(&self, enable: bool) -> u32 {
        let ctl = cm::PASSWORD | cm::ctl_mash(self.mash.bits()) | cm::ctl_src(REFERENCE.selector());
        if enable {
            ctl | cm::CTL_ENAB
        } else {
            ctl
        }
    }

    /// DIV value: password, integer and fractional divider.
    #[must_use]
    pub const fn divider_word(&self) -> u32 {
        cm::PASSWORD | cm::div_divi(self.divi) | cm::div_divf(self.divf)
    }

    /// Average output frequency actually produced, in millihertz.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: divisor >= 4096 * 2 since divi >= 2 in band
    pub fn effective_millihertz(&self) -> u64 {
        let scaled_divisor = u64::from(self.divi) * u64::from(DIVF_SCALE) + u64::from(self.divf);
        u64::from(REFERENCE.frequency_hz()) * u64::from(DIVF_SCALE) * 1000 / scaled_divisor
    }
}

/// Control word that parks the generator: MASH 0, 500 MHz source, disabled.
pub const PARKED_CONTROL: u32 =
    cm::PASSWORD | cm::ctl_mash(0) | cm::ctl_src(ClockSource::HdmiAux.selector());

/// Programs the PWM clock generator through the clock-manager window.
pub struct ClockProgrammer<R> {
    regs: R,
}

impl<R: RegisterBlock> ClockProgrammer<R> {
    /// Wrap the clock-manager window.
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Program and enable the PWM clock at `target_hz`.
    ///
    /// Out-of-band targets are rejected without any register write.
    pub fn configure(&self, target_hz: u32) -> Result<ClockConfig, ClockError> {
        let config = ClockConfig::for_frequency(target_hz)?;
        debug!(
            "PWM clock {} Hz: divi={} divf={} mash={:?}",
            target_hz, config.divi, config.divf, config.mash
        );
        self.regs.write(cm::PWMCTL, config.control_word(false));
        self.regs.write(cm::PWMDIV, config.divider_word());
        self.regs.write(cm::PWMCTL, config.control_word(true));
        Ok(config)
    }

    /// Disable the PWM clock and park it on the 500 MHz source.
    pub fn stop(&self) {
        self.regs.write(cm::PWMCTL, PARKED_CONTROL);
    }

    /// Whether the generator is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.regs.read(cm::PWMCTL) & cm::CTL_ENAB != 0
    }

    /// Borrow the underlying register window.
    pub fn registers(&self) -> &R {
        &self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::mocks::MockRegisters;

    #[test]
    fn divider_for_twice_the_default_carrier() {
        // 1e9 / 81.37e6 = 12 rem 23_560_000; 4096 * 23.56e6 / 81.37e6 = 1185.9
        let config = ClockConfig::for_frequency(81_370_000).unwrap();
        assert_eq!(config.divi, 12);
        assert_eq!(config.divf, 1185);
        assert_eq!(config.mash, MashStage::Three);
    }

    #[test]
    fn mash_stage_boundaries() {
        assert_eq!(MashStage::for_frequency(99_999_999), MashStage::Three);
        assert_eq!(MashStage::for_frequency(100_000_000), MashStage::Two);
        assert_eq!(MashStage::for_frequency(150_000_000), MashStage::Two);
        assert_eq!(MashStage::for_frequency(150_000_001), MashStage::One);
    }

    #[test]
    fn band_edges() {
        assert!(ClockConfig::for_frequency(1_000_000).is_ok());
        assert!(ClockConfig::for_frequency(500_000_000).is_ok());
        assert_eq!(
            ClockConfig::for_frequency(999_999),
            Err(ClockError::OutOfRange(999_999))
        );
        assert_eq!(
            ClockConfig::for_frequency(500_000_001),
            Err(ClockError::OutOfRange(500_000_001))
        );
    }

    #[test]
    fn configure_writes_disable_divide_enable_in_order() {
        let regs = MockRegisters::new();
        let clock = ClockProgrammer::new(&regs);
        let config = clock.configure(81_370_000).unwrap();

        let ctl = 0x5A00_0000 | (3 << 9) | 5;
        assert_eq!(
            regs.writes(),
            [
                (cm::PWMCTL, ctl),
                (cm::PWMDIV, 0x5A00_0000 | (12 << 12) | 1185),
                (cm::PWMCTL, ctl | cm::CTL_ENAB),
            ]
        );
        assert_eq!(config.divider_word(), 0x5A00_C4A1);
        assert!(clock.is_enabled());
    }

    #[test]
    fn out_of_band_configure_touches_nothing() {
        let regs = MockRegisters::new();
        let clock = ClockProgrammer::new(&regs);
        assert!(clock.configure(600_000_000).is_err());
        assert!(regs.writes().is_empty());
    }

    #[test]
    fn stop_parks_on_500mhz_source() {
        let regs = MockRegisters::new();
        let clock = ClockProgrammer::new(&regs);
        clock.configure(81_370_000).unwrap();
        clock.stop();
        assert_eq!(regs.value(cm::PWMCTL), 0x5A00_0006);
        assert!(!clock.is_enabled());
    }

    #[test]
    fn sources_match_the_pwm_clock_requirement() {
        let pwm = platform::clock_config::TRANSMITTER_CLOCK_REQUIREMENTS
            .iter()
            .find(|r| r.clock == "PWM")
            .unwrap();
        assert_eq!(REFERENCE, pwm.running_source);
        assert_eq!(PARKED_CONTROL & 0xF, pwm.parked_source.selector());
    }

    #[test]
    fn effective_frequency_is_close_to_target() {
        let config = ClockConfig::for_frequency(81_370_000).unwrap();
        let actual_hz = config.effective_millihertz() / 1000;
        assert!(actual_hz.abs_diff(81_370_000) < 81_370_000 / 4096);
    }
}
