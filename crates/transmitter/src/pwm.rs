//! PWM configuration
//!
//! Channel 1 runs as a 32-bit serializer repeating its data word: `0` is
//! silence, `0xAAAA_AAAA` toggles every clock and yields the carrier at half
//! the PWM clock. The descriptor chain switches between the two by writing
//! DAT1.
//!
//! Channel 2 is never connected to a pin. It is a mark/space channel with
//! range `width` that pulls one FIFO word every `width` clocks, i.e. once per
//! sample period. Its DREQ paces the DMA engine.

use platform::registers::pwm;
use platform::RegisterBlock;

/// DMAC threshold: request data as soon as the FIFO is not full.
pub const DREQ_THRESHOLD: u32 = 1;

/// Control word for a transmission: serializer on ch1, FIFO-fed M/S on ch2.
pub const RUN_CONTROL: u32 = pwm::CTL_CLRF
    | pwm::CTL_MODE1
    | pwm::CTL_PWEN1
    | pwm::CTL_RPTL1
    | pwm::CTL_MSEN2
    | pwm::CTL_PWEN2
    | pwm::CTL_USEF2;

/// Cannot derive pacing from the carrier and sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmError {
    /// Sample rate of zero.
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    /// Carrier of zero.
    #[error("carrier frequency must be non-zero")]
    ZeroCarrier,
    /// `2 * carrier / sample_rate` is zero or does not fit RNG2.
    #[error("pacing width {0} outside 1..=u32::MAX")]
    WidthOutOfRange(u64),
}

/// Pacing derived from the carrier and sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmTiming {
    carrier_hz: u32,
    sample_rate_hz: u32,
    width: u32,
}

impl PwmTiming {
    /// `width = 2 * carrier / sample_rate` PWM clocks per sample.
    pub fn new(carrier_hz: u32, sample_rate_hz: u32) -> Result<Self, PwmError> {
        if carrier_hz == 0 {
            return Err(PwmError::ZeroCarrier);
        }
        if sample_rate_hz == 0 {
            return Err(PwmError::ZeroSampleRate);
        }
        #[allow(clippy::arithmetic_side_effects)] // Safety: 2 * u32 fits u64; sample_rate_hz != 0
        let width = 2 * u64::from(carrier_hz) / u64::from(sample_rate_hz);
        let width = u32::try_from(width)
            .ok()
            .filter(|&w| w > 0)
            .ok_or(PwmError::WidthOutOfRange(width))?;
        Ok(Self {
            carrier_hz,
            sample_rate_hz,
            width,
        })
    }

    /// PWM clock frequency: the serializer pattern halves it.
    #[must_use]
    pub const fn clock_hz(&self) -> u64 {
        self.carrier_hz as u64 * 2
    }

    /// Carrier frequency.
    #[must_use]
    pub const fn carrier_hz(&self) -> u32 {
        self.carrier_hz
    }

    /// Sample rate.
    #[must_use]
    pub const fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// PWM clocks per sample (RNG2).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// 50 % duty word fed to the ch2 FIFO.
    #[must_use]
    pub const fn duty_word(&self) -> u32 {
        self.width / 2
    }
}

/// Drives the PWM window.
pub struct PwmConfigurator<R> {
    regs: R,
}

impl<R: RegisterBlock> PwmConfigurator<R> {
    /// Wrap the PWM window.
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Start both channels with DMA requests still off.
    pub fn initialize(&self, timing: &PwmTiming) {
        self.regs.write(pwm::RNG1, pwm::SERIALIZER_BITS);
        self.regs.write(pwm::DAT1, 0);
        self.regs.write(pwm::RNG2, timing.width());
        self.regs.write(pwm::CTL, RUN_CONTROL);
        debug!("PWM running: width={} duty={}", timing.width(), timing.duty_word());
    }

    /// Let the FIFO raise DREQ; paced descriptors start flowing.
    pub fn enable_dma_pacing(&self) {
        self.regs.write(pwm::DMAC, pwm::DMAC_ENAB | pwm::dmac_dreq(DREQ_THRESHOLD));
    }

    /// Whether DREQ is enabled.
    pub fn is_pacing(&self) -> bool {
        self.regs.read(pwm::DMAC) & pwm::DMAC_ENAB != 0
    }

    /// Clear the FIFO, disable both channels and DMA requests.
    pub fn stop(&self) {
        self.regs.write(pwm::CTL, pwm::CTL_CLRF);
        self.regs.write(pwm::DMAC, 0);
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
    fn default_carrier_width() {
        let timing = PwmTiming::new(40_685_000, 1_250).unwrap();
        assert_eq!(timing.width(), 65_096);
        assert_eq!(timing.duty_word(), 32_548);
        assert_eq!(timing.clock_hz(), 81_370_000);
    }

    #[test]
    fn degenerate_rates_are_rejected() {
        assert_eq!(PwmTiming::new(0, 1_250), Err(PwmError::ZeroCarrier));
        assert_eq!(PwmTiming::new(40_685_000, 0), Err(PwmError::ZeroSampleRate));
        assert_eq!(PwmTiming::new(1, 10), Err(PwmError::WidthOutOfRange(0)));
    }

    #[test]
    fn initialize_programs_both_channels() {
        let regs = MockRegisters::new();
        let pwm_cfg = PwmConfigurator::new(&regs);
        pwm_cfg.initialize(&PwmTiming::new(40_685_000, 1_250).unwrap());

        assert_eq!(regs.value(pwm::RNG1), 32);
        assert_eq!(regs.value(pwm::DAT1), 0);
        assert_eq!(regs.value(pwm::RNG2), 65_096);
        assert_eq!(regs.value(pwm::CTL), 0xA147);
        assert!(!pwm_cfg.is_pacing(), "DREQ stays off until the chain is armed");
    }

    #[test]
    fn pacing_and_stop() {
        let regs = MockRegisters::new();
        let pwm_cfg = PwmConfigurator::new(&regs);
        pwm_cfg.enable_dma_pacing();
        assert_eq!(regs.value(pwm::DMAC), 0x8000_0001);

        pwm_cfg.stop();
        pwm_cfg.stop();
        assert_eq!(regs.value(pwm::CTL), pwm::CTL_CLRF);
        assert_eq!(regs.value(pwm::DMAC), 0);
        assert!(!pwm_cfg.is_pacing());
    }
}
