//! DMA channel discovery
//!
//! The DMA framework allocates a channel and routes its interrupt, but never
//! says which of the 15 hardware register sets it picked. We need those
//! registers to start our own chain, so we ask the hardware instead:
//!
//! 1. submit a 4-byte probe transfer whose source is the start of our shared
//!    buffer, and issue it;
//! 2. the engine fetches the first source word immediately, so the bound
//!    channel's SOURCE_AD reads `probe + 4` while the write waits for a
//!    DREQ that never comes (PWM pacing is still off);
//! 3. scan SOURCE_AD of channels 0..15 for that value.
//!
//! This depends on the prefetch having happened by the time we scan. It has
//! on every board tried, but nothing guarantees it; a miss is reported as
//! [`DiscoveryError::ChannelNotFound`] rather than guessed around.
//!
//! The probe also carries the completion notifier: the framework's IRQ
//! handler completes the probe when our terminal block raises the channel
//! interrupt, which is how the completion signal fires.

use platform::registers::dma as regs;
use platform::{
    BusRegion, BusWidth, DmaEngineService, Peripheral, RegisterBlock, SlaveConfig, SubWindow,
    TransferDirection, TransferNotifier,
};

/// Size of the probe transfer.
pub const PROBE_BYTES: u32 = 4;

/// Discovery failure. The device is left unbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryError {
    /// No channel's SOURCE_AD matched the probe.
    #[error("no DMA channel is executing the probe transfer")]
    ChannelNotFound,
    /// The framework refused to terminate, configure or queue the probe.
    #[error("DMA framework rejected the probe transfer")]
    Submission,
}

/// Register set of one hardware channel, as a byte offset in the DMA window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelRegisterBase(usize);

impl ChannelRegisterBase {
    /// Register set of hardware channel `channel`.
    #[must_use]
    pub const fn for_channel(channel: usize) -> Self {
        Self(channel.saturating_mul(regs::CHANNEL_STRIDE))
    }

    /// Hardware channel number.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: CHANNEL_STRIDE is non-zero
    pub const fn channel(self) -> usize {
        self.0 / regs::CHANNEL_STRIDE
    }

    /// Byte offset in the DMA window.
    #[must_use]
    pub const fn offset(self) -> usize {
        self.0
    }

    /// View of this channel's registers inside `dma`.
    pub fn bind<R: RegisterBlock>(self, dma: &R) -> BoundChannel<'_, R> {
        BoundChannel {
            regs: SubWindow::new(dma, self.0),
        }
    }
}

/// Slave profile of the probe: 32-bit single-beat writes to GPCLR0, paced by
/// `dreq`, memory to device.
#[must_use]
pub fn slave_profile(dreq: u8) -> SlaveConfig {
    SlaveConfig {
        direction: TransferDirection::MemToDev,
        destination: Peripheral::Gpio.bus_address(platform::registers::gpio::GPCLR0),
        destination_width: BusWidth::Bytes4,
        max_burst: 1,
        slave_id: dreq,
        device_flow_control: false,
    }
}

/// Terminate whatever is queued, then submit and issue the probe.
pub fn submit_probe<D: DmaEngineService>(
    dma: &mut D,
    channel: &mut D::Channel,
    profile: &SlaveConfig,
    probe: BusRegion,
    notifier: &'static dyn TransferNotifier,
) -> Result<(), DiscoveryError> {
    dma.terminate_all(channel).map_err(|_| DiscoveryError::Submission)?;
    dma.configure(channel, profile).map_err(|_| DiscoveryError::Submission)?;
    dma.submit(channel, probe, notifier)
        .map_err(|_| DiscoveryError::Submission)?;
    dma.issue_pending(channel);
    Ok(())
}

/// Find the channel whose SOURCE_AD has moved past the probe word.
pub fn scan<R: RegisterBlock>(dma: &R, probe_address: u32, channels: usize) -> Option<ChannelRegisterBase> {
    let expected = probe_address.wrapping_add(PROBE_BYTES);
    (0..channels.min(regs::WINDOW_CHANNELS))
        .map(ChannelRegisterBase::for_channel)
        .find(|base| verify(dma, *base, probe_address))
        .inspect(|base| {
            trace!("SOURCE_AD {} found on channel {}", expected, base.channel());
        })
}

/// Whether `base` is executing the probe.
pub fn verify<R: RegisterBlock>(dma: &R, base: ChannelRegisterBase, probe_address: u32) -> bool {
    base.bind(dma).source_address() == probe_address.wrapping_add(PROBE_BYTES)
}

/// Scan the first `channels` register sets for the probe, logging the
/// outcome.
pub fn locate<R: RegisterBlock>(
    dma_regs: &R,
    probe_address: u32,
    channels: usize,
) -> Result<ChannelRegisterBase, DiscoveryError> {
    match scan(dma_regs, probe_address, channels) {
        Some(base) => {
            info!("detected DMA channel {}", base.channel());
            Ok(base)
        }
        None => {
            error!("probe transfer not found on any of {} DMA channels", channels);
            Err(DiscoveryError::ChannelNotFound)
        }
    }
}

/// Submit the probe and scan the first `channels` register sets for the
/// channel executing it.
pub fn discover<D: DmaEngineService, R: RegisterBlock>(
    dma: &mut D,
    channel: &mut D::Channel,
    dma_regs: &R,
    probe: BusRegion,
    dreq: u8,
    channels: usize,
    notifier: &'static dyn TransferNotifier,
) -> Result<ChannelRegisterBase, DiscoveryError> {
    submit_probe(dma, channel, &slave_profile(dreq), probe, notifier)?;
    locate(dma_regs, probe.address, channels)
}

/// Registers of the discovered hardware channel.
pub struct BoundChannel<'a, R> {
    regs: SubWindow<'a, R>,
}

impl<R: RegisterBlock> BoundChannel<'_, R> {
    /// Abort whatever runs and clear pending status.
    pub fn reset(&self) {
        self.regs.write(regs::CS, regs::CS_RESET | regs::CS_ABORT);
        self.regs.write(regs::CS, regs::CS_INT | regs::CS_END);
    }

    /// Start executing the chain whose first block is at `head`.
    pub fn start(&self, head: u32) {
        self.regs.write(regs::CONBLK_AD, head);
        self.regs.write(regs::CS, regs::CS_ACTIVE);
    }

    /// Whether the channel is executing.
    pub fn is_active(&self) -> bool {
        self.regs.read(regs::CS) & regs::CS_ACTIVE != 0
    }

    /// Current SOURCE_AD.
    pub fn source_address(&self) -> u32 {
        self.regs.read(regs::SOURCE_AD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::mocks::{MockDmaEngine, MockRegisters};
    use platform::DmaCapability;

    struct Ignore;
    impl TransferNotifier for Ignore {
        fn transfer_complete(&self) {}
    }
    static IGNORE: Ignore = Ignore;

    const PROBE: u32 = 0xC010_0000;

    #[test]
    fn scan_finds_channel_with_advanced_source() {
        let dma = MockRegisters::new();
        dma.preset(0x300 + regs::SOURCE_AD, PROBE);
        dma.preset(0x700 + regs::SOURCE_AD, PROBE + 4);

        let found = scan(&dma, PROBE, 15).unwrap();
        assert_eq!(found.channel(), 7);
        assert_eq!(found.offset(), 0x700);
    }

    #[test]
    fn scan_reports_nothing_when_no_channel_matches() {
        let dma = MockRegisters::new();
        dma.preset(0x200 + regs::SOURCE_AD, PROBE);
        assert_eq!(scan(&dma, PROBE, 15), None);
    }

    #[test]
    fn scan_stays_inside_the_window() {
        let dma = MockRegisters::new();
        dma.preset(0xF00 + regs::SOURCE_AD, PROBE + 4);
        assert_eq!(scan(&dma, PROBE, 16), None, "channel 15 is not in the main window");
    }

    #[test]
    fn discover_honours_the_scan_bound() {
        let mut engine = MockDmaEngine::new();
        let mut channel = engine.request_channel(DmaCapability::Slave).unwrap();
        let dma = MockRegisters::new();
        dma.preset(0x600 + regs::SOURCE_AD, PROBE + 4);
        let probe = BusRegion {
            address: PROBE,
            len_bytes: PROBE_BYTES,
        };

        assert_eq!(
            discover(&mut engine, &mut channel, &dma, probe, 5, 6, &IGNORE),
            Err(DiscoveryError::ChannelNotFound)
        );
        let base = discover(&mut engine, &mut channel, &dma, probe, 5, 7, &IGNORE).unwrap();
        assert_eq!(base.channel(), 6);
    }

    #[test]
    fn probe_profile_targets_gpio_clear() {
        let profile = slave_profile(5);
        assert_eq!(profile.destination, 0x7E20_0028);
        assert_eq!(profile.destination_width.bytes(), 4);
        assert_eq!(profile.max_burst, 1);
        assert_eq!(profile.slave_id, 5);
        assert_eq!(profile.direction, TransferDirection::MemToDev);
    }

    #[test]
    fn discover_terminates_then_submits_probe() {
        let mut engine = MockDmaEngine::new();
        let mut channel = engine.request_channel(DmaCapability::Slave).unwrap();
        let dma = MockRegisters::new();
        dma.preset(0x400 + regs::SOURCE_AD, PROBE + 4);

        let probe = BusRegion {
            address: PROBE,
            len_bytes: PROBE_BYTES,
        };
        let base = discover(&mut engine, &mut channel, &dma, probe, 5, 15, &IGNORE).unwrap();

        assert_eq!(base.channel(), 4);
        assert_eq!(engine.terminations(), 1);
        assert_eq!(engine.submitted(), [probe]);
        assert_eq!(engine.issued(), 1);
        assert_eq!(engine.configured(), Some(slave_profile(5)));
    }

    #[test]
    fn rejected_probe_is_a_submission_error() {
        let mut engine = MockDmaEngine::new();
        engine.fail_submit = true;
        let mut channel = engine.request_channel(DmaCapability::Slave).unwrap();
        let probe = BusRegion {
            address: PROBE,
            len_bytes: PROBE_BYTES,
        };
        assert_eq!(
            discover(&mut engine, &mut channel, &MockRegisters::new(), probe, 5, 15, &IGNORE),
            Err(DiscoveryError::Submission)
        );
        assert_eq!(engine.issued(), 0);
    }

    #[test]
    fn bound_channel_reset_and_start_sequence() {
        let dma = MockRegisters::new();
        let bound = ChannelRegisterBase::for_channel(2).bind(&dma);
        bound.reset();
        bound.start(PROBE);
        assert_eq!(
            dma.writes(),
            [
                (0x200, regs::CS_RESET | regs::CS_ABORT),
                (0x200, regs::CS_INT | regs::CS_END),
                (0x204, PROBE),
                (0x200, regs::CS_ACTIVE),
            ]
        );
        assert!(bound.is_active());
    }
}
