//! Transfer controller
//!
//! Owns every resource of one transmitter and walks it through one
//! transmission at a time:
//!
//! ```text
//! Idle ─► ClockConfigured ─► ChannelBound ─► ChainBuilt ─► Armed ─► Running ─┬─► Completed
//!   ▲                                                                        └─► Stopped
//!   └──────────────── next start() from Completed / Stopped ◄─────────────────────┘
//! ```
//!
//! `start` runs the left half synchronously and returns once the DMA engine
//! owns the chain. Completion arrives through the [`CompletionSignal`];
//! `wait_complete` (or `try_complete`) performs the teardown: PWM pin back
//! to plain output, clock parked, PWM stopped, DMA channel reset.
//!
//! Any error during `start` after the clock was written halts the peripherals
//! and leaves the device `Stopped`. Configuration errors are caught before
//! the first register write and change nothing.

use embassy_time::{Duration, Instant};
use platform::{
    BusRegion, ControlBlock, DmaCapability, DmaEngineService, DmaMemory, FunctionSelect, Gpio,
    GpioPin, RegisterBlock,
};

use crate::chain::{required_words, ArmError, Armed, Building, ChainFull, DescriptorChain};
use crate::clock::{ClockConfig, ClockProgrammer};
use crate::completion::{BusyGate, CompletionEvent, CompletionSignal};
use crate::config::TransmitterConfig;
use crate::discovery::{self, ChannelRegisterBase, PROBE_BYTES};
use crate::encoder::{self, EncoderTargets};
use crate::error::{ResourceError, TransmitterError};
use crate::pwm::{PwmConfigurator, PwmTiming};
use crate::samples::SampleWords;

/// The four register windows the transmitter drives.
pub struct Peripherals<R> {
    /// Clock manager.
    pub clock: R,
    /// PWM controller.
    pub pwm: R,
    /// GPIO controller.
    pub gpio: R,
    /// DMA controller (all channels).
    pub dma: R,
}

/// Where the transmitter is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitterState {
    /// Nothing programmed yet.
    Idle,
    /// PWM clock and PWM running, DREQ off.
    ClockConfigured,
    /// Probe found; hardware channel known.
    ChannelBound,
    /// Descriptor chain filled.
    ChainBuilt,
    /// Channel reset, chain handed over.
    Armed,
    /// DMA executing the chain.
    Running,
    /// Last transmission finished.
    Completed,
    /// Last transmission aborted.
    Stopped,
}

impl TransmitterState {
    /// Whether the DMA engine owns the chain.
    #[must_use]
    pub const fn in_flight(self) -> bool {
        matches!(self, Self::Armed | Self::Running)
    }

    /// Whether clock and PWM are programmed for a transmission.
    #[must_use]
    pub const fn peripherals_configured(self) -> bool {
        matches!(
            self,
            Self::ClockConfigured | Self::ChannelBound | Self::ChainBuilt | Self::Armed | Self::Running
        )
    }

    /// Whether the chain holds the current transmission.
    #[must_use]
    pub const fn chain_built(self) -> bool {
        matches!(self, Self::ChainBuilt | Self::Armed | Self::Running)
    }
}

/// Snapshot of what is currently set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    /// PWM clock programmed.
    pub clock_configured: bool,
    /// PWM channels programmed.
    pub pwm_configured: bool,
    /// Hardware channel found by discovery.
    pub dma_channel_bound: Option<usize>,
    /// Chain holds the current transmission.
    pub chain_built: bool,
    /// DMA engine owns the chain.
    pub transfer_in_flight: bool,
}

/// Summary of a completed transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmissionReport {
    /// Symbols sent.
    pub symbols: usize,
    /// Control blocks executed, terminal included.
    pub descriptors: usize,
    /// Hardware DMA channel used.
    pub channel: usize,
    /// PWM clock settings.
    pub clock: ClockConfig,
    /// PWM pacing.
    pub timing: PwmTiming,
    /// From DMA start to the completion interrupt.
    pub elapsed: Duration,
}

struct ActiveTransmission {
    symbols: usize,
    descriptors: usize,
    channel: usize,
    clock: ClockConfig,
    timing: PwmTiming,
    started_at: Instant,
}

enum ChainSlot<M> {
    Building(DescriptorChain<M, Building>),
    Armed(DescriptorChain<M, Armed>),
}

/// One OOK transmitter: clock, PWM, GPIO, a DMA channel and its chain.
pub struct Transmitter<R, D: DmaEngineService, M> {
    config: TransmitterConfig,
    clock: ClockProgrammer<R>,
    pwm: PwmConfigurator<R>,
    gpio: Gpio<R>,
    dma_regs: R,
    dma: D,
    channel: Option<D::Channel>,
    chain: Option<ChainSlot<M>>,
    bound: Option<ChannelRegisterBase>,
    completion: &'static CompletionSignal,
    gate: BusyGate,
    state: TransmitterState,
    output_pin: GpioPin,
    busy_led: GpioPin,
    active: Option<ActiveTransmission>,
    last_report: Option<TransmissionReport>,
}

impl<R, D, M> Transmitter<R, D, M>
where
    R: RegisterBlock,
    D: DmaEngineService,
    M: DmaMemory,
{
    /// Acquire the shared memory and a DMA channel, and mux the pins.
    ///
    /// Nothing is transmitted until [`Transmitter::start`].
    pub fn new(
        config: TransmitterConfig,
        peripherals: Peripherals<R>,
        mut dma: D,
        memory: M,
        completion: &'static CompletionSignal,
    ) -> Result<Self, TransmitterError> {
        config.validate()?;
        let output_pin = config.output_pin()?;
        let busy_led = config.busy_led()?;

        let chain = DescriptorChain::new(memory)?;
        let channel = dma.request_channel(DmaCapability::Slave).map_err(|_| {
            error!("DMA framework has no slave channel");
            ResourceError::ChannelUnavailable
        })?;
        info!("allocated DMA channel, framework id {}", dma.channel_id(&channel));

        let gpio = Gpio::new(peripherals.gpio);
        gpio.set_function(output_pin, FunctionSelect::Alt5);
        gpio.set_function(busy_led, FunctionSelect::Output);

        Ok(Self {
            config,
            clock: ClockProgrammer::new(peripherals.clock),
            pwm: PwmConfigurator::new(peripherals.pwm),
            gpio,
            dma_regs: peripherals.dma,
            dma,
            channel: Some(channel),
            chain: Some(ChainSlot::Building(chain)),
            bound: None,
            completion,
            gate: BusyGate::new(),
            state: TransmitterState::Idle,
            output_pin,
            busy_led,
            active: None,
            last_report: None,
        })
    }

    // ── Transmission ────────────────────────────────────────────────────────

    /// Program the peripherals, build the chain for `sequence` and start the
    /// DMA engine. Returns as soon as the hardware runs on its own.
    pub fn start(&mut self, sequence: &str) -> Result<(), TransmitterError> {
        if self.state.in_flight() || !self.gate.try_acquire() {
            return Err(TransmitterError::Busy);
        }
        match self.launch(sequence) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("transmission not started: {:?}", e);
                self.abort_launch();
                self.gate.release();
                Err(e)
            }
        }
    }

    /// Wait for the completion interrupt, then tear down.
    pub async fn wait_complete(&mut self) -> Result<TransmissionReport, TransmitterError> {
        if self.state != TransmitterState::Running {
            return Err(TransmitterError::InvalidState(self.state));
        }
        let event = self.completion.wait().await;
        self.finish(event)
    }

    /// Non-blocking [`Transmitter::wait_complete`]: `Ok(None)` while the
    /// DMA engine is still running.
    pub fn try_complete(&mut self) -> Result<Option<TransmissionReport>, TransmitterError> {
        if self.state != TransmitterState::Running {
            return Err(TransmitterError::InvalidState(self.state));
        }
        match self.completion.try_take() {
            Some(event) => self.finish(event).map(Some),
            None => Ok(None),
        }
    }

    /// Transmit `sequence` and wait for completion.
    pub async fn send(&mut self, sequence: &str) -> Result<TransmissionReport, TransmitterError> {
        self.start(sequence)?;
        self.wait_complete().await
    }

    /// [`Transmitter::send`] for callers without an executor.
    pub fn send_blocking(&mut self, sequence: &str) -> Result<TransmissionReport, TransmitterError> {
        embassy_futures::block_on(self.send(sequence))
    }

    /// Abort whatever is running and halt the peripherals. Safe to call in
    /// any state, any number of times.
    pub fn stop(&mut self) {
        self.halt();
        self.disarm();
        self.completion.reset();
        if self.state.in_flight() {
            info!("transmission stopped");
            self.state = TransmitterState::Stopped;
        }
        self.active = None;
        self.gate.release();
    }

    /// Stop, then hand the DMA channel back to the framework.
    pub fn release(mut self) -> D {
        self.stop();
        if let Some(mut channel) = self.channel.take() {
            if self.dma.terminate_all(&mut channel).is_err() {
                warn!("terminate_all failed while releasing the channel");
            }
            self.dma.release_channel(channel);
        }
        info!("transmitter released");
        self.dma
    }

    // ── Configuration ───────────────────────────────────────────────────────

    /// Change the carrier. Rejected while a transmission is in flight.
    pub fn set_carrier_frequency(&mut self, carrier_hz: i32) -> Result<(), TransmitterError> {
        self.reconfigure(TransmitterConfig {
            carrier_hz,
            ..self.config
        })
    }

    /// Change the sample rate. Rejected while a transmission is in flight.
    pub fn set_sample_rate(&mut self, sample_rate_hz: i32) -> Result<(), TransmitterError> {
        self.reconfigure(TransmitterConfig {
            sample_rate_hz,
            ..self.config
        })
    }

    fn reconfigure(&mut self, candidate: TransmitterConfig) -> Result<(), TransmitterError> {
        if self.gate.is_busy() {
            return Err(TransmitterError::Busy);
        }
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    /// Current configuration.
    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> TransmitterState {
        self.state
    }

    /// What is currently set up.
    pub fn device_state(&self) -> DeviceState {
        DeviceState {
            clock_configured: self.state.peripherals_configured(),
            pwm_configured: self.state.peripherals_configured(),
            dma_channel_bound: self.bound.map(ChannelRegisterBase::channel),
            chain_built: self.state.chain_built(),
            transfer_in_flight: self.state.in_flight(),
        }
    }

    /// Whether a transmission holds the busy gate.
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Report of the last completed transmission.
    pub fn last_report(&self) -> Option<TransmissionReport> {
        self.last_report
    }

    /// Blocks in the chain.
    pub fn descriptor_count(&self) -> usize {
        match &self.chain {
            Some(ChainSlot::Building(c)) => c.len(),
            Some(ChainSlot::Armed(c)) => c.len(),
            None => 0,
        }
    }

    /// Read back block `index` of the chain.
    pub fn descriptor(&self, index: usize) -> Option<ControlBlock> {
        match &self.chain {
            Some(ChainSlot::Building(c)) => c.descriptor(index),
            Some(ChainSlot::Armed(c)) => c.descriptor(index),
            None => None,
        }
    }

    /// Hardware channel found by the last discovery.
    pub fn bound_channel(&self) -> Option<usize> {
        self.bound.map(ChannelRegisterBase::channel)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn launch(&mut self, sequence: &str) -> Result<(), TransmitterError> {
        if self.channel.is_none() {
            return Err(ResourceError::Unusable.into());
        }
        // Everything that can fail without hardware fails here.
        let timing = self.config.timing()?;
        let clock_target = self.config.clock_target()?;

        let clock = self.clock.configure(clock_target)?;
        self.state = TransmitterState::ClockConfigured;
        self.gpio.set_function(self.output_pin, FunctionSelect::Alt5);
        self.gpio.set(self.busy_led);
        self.pwm.stop();
        self.pwm.initialize(&timing);

        self.completion.reset();
        let base = self.bind()?;
        self.state = TransmitterState::ChannelBound;

        let descriptors = self.build_chain(sequence, &timing)?;
        self.state = TransmitterState::ChainBuilt;

        let head = self.arm(base)?;
        self.state = TransmitterState::Armed;

        let symbols = encoder::symbols(sequence).count();
        info!(
            "transmitting {} symbols ({} blocks) on DMA channel {}",
            symbols,
            descriptors,
            base.channel()
        );
        base.bind(&self.dma_regs).start(head);
        self.active = Some(ActiveTransmission {
            symbols,
            descriptors,
            channel: base.channel(),
            clock,
            timing,
            started_at: Instant::now(),
        });
        self.state = TransmitterState::Running;
        self.pwm.enable_dma_pacing();
        Ok(())
    }

    /// Submit the probe and find (or confirm) the hardware channel.
    fn bind(&mut self) -> Result<ChannelRegisterBase, TransmitterError> {
        let probe = BusRegion {
            address: self.chain_bus_address(),
            len_bytes: PROBE_BYTES,
        };
        let channel = self
            .channel
            .as_mut()
            .ok_or(TransmitterError::Resource(ResourceError::Unusable))?;

        let Some(bound) = self.bound else {
            let base = discovery::discover(
                &mut self.dma,
                channel,
                &self.dma_regs,
                probe,
                self.config.dreq,
                self.config.scan_channels,
                self.completion,
            )?;
            self.bound = Some(base);
            return Ok(base);
        };

        discovery::submit_probe(
            &mut self.dma,
            channel,
            &discovery::slave_profile(self.config.dreq),
            probe,
            self.completion,
        )?;
        if discovery::verify(&self.dma_regs, bound, probe.address) {
            return Ok(bound);
        }
        warn!("DMA channel {} no longer runs the probe, rescanning", bound.channel());
        self.bound = None;
        let base = discovery::locate(&self.dma_regs, probe.address, self.config.scan_channels)?;
        self.bound = Some(base);
        Ok(base)
    }

    fn build_chain(&mut self, sequence: &str, timing: &PwmTiming) -> Result<usize, TransmitterError> {
        let Some(ChainSlot::Building(chain)) = self.chain.as_mut() else {
            return Err(TransmitterError::InvalidState(self.state));
        };
        chain.reset();
        chain
            .write_samples(&SampleWords::new(self.busy_led, timing))
            .map_err(|_| ResourceError::MemoryTooSmall {
                needed: required_words(chain.capacity()),
                available: chain.memory().len_words(),
            })?;
        let samples = chain.sample_addresses();
        let targets = EncoderTargets::new(self.busy_led, self.config.dreq);
        let descriptors = encoder::build(chain, sequence, &samples, &targets)?;
        debug!("chain holds {} blocks", descriptors);
        Ok(descriptors)
    }

    /// Reset the hardware channel and hand the chain over. Returns the head.
    fn arm(&mut self, base: ChannelRegisterBase) -> Result<u32, TransmitterError> {
        let chain = match self.chain.take() {
            Some(ChainSlot::Building(chain)) => chain,
            other => {
                self.chain = other;
                return Err(TransmitterError::InvalidState(self.state));
            }
        };
        base.bind(&self.dma_regs).reset();
        match chain.arm() {
            Ok(armed) => {
                let head = armed.head_address();
                self.chain = Some(ChainSlot::Armed(armed));
                head.ok_or(TransmitterError::InvalidState(self.state))
            }
            Err(rejected) => {
                let capacity = rejected.chain.capacity();
                self.chain = Some(ChainSlot::Building(rejected.chain));
                Err(match rejected.reason {
                    ArmError::Overflowed => ChainFull { capacity }.into(),
                    ArmError::Empty => TransmitterError::InvalidState(self.state),
                })
            }
        }
    }

    fn finish(&mut self, event: CompletionEvent) -> Result<TransmissionReport, TransmitterError> {
        self.halt();
        self.disarm();
        let active = self
            .active
            .take()
            .ok_or(TransmitterError::InvalidState(self.state))?;
        let elapsed = event.at.saturating_duration_since(active.started_at);
        self.state = TransmitterState::Completed;
        self.gate.release();
        info!("all done: {} ms", elapsed.as_millis());

        let report = TransmissionReport {
            symbols: active.symbols,
            descriptors: active.descriptors,
            channel: active.channel,
            clock: active.clock,
            timing: active.timing,
            elapsed,
        };
        self.last_report = Some(report);
        Ok(report)
    }

    /// Undo whatever a launch set up after the clock was written.
    fn abort_launch(&mut self) {
        if self.state.peripherals_configured() {
            self.halt();
            self.disarm();
            if let Some(ChainSlot::Building(chain)) = self.chain.as_mut() {
                chain.reset();
            }
            self.state = TransmitterState::Stopped;
        }
        self.active = None;
    }

    /// Pin back to plain output, clock parked, PWM stopped, DMA channel
    /// reset. Each step only touches its own peripheral.
    fn halt(&mut self) {
        self.gpio.set_function(self.output_pin, FunctionSelect::Output);
        self.gpio.clear(self.busy_led);
        self.clock.stop();
        self.pwm.stop();
        if let Some(base) = self.bound {
            base.bind(&self.dma_regs).reset();
        }
    }

    fn disarm(&mut self) {
        self.chain = match self.chain.take() {
            Some(ChainSlot::Armed(chain)) => Some(ChainSlot::Building(chain.disarm())),
            other => other,
        };
    }

    fn chain_bus_address(&self) -> u32 {
        match &self.chain {
            Some(ChainSlot::Building(c)) => c.bus_address(),
            Some(ChainSlot::Armed(c)) => c.bus_address(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockError;
    use crate::discovery::DiscoveryError;
    use crate::error::ConfigError;
    use platform::mocks::{MockDmaEngine, MockMemory, MockRegisters};
    use platform::registers::{cm, dma as dreg, gpio as greg, pwm};

    const BUS: u32 = 0xC010_0000;

    struct Rig {
        clock: MockRegisters,
        pwm: MockRegisters,
        gpio: MockRegisters,
        dma: MockRegisters,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                clock: MockRegisters::new(),
                pwm: MockRegisters::new(),
                gpio: MockRegisters::new(),
                dma: MockRegisters::new(),
            }
        }

        fn peripherals(&self) -> Peripherals<&MockRegisters> {
            Peripherals {
                clock: &self.clock,
                pwm: &self.pwm,
                gpio: &self.gpio,
                dma: &self.dma,
            }
        }

        /// Make hardware channel `channel` look like it runs the probe.
        fn probe_on(&self, channel: usize) {
            self.dma.preset(channel * 0x100 + dreg::SOURCE_AD, BUS + 4);
        }
    }

    fn leak_signal() -> &'static CompletionSignal {
        Box::leak(Box::new(CompletionSignal::new()))
    }

    fn transmitter<'a>(
        rig: &'a Rig,
        engine: MockDmaEngine,
        done: &'static CompletionSignal,
    ) -> Transmitter<&'a MockRegisters, MockDmaEngine, MockMemory> {
        Transmitter::new(
            TransmitterConfig::default(),
            rig.peripherals(),
            engine,
            MockMemory::new(BUS, required_words(crate::MAX_DESCRIPTORS)),
            done,
        )
        .unwrap()
    }

    #[test]
    fn new_muxes_pwm_pin_and_led() {
        let rig = Rig::new();
        let _tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());
        // GPIO 18 → ALT5 (0b010) and GPIO 19 → output (0b001) in GPFSEL1
        assert_eq!(rig.gpio.value(0x04), (0b010 << 24) | (0b001 << 27));
    }

    #[test]
    fn missing_channel_is_a_resource_error() {
        let rig = Rig::new();
        let mut engine = MockDmaEngine::new();
        engine.fail_request = true;
        let err = Transmitter::new(
            TransmitterConfig::default(),
            rig.peripherals(),
            engine,
            MockMemory::new(BUS, required_words(crate::MAX_DESCRIPTORS)),
            leak_signal(),
        )
        .err()
        .unwrap();
        assert_eq!(err, TransmitterError::Resource(ResourceError::ChannelUnavailable));
        assert!(err.is_fatal());
    }

    #[test]
    fn start_arms_and_runs_the_chain() {
        let rig = Rig::new();
        rig.probe_on(3);
        let mut tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());

        tx.start("101").unwrap();

        assert_eq!(tx.state(), TransmitterState::Running);
        assert_eq!(tx.descriptor_count(), 7);
        assert_eq!(tx.bound_channel(), Some(3));
        assert_eq!(rig.dma.value(0x300 + dreg::CONBLK_AD), BUS);
        assert_eq!(rig.dma.writes_to(0x300 + dreg::CS).last(), Some(&dreg::CS_ACTIVE));
        assert_eq!(rig.pwm.value(pwm::DMAC), 0x8000_0001);
        assert_eq!(rig.pwm.value(pwm::RNG2), 65_096);
        assert_eq!(rig.gpio.writes_to(greg::GPSET0), [1 << 19]);
        let state = tx.device_state();
        assert!(state.transfer_in_flight && state.chain_built);
    }

    #[test]
    fn second_start_while_running_is_busy() {
        let rig = Rig::new();
        rig.probe_on(0);
        let mut tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());
        tx.start("1").unwrap();
        assert_eq!(tx.start("1"), Err(TransmitterError::Busy));
        assert_eq!(tx.set_sample_rate(100), Err(TransmitterError::Busy));
    }

    #[tokio::test]
    async fn completion_tears_down_and_reports() {
        let rig = Rig::new();
        rig.probe_on(6);
        let done = leak_signal();
        let mut tx = transmitter(&rig, MockDmaEngine::new(), done);

        tx.start("10").unwrap();
        // the framework's IRQ handler
        platform::TransferNotifier::transfer_complete(done);
        let report = tx.wait_complete().await.unwrap();

        assert_eq!(report.symbols, 2);
        assert_eq!(report.descriptors, 5);
        assert_eq!(report.channel, 6);
        assert_eq!(tx.state(), TransmitterState::Completed);
        assert!(!tx.is_busy());
        assert_eq!(rig.clock.value(cm::PWMCTL), 0x5A00_0006);
        assert_eq!(rig.pwm.value(pwm::DMAC), 0);
        assert_eq!(
            rig.dma.writes_to(0x600 + dreg::CS).last(),
            Some(&(dreg::CS_INT | dreg::CS_END))
        );
    }

    #[test]
    fn discovery_failure_stops_and_unbinds() {
        let rig = Rig::new();
        let mut tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());

        assert_eq!(
            tx.start("1"),
            Err(TransmitterError::Discovery(DiscoveryError::ChannelNotFound))
        );
        assert_eq!(tx.state(), TransmitterState::Stopped);
        assert_eq!(tx.bound_channel(), None);
        assert!(!tx.is_busy());
        assert_eq!(rig.clock.value(cm::PWMCTL) & cm::CTL_ENAB, 0);
    }

    #[test]
    fn oversized_sequence_is_chain_full_and_nothing_is_armed() {
        let rig = Rig::new();
        rig.probe_on(1);
        let mut tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());
        let long = "1".repeat(300);

        assert!(matches!(tx.start(&long), Err(TransmitterError::ChainFull(_))));
        assert_eq!(tx.state(), TransmitterState::Stopped);
        assert_eq!(tx.descriptor_count(), 0);
        assert!(rig.dma.writes_to(0x100 + dreg::CONBLK_AD).is_empty());
    }

    #[test]
    fn configuration_error_touches_no_register() {
        let rig = Rig::new();
        let mut tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());
        assert_eq!(
            tx.set_carrier_frequency(400_000_000),
            Err(TransmitterError::Configuration(ConfigError::Clock(
                ClockError::OutOfRange(800_000_000)
            )))
        );
        assert_eq!(tx.set_sample_rate(-3), Err(ConfigError::NonPositiveSampleRate(-3).into()));
        assert!(rig.clock.writes().is_empty());
        assert_eq!(tx.state(), TransmitterState::Idle);
    }

    #[test]
    fn stop_is_idempotent() {
        let rig = Rig::new();
        rig.probe_on(2);
        let mut tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());
        tx.start("11").unwrap();

        tx.stop();
        assert_eq!(tx.state(), TransmitterState::Stopped);
        tx.stop();
        assert_eq!(tx.state(), TransmitterState::Stopped);
        assert!(!tx.is_busy());
        assert_eq!(rig.clock.value(cm::PWMCTL) & cm::CTL_ENAB, 0);
        assert_eq!(tx.try_complete(), Err(TransmitterError::InvalidState(TransmitterState::Stopped)));
    }

    #[test]
    fn moved_channel_is_rescanned() {
        let rig = Rig::new();
        rig.probe_on(2);
        let done = leak_signal();
        let mut tx = transmitter(&rig, MockDmaEngine::new(), done);
        tx.start("1").unwrap();
        tx.stop();

        // The reset on stop cleared nothing in the mock; move the probe.
        rig.dma.preset(0x200 + dreg::SOURCE_AD, 0);
        rig.probe_on(9);
        tx.start("1").unwrap();
        assert_eq!(tx.bound_channel(), Some(9));
    }

    #[test]
    fn discovery_only_scans_the_configured_channels() {
        let rig = Rig::new();
        rig.probe_on(6);
        let config = TransmitterConfig {
            scan_channels: 6,
            ..TransmitterConfig::default()
        };
        let mut tx = Transmitter::new(
            config,
            rig.peripherals(),
            MockDmaEngine::new(),
            MockMemory::new(BUS, required_words(crate::MAX_DESCRIPTORS)),
            leak_signal(),
        )
        .unwrap();

        assert_eq!(
            tx.start("1"),
            Err(TransmitterError::Discovery(DiscoveryError::ChannelNotFound))
        );
        assert_eq!(tx.bound_channel(), None);
    }

    #[test]
    fn release_returns_the_channel() {
        let rig = Rig::new();
        let tx = transmitter(&rig, MockDmaEngine::new(), leak_signal());
        let engine = tx.release();
        assert_eq!(engine.released(), [0]);
    }
}
