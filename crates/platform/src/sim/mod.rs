//! Behavioural model of the BCM2835 peripherals the transmitter drives
//!
//! Not cycle-accurate. It models exactly what the transmitter relies on:
//!
//! - register windows for the clock manager, PWM, GPIO and DMA channels 0–14,
//!   with the side-effects that matter (CM password gate, PWM CLRF
//!   self-clear, GPIO set/clear → level, DMA CS reset/start/W1C);
//! - coherent shared memory at a fixed bus address;
//! - a DMA framework that binds one configurable hardware channel and keeps
//!   the submitted transfer's callback pending until an INT_EN control block
//!   completes on that channel;
//! - control-block execution: follows `next`, copies words to memory or
//!   peripheral registers, stalls on D_DREQ blocks while PWM DMA pacing is
//!   off.
//!
//! Notifiers are always called with the model unlocked, so a notifier may
//! read registers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::dma::{
    BusRegion, ControlBlock, DmaCapability, DmaCookie, DmaEngineService, DmaMemory, OutOfBounds,
    SlaveConfig, TransferNotifier,
};
use crate::gpio::GpioPin;
use crate::memory_map::{peripheral_at, Peripheral};
use crate::mmio::RegisterBlock;
use crate::registers::{cm, dma as dreg, gpio as greg, pwm as preg};

/// Tunables of the simulated SoC.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Hardware channel the framework hands out (0–14).
    pub hardware_channel: usize,
    /// `issue_pending` lets the channel fetch the first source word, so
    /// SOURCE_AD reads `source + 4`. Turn off to make discovery fail.
    pub prefetch_on_issue: bool,
    /// Execute DMA chains as soon as a channel is activated or PWM pacing is
    /// enabled, instead of waiting for [`SimulatedSoc::run_dma`].
    pub auto_drain: bool,
    /// Bus address of the shared memory.
    pub memory_bus_address: u32,
    /// Shared memory size in words.
    pub memory_words: usize,
    /// Control blocks executed per channel per drain before giving up.
    pub max_steps: usize,
    /// Fail every `request_channel`.
    pub fail_request: bool,
    /// Fail every `submit`.
    pub fail_submit: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hardware_channel: 5,
            prefetch_on_issue: true,
            auto_drain: true,
            memory_bus_address: 0xC010_0000,
            memory_words: 4808,
            max_steps: 4096,
            fail_request: false,
            fail_submit: false,
        }
    }
}

/// Who performed a register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// The CPU, through a [`SimWindow`].
    Cpu,
    /// A DMA control block.
    Dma,
}

/// One logged register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    /// Target peripheral.
    pub peripheral: Peripheral,
    /// Byte offset inside the peripheral window.
    pub offset: usize,
    /// Value written.
    pub value: u32,
    /// Writer.
    pub origin: WriteOrigin,
}

/// Why DMA execution stopped abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// CONBLK_AD points outside shared memory.
    ControlBlockOutsideMemory(u32),
    /// A source address is outside shared memory.
    SourceOutsideMemory(u32),
    /// A destination is neither shared memory nor a mapped peripheral.
    DestinationUnmapped(u32),
    /// `max_steps` control blocks without reaching the end of the chain.
    StepLimit,
}

/// What one drain of the DMA engine did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Control blocks fully executed.
    pub descriptors_executed: usize,
    /// INT_EN control blocks completed.
    pub interrupts: usize,
    /// A channel is waiting on DREQ.
    pub stalled: bool,
    /// Abnormal stop, if any.
    pub fault: Option<SimFault>,
}

/// Failures of the simulated DMA framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimDmaError {
    /// No channel available.
    #[error("no DMA channel available")]
    NoChannel,
    /// The framework refused the transfer.
    #[error("DMA submission rejected")]
    SubmitRejected,
}

struct DummyTransfer {
    channel: usize,
    source: u32,
    destination: u32,
}

type Notifier = &'static dyn TransferNotifier;

struct SocState {
    config: SimConfig,
    registers: BTreeMap<(Peripheral, usize), u32>,
    gpio_levels: u64,
    memory: Vec<u32>,
    writes: Vec<RegisterWrite>,
    slave: Option<SlaveConfig>,
    dummy: Option<DummyTransfer>,
    notifier: Option<Notifier>,
    channels_allocated: u32,
    channels_released: u32,
    submissions: u32,
    completions: usize,
}

impl SocState {
    fn new(config: SimConfig) -> Self {
        let memory = std::vec![0; config.memory_words];
        Self {
            config,
            registers: BTreeMap::new(),
            gpio_levels: 0,
            memory,
            writes: Vec::new(),
            slave: None,
            dummy: None,
            notifier: None,
            channels_allocated: 0,
            channels_released: 0,
            submissions: 0,
            completions: 0,
        }
    }

    fn stored(&self, peripheral: Peripheral, offset: usize) -> u32 {
        self.registers.get(&(peripheral, offset)).copied().unwrap_or(0)
    }

    fn store(&mut self, peripheral: Peripheral, offset: usize, value: u32) {
        self.registers.insert((peripheral, offset), value);
    }

    #[allow(clippy::cast_possible_truncation)] // levels are split into two 32-bit banks
    fn read(&self, peripheral: Peripheral, offset: usize) -> u32 {
        match (peripheral, offset) {
            (Peripheral::Gpio, greg::GPLEV0) => self.gpio_levels as u32,
            (Peripheral::Gpio, greg::GPLEV1) => (self.gpio_levels >> 32) as u32,
            _ => self.stored(peripheral, offset),
        }
    }

    /// Apply a write with its hardware side-effects. Returns `true` when the
    /// write may let DMA make progress.
    fn write(&mut self, peripheral: Peripheral, offset: usize, value: u32, origin: WriteOrigin) -> bool {
        self.writes.push(RegisterWrite {
            peripheral,
            offset,
            value,
            origin,
        });
        match peripheral {
            Peripheral::ClockManager => {
                if value & 0xFF00_0000 != cm::PASSWORD {
                    return false;
                }
                let mut value = value & 0x00FF_FFFF;
                if offset == cm::PWMCTL {
                    if value & cm::CTL_ENAB != 0 {
                        value |= cm::CTL_BUSY;
                    } else {
                        value &= !cm::CTL_BUSY;
                    }
                }
                self.store(peripheral, offset, value);
                false
            }
            Peripheral::Pwm => {
                let stored = if offset == preg::CTL {
                    value & !preg::CTL_CLRF
                } else {
                    value
                };
                self.store(peripheral, offset, stored);
                offset == preg::DMAC && value & preg::DMAC_ENAB != 0
            }
            Peripheral::Gpio => {
                match offset {
                    greg::GPSET0 => self.gpio_levels |= u64::from(value),
                    greg::GPSET1 => self.gpio_levels |= u64::from(value) << 32,
                    greg::GPCLR0 => self.gpio_levels &= !u64::from(value),
                    greg::GPCLR1 => self.gpio_levels &= !(u64::from(value) << 32),
                    _ => self.store(peripheral, offset, value),
                }
                false
            }
            Peripheral::Dma => self.write_dma(offset, value),
        }
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: offset < WINDOW_LEN_BYTES, division by a non-zero constant
    fn write_dma(&mut self, offset: usize, value: u32) -> bool {
        let channel = offset / dreg::CHANNEL_STRIDE;
        let register = offset % dreg::CHANNEL_STRIDE;
        if register != dreg::CS {
            self.store(Peripheral::Dma, offset, value);
            return false;
        }
        if value & (dreg::CS_RESET | dreg::CS_ABORT) != 0 {
            self.reset_channel(channel);
            return false;
        }
        let mut cs = self.stored(Peripheral::Dma, offset);
        cs &= !(value & (dreg::CS_END | dreg::CS_INT));
        let start = value & dreg::CS_ACTIVE != 0;
        if start {
            cs |= dreg::CS_ACTIVE;
        }
        self.store(Peripheral::Dma, offset, cs);
        start
    }

    fn channel_base(channel: usize) -> usize {
        channel.saturating_mul(dreg::CHANNEL_STRIDE)
    }

    fn channel_reg(&self, channel: usize, register: usize) -> u32 {
        self.stored(Peripheral::Dma, Self::channel_base(channel).saturating_add(register))
    }

    fn set_channel_reg(&mut self, channel: usize, register: usize, value: u32) {
        self.store(Peripheral::Dma, Self::channel_base(channel).saturating_add(register), value);
    }

    fn reset_channel(&mut self, channel: usize) {
        for register in (dreg::CS..=dreg::DEBUG).step_by(4) {
            self.set_channel_reg(channel, register, 0);
        }
        if self.dummy.as_ref().is_some_and(|d| d.channel == channel) {
            self.dummy = None;
        }
    }

    fn memory_index(&self, bus_address: u32) -> Option<usize> {
        let offset = bus_address.checked_sub(self.config.memory_bus_address)?;
        if offset % 4 != 0 {
            return None;
        }
        let index = usize::try_from(offset / 4).ok()?;
        (index < self.memory.len()).then_some(index)
    }

    fn read_bus(&self, bus_address: u32) -> Option<u32> {
        let index = self.memory_index(bus_address)?;
        self.memory.get(index).copied()
    }

    fn write_bus(&mut self, bus_address: u32, value: u32) -> Result<(), SimFault> {
        if let Some(index) = self.memory_index(bus_address) {
            if let Some(slot) = self.memory.get_mut(index) {
                *slot = value;
                return Ok(());
            }
        }
        let (peripheral, offset) =
            peripheral_at(bus_address).ok_or(SimFault::DestinationUnmapped(bus_address))?;
        self.write(peripheral, offset, value, WriteOrigin::Dma);
        Ok(())
    }

    fn read_control_block(&self, bus_address: u32) -> Option<ControlBlock> {
        let mut words = [0u32; ControlBlock::WORDS];
        let mut address = bus_address;
        for word in &mut words {
            *word = self.read_bus(address)?;
            address = address.checked_add(4)?;
        }
        Some(ControlBlock::from_words(words))
    }

    fn dreq_enabled(&self) -> bool {
        self.stored(Peripheral::Pwm, preg::DMAC) & preg::DMAC_ENAB != 0
    }

    fn raise_interrupt(&mut self, report: &mut DrainReport, fired: &mut Vec<Notifier>) {
        report.interrupts = report.interrupts.saturating_add(1);
        if let Some(notifier) = self.notifier.take() {
            self.completions = self.completions.saturating_add(1);
            fired.push(notifier);
        }
    }

    /// Run every active channel until it ends, stalls or faults.
    fn drain(&mut self, fired: &mut Vec<Notifier>) -> DrainReport {
        let mut report = DrainReport::default();

        // A framework transfer still in flight is paced by the PWM DREQ too.
        if self.dreq_enabled() {
            if let Some(dummy) = self.dummy.take() {
                self.finish_dummy(&dummy, &mut report, fired);
            }
        }

        for channel in 0..dreg::WINDOW_CHANNELS {
            let active = self.channel_reg(channel, dreg::CS) & dreg::CS_ACTIVE != 0;
            if active && self.channel_reg(channel, dreg::CONBLK_AD) != 0 {
                self.run_channel(channel, &mut report, fired);
            }
            if report.fault.is_some() {
                break;
            }
        }
        report
    }

    fn finish_dummy(&mut self, dummy: &DummyTransfer, report: &mut DrainReport, fired: &mut Vec<Notifier>) {
        let Some(word) = self.read_bus(dummy.source) else {
            report.fault = Some(SimFault::SourceOutsideMemory(dummy.source));
            return;
        };
        if let Err(fault) = self.write_bus(dummy.destination, word) {
            report.fault = Some(fault);
            return;
        }
        self.set_channel_reg(dummy.channel, dreg::SOURCE_AD, dummy.source.wrapping_add(4));
        self.set_channel_reg(dummy.channel, dreg::CS, dreg::CS_END | dreg::CS_INT);
        report.descriptors_executed = report.descriptors_executed.saturating_add(1);
        self.raise_interrupt(report, fired);
    }

    fn run_channel(&mut self, channel: usize, report: &mut DrainReport, fired: &mut Vec<Notifier>) {
        for _ in 0..self.config.max_steps {
            let address = self.channel_reg(channel, dreg::CONBLK_AD);
            if address == 0 {
                let cs = self.channel_reg(channel, dreg::CS);
                self.set_channel_reg(channel, dreg::CS, (cs & !dreg::CS_ACTIVE) | dreg::CS_END);
                return;
            }
            let Some(cb) = self.read_control_block(address) else {
                report.fault = Some(SimFault::ControlBlockOutsideMemory(address));
                self.halt_channel(channel);
                return;
            };
            self.set_channel_reg(channel, dreg::TI, cb.info);
            self.set_channel_reg(channel, dreg::SOURCE_AD, cb.source);
            self.set_channel_reg(channel, dreg::DEST_AD, cb.destination);
            self.set_channel_reg(channel, dreg::TXFR_LEN, cb.length);
            self.set_channel_reg(channel, dreg::NEXTCONBK, cb.next);

            if cb.info & dreg::TI_D_DREQ != 0 && !self.dreq_enabled() {
                report.stalled = true;
                return;
            }
            if let Err(fault) = self.execute(channel, &cb) {
                report.fault = Some(fault);
                self.halt_channel(channel);
                return;
            }
            report.descriptors_executed = report.descriptors_executed.saturating_add(1);
            if cb.info & dreg::TI_INT_EN != 0 {
                let cs = self.channel_reg(channel, dreg::CS);
                self.set_channel_reg(channel, dreg::CS, cs | dreg::CS_INT);
                self.raise_interrupt(report, fired);
            }
            self.set_channel_reg(channel, dreg::CONBLK_AD, cb.next);
        }
        report.fault = Some(SimFault::StepLimit);
    }

    fn execute(&mut self, channel: usize, cb: &ControlBlock) -> Result<(), SimFault> {
        let mut source = cb.source;
        let mut destination = cb.destination;
        for _ in 0..cb.length / 4 {
            let word = self.read_bus(source).ok_or(SimFault::SourceOutsideMemory(source))?;
            self.write_bus(destination, word)?;
            if cb.info & dreg::TI_S_INC != 0 {
                source = source.wrapping_add(4);
            }
            if cb.info & dreg::TI_D_INC != 0 {
                destination = destination.wrapping_add(4);
            }
        }
        if cb.info & dreg::TI_S_INC == 0 {
            source = source.wrapping_add(4);
        }
        self.set_channel_reg(channel, dreg::SOURCE_AD, source);
        self.set_channel_reg(channel, dreg::DEST_AD, destination);
        self.set_channel_reg(channel, dreg::TXFR_LEN, 0);
        Ok(())
    }

    fn halt_channel(&mut self, channel: usize) {
        let cs = self.channel_reg(channel, dreg::CS);
        self.set_channel_reg(channel, dreg::CS, cs & !dreg::CS_ACTIVE);
    }
}

/// Shared handle to the simulated SoC. Clones see the same state.
#[derive(Clone)]
pub struct SimulatedSoc(Arc<Mutex<SocState>>);

impl Default for SimulatedSoc {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimulatedSoc {
    /// Power on a SoC with `config`.
    pub fn new(config: SimConfig) -> Self {
        Self(Arc::new(Mutex::new(SocState::new(config))))
    }

    fn state(&self) -> MutexGuard<'_, SocState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The configuration this SoC was created with.
    pub fn config(&self) -> SimConfig {
        self.state().config.clone()
    }

    /// Register window of `peripheral`.
    pub fn window(&self, peripheral: Peripheral) -> SimWindow {
        SimWindow {
            soc: self.clone(),
            peripheral,
        }
    }

    /// Handle to the shared coherent memory.
    pub fn memory(&self) -> SimMemory {
        SimMemory { soc: self.clone() }
    }

    /// The DMA framework.
    pub fn dma_engine(&self) -> SimDmaEngine {
        SimDmaEngine { soc: self.clone() }
    }

    /// Current register value, as the CPU would read it.
    pub fn register(&self, peripheral: Peripheral, offset: usize) -> u32 {
        self.state().read(peripheral, offset)
    }

    /// Force a register value without side-effects or logging.
    pub fn set_register(&self, peripheral: Peripheral, offset: usize, value: u32) {
        self.state().store(peripheral, offset, value);
    }

    /// Every register write so far, oldest first.
    pub fn writes(&self) -> Vec<RegisterWrite> {
        self.state().writes.clone()
    }

    /// Values written to one register, oldest first.
    pub fn writes_to(&self, peripheral: Peripheral, offset: usize) -> Vec<u32> {
        self.state()
            .writes
            .iter()
            .filter(|w| w.peripheral == peripheral && w.offset == offset)
            .map(|w| w.value)
            .collect()
    }

    /// Forget logged writes.
    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    /// Shared memory word at `index`.
    pub fn memory_word(&self, index: usize) -> Option<u32> {
        self.state().memory.get(index).copied()
    }

    /// Output level of `pin`.
    pub fn gpio_level(&self, pin: GpioPin) -> bool {
        self.state().gpio_levels & (1u64 << pin.number()) != 0
    }

    /// Completion callbacks delivered so far.
    pub fn completions(&self) -> usize {
        self.state().completions
    }

    /// Channels handed back to the framework so far.
    pub fn channels_released(&self) -> u32 {
        self.state().channels_released
    }

    /// Let every active channel run until it ends, stalls or faults.
    pub fn run_dma(&self) -> DrainReport {
        let mut fired = Vec::new();
        let report = self.state().drain(&mut fired);
        notify(&fired);
        report
    }

    fn cpu_write(&self, peripheral: Peripheral, offset: usize, value: u32) {
        let mut fired = Vec::new();
        {
            let mut state = self.state();
            let progress = state.write(peripheral, offset, value, WriteOrigin::Cpu);
            if progress && state.config.auto_drain {
                state.drain(&mut fired);
            }
        }
        notify(&fired);
    }
}

fn notify(fired: &[Notifier]) {
    for notifier in fired {
        notifier.transfer_complete();
    }
}

/// A peripheral register window of a [`SimulatedSoc`].
#[derive(Clone)]
pub struct SimWindow {
    soc: SimulatedSoc,
    peripheral: Peripheral,
}

impl RegisterBlock for SimWindow {
    fn read(&self, offset: usize) -> u32 {
        self.soc.register(self.peripheral, offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.soc.cpu_write(self.peripheral, offset, value);
    }
}

/// The shared coherent memory of a [`SimulatedSoc`].
#[derive(Clone)]
pub struct SimMemory {
    soc: SimulatedSoc,
}

impl DmaMemory for SimMemory {
    fn bus_address(&self) -> u32 {
        self.soc.state().config.memory_bus_address
    }

    fn len_words(&self) -> usize {
        self.soc.state().memory.len()
    }

    fn read_word(&self, index: usize) -> Option<u32> {
        self.soc.memory_word(index)
    }

    fn write_word(&mut self, index: usize, value: u32) -> Result<(), OutOfBounds> {
        let mut state = self.soc.state();
        let len_words = state.memory.len();
        let slot = state
            .memory
            .get_mut(index)
            .ok_or(OutOfBounds { index, len_words })?;
        *slot = value;
        Ok(())
    }
}

/// Framework channel handle of the simulated DMA engine.
#[derive(Debug)]
pub struct SimChannel {
    id: u32,
    hardware: usize,
}

/// The DMA framework of a [`SimulatedSoc`].
#[derive(Clone)]
pub struct SimDmaEngine {
    soc: SimulatedSoc,
}

impl DmaEngineService for SimDmaEngine {
    type Channel = SimChannel;
    type Error = SimDmaError;

    fn request_channel(&mut self, _capability: DmaCapability) -> Result<SimChannel, SimDmaError> {
        let mut state = self.soc.state();
        if state.config.fail_request {
            return Err(SimDmaError::NoChannel);
        }
        let id = state.channels_allocated;
        state.channels_allocated = id.wrapping_add(1);
        Ok(SimChannel {
            id,
            hardware: state.config.hardware_channel,
        })
    }

    fn channel_id(&self, channel: &SimChannel) -> u32 {
        channel.id
    }

    fn terminate_all(&mut self, channel: &mut SimChannel) -> Result<(), SimDmaError> {
        let mut state = self.soc.state();
        state.notifier = None;
        state.reset_channel(channel.hardware);
        state.dummy = None;
        Ok(())
    }

    fn configure(&mut self, _channel: &mut SimChannel, config: &SlaveConfig) -> Result<(), SimDmaError> {
        self.soc.state().slave = Some(*config);
        Ok(())
    }

    fn submit(
        &mut self,
        channel: &mut SimChannel,
        region: BusRegion,
        notifier: &'static dyn TransferNotifier,
    ) -> Result<DmaCookie, SimDmaError> {
        let mut state = self.soc.state();
        if state.config.fail_submit {
            return Err(SimDmaError::SubmitRejected);
        }
        let destination = state
            .slave
            .map_or(Peripheral::Gpio.bus_address(greg::GPCLR0), |s| s.destination);
        state.dummy = Some(DummyTransfer {
            channel: channel.hardware,
            source: region.address,
            destination,
        });
        state.notifier = Some(notifier);
        state.submissions = state.submissions.wrapping_add(1);
        Ok(DmaCookie(state.submissions))
    }

    fn issue_pending(&mut self, channel: &mut SimChannel) {
        let mut state = self.soc.state();
        let Some((source, destination)) = state
            .dummy
            .as_ref()
            .filter(|d| d.channel == channel.hardware)
            .map(|d| (d.source, d.destination))
        else {
            return;
        };
        let fetched = if state.config.prefetch_on_issue {
            source.wrapping_add(4)
        } else {
            source
        };
        state.set_channel_reg(channel.hardware, dreg::CS, dreg::CS_ACTIVE);
        state.set_channel_reg(channel.hardware, dreg::SOURCE_AD, fetched);
        state.set_channel_reg(channel.hardware, dreg::DEST_AD, destination);
    }

    fn release_channel(&mut self, _channel: SimChannel) {
        let mut state = self.soc.state();
        state.channels_released = state.channels_released.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl TransferNotifier for Counter {
        fn transfer_complete(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn write_cb(mem: &mut SimMemory, index: usize, cb: ControlBlock) {
        for (i, word) in cb.to_words().into_iter().enumerate() {
            mem.write_word(index + i, word).unwrap();
        }
    }

    #[test]
    fn clock_manager_ignores_writes_without_password() {
        let soc = SimulatedSoc::default();
        let cm = soc.window(Peripheral::ClockManager);

        cm.write(cm::PWMCTL, cm::CTL_ENAB);
        assert_eq!(cm.read(cm::PWMCTL), 0);

        cm.write(cm::PWMCTL, cm::PASSWORD | cm::CTL_ENAB);
        assert_eq!(cm.read(cm::PWMCTL), cm::CTL_ENAB | cm::CTL_BUSY);
    }

    #[test]
    fn gpio_set_and_clear_drive_levels() {
        let soc = SimulatedSoc::default();
        let gpio = soc.window(Peripheral::Gpio);
        let led = GpioPin::new(19).unwrap();

        gpio.write(greg::GPSET0, 1 << 19);
        assert!(soc.gpio_level(led));
        assert_eq!(gpio.read(greg::GPLEV0), 1 << 19);
        gpio.write(greg::GPCLR0, 1 << 19);
        assert!(!soc.gpio_level(led));
    }

    #[test]
    fn issue_pending_advances_source_of_bound_channel() {
        static COUNTER: Counter = Counter(AtomicUsize::new(0));
        let soc = SimulatedSoc::default();
        let mut engine = soc.dma_engine();
        let mut channel = engine.request_channel(DmaCapability::Slave).unwrap();

        let region = BusRegion {
            address: 0xC010_0000,
            len_bytes: 4,
        };
        engine.submit(&mut channel, region, &COUNTER).unwrap();
        engine.issue_pending(&mut channel);

        assert_eq!(soc.register(Peripheral::Dma, 0x500 + dreg::SOURCE_AD), 0xC010_0004);
        assert_eq!(soc.completions(), 0);
    }

    #[test]
    fn chain_stalls_on_dreq_until_pacing_is_enabled() {
        static COUNTER: Counter = Counter(AtomicUsize::new(0));
        let soc = SimulatedSoc::new(SimConfig {
            hardware_channel: 2,
            ..SimConfig::default()
        });
        let mut engine = soc.dma_engine();
        let mut channel = engine.request_channel(DmaCapability::Slave).unwrap();
        let region = BusRegion {
            address: 0xC010_0000,
            len_bytes: 4,
        };
        engine.submit(&mut channel, region, &COUNTER).unwrap();
        engine.issue_pending(&mut channel);

        let mut mem = soc.memory();
        // data word at index 16, two control blocks at 0 and 8
        mem.write_word(16, 0xAAAA_AAAA).unwrap();
        write_cb(&mut mem, 0, ControlBlock {
            info: dreg::TI_S_INC,
            source: 0xC010_0040,
            destination: Peripheral::Pwm.bus_address(preg::DAT1),
            length: 4,
            next: 0xC010_0020,
            ..ControlBlock::default()
        });
        write_cb(&mut mem, 8, ControlBlock {
            info: dreg::TI_D_DREQ | dreg::ti_per_map(5) | dreg::TI_INT_EN,
            source: 0xC010_0040,
            destination: Peripheral::Pwm.bus_address(preg::FIF1),
            length: 4,
            next: 0,
            ..ControlBlock::default()
        });

        let dma = soc.window(Peripheral::Dma);
        dma.write(0x200 + dreg::CS, dreg::CS_RESET | dreg::CS_ABORT);
        dma.write(0x200 + dreg::CONBLK_AD, 0xC010_0000);
        dma.write(0x200 + dreg::CS, dreg::CS_ACTIVE);

        assert_eq!(soc.register(Peripheral::Pwm, preg::DAT1), 0xAAAA_AAAA);
        assert_eq!(COUNTER.0.load(Ordering::SeqCst), 0, "stalled on the paced block");

        soc.window(Peripheral::Pwm).write(preg::DMAC, preg::DMAC_ENAB | 1);
        assert_eq!(COUNTER.0.load(Ordering::SeqCst), 1);
        assert_eq!(soc.writes_to(Peripheral::Pwm, preg::FIF1), [0xAAAA_AAAA]);
        assert_eq!(dma.read(0x200 + dreg::CS) & dreg::CS_ACTIVE, 0);
        assert_eq!(soc.run_dma(), DrainReport::default(), "nothing left to run");
    }

    #[test]
    fn reset_clears_channel_registers() {
        let soc = SimulatedSoc::default();
        let dma = soc.window(Peripheral::Dma);
        dma.write(0x100 + dreg::SOURCE_AD, 1234);
        dma.write(0x100 + dreg::CS, dreg::CS_RESET);
        assert_eq!(dma.read(0x100 + dreg::SOURCE_AD), 0);
    }

    #[test]
    fn chain_outside_memory_faults() {
        let soc = SimulatedSoc::new(SimConfig {
            auto_drain: false,
            ..SimConfig::default()
        });
        let dma = soc.window(Peripheral::Dma);
        dma.write(dreg::CONBLK_AD, 0x1000);
        dma.write(dreg::CS, dreg::CS_ACTIVE);

        let report = soc.run_dma();
        assert_eq!(report.fault, Some(SimFault::ControlBlockOutsideMemory(0x1000)));
    }

    #[test]
    fn request_failure_is_injectable() {
        let soc = SimulatedSoc::new(SimConfig {
            fail_request: true,
            ..SimConfig::default()
        });
        assert_eq!(
            soc.dma_engine().request_channel(DmaCapability::Slave).unwrap_err(),
            SimDmaError::NoChannel
        );
    }
}
