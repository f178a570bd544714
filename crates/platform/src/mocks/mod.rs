//! Mock implementations for testing
//!
//! These mocks allow testing the transmitter core without real hardware: a
//! register window that records every write, plain-`Vec` DMA memory and a DMA
//! engine service whose failures can be injected.

use core::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::vec;
use std::vec::Vec;

use crate::dma::{
    BusRegion, DmaCapability, DmaCookie, DmaEngineService, DmaMemory, OutOfBounds, SlaveConfig,
    TransferNotifier,
};
use crate::mmio::RegisterBlock;

/// Mock register window
///
/// Unwritten registers read as zero unless preset. Every write is logged in
/// order.
#[derive(Debug, Default)]
pub struct MockRegisters {
    values: RefCell<BTreeMap<usize, u32>>,
    log: RefCell<Vec<(usize, u32)>>,
}

impl MockRegisters {
    /// Create an all-zero window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register without logging a write.
    pub fn preset(&self, offset: usize, value: u32) {
        self.values.borrow_mut().insert(offset, value);
    }

    /// Current register value.
    pub fn value(&self, offset: usize) -> u32 {
        self.values.borrow().get(&offset).copied().unwrap_or(0)
    }

    /// All writes so far, oldest first.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.log.borrow().clone()
    }

    /// Values written to one register, oldest first.
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.log
            .borrow()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Forget logged writes, keeping register values.
    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl RegisterBlock for MockRegisters {
    fn read(&self, offset: usize) -> u32 {
        self.value(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.values.borrow_mut().insert(offset, value);
        self.log.borrow_mut().push((offset, value));
    }
}

/// Mock coherent DMA memory backed by a `Vec`.
#[derive(Debug, Clone)]
pub struct MockMemory {
    bus_address: u32,
    words: Vec<u32>,
}

impl MockMemory {
    /// `len_words` zeroed words visible at `bus_address`.
    pub fn new(bus_address: u32, len_words: usize) -> Self {
        Self {
            bus_address,
            words: vec![0; len_words],
        }
    }

    /// Raw view of the backing words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

impl DmaMemory for MockMemory {
    fn bus_address(&self) -> u32 {
        self.bus_address
    }

    fn len_words(&self) -> usize {
        self.words.len()
    }

    fn read_word(&self, index: usize) -> Option<u32> {
        self.words.get(index).copied()
    }

    fn write_word(&mut self, index: usize, value: u32) -> Result<(), OutOfBounds> {
        let len_words = self.words.len();
        let slot = self
            .words
            .get_mut(index)
            .ok_or(OutOfBounds { index, len_words })?;
        *slot = value;
        Ok(())
    }
}

/// Failure injected into [`MockDmaEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockDmaError {
    /// No channel available.
    NoChannel,
    /// Slave configuration rejected.
    ConfigRejected,
    /// Descriptor preparation failed.
    SubmitFailed,
}

/// Channel handle handed out by [`MockDmaEngine`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockChannel {
    /// Framework id.
    pub id: u32,
}

/// Mock DMA engine service
///
/// Records what it was asked to do. Completion is delivered by calling
/// [`MockDmaEngine::fire`].
#[derive(Default)]
pub struct MockDmaEngine {
    /// Fail `request_channel`.
    pub fail_request: bool,
    /// Fail `configure`.
    pub fail_configure: bool,
    /// Fail `submit`.
    pub fail_submit: bool,
    next_id: u32,
    configured: Option<SlaveConfig>,
    submitted: Vec<BusRegion>,
    notifier: Option<&'static dyn TransferNotifier>,
    terminations: Cell<usize>,
    issued: usize,
    released: Vec<u32>,
}

impl MockDmaEngine {
    /// An engine that grants every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last slave profile applied.
    pub fn configured(&self) -> Option<SlaveConfig> {
        self.configured
    }

    /// Regions submitted so far.
    pub fn submitted(&self) -> &[BusRegion] {
        &self.submitted
    }

    /// Number of `terminate_all` calls.
    pub fn terminations(&self) -> usize {
        self.terminations.get()
    }

    /// Number of `issue_pending` calls.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Ids of released channels.
    pub fn released(&self) -> &[u32] {
        &self.released
    }

    /// Deliver the pending completion callback, if any. Returns whether one
    /// fired.
    pub fn fire(&mut self) -> bool {
        match self.notifier.take() {
            Some(notifier) => {
                notifier.transfer_complete();
                true
            }
            None => false,
        }
    }
}

impl DmaEngineService for MockDmaEngine {
    type Channel = MockChannel;
    type Error = MockDmaError;

    fn request_channel(&mut self, _capability: DmaCapability) -> Result<MockChannel, MockDmaError> {
        if self.fail_request {
            return Err(MockDmaError::NoChannel);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(MockChannel { id })
    }

    fn channel_id(&self, channel: &MockChannel) -> u32 {
        channel.id
    }

    fn terminate_all(&mut self, _channel: &mut MockChannel) -> Result<(), MockDmaError> {
        self.terminations.set(self.terminations.get().wrapping_add(1));
        self.notifier = None;
        Ok(())
    }

    fn configure(&mut self, _channel: &mut MockChannel, config: &SlaveConfig) -> Result<(), MockDmaError> {
        if self.fail_configure {
            return Err(MockDmaError::ConfigRejected);
        }
        self.configured = Some(*config);
        Ok(())
    }

    fn submit(
        &mut self,
        _channel: &mut MockChannel,
        region: BusRegion,
        notifier: &'static dyn TransferNotifier,
    ) -> Result<DmaCookie, MockDmaError> {
        if self.fail_submit {
            return Err(MockDmaError::SubmitFailed);
        }
        self.submitted.push(region);
        self.notifier = Some(notifier);
        let cookie = u32::try_from(self.submitted.len()).unwrap_or(u32::MAX);
        Ok(DmaCookie(cookie))
    }

    fn issue_pending(&mut self, _channel: &mut MockChannel) {
        self.issued = self.issued.wrapping_add(1);
    }

    fn release_channel(&mut self, channel: MockChannel) {
        self.released.push(channel.id);
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

    #[test]
    fn mock_registers_log_writes_in_order() {
        let regs = MockRegisters::new();
        regs.write(0x10, 32);
        regs.write(0x14, 0);
        regs.modify(0x10, |v| v + 1);

        assert_eq!(regs.value(0x10), 33);
        assert_eq!(regs.writes(), [(0x10, 32), (0x14, 0), (0x10, 33)]);
        assert_eq!(regs.writes_to(0x10), [32, 33]);
    }

    #[test]
    fn mock_memory_is_bounds_checked() {
        let mut mem = MockMemory::new(0xC000_0000, 4);
        assert!(mem.write_word(3, 7).is_ok());
        assert!(mem.write_word(4, 7).is_err());
        assert_eq!(mem.read_word(3), Some(7));
        assert_eq!(mem.word_bus_address(3), Some(0xC000_000C));
    }

    #[test]
    fn mock_engine_fires_latest_notifier_once() {
        static COUNTER: Counter = Counter(AtomicUsize::new(0));

        let mut engine = MockDmaEngine::new();
        let mut channel = engine.request_channel(DmaCapability::Slave).unwrap();
        let region = BusRegion {
            address: 0xC000_0000,
            len_bytes: 4,
        };
        engine.submit(&mut channel, region, &COUNTER).unwrap();
        engine.issue_pending(&mut channel);

        assert!(engine.fire());
        assert!(!engine.fire(), "callback fires once");
        assert_eq!(COUNTER.0.load(Ordering::SeqCst), 1);
        assert_eq!(engine.submitted(), [region]);
    }

    #[test]
    fn mock_engine_injected_failures() {
        let mut engine = MockDmaEngine {
            fail_request: true,
            ..MockDmaEngine::default()
        };
        assert_eq!(
            engine.request_channel(DmaCapability::Slave),
            Err(MockDmaError::NoChannel)
        );
    }
}
