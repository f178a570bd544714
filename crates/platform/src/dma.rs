//! DMA abstraction layer
//!
//! Two halves:
//!
//! - the **hardware** side: [`ControlBlock`], the 32-byte descriptor the DMA
//!   engine fetches and executes, and [`DmaMemory`], the coherent memory the
//!   CPU builds descriptors in;
//! - the **framework** side: [`DmaEngineService`], the channel allocator that
//!   owns interrupts and completion callbacks. It never tells us which
//!   hardware channel it picked; see the transmitter's discovery module.

use crate::memory_map::CONTROL_BLOCK_ALIGN;

/// One DMA control block, exactly as the engine reads it from memory.
///
/// All addresses are **bus** addresses (see [`crate::memory_map`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C, align(32))]
pub struct ControlBlock {
    /// Transfer information (TI register image).
    pub info: u32,
    /// Source bus address.
    pub source: u32,
    /// Destination bus address.
    pub destination: u32,
    /// Transfer length in bytes.
    pub length: u32,
    /// 2D stride (unused in 1D mode).
    pub stride: u32,
    /// Bus address of the next control block, or 0 to stop.
    pub next: u32,
    /// Reserved, must be zero.
    pub reserved: [u32; 2],
}

impl ControlBlock {
    /// Size of a control block in 32-bit words.
    pub const WORDS: usize = 8;

    /// Size of a control block in bytes.
    #[allow(clippy::cast_possible_truncation)] // 8 * 4 fits in u32
    pub const BYTES: u32 = (Self::WORDS * 4) as u32;

    /// Serialise into the word order the engine expects.
    #[must_use]
    pub const fn to_words(&self) -> [u32; Self::WORDS] {
        [
            self.info,
            self.source,
            self.destination,
            self.length,
            self.stride,
            self.next,
            self.reserved[0],
            self.reserved[1],
        ]
    }

    /// Rebuild from the engine's word order.
    #[must_use]
    pub const fn from_words(words: [u32; Self::WORDS]) -> Self {
        Self {
            info: words[0],
            source: words[1],
            destination: words[2],
            length: words[3],
            stride: words[4],
            next: words[5],
            reserved: [words[6], words[7]],
        }
    }
}

/// Returned when a word index lies outside a [`DmaMemory`] region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("word {index} outside DMA memory of {len_words} words")]
pub struct OutOfBounds {
    /// Offending word index.
    pub index: usize,
    /// Region length in words.
    pub len_words: usize,
}

/// Memory shared between the CPU and the DMA engine.
///
/// Allocated once (coherent, never resized). Indexing is in 32-bit words from
/// the start of the region; [`DmaMemory::bus_address`] is where the engine
/// sees word 0.
pub trait DmaMemory {
    /// Bus address of word 0.
    fn bus_address(&self) -> u32;

    /// Region length in 32-bit words.
    fn len_words(&self) -> usize;

    /// Read word `index`, or `None` past the end.
    fn read_word(&self, index: usize) -> Option<u32>;

    /// Write word `index`.
    fn write_word(&mut self, index: usize, value: u32) -> Result<(), OutOfBounds>;

    /// Bus address of word `index`, or `None` if it lies outside the region
    /// or the 32-bit bus.
    fn word_bus_address(&self, index: usize) -> Option<u32> {
        if index >= self.len_words() {
            return None;
        }
        let byte_offset = u32::try_from(index.checked_mul(4)?).ok()?;
        self.bus_address().checked_add(byte_offset)
    }
}

/// A real coherent allocation obtained from the platform.
pub struct CoherentRegion {
    cpu: core::ptr::NonNull<u32>,
    bus_address: u32,
    len_words: usize,
}

impl CoherentRegion {
    /// Wrap a coherent allocation.
    ///
    /// Returns `None` if `cpu` is null or `bus_address` is not aligned for
    /// control blocks.
    ///
    /// # Safety
    ///
    /// `cpu` must point to `len_words` words of uncached memory, visible to
    /// the DMA engine at `bus_address`, valid for the lifetime of the value.
    pub unsafe fn new(cpu: *mut u32, bus_address: u32, len_words: usize) -> Option<Self> {
        let cpu = core::ptr::NonNull::new(cpu)?;
        if bus_address % CONTROL_BLOCK_ALIGN != 0 {
            return None;
        }
        Some(Self {
            cpu,
            bus_address,
            len_words,
        })
    }
}

// SAFETY: the region is plain coherent memory; the descriptor chain's
// typestate decides who may write it.
unsafe impl Send for CoherentRegion {}

impl DmaMemory for CoherentRegion {
    fn bus_address(&self) -> u32 {
        self.bus_address
    }

    fn len_words(&self) -> usize {
        self.len_words
    }

    fn read_word(&self, index: usize) -> Option<u32> {
        if index >= self.len_words {
            return None;
        }
        // SAFETY: index < len_words, inside the allocation promised by `new`.
        Some(unsafe { self.cpu.as_ptr().add(index).read_volatile() })
    }

    fn write_word(&mut self, index: usize, value: u32) -> Result<(), OutOfBounds> {
        if index >= self.len_words {
            return Err(OutOfBounds {
                index,
                len_words: self.len_words,
            });
        }
        // SAFETY: index < len_words, inside the allocation promised by `new`.
        unsafe { self.cpu.as_ptr().add(index).write_volatile(value) };
        Ok(())
    }
}

// ─── Framework side ──────────────────────────────────────────────────────────

/// Receives the DMA framework's completion callback.
///
/// Runs in interrupt context: implementations must not allocate or block.
pub trait TransferNotifier: Sync {
    /// The transfer this notifier was submitted with has completed.
    fn transfer_complete(&self);
}

/// What kind of channel to ask the framework for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaCapability {
    /// Peripheral-paced slave transfers.
    Slave,
    /// Memory-to-memory only.
    Memcpy,
}

/// Transfer direction of a slave configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferDirection {
    /// Memory to device.
    MemToDev,
    /// Device to memory.
    DevToMem,
}

/// Bus access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusWidth {
    /// 1 byte.
    Byte1,
    /// 2 bytes.
    Bytes2,
    /// 4 bytes.
    Bytes4,
}

impl BusWidth {
    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte1 => 1,
            Self::Bytes2 => 2,
            Self::Bytes4 => 4,
        }
    }
}

/// Slave transfer profile handed to [`DmaEngineService::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveConfig {
    /// Transfer direction.
    pub direction: TransferDirection,
    /// Device-side bus address.
    pub destination: u32,
    /// Device-side access width.
    pub destination_width: BusWidth,
    /// Maximum burst length.
    pub max_burst: u32,
    /// Peripheral DREQ line.
    pub slave_id: u8,
    /// Whether the device controls flow.
    pub device_flow_control: bool,
}

/// A contiguous range in bus address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusRegion {
    /// Bus address of the first byte.
    pub address: u32,
    /// Length in bytes.
    pub len_bytes: u32,
}

/// Token returned by [`DmaEngineService::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaCookie(pub u32);

/// The platform DMA framework.
///
/// Owns channel allocation, interrupt routing and completion callbacks. The
/// hardware channel number behind a [`Self::Channel`] is not exposed.
pub trait DmaEngineService {
    /// Framework channel handle.
    type Channel;

    /// Error type
    type Error: core::fmt::Debug;

    /// Allocate a channel with `capability`.
    fn request_channel(&mut self, capability: DmaCapability) -> Result<Self::Channel, Self::Error>;

    /// Framework-side identifier of `channel`, for logs.
    fn channel_id(&self, channel: &Self::Channel) -> u32;

    /// Abort everything queued on `channel` and drop pending callbacks.
    fn terminate_all(&mut self, channel: &mut Self::Channel) -> Result<(), Self::Error>;

    /// Apply a slave profile to `channel`.
    fn configure(&mut self, channel: &mut Self::Channel, config: &SlaveConfig) -> Result<(), Self::Error>;

    /// Queue a single-segment transfer of `region`; `notifier` fires when the
    /// framework sees the channel's interrupt.
    fn submit(
        &mut self,
        channel: &mut Self::Channel,
        region: BusRegion,
        notifier: &'static dyn TransferNotifier,
    ) -> Result<DmaCookie, Self::Error>;

    /// Start queued transfers.
    fn issue_pending(&mut self, channel: &mut Self::Channel);

    /// Give `channel` back to the framework.
    fn release_channel(&mut self, channel: Self::Channel);
}
