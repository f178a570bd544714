//! DMA descriptor chain
//!
//! An arena of fixed 32-byte control-block slots in coherent memory, followed
//! by the [sample words](crate::samples). Slots are addressed by index; the
//! `next` field of slot *i* holds the bus address of slot *i + 1* and the last
//! appended slot ends the chain with 0.
//!
//! ## Ownership (typestate)
//!
//! ```text
//! DescriptorChain<M, Building> --arm()--> DescriptorChain<M, Armed>
//!          ^                                        |
//!          +---------------- disarm() --------------+
//! ```
//!
//! Only `Building` has write methods. Once armed the DMA engine owns the
//! memory logically; the CPU can inspect it but the type system stops it
//! from appending, resetting or rewriting the samples.
//!
//! ## Capacity
//!
//! The fill index never exceeds the capacity. The first append past it
//! returns [`ChainFull`] and latches: every later append fails too and the
//! chain refuses to arm until [`DescriptorChain::reset`].

use core::marker::PhantomData;

use platform::dma::OutOfBounds;
use platform::memory_map::CONTROL_BLOCK_ALIGN;
use platform::registers::dma as ti;
use platform::{ControlBlock, DmaMemory};

use crate::error::ResourceError;
use crate::samples::{SampleAddresses, SampleWords, SAMPLE_WORDS};

/// Maximum number of control blocks in a chain.
pub const MAX_DESCRIPTORS: usize = 600;

/// Transfer information every appended block starts with: wait for write
/// response, increment source, single-beat bursts, no wide bursts.
pub const BASE_INFO: u32 = ti::TI_WAIT_RESP | ti::TI_S_INC | ti::ti_burst(1) | ti::TI_NO_WIDE_BURSTS;

/// Index of the `info` word inside a control block.
const INFO_WORD: usize = 0;
/// Index of the `next` word inside a control block.
const NEXT_WORD: usize = 5;

/// Words of shared memory needed for `capacity` blocks plus the samples.
#[must_use]
pub const fn required_words(capacity: usize) -> usize {
    capacity.saturating_mul(ControlBlock::WORDS).saturating_add(SAMPLE_WORDS)
}

/// Chain is being filled by the CPU.
#[derive(Debug)]
pub struct Building;

/// Chain has been handed to the DMA engine.
#[derive(Debug)]
pub struct Armed;

/// No room for another control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("descriptor chain full ({capacity} control blocks)")]
pub struct ChainFull {
    /// Chain capacity.
    pub capacity: usize,
}

/// Why a chain cannot be armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmError {
    /// Nothing to execute.
    #[error("chain is empty")]
    Empty,
    /// An append overflowed since the last reset.
    #[error("chain overflowed since the last reset")]
    Overflowed,
}

/// A chain that refused to arm, handed back unchanged.
#[derive(Debug)]
pub struct ArmRejected<M> {
    /// The chain, still building.
    pub chain: DescriptorChain<M, Building>,
    /// Why it was rejected.
    pub reason: ArmError,
}

/// Control-block arena in coherent memory.
#[derive(Debug)]
pub struct DescriptorChain<M, S = Building> {
    memory: M,
    capacity: usize,
    len: usize,
    overflowed: bool,
    _state: PhantomData<S>,
}

impl<M: DmaMemory, S> DescriptorChain<M, S> {
    /// Number of appended blocks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether an append overflowed since the last reset.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Bus address of slot 0, also the start of the shared buffer.
    pub fn bus_address(&self) -> u32 {
        self.memory.bus_address()
    }

    /// Bus address of the first block, if any was appended.
    pub fn head_address(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            self.slot_address(0)
        }
    }

    /// Bus address of slot `index`.
    pub fn slot_address(&self, index: usize) -> Option<u32> {
        if index >= self.capacity {
            return None;
        }
        self.memory.word_bus_address(index.checked_mul(ControlBlock::WORDS)?)
    }

    /// Read back block `index` (only appended blocks).
    pub fn descriptor(&self, index: usize) -> Option<ControlBlock> {
        if index >= self.len {
            return None;
        }
        let base = index.checked_mul(ControlBlock::WORDS)?;
        let mut words = [0u32; ControlBlock::WORDS];
        for (offset, word) in words.iter_mut().enumerate() {
            *word = self.memory.read_word(base.checked_add(offset)?)?;
        }
        Some(ControlBlock::from_words(words))
    }

    /// Bus addresses of the sample words.
    pub fn sample_addresses(&self) -> SampleAddresses {
        let base = self
            .memory
            .word_bus_address(self.samples_index())
            .unwrap_or_default();
        SampleAddresses::starting_at(base)
    }

    /// Follow `next` pointers from the head, the way the engine does.
    pub fn walk(&self) -> ChainWalk<'_, M, S> {
        ChainWalk {
            chain: self,
            current: self.head_address().unwrap_or(0),
            remaining: self.capacity,
        }
    }

    /// Borrow the shared memory.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    fn samples_index(&self) -> usize {
        self.capacity.saturating_mul(ControlBlock::WORDS)
    }

    fn index_of(&self, bus_address: u32) -> Option<usize> {
        let offset = bus_address.checked_sub(self.bus_address())?;
        if offset % ControlBlock::BYTES != 0 {
            return None;
        }
        let index = usize::try_from(offset / ControlBlock::BYTES).ok()?;
        (index < self.len).then_some(index)
    }

    fn retype<T>(self) -> DescriptorChain<M, T> {
        DescriptorChain {
            memory: self.memory,
            capacity: self.capacity,
            len: self.len,
            overflowed: self.overflowed,
            _state: PhantomData,
        }
    }
}

impl<M: DmaMemory> DescriptorChain<M, Building> {
    /// Chain of [`MAX_DESCRIPTORS`] blocks over `memory`.
    pub fn new(memory: M) -> Result<Self, ResourceError> {
        Self::with_capacity(memory, MAX_DESCRIPTORS)
    }

    /// Chain of `capacity` blocks over `memory`.
    ///
    /// `memory` must start on a 32-byte bus boundary and hold
    /// [`required_words`]`(capacity)` words.
    pub fn with_capacity(memory: M, capacity: usize) -> Result<Self, ResourceError> {
        let bus = memory.bus_address();
        if bus % CONTROL_BLOCK_ALIGN != 0 {
            return Err(ResourceError::MemoryMisaligned(bus));
        }
        let needed = required_words(capacity);
        let available = memory.len_words();
        if available < needed {
            return Err(ResourceError::MemoryTooSmall { needed, available });
        }
        Ok(Self {
            memory,
            capacity,
            len: 0,
            overflowed: false,
            _state: PhantomData,
        })
    }

    /// Append one block copying `length` bytes from `source` to
    /// `destination` with [`BASE_INFO`], and link it after the previous one.
    pub fn append(
        &mut self,
        source: u32,
        destination: u32,
        length: u32,
    ) -> Result<DescriptorHandle<'_, M>, ChainFull> {
        let full = ChainFull {
            capacity: self.capacity,
        };
        if self.overflowed || self.len >= self.capacity {
            self.overflowed = true;
            warn!("descriptor chain full at {} blocks", self.capacity);
            return Err(full);
        }
        let index = self.len;
        let address = self.slot_address(index).ok_or(full)?;
        let block = ControlBlock {
            info: BASE_INFO,
            source,
            destination,
            length,
            stride: 0,
            next: 0,
            reserved: [0, 0],
        };
        self.write_block(index, &block).map_err(|_| full)?;
        if let Some(previous) = index.checked_sub(1) {
            self.write_field(previous, NEXT_WORD, address).map_err(|_| full)?;
        }
        self.len = index.saturating_add(1);
        Ok(DescriptorHandle { chain: self, index })
    }

    /// Make sure `additional` more blocks fit; otherwise latch the overflow
    /// without writing anything.
    pub fn reserve(&mut self, additional: usize) -> Result<(), ChainFull> {
        let fits = self
            .len
            .checked_add(additional)
            .is_some_and(|total| total <= self.capacity);
        if self.overflowed || !fits {
            self.overflowed = true;
            warn!(
                "{} more blocks do not fit ({} of {} used)",
                additional, self.len, self.capacity
            );
            return Err(ChainFull {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Empty the chain. Slot memory is not cleared.
    pub fn reset(&mut self) {
        self.len = 0;
        self.overflowed = false;
    }

    /// Rewrite the sample words.
    pub fn write_samples(&mut self, samples: &SampleWords) -> Result<(), OutOfBounds> {
        let base = self.samples_index();
        for (offset, word) in samples.to_words().into_iter().enumerate() {
            self.memory.write_word(base.saturating_add(offset), word)?;
        }
        Ok(())
    }

    /// Hand the chain to the DMA engine.
    pub fn arm(self) -> Result<DescriptorChain<M, Armed>, ArmRejected<M>> {
        let reason = if self.overflowed {
            ArmError::Overflowed
        } else if self.is_empty() {
            ArmError::Empty
        } else {
            return Ok(self.retype());
        };
        Err(ArmRejected {
            chain: self,
            reason,
        })
    }

    /// Give the shared memory back.
    pub fn into_memory(self) -> M {
        self.memory
    }

    fn write_block(&mut self, index: usize, block: &ControlBlock) -> Result<(), OutOfBounds> {
        for (offset, word) in block.to_words().into_iter().enumerate() {
            self.write_field(index, offset, word)?;
        }
        Ok(())
    }

    fn write_field(&mut self, index: usize, field: usize, value: u32) -> Result<(), OutOfBounds> {
        let word = index
            .saturating_mul(ControlBlock::WORDS)
            .saturating_add(field);
        self.memory.write_word(word, value)
    }
}

impl<M: DmaMemory> DescriptorChain<M, Armed> {
    /// Take the chain back from the DMA engine. Only call once the engine
    /// has stopped or been reset.
    pub fn disarm(self) -> DescriptorChain<M, Building> {
        self.retype()
    }
}

/// The block just appended; lets the caller add transfer-information bits.
pub struct DescriptorHandle<'a, M: DmaMemory> {
    chain: &'a mut DescriptorChain<M, Building>,
    index: usize,
}

impl<M: DmaMemory> DescriptorHandle<'_, M> {
    /// OR `bits` into the block's transfer information.
    ///
    /// If the info word cannot be read back or rewritten the chain is marked
    /// overflowed, so a block missing its DREQ or interrupt tag is never armed.
    pub fn or_info(self, bits: u32) -> Result<Self, ChainFull> {
        let base = self.index.saturating_mul(ControlBlock::WORDS);
        let tagged = self
            .chain
            .memory
            .read_word(base)
            .is_some_and(|info| self.chain.write_field(self.index, INFO_WORD, info | bits).is_ok());
        if !tagged {
            self.chain.overflowed = true;
            error!("could not tag control block {}", self.index);
            return Err(ChainFull {
                capacity: self.chain.capacity,
            });
        }
        Ok(self)
    }

    /// Slot index of this block.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bus address of this block.
    pub fn bus_address(&self) -> Option<u32> {
        self.chain.slot_address(self.index)
    }
}

/// Iterator over the chain in execution order.
///
/// Stops at a null `next`, at an address outside the appended blocks, or
/// after `capacity` steps, so a corrupted chain cannot loop forever.
pub struct ChainWalk<'a, M, S> {
    chain: &'a DescriptorChain<M, S>,
    current: u32,
    remaining: usize,
}

impl<M: DmaMemory, S> Iterator for ChainWalk<'_, M, S> {
    type Item = (usize, ControlBlock);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == 0 || self.remaining == 0 {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        let index = self.chain.index_of(self.current)?;
        let block = self.chain.descriptor(index)?;
        self.current = block.next;
        Some((index, block))
    }
}
