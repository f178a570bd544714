//! Register window abstraction
//!
//! Every peripheral is driven the same way: read a 32-bit register, write a
//! 32-bit register, at a fixed byte offset inside a mapped window. Mapping
//! the window is the caller's job; this module only describes access.

use core::ptr::NonNull;

/// A window of 32-bit memory-mapped registers.
///
/// Methods take `&self`: register access is volatile and has no Rust-level
/// aliasing story, exactly like the hardware it models.
pub trait RegisterBlock {
    /// Read the register at byte `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at byte `offset`.
    fn write(&self, offset: usize, value: u32);

    /// Read-modify-write the register at byte `offset`.
    fn modify(&self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read(offset);
        self.write(offset, f(value));
    }
}

impl<R: RegisterBlock + ?Sized> RegisterBlock for &R {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value);
    }
}

/// A sub-range of a larger window, starting at a fixed byte offset.
///
/// The DMA controller exposes one register set per channel at a 0x100
/// stride; a bound channel is a `SubWindow` over the DMA window.
#[derive(Debug, Clone, Copy)]
pub struct SubWindow<'a, R: ?Sized> {
    parent: &'a R,
    base: usize,
}

impl<'a, R: RegisterBlock + ?Sized> SubWindow<'a, R> {
    /// Create a view of `parent` starting at byte offset `base`.
    pub fn new(parent: &'a R, base: usize) -> Self {
        Self { parent, base }
    }

    /// Byte offset of this view inside its parent window.
    pub fn base(&self) -> usize {
        self.base
    }
}

impl<R: RegisterBlock + ?Sized> RegisterBlock for SubWindow<'_, R> {
    fn read(&self, offset: usize) -> u32 {
        self.parent.read(self.base.saturating_add(offset))
    }

    fn write(&self, offset: usize, value: u32) {
        self.parent.write(self.base.saturating_add(offset), value);
    }
}

/// A real memory-mapped register window.
///
/// Accesses outside the mapped length read as zero and drop writes instead
/// of touching unmapped memory.
pub struct MmioWindow {
    base: NonNull<u32>,
    len_bytes: usize,
}

impl MmioWindow {
    /// Wrap an already-mapped register window.
    ///
    /// Returns `None` for a null or misaligned base pointer.
    ///
    /// # Safety
    ///
    /// `base` must point to `len_bytes` of device memory that stays mapped
    /// for the lifetime of the returned value, and nothing else may assume
    /// exclusive access to it.
    pub unsafe fn new(base: *mut u32, len_bytes: usize) -> Option<Self> {
        let base = NonNull::new(base)?;
        if base.as_ptr().align_offset(core::mem::align_of::<u32>()) != 0 {
            return None;
        }
        Some(Self { base, len_bytes })
    }

    /// Mapped length in bytes.
    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }

    fn word_ptr(&self, offset: usize) -> Option<*mut u32> {
        let end = offset.checked_add(4)?;
        if end > self.len_bytes || offset % 4 != 0 {
            return None;
        }
        // SAFETY: offset + 4 <= len_bytes, so the word lies inside the
        // window that `new` was promised is mapped.
        Some(unsafe { self.base.as_ptr().add(offset / 4) })
    }
}

// SAFETY: the window is device memory accessed only through volatile
// operations; sharing the pointer between contexts is how the hardware is
// used (the completion path and the control thread both touch registers).
unsafe impl Send for MmioWindow {}
// SAFETY: see `Send` above; every access is a single volatile word access.
unsafe impl Sync for MmioWindow {}

impl RegisterBlock for MmioWindow {
    fn read(&self, offset: usize) -> u32 {
        match self.word_ptr(offset) {
            // SAFETY: word_ptr only returns in-range, aligned pointers.
            Some(ptr) => unsafe { ptr.read_volatile() },
            None => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        if let Some(ptr) = self.word_ptr(offset) {
            // SAFETY: word_ptr only returns in-range, aligned pointers.
            unsafe { ptr.write_volatile(value) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmio_window_reads_and_writes_backing_words() {
        let mut backing = [0u32; 4];
        // SAFETY: backing outlives the window and is only touched through it.
        let window = unsafe { MmioWindow::new(backing.as_mut_ptr(), 16) }.unwrap();

        window.write(0x8, 0xDEAD_BEEF);
        assert_eq!(window.read(0x8), 0xDEAD_BEEF);
        window.modify(0x8, |v| v & 0xFFFF);
        assert_eq!(window.read(0x8), 0xBEEF);
        drop(window);
        assert_eq!(backing[2], 0xBEEF);
    }

    #[test]
    fn mmio_window_ignores_out_of_range_and_misaligned_offsets() {
        let mut backing = [0u32; 2];
        // SAFETY: backing outlives the window and is only touched through it.
        let window = unsafe { MmioWindow::new(backing.as_mut_ptr(), 8) }.unwrap();

        window.write(8, 1);
        window.write(2, 1);
        assert_eq!(window.read(8), 0);
        assert_eq!(window.read(2), 0);
        drop(window);
        assert_eq!(backing, [0, 0]);
    }

    #[test]
    fn null_base_is_rejected() {
        // SAFETY: a null pointer is never dereferenced; new() rejects it.
        assert!(unsafe { MmioWindow::new(core::ptr::null_mut(), 16) }.is_none());
    }

    #[test]
    fn sub_window_offsets_into_parent() {
        let mut backing = [0u32; 0x300 / 4];
        // SAFETY: backing outlives the window and is only touched through it.
        let window = unsafe { MmioWindow::new(backing.as_mut_ptr(), 0x300) }.unwrap();
        let channel2 = SubWindow::new(&window, 0x200);

        channel2.write(0x0C, 42);
        assert_eq!(window.read(0x20C), 42);
        assert_eq!(channel2.base(), 0x200);
    }
}
