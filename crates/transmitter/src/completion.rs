//! Completion signalling
//!
//! The DMA framework calls [`CompletionSignal::transfer_complete`] from its
//! interrupt handler. That context only timestamps and signals; the clock,
//! PWM and DMA teardown runs in the waiter (see
//! [`crate::Transmitter::wait_complete`]).
//!
//! [`BusyGate`] is the single-flight flag: set while a transmission is
//! between `start` and its completion (or `stop`).

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use platform::TransferNotifier;

/// A completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompletionEvent {
    /// When the interrupt was handled.
    pub at: Instant,
}

/// Interrupt-to-thread completion notification.
///
/// Lives in a `static`: the DMA framework keeps a `&'static` to it for as
/// long as the probe transfer is queued.
pub struct CompletionSignal {
    signal: Signal<CriticalSectionRawMutex, CompletionEvent>,
}

impl CompletionSignal {
    /// An unsignalled completion.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Wait for the next completion and consume it.
    pub async fn wait(&self) -> CompletionEvent {
        self.signal.wait().await
    }

    /// Consume a completion if one is pending.
    pub fn try_take(&self) -> Option<CompletionEvent> {
        self.signal.try_take()
    }

    /// Whether a completion is pending.
    pub fn is_signaled(&self) -> bool {
        self.signal.signaled()
    }

    /// Drop any pending completion.
    pub fn reset(&self) {
        self.signal.reset();
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferNotifier for CompletionSignal {
    fn transfer_complete(&self) {
        self.signal.signal(CompletionEvent { at: Instant::now() });
    }
}

/// Single-flight gate: at most one transmission per device.
#[derive(Debug, Default)]
pub struct BusyGate(AtomicBool);

impl BusyGate {
    /// An open gate.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Close the gate; `false` if it already was.
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Open the gate. Opening an open gate is a no-op.
    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether a transmission holds the gate.
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
