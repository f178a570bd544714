//! Hardware Abstraction Layer (HAL) for the BCM2835-family OOK transmitter
//!
//! This crate provides trait-based abstractions for every piece of hardware
//! the transmitter touches, enabling development and testing without a
//! Raspberry Pi on the bench.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (simulator binary / kernel-side glue)
//!         ↓
//! Transmitter core (clock, PWM, descriptor chain, discovery, controller)
//!         ↓
//! Platform HAL (this crate - trait abstractions + register map)
//!         ↓
//! Memory-mapped peripheral windows / DMA engine framework
//! ```
//!
//! # Abstraction Levels
//!
//! ## Register level
//! - [`RegisterBlock`] - 32-bit read/write at a fixed offset in a window
//! - [`registers`] - clock manager, PWM, GPIO and DMA register map
//! - [`memory_map`] - physical vs. bus (DMA-visible) addresses
//!
//! ## DMA
//! - [`DmaEngineService`] - the framework that owns channel allocation and IRQs
//! - [`DmaMemory`] - coherent memory shared between CPU and DMA engine
//! - [`ControlBlock`] - the hardware transfer descriptor layout
//!
//! # Features
//!
//! - `std`: host-side mocks ([`mocks`])
//! - `simulator`: behavioural SoC model ([`sim`])
//! - `serde`: serde derives for [`GpioPin`] and the simulator configuration
//! - `defmt`: enable defmt logging derives

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)] // all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod clock_config;
pub mod dma;
pub mod gpio;
pub mod memory_map;
pub mod mmio;
pub mod registers;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

#[cfg(feature = "simulator")]
pub mod sim;

// Re-export register-level types
pub use mmio::{MmioWindow, RegisterBlock, SubWindow};

// Re-export DMA types
pub use dma::{
    BusRegion, BusWidth, CoherentRegion, ControlBlock, DmaCapability, DmaCookie,
    DmaEngineService, DmaMemory, SlaveConfig, TransferDirection, TransferNotifier,
};

// Re-export GPIO types
pub use gpio::{FunctionSelect, Gpio, GpioPin};

// Re-export address map types
pub use memory_map::Peripheral;
