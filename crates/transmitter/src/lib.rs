//! DMA-driven OOK transmitter for BCM2835-family SoCs
//!
//! Turns a string of `'1'`/`'0'` symbols into a chain of DMA control blocks
//! that drive the PWM peripheral with no CPU involvement once started:
//!
//! ```text
//! ClockProgrammer ──► PWM clock = 2 × carrier
//! PwmConfigurator ──► ch1 serializer (carrier on/off), ch2 FIFO (pacing)
//! discovery       ──► which hardware channel the DMA framework gave us
//! encoder         ──► DescriptorChain (2 blocks per symbol + terminal)
//! Transmitter     ──► arm, start, wait for CompletionSignal, tear down
//! ```
//!
//! The crate is `no_std`; hardware access goes through the [`platform`]
//! traits so the same code runs against real register windows, the
//! [`platform::mocks`] or the behavioural [`platform::sim`] SoC.
//!
//! # Features
//!
//! - `tracing`: log through `tracing` (desktop)
//! - `defmt`: log through `defmt` and derive `defmt::Format` (hardware)
//! - `serde`: serde derives for [`TransmitterConfig`]

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
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Must come first: the logging macros are used by every other module.
#[macro_use]
mod fmt;

pub mod chain;
pub mod clock;
pub mod completion;
pub mod config;
pub mod control;
pub mod controller;
pub mod discovery;
pub mod encoder;
pub mod error;
pub mod pwm;
pub mod samples;

pub use chain::{Armed, Building, ChainFull, DescriptorChain, MAX_DESCRIPTORS};
pub use clock::{ClockConfig, ClockError, ClockProgrammer, MashStage};
pub use completion::{BusyGate, CompletionEvent, CompletionSignal};
pub use config::{TransmitterConfig, DEFAULT_CODE};
pub use control::{Attribute, ControlSurface};
pub use controller::{
    DeviceState, Peripherals, TransmissionReport, Transmitter, TransmitterState,
};
pub use discovery::{ChannelRegisterBase, DiscoveryError};
pub use error::{ConfigError, ResourceError, TransmitterError};
pub use pwm::{PwmConfigurator, PwmError, PwmTiming};
