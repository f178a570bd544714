// Desktop tooling crate — unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

//! `ook-sim`: run a transmission against the simulated SoC.
//!
//! ```text
//! ook-sim                          # default code through the control surface
//! ook-sim --sequence 1011 --dump   # one sequence, print the chain
//! RUST_LOG=debug ook-sim -c sim.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use platform::sim::{SimConfig, SimulatedSoc, WriteOrigin};
use platform::{GpioPin, Peripheral};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use transmitter::{
    Attribute, CompletionSignal, ControlSurface, Peripherals, TransmissionReport, Transmitter,
    TransmitterConfig, DEFAULT_CODE,
};

/// Completion notifier handed to the simulated DMA framework.
static COMPLETION: CompletionSignal = CompletionSignal::new();

#[derive(Parser)]
#[command(name = "ook-sim")]
#[command(about = "Simulate the DMA-driven OOK transmitter", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON file with `transmitter` and `soc` sections
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Symbols to send; the default code when omitted
    #[arg(short, long)]
    sequence: Option<String>,
    /// Carrier frequency in Hz
    #[arg(long, allow_hyphen_values = true)]
    carrier_frequency: Option<i32>,
    /// Sample rate in Hz
    #[arg(long, allow_hyphen_values = true)]
    sample_rate: Option<i32>,
    /// Hardware channel the simulated framework hands out
    #[arg(long)]
    channel: Option<usize>,
    /// Disable the prefetch discovery depends on
    #[arg(long)]
    no_prefetch: bool,
    /// Number of transmissions
    #[arg(short = 'n', long, default_value_t = 1)]
    repeat: u32,
    /// Print the control blocks of the last transmission
    #[arg(long)]
    dump: bool,
    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SimulatorConfig {
    transmitter: TransmitterConfig,
    soc: SimConfig,
}

impl SimulatorConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };
    if let Some(channel) = cli.channel {
        config.soc.hardware_channel = channel;
    }
    if cli.no_prefetch {
        config.soc.prefetch_on_issue = false;
    }
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let soc = SimulatedSoc::new(config.soc.clone());
    let tx = Transmitter::new(
        config.transmitter,
        Peripherals {
            clock: soc.window(Peripheral::ClockManager),
            pwm: soc.window(Peripheral::Pwm),
            gpio: soc.window(Peripheral::Gpio),
            dma: soc.window(Peripheral::Dma),
        },
        soc.dma_engine(),
        soc.memory(),
        &COMPLETION,
    )
    .context("creating transmitter")?;

    let tx = match cli.sequence.as_deref() {
        Some(sequence) => send_sequence(tx, &cli, sequence).await?,
        None => send_default_code(tx, &cli)?,
    };

    if cli.dump {
        dump_chain(&tx);
    }
    summarize(&soc, &tx);

    tx.release();
    tracing::info!(released = soc.channels_released(), "DMA channel released");
    Ok(())
}

type SimTransmitter = Transmitter<
    platform::sim::SimWindow,
    platform::sim::SimDmaEngine,
    platform::sim::SimMemory,
>;

/// Drive the transmitter directly.
async fn send_sequence(mut tx: SimTransmitter, cli: &Cli, sequence: &str) -> Result<SimTransmitter> {
    if let Some(hz) = cli.carrier_frequency {
        tx.set_carrier_frequency(hz)?;
    }
    if let Some(hz) = cli.sample_rate {
        tx.set_sample_rate(hz)?;
    }
    for round in 1..=cli.repeat {
        let report = tx.send(sequence).await?;
        print_report(round, &report);
    }
    Ok(tx)
}

/// Go through the attribute surface, the way a host shell would.
fn send_default_code(tx: SimTransmitter, cli: &Cli) -> Result<SimTransmitter> {
    let mut surface = ControlSurface::new(tx);
    if let Some(hz) = cli.carrier_frequency {
        surface.store(Attribute::CarrierFrequency, &format!("{hz}\n"))?;
    }
    if let Some(hz) = cli.sample_rate {
        surface.store(Attribute::SampleRate, &format!("{hz}\n"))?;
    }
    for attribute in Attribute::ALL {
        print!("{} = {}", attribute.name(), surface.show(attribute));
    }
    for round in 1..=cli.repeat {
        match surface.store(Attribute::Send, DEFAULT_CODE)? {
            Some(report) => print_report(round, &report),
            None => bail!("send store did not transmit"),
        }
    }
    Ok(surface.into_inner())
}

fn print_report(round: u32, report: &TransmissionReport) {
    println!(
        "#{round}: {} symbols, {} blocks on DMA channel {}, clock {} Hz (divi {}, divf {}, MASH {}), width {}, {} ms",
        report.symbols,
        report.descriptors,
        report.channel,
        report.clock.target_hz,
        report.clock.divi,
        report.clock.divf,
        report.clock.mash.bits(),
        report.timing.width(),
        report.elapsed.as_millis(),
    );
}

fn dump_chain(tx: &SimTransmitter) {
    println!("{:>4}  {:>10}  {:>10}  {:>10}  {:>10}", "#", "info", "source", "dest", "next");
    for index in 0..tx.descriptor_count() {
        if let Some(cb) = tx.descriptor(index) {
            println!(
                "{index:>4}  {:#010x}  {:#010x}  {:#010x}  {:#010x}",
                cb.info, cb.source, cb.destination, cb.next
            );
        }
    }
}

fn summarize(soc: &SimulatedSoc, tx: &SimTransmitter) {
    let writes = soc.writes();
    let by_dma = writes.iter().filter(|w| w.origin == WriteOrigin::Dma).count();
    let led = GpioPin::new(tx.config().busy_led_pin).map(|pin| soc.gpio_level(pin));
    tracing::info!(
        cpu_writes = writes.len().saturating_sub(by_dma),
        dma_writes = by_dma,
        completions = soc.completions(),
        state = ?tx.state(),
        busy_led = ?led,
        "simulation finished"
    );
}
