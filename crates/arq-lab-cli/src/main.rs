use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use arq_lab_abstract::{ProtocolConfig, SimConfig, PAYLOAD_LEN};
use arq_lab_protocols::{build_pair, variant_by_name};
use arq_lab_simulator::{scenario_runner, SimulationReport, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "ARQ lab: Go-Back-N / Selective Repeat over a lossy channel")]
struct Args {
    /// Protocol variant to run: 'gbn' or 'sr'.
    #[arg(long, default_value = "gbn")]
    variant: String,

    /// Number of application messages to generate.
    #[arg(long, default_value_t = 10)]
    messages: u32,

    /// Spacing between generated messages, in simulated ms.
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Probability that the channel loses a packet.
    #[arg(long, default_value_t = 0.0)]
    loss_rate: f64,

    /// Probability that the channel corrupts a packet.
    #[arg(long, default_value_t = 0.0)]
    corrupt_rate: f64,

    #[arg(long, default_value_t = 1)]
    min_latency: u64,

    #[arg(long, default_value_t = 7)]
    max_latency: u64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = 6)]
    window_size: usize,

    #[arg(long, default_value_t = 7)]
    seq_space: i32,

    /// Retransmission timeout, in simulated ms.
    #[arg(long, default_value_t = 16)]
    rtt: u64,

    /// Selective Repeat retry ceiling before the session is declared dead.
    #[arg(long, default_value_t = 10)]
    max_retries: u32,

    /// Run a TOML scenario instead of generated traffic.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let variant = variant_by_name(&args.variant)?;
    let protocol = ProtocolConfig {
        window_size: args.window_size,
        seq_space: args.seq_space,
        rtt: args.rtt,
        max_retries: args.max_retries,
    };
    let (sender, receiver) = build_pair(variant, protocol);

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario(path, sender, receiver)?
    } else {
        run_generated(&args, sender, receiver)?
    };

    info!(
        "Done: {} payload(s) delivered in {}ms ({} packets from sender)",
        report.delivered_data.len(),
        report.duration_ms,
        report.sender_packet_count
    );
    info!("Sender stats: {:?}", report.sender_stats);
    info!("Receiver stats: {:?}", report.receiver_stats);

    if let Some(path) = &args.trace_out {
        write_trace(path, &report)?;
    }
    Ok(())
}

fn run_generated(
    args: &Args,
    sender: Box<dyn arq_lab_abstract::ArqSender>,
    receiver: Box<dyn arq_lab_abstract::ArqReceiver>,
) -> Result<SimulationReport> {
    anyhow::ensure!(
        args.min_latency <= args.max_latency,
        "min_latency ({}) must not exceed max_latency ({})",
        args.min_latency,
        args.max_latency
    );
    let config = SimConfig {
        loss_rate: args.loss_rate,
        corrupt_rate: args.corrupt_rate,
        min_latency: args.min_latency,
        max_latency: args.max_latency,
        seed: args.seed,
    };
    let mut sim = Simulator::new(config, sender, receiver);

    // The i-th message is 20 copies of the i-th lowercase letter, the
    // reference emulator's traffic pattern.
    for i in 0..args.messages {
        let byte = b'a' + (i % 26) as u8;
        sim.schedule_app_send(u64::from(i) * args.interval_ms, vec![byte; PAYLOAD_LEN]);
    }

    info!(
        "Starting {} run: {} messages, loss={}, corrupt={}",
        args.variant, args.messages, args.loss_rate, args.corrupt_rate
    );
    sim.run_until_complete()
        .context("Protocol failure ended the session")?;
    Ok(sim.export_report())
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
