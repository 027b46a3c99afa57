//! Runs random traffic through the chip, the chipset, and the link between them, and checks the delivered streams.

use std::path::PathBuf;

use clap::Parser;
use pitonflow_chipset::*;

#[derive(Parser, Debug)]
#[command(name = "pitonflow-chipset", version, about = "Cycle-level simulation of the chip-to-chipset bridge")]
struct Cli {
    /// Board profile. Overridden by the `profile` key of the configuration file.
    #[arg(short, long)]
    profile: Option<BoardProfile>,

    /// TOML configuration file, overlaid on the board profile.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Core cycles of random traffic.
    #[arg(long, default_value_t = 10_000)]
    cycles: u64,

    /// Seed of every random choice.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Probability that a producer offers a new flit in a core cycle.
    #[arg(long, default_value_t = 0.5)]
    injection_rate: f64,

    /// Probability that a consumer is ready in a core cycle.
    #[arg(long, default_value_t = 1.0)]
    consumer_rate: f64,

    /// Probability that a bit is flipped on the link.
    #[arg(long)]
    bit_error_rate: Option<f64>,

    /// Send credit threshold of both bridges.
    #[arg(long)]
    threshold: Option<usize>,

    /// Core cycles at which the external reset is pulsed.
    #[arg(long = "reset-at", value_name = "CYCLE")]
    reset_at: Vec<u64>,
}

fn main() -> Result<(), ChipsetError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = ChipsetConfig::load_with(cli.config.as_deref(), cli.profile)?;
    if let Some(threshold) = cli.threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(rate) = cli.bit_error_rate {
        config.link.bit_error_rate = rate;
    }
    log::info!("profile {}, seed {}", config.profile.name(), cli.seed);

    let mut system = System::new(config, cli.seed)?;
    for cycle in &cli.reset_at {
        system.schedule_reset(*cycle);
    }
    let consumer = if cli.consumer_rate >= 1.0 {
        ConsumerMode::Always
    } else {
        ConsumerMode::Random(cli.consumer_rate.max(0.0))
    };

    let report = system.run_random(cli.cycles, cli.injection_rate.clamp(0.0, 1.0), consumer);
    println!("{}", report);
    report.verify()
}
