use anyhow::{Context, Result};
use clap::Parser;
use fuzzydev::backends::{self, BackendKind};
use fuzzydev::clock::MonotonicClock;
use fuzzydev::descriptor::DescriptorFormat;
use fuzzydev::trace::WriterTrace;
use fuzzydev::{logger, CancellationToken, FuzzConfig, Harness};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fuzzydev",
    version,
    about = "Create randomized virtual input devices and feed them random event streams"
)]
struct Cli {
    /// TOML config file; every key is optional.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rng seed. A random seed is drawn and logged when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after N iterations (default: run until Ctrl-C).
    #[arg(long, value_name = "N")]
    iterations: Option<u64>,

    /// Where devices are created.
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// How device descriptors are written to the trace.
    #[arg(long, value_enum)]
    descriptor_format: Option<DescriptorFormat>,
}

impl Cli {
    fn into_config(self) -> Result<FuzzConfig> {
        let mut config = match &self.config {
            Some(path) => FuzzConfig::load(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => FuzzConfig::default(),
        };
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.iterations.is_some() {
            config.iterations = self.iterations;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(format) = self.descriptor_format {
            config.descriptor_format = format;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    logger::init("info");
    let config = Cli::parse().into_config()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())
            .context("failed to install Ctrl-C handler")?;
    }

    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, backend = ?config.backend, "starting fuzz run");
    let mut rng = StdRng::seed_from_u64(seed);

    let backend = backends::create(config.backend).context("failed to set up backend")?;
    let mut harness = Harness::new(config, backend).context("invalid configuration")?;

    let summary = harness
        .run(
            &mut WriterTrace::stdio(),
            &mut MonotonicClock::new(),
            &mut rng,
            &cancel,
        )
        .with_context(|| format!("fuzz run failed (seed {seed})"))?;

    tracing::info!(
        seed,
        iterations = summary.iterations,
        frames = summary.frames,
        events = summary.events,
        "done"
    );
    Ok(())
}
