use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use controller::{EsdConfig, Timing};
use safety::BlinkPhase;
use sim::{Bench, BenchConfig, Scenario, ScenarioReport};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScenarioArg {
    FullSequence,
    BasicFunctionality,
    EdgeCases,
    WatchdogTimeout,
    DualEstop,
    All,
}

impl ScenarioArg {
    fn scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioArg::FullSequence => vec![Scenario::FullSequence],
            ScenarioArg::BasicFunctionality => vec![Scenario::BasicFunctionality],
            ScenarioArg::EdgeCases => vec![Scenario::EdgeCases],
            ScenarioArg::WatchdogTimeout => vec![Scenario::WatchdogTimeout],
            ScenarioArg::DualEstop => vec![Scenario::DualEstop],
            ScenarioArg::All => Scenario::ALL.to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimingArg {
    /// 100 kHz verification bench
    Bench100khz,
    /// 50 MHz silicon target
    Asic50mhz,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlinkPhaseArg {
    RestartOnEntry,
    FreeRunning,
}

impl From<BlinkPhaseArg> for BlinkPhase {
    fn from(p: BlinkPhaseArg) -> Self {
        match p {
            BlinkPhaseArg::RestartOnEntry => BlinkPhase::RestartOnEntry,
            BlinkPhaseArg::FreeRunning => BlinkPhase::FreeRunning,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "esd-sim",
    version,
    about = "Emergency shutdown controller bench runner"
)]
struct Args {
    #[arg(value_enum, long, default_value = "full-sequence")]
    scenario: ScenarioArg,

    /// Timing preset the tick counts are derived from
    #[arg(value_enum, long, default_value = "bench100khz")]
    timing: TimingArg,

    /// JSON controller configuration; fields left out keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debounce threshold in ticks
    #[arg(long)]
    debounce_ticks: Option<u32>,

    /// Watchdog timeout in ticks
    #[arg(long)]
    timeout_ticks: Option<u32>,

    /// Synchronizer depth
    #[arg(long)]
    sync_depth: Option<usize>,

    /// Status lamp half period in ticks
    #[arg(long)]
    blink_half_period: Option<u32>,

    #[arg(value_enum, long)]
    blink_phase: Option<BlinkPhaseArg>,

    /// RNG seed for contact bounce and metastable captures
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Emit the JSONL trace on stdout
    #[arg(long)]
    trace: bool,

    /// Trace sampling interval in ticks (output changes are always traced)
    #[arg(long, default_value_t = 1000)]
    every: u64,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    check_args(&args)?;

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let (esd, clock_hz) = load_config(&args)?;
    info!(?esd, clock_hz, "controller configuration");

    let mut failed = 0;
    for scenario in args.scenario.scenarios() {
        let mut cfg = BenchConfig::new(esd);
        cfg.clock_hz = clock_hz;
        cfg.seed = args.seed;

        let mut bench = Bench::new(cfg).context("invalid controller configuration")?;
        if args.trace {
            bench.record_trace(args.every);
        }

        let report = scenario.run(&mut bench);
        if args.trace {
            emit_trace(&report)?;
        }
        for c in report.checks.iter().filter(|c| !c.passed) {
            warn!(
                scenario = scenario.label(),
                tick = c.tick,
                detail = c.detail.as_deref(),
                "failed: {}",
                c.name
            );
        }
        failed += report.failed_count();
    }

    if failed > 0 {
        bail!("{failed} check(s) failed");
    }
    Ok(())
}

/// Each scenario restarts the bench clock, so one JSONL stream can only
/// hold a single scenario.
fn check_args(args: &Args) -> Result<()> {
    if args.trace && args.scenario.scenarios().len() > 1 {
        bail!("--trace needs a single --scenario; run each scenario separately");
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<(EsdConfig, u32)> {
    let timing = match args.timing {
        TimingArg::Bench100khz => Timing::bench_100khz(),
        TimingArg::Asic50mhz => Timing::asic_50mhz(),
    };

    let mut cfg = match &args.config {
        Some(path) => read_config(path)?,
        None => EsdConfig::from_timing(&timing)?,
    };

    if let Some(v) = args.debounce_ticks {
        cfg.debounce_ticks = v;
    }
    if let Some(v) = args.timeout_ticks {
        cfg.watchdog_timeout_ticks = v;
    }
    if let Some(v) = args.sync_depth {
        cfg.sync_depth = v;
    }
    if let Some(v) = args.blink_half_period {
        cfg.blink_half_period_ticks = v;
    }
    if let Some(v) = args.blink_phase {
        cfg.blink_phase = v.into();
    }

    cfg.validate()?;
    Ok((cfg, timing.clock_hz))
}

fn read_config(path: &Path) -> Result<EsdConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

/// One JSON object per line on stdout.
fn emit_trace(report: &ScenarioReport) -> Result<()> {
    for row in &report.trace {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("esd-sim").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn trace_of_every_scenario_is_rejected() {
        assert!(check_args(&parse(&["--scenario", "all", "--trace"])).is_err());
        assert!(check_args(&parse(&["--scenario", "all"])).is_ok());
        assert!(check_args(&parse(&["--scenario", "dual-estop", "--trace"])).is_ok());
    }

    #[test]
    fn overrides_apply_on_top_of_the_timing_preset() {
        let args = parse(&["--timing", "asic50mhz", "--sync-depth", "3"]);
        let (cfg, clock_hz) = load_config(&args).unwrap();
        assert_eq!(clock_hz, 50_000_000);
        assert_eq!(cfg.sync_depth, 3);
        assert_eq!(cfg.debounce_ticks, 500_000);
    }

    #[test]
    fn oversized_sync_depth_is_a_config_error() {
        let args = parse(&["--sync-depth", "1000000"]);
        assert!(load_config(&args).is_err());
    }
}
