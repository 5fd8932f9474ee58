use std::path::PathBuf;

use anyhow::{bail, Context};
use c2_probe::session::format_dump;
use c2_probe::{Bench, InterfaceConfig, Session, TargetConfig};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// A run of SFR addresses, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SfrRange {
    start: u8,
    len: usize,
}

fn parse_number(src: &str) -> Result<u16, std::num::ParseIntError> {
    if let Some(hex) = src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        src.parse()
    }
}

fn parse_range(src: &str) -> Result<SfrRange, Box<dyn std::error::Error + Send + Sync + 'static>> {
    let parts = src
        .trim()
        .split("..")
        .map(parse_number)
        .collect::<Result<Vec<_>, _>>()?;

    let (start, end) = match *parts.as_slice() {
        [address] => (address, address.saturating_add(1)),
        [start, end] => (start, end),
        _ => return Err("Invalid range: multiple '..'s".into()),
    };

    if start > 0xFF || end > 0x100 {
        return Err("SFR addresses end at 0xFF".into());
    }
    if end <= start {
        return Err("Empty range".into());
    }

    Ok(SfrRange {
        start: start as u8,
        len: usize::from(end - start),
    })
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "c2host",
    about = "Host program driving a simulated C2 interface against an emulated target.",
    version
)]
struct Opts {
    #[clap(long, help = "Interface configuration (YAML). Defaults to the full profile.")]
    config: Option<PathBuf>,

    #[clap(
        long,
        default_value = "2",
        help = "Wait cycles the emulated target takes before signalling readiness."
    )]
    ready_latency: u32,

    #[clap(long, help = "Make the emulated target ignore every request.")]
    unresponsive: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Dump a range of special function registers.
    Dump {
        #[clap(
            default_value = "0x80..0x100",
            value_parser = parse_range,
            help = "Either a single address '0x80' or a range such as '0x80..0x100'. Both decimal and hex are accepted."
        )]
        range: SfrRange,
    },
    /// Dump the same range repeatedly.
    Live {
        #[clap(short, long, default_value = "10")]
        count: usize,

        #[clap(default_value = "0x80..0x100", value_parser = parse_range)]
        range: SfrRange,
    },
    /// Arm the glitch injector and report when the power gate dropped.
    Glitch {
        offset: u32,
        length: u8,

        #[clap(long, default_value = "1000", help = "Ticks to observe after arming.")]
        observe: u64,
    },
    /// Send a reset pulse to the target.
    Reset,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .without_time()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let opts = Opts::parse();

    let interface = match &opts.config {
        Some(path) => InterfaceConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load interface configuration from {}", path.display()))?,
        None => InterfaceConfig::default(),
    };

    // Each register reads back its own address.
    let target = TargetConfig {
        ready_latency: opts.ready_latency,
        unresponsive: opts.unresponsive,
        sfr: (0..=0xFF).collect(),
        ..TargetConfig::default()
    };

    let bench = Bench::from_config(&interface, target)?;
    let mut session = Session::new(bench);

    match opts.command {
        Command::Dump { range } => dump(&mut session, range)?,
        Command::Live { count, range } => {
            for pass in 0..count {
                if pass > 0 {
                    println!();
                }
                dump(&mut session, range)?;
            }
        }
        Command::Glitch {
            offset,
            length,
            observe,
        } => glitch(&mut session, offset, length, observe)?,
        Command::Reset => {
            session.reset().context("Reset failed")?;
            println!(
                "Target reset ({} ticks elapsed)",
                session.bench().interface().ticks()
            );
        }
    }

    Ok(())
}

fn dump(session: &mut Session, range: SfrRange) -> anyhow::Result<()> {
    let data = session
        .dump(range.start, range.len)
        .with_context(|| format!("Failed to dump {} registers from {:#04x}", range.len, range.start))?;

    for line in format_dump(range.start, &data) {
        println!("{line}");
    }

    Ok(())
}

fn glitch(session: &mut Session, offset: u32, length: u8, observe: u64) -> anyhow::Result<()> {
    session.arm_glitch(offset, length)?;

    let bench = session.bench_mut();

    // The tick that sees the arm bit.
    bench.tick();

    let mut low = Vec::new();
    for tick in 1..=observe {
        bench.tick();
        if !bench.interface().power_gate() {
            low.push(tick);
        }
    }

    match (low.first(), low.last()) {
        (Some(first), Some(last)) => {
            println!(
                "Power gate dropped on ticks {first}..={last} after arming ({} ticks)",
                low.len()
            );
        }
        _ if length == 0 => println!("Glitch length is zero, the power gate never dropped"),
        _ => bail!("The power gate did not drop within {observe} ticks"),
    }

    Ok(())
}
