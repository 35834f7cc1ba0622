// CLI command handlers
use crate::create_progress_bar;
use crate::terminal::TerminalConsole;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use zipmon_core::bus::net::TcpBus;
use zipmon_core::bus::sim::SimBus;
use zipmon_core::bus::DevBus;
use zipmon_core::debugger::{Session, SessionState};
use zipmon_core::image::{load_image, WordOrder};
use zipmon_core::profile::dump::AnnotatedDump;
use zipmon_core::profile::report::{write_dump, write_profile_summary, ReportOptions};
use zipmon_core::profile::{ProfileSample, ProfileTable};
use zipmon_core::{MonitorConfig, ProfileError, ZipDecoder};

pub struct DebugArgs {
    pub sim: Option<PathBuf>,
    pub load_address: Option<u32>,
    pub connect: Option<String>,
    pub stall_timeout_ms: Option<u64>,
    pub poll_ms: Option<u64>,
}

pub struct PdumpArgs {
    pub files: Vec<PathBuf>,
    pub profile: PathBuf,
    pub base: Option<u32>,
    pub top: Option<usize>,
    pub no_echo: bool,
    pub json: Option<PathBuf>,
    pub big_endian: bool,
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    MonitorConfig::load(path).context("Failed to load monitor configuration")
}

pub fn run_pdump(config_path: Option<&Path>, args: PdumpArgs) -> Result<()> {
    let config = load_config(config_path)?;

    let pb = create_progress_bar("Loading profile...");
    let samples = ProfileSample::load(&args.profile)
        .with_context(|| format!("Failed to read profile: {}", args.profile.display()))?;
    pb.finish_and_clear();

    let samples = samples.unwrap_or_default();
    let table = match ProfileTable::aggregate_with_limit(&samples, config.max_profile_span) {
        Ok(table) => table,
        Err(err @ ProfileError::SpanTooLarge { .. }) => {
            warn!("{err}");
            None
        }
        Err(err) => return Err(err).context("Failed to aggregate profile"),
    };

    let base = args
        .base
        .or_else(|| table.as_ref().map(ProfileTable::min_address))
        .unwrap_or(config.boot_address);
    info!("dumping from base address 0x{base:08x}");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if let Some(table) = &table {
        let options = ReportOptions {
            echo_samples: !args.no_echo,
            top: args.top,
        };
        write_profile_summary(&mut out, &samples, table, &options)
            .context("Failed to write profile summary")?;

        if let Some(path) = &args.json {
            let json = table.export_json().context("Failed to serialize profile")?;
            fs::write(path, json)
                .with_context(|| format!("Failed to write JSON profile: {}", path.display()))?;
        }
    } else if args.json.is_some() {
        warn!("no profile data, skipping JSON export");
    }

    let order = if args.big_endian {
        WordOrder::Big
    } else {
        WordOrder::Little
    };
    for file in &args.files {
        let words = match load_image(file, order) {
            Ok(words) => words,
            Err(err) => {
                warn!("skipping {}: {err}", file.display());
                continue;
            }
        };
        let dump = AnnotatedDump::new(words, base, ZipDecoder::new(), table.as_ref());
        let count = write_dump(&mut out, &file.display().to_string(), dump)
            .context("Failed to write dump")?;
        info!("{}: {count} instructions", file.display());
    }

    out.flush().context("Failed to flush output")?;
    Ok(())
}

pub fn run_debug(config_path: Option<&Path>, args: DebugArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(ms) = args.stall_timeout_ms {
        config.stall_timeout_ms = Some(ms);
    }
    if let Some(ms) = args.poll_ms {
        config.poll_interval_ms = ms;
    }

    let bus: Box<dyn DevBus> = match (&args.sim, &args.connect) {
        (Some(image), _) => {
            let base = args.load_address.unwrap_or(config.boot_address);
            let sim = SimBus::open(config.debug_port(), image, base, WordOrder::Little)
                .with_context(|| format!("Failed to open image: {}", image.display()))?;
            let port = sim.port();
            info!(
                "simulating {} at 0x{base:08x}, debug port ctrl 0x{:08x} data 0x{:08x}",
                image.display(),
                port.ctrl,
                port.data
            );
            Box::new(sim)
        }
        (None, Some(addr)) => {
            let mut tcp = TcpBus::connect(addr.as_str())
                .with_context(|| format!("Failed to connect to bus bridge at {addr}"))?;
            tcp.set_timeout(config.session().stall_timeout)
                .context("Failed to set bus bridge timeout")?;
            Box::new(tcp)
        }
        (None, None) => anyhow::bail!("either --sim or --connect is required"),
    };

    let mut session = Session::new(bus, ZipDecoder::new(), config.session());
    if !session.launch().context("Failed to halt the CPU")? {
        warn!("CPU did not stall after the halt request, register reads may time out");
    }

    let mut console = TerminalConsole::enter().context("Failed to set up the terminal")?;
    let state = session.run(&mut console);
    drop(console);

    match state.context("Debug session failed")? {
        SessionState::Running => println!("CPU released"),
        _ => println!("CPU left halted"),
    }
    Ok(())
}
