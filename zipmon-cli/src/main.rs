// CLI application
use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod commands;
mod terminal;

use commands::{run_debug, run_pdump, DebugArgs, PdumpArgs};

#[derive(Parser)]
#[command(name = "zipmon")]
#[command(about = "Zip CPU debug monitor and profile dumper")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file (default: <config dir>/zipmon/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write log output to this file (without it, `debug` discards logs)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Halt a CPU and inspect it interactively
    Debug {
        /// Simulate a CPU running this instruction image
        #[arg(long, conflicts_with = "connect", required_unless_present = "connect")]
        sim: Option<PathBuf>,

        /// Load address of the simulated image
        #[arg(long, value_parser = parse_address, requires = "sim")]
        load_address: Option<u32>,

        /// Connect to a bus bridge at HOST:PORT
        #[arg(long)]
        connect: Option<String>,

        /// Give up on a register read after this many milliseconds
        #[arg(long)]
        stall_timeout_ms: Option<u64>,

        /// Keyboard poll interval in milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,
    },
    /// Dump instruction images annotated with profile counts
    Pdump {
        /// Instruction image files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Profile sample file
        #[arg(long, default_value = "pfile.bin")]
        profile: PathBuf,

        /// Address of the first word of each image
        #[arg(long, value_parser = parse_address)]
        base: Option<u32>,

        /// Only list the N hottest addresses
        #[arg(long, value_name = "N")]
        top: Option<usize>,

        /// Do not echo every sample address
        #[arg(long)]
        no_echo: bool,

        /// Also write the aggregated profile as JSON
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,

        /// Image words are stored big-endian
        #[arg(long)]
        big_endian: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let full_screen = matches!(cli.command, Commands::Debug { .. });
    init_logging(LogSink::choose(cli.log_file.as_deref(), full_screen))?;

    match cli.command {
        Commands::Debug {
            sim,
            load_address,
            connect,
            stall_timeout_ms,
            poll_ms,
        } => run_debug(
            cli.config.as_deref(),
            DebugArgs {
                sim,
                load_address,
                connect,
                stall_timeout_ms,
                poll_ms,
            },
        ),
        Commands::Pdump {
            files,
            profile,
            base,
            top,
            no_echo,
            json,
            big_endian,
        } => run_pdump(
            cli.config.as_deref(),
            PdumpArgs {
                files,
                profile,
                base,
                top,
                no_echo,
                json,
                big_endian,
            },
        ),
    }
}

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogSink {
    Stderr,
    File(PathBuf),
    /// The full-screen debugger owns the terminal and nothing else may
    /// write to it.
    Discard,
}

impl LogSink {
    fn choose(log_file: Option<&Path>, full_screen: bool) -> Self {
        match log_file {
            Some(path) => LogSink::File(path.to_path_buf()),
            None if full_screen => LogSink::Discard,
            None => LogSink::Stderr,
        }
    }
}

fn init_logging(sink: LogSink) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"),
    );
    match sink {
        LogSink::Stderr => {}
        LogSink::File(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        LogSink::Discard => {
            builder.target(env_logger::Target::Pipe(Box::new(io::sink())));
        }
    }
    builder.init();
    Ok(())
}

/// Accepts `0x`-prefixed hexadecimal or decimal.
fn parse_address(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|err| format!("invalid address '{text}': {err}"))
}

pub(crate) fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
